//! Task and result records exchanged over the push/pull channels.
//!
//! Image payloads travel as standard base64 strings. Decoding is left to
//! the consumer so that a task with a corrupt payload still carries its id
//! and can be answered with an error result.

use base64::{Engine, engine::general_purpose::STANDARD};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A unit of requested image-effect work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub task_id: CompactString,
    /// Effect name as requested by the client.
    pub effect: CompactString,
    /// Base64 of the encoded raster.
    pub image_data: String,
}

impl Task {
    /// Build a task from raw encoded image bytes.
    pub fn new(
        task_id: impl Into<CompactString>,
        effect: impl Into<CompactString>,
        image: &[u8],
    ) -> Self {
        Self {
            task_id: task_id.into(),
            effect: effect.into(),
            image_data: STANDARD.encode(image),
        }
    }

    /// Decode the image payload.
    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.image_data.as_bytes())
    }
}

/// The outcome of processing a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskResult {
    /// The effect was applied.
    Completed {
        /// Id of the originating task.
        task_id: CompactString,
        /// Base64 of the PNG-encoded output.
        processed_image_data: String,
    },
    /// Processing failed.
    Error {
        /// Id of the originating task.
        task_id: CompactString,
        /// Human-readable failure detail.
        message: String,
    },
}

impl TaskResult {
    /// Successful result carrying the encoded output image.
    pub fn completed(task_id: impl Into<CompactString>, image: &[u8]) -> Self {
        Self::Completed {
            task_id: task_id.into(),
            processed_image_data: STANDARD.encode(image),
        }
    }

    /// Failed result.
    pub fn error(task_id: impl Into<CompactString>, message: impl Into<String>) -> Self {
        Self::Error {
            task_id: task_id.into(),
            message: message.into(),
        }
    }

    /// Id of the originating task.
    pub fn task_id(&self) -> &CompactString {
        match self {
            Self::Completed { task_id, .. } | Self::Error { task_id, .. } => task_id,
        }
    }

    /// Whether the task completed successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Decode the output image, if any.
    pub fn image_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            Self::Completed {
                processed_image_data,
                ..
            } => Some(STANDARD.decode(processed_image_data.as_bytes())),
            Self::Error { .. } => None,
        }
    }
}

/// Frames a worker sends upstream on the task link.
///
/// The gateway hands out one task per `ready` credit, so idle workers pull
/// and busy workers are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credit {
    /// The worker can take one more task.
    Ready,
}
