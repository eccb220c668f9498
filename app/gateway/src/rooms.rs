//! The dispatcher's view of the session layer.

use compact_str::CompactString;
use protocol::{PNG_DATA_URL_PREFIX, Processed, ServerMessage, TaskResult};

/// Opaque client identifier, unique per connection.
pub type ClientId = CompactString;

/// Something the dispatcher tells a client about one of its room's tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The task was accepted and queued. Sent to the submitter only.
    Processing { task_id: CompactString },
    /// The task finished; `image` is base64 PNG.
    Completed { task_id: CompactString, image: String },
    /// The worker reported a failure.
    Failed { task_id: CompactString, message: String },
}

impl Notice {
    pub fn task_id(&self) -> &CompactString {
        match self {
            Self::Processing { task_id }
            | Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. } => task_id,
        }
    }
}

impl From<TaskResult> for Notice {
    fn from(result: TaskResult) -> Self {
        match result {
            TaskResult::Completed {
                task_id,
                processed_image_data,
            } => Self::Completed {
                task_id,
                image: processed_image_data,
            },
            TaskResult::Error { task_id, message } => Self::Failed { task_id, message },
        }
    }
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        match notice {
            Notice::Processing { task_id } => ServerMessage::SnapshotProcessing { task_id },
            Notice::Completed { task_id, image } => {
                ServerMessage::SnapshotProcessed(Processed::Completed {
                    task_id,
                    image_data_url: format!("{PNG_DATA_URL_PREFIX}{image}"),
                })
            }
            Notice::Failed { task_id, message } => {
                ServerMessage::SnapshotProcessed(Processed::Error { task_id, message })
            }
        }
    }
}

/// Read-only group registry plus delivery.
///
/// Owned by the session layer; the dispatcher only looks up membership and
/// hands notices over. Implementations must not block.
pub trait Rooms: Send + Sync + 'static {
    /// The room `client` is currently in, if any.
    fn group_of(&self, client: &str) -> Option<CompactString>;

    /// Every client currently in `group`.
    fn members(&self, group: &str) -> Vec<ClientId>;

    /// Deliver `notice` to `client`. Unknown clients are ignored.
    fn deliver(&self, client: &str, notice: Notice);
}
