//! snapfx wire protocol types shared between the gateway, its browser
//! clients, and the worker pool.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod task;

pub use task::{Credit, Task, TaskResult};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Prefix of the data URL carrying a processed snapshot.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Messages sent by a browser client to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room under a display name.
    Join {
        /// Room identifier.
        room: CompactString,
        /// Display name, unique within the room.
        username: CompactString,
    },
    /// Leave the current room.
    Leave,
    /// Request an effect on a snapshot taken by this client.
    ProcessSnapshot {
        /// Effect name, e.g. `blur`.
        #[serde(default)]
        effect: Option<CompactString>,
        /// Base64 image, optionally as a `data:` URL.
        #[serde(default)]
        image_data_url: Option<String>,
    },
    /// Ping the server (keepalive).
    Ping,
}

/// Messages sent by the gateway to a browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent to a client after it joined a room.
    UsersInRoom {
        /// Room identifier.
        room: CompactString,
        /// Other users already in the room.
        users: Vec<CompactString>,
    },
    /// Another user joined the room.
    UserJoined {
        /// Display name of the new user.
        username: CompactString,
    },
    /// A user left the room.
    UserLeft {
        /// Display name of the user who left.
        username: CompactString,
        /// Room identifier.
        room: CompactString,
    },
    /// The join request was refused.
    JoinError {
        /// Reason.
        message: String,
    },
    /// A snapshot was accepted and queued.
    SnapshotProcessing {
        /// Task identifier.
        task_id: CompactString,
    },
    /// A snapshot finished processing, successfully or not.
    SnapshotProcessed(Processed),
    /// A snapshot request was refused before it was queued.
    SnapshotRejected {
        /// Reason.
        message: String,
    },
    /// Error response.
    Error {
        /// Error code.
        code: u16,
        /// Error message.
        message: String,
    },
    /// Pong response to client ping.
    Pong,
}

/// Outcome of a processed snapshot, broadcast to the whole room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Processed {
    /// The effect was applied.
    Completed {
        /// Task identifier.
        task_id: CompactString,
        /// PNG result as a data URL.
        image_data_url: String,
    },
    /// The worker reported a failure.
    Error {
        /// Task identifier.
        task_id: CompactString,
        /// Failure detail.
        message: String,
    },
}
