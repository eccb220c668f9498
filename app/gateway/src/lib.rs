//! snapfx gateway: browser sessions in rooms, effect task submission and
//! result broadcast back to the submitter's room.

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod lobby;
pub mod rooms;
pub mod serve;
pub mod ws;

pub use config::GatewayConfig;
pub use correlation::CorrelationMap;
pub use dispatch::{Gateway, SubmitError};
pub use lobby::Lobby;
pub use rooms::{ClientId, Notice, Rooms};
pub use serve::{ServeHandle, serve};
