//! snapfx worker: pulls effect tasks from the gateway, applies the
//! requested transform and pushes the result back.

pub mod config;
pub mod process;
pub mod utils;
pub mod worker;

pub use config::WorkerConfig;
pub use worker::Worker;
