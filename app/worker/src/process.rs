//! Turning one task into one result.

use protocol::{Task, TaskResult};
use std::time::Instant;
use transform::Effect;

/// Message for a payload that is not a decodable image.
pub const DECODE_FAILED: &str = "Failed to decode image";
/// Message for an output that could not be encoded.
pub const ENCODE_FAILED: &str = "Failed to encode processed image";
/// Message for an output too large to send back.
pub const RESULT_TOO_LARGE: &str = "Processed image too large";

/// Process a task synchronously. Never fails: every problem becomes an
/// error result carrying the task id.
pub fn handle(task: &Task) -> TaskResult {
    let image = match task.image_bytes() {
        Ok(bytes) => match transform::decode(&bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("task {}: {e}", task.task_id);
                return TaskResult::error(&*task.task_id, DECODE_FAILED);
            }
        },
        Err(e) => {
            tracing::debug!("task {}: bad base64: {e}", task.task_id);
            return TaskResult::error(&*task.task_id, DECODE_FAILED);
        }
    };

    let effect: Effect = match task.effect.parse() {
        Ok(effect) => effect,
        Err(e) => return TaskResult::error(&*task.task_id, e.to_string()),
    };

    let output = match transform::apply(&image, effect) {
        Ok(output) => output,
        Err(e) => return TaskResult::error(&*task.task_id, e.to_string()),
    };

    match transform::encode_png(&output) {
        Ok(png) => TaskResult::completed(&*task.task_id, &png),
        Err(e) => {
            tracing::warn!("task {}: {e}", task.task_id);
            TaskResult::error(&*task.task_id, ENCODE_FAILED)
        }
    }
}

/// Process a task on the blocking pool. A panic inside the transform is
/// reported as an error result.
pub async fn process(task: Task) -> TaskResult {
    let task_id = task.task_id.clone();
    let effect = task.effect.clone();
    let started = Instant::now();

    let result = match tokio::task::spawn_blocking(move || handle(&task)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("task {task_id}: transform aborted: {e}");
            TaskResult::error(task_id.clone(), format!("Processing failed: {e}"))
        }
    };

    tracing::info!(
        "task {task_id} ({effect}) {} in {:?}",
        if result.is_completed() { "completed" } else { "failed" },
        started.elapsed()
    );
    result
}
