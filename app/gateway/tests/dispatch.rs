//! Submission and broadcast tests over in-process queues.

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgb, RgbImage};
use protocol::{PNG_DATA_URL_PREFIX, Processed, ServerMessage, Task, TaskResult};
use queue::{Puller, Pusher, queue};
use snapfx_gateway::{Gateway, Lobby, SubmitError, dispatch};
use std::{io::Cursor, sync::Arc, time::Duration};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    watch,
};
use worker::Worker;

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    lobby: Arc<Lobby>,
    gateway: Gateway,
    tasks: Puller<Task>,
    results: Pusher<TaskResult>,
}

/// A dispatcher with no workers; the test plays the worker.
fn harness(capacity: usize) -> Harness {
    let lobby = Arc::new(Lobby::new());
    let (task_tx, tasks) = queue::<Task>(capacity);
    let (results, result_rx) = queue::<TaskResult>(16);
    let (gateway, _dispatcher) = dispatch::spawn(Arc::clone(&lobby), task_tx, result_rx, 64);
    Harness {
        lobby,
        gateway,
        tasks,
        results,
    }
}

/// A dispatcher with one in-process worker.
fn with_worker() -> (Harness, watch::Sender<bool>) {
    let h = harness(16);
    let result_tx = h.results.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Worker::new("test", h.tasks.clone(), result_tx)
        .poll_interval(Duration::from_millis(10));
    tokio::spawn(worker.run(shutdown_rx));
    (h, shutdown_tx)
}

fn join(lobby: &Lobby, client: &str, room: &str) -> UnboundedReceiver<ServerMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    lobby.register(client.into(), tx);
    lobby.join(client, room, client).unwrap();
    rx
}

fn png_data_url(width: u32, height: u32) -> String {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 160, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(out.into_inner()))
}

/// Wait for the next processed-snapshot message, skipping room chatter.
async fn next_processed(rx: &mut UnboundedReceiver<ServerMessage>) -> Processed {
    loop {
        let msg = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        if let ServerMessage::SnapshotProcessed(processed) = msg {
            return processed;
        }
    }
}

/// Everything currently queued for a client.
fn pending(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn blur_result_reaches_the_whole_room() {
    let (h, _shutdown) = with_worker();
    let mut alice = join(&h.lobby, "alice", "r");
    let mut bob = join(&h.lobby, "bob", "r");
    let mut carol = join(&h.lobby, "carol", "elsewhere");

    let task_id = h
        .gateway
        .submit("alice", "r", Some("blur"), Some(&png_data_url(32, 24)))
        .await
        .unwrap();

    let processing = loop {
        match tokio::time::timeout(WAIT, alice.recv()).await.unwrap().unwrap() {
            ServerMessage::SnapshotProcessing { task_id } => break task_id,
            _ => continue,
        }
    };
    assert_eq!(processing, task_id);

    for rx in [&mut alice, &mut bob] {
        match next_processed(rx).await {
            Processed::Completed {
                task_id: id,
                image_data_url,
            } => {
                assert_eq!(id, task_id);
                let data = image_data_url.strip_prefix(PNG_DATA_URL_PREFIX).unwrap();
                let img = image::load_from_memory(&STANDARD.decode(data).unwrap()).unwrap();
                assert_eq!((img.width(), img.height()), (32, 24));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    // Bob only sees the outcome, never the submitter's acknowledgement.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        !pending(&mut bob)
            .iter()
            .any(|m| matches!(m, ServerMessage::SnapshotProcessing { .. }))
    );
    assert!(
        !pending(&mut carol)
            .iter()
            .any(|m| matches!(m, ServerMessage::SnapshotProcessed(_)))
    );
}

#[tokio::test]
async fn unknown_effect_comes_back_as_error() {
    let (h, _shutdown) = with_worker();
    let mut alice = join(&h.lobby, "alice", "r");

    let task_id = h
        .gateway
        .submit("alice", "r", Some("triangulate"), Some(&png_data_url(8, 8)))
        .await
        .unwrap();

    match next_processed(&mut alice).await {
        Processed::Error { task_id: id, message } => {
            assert_eq!(id, task_id);
            assert!(message.contains("Unknown effect type"), "{message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_requests_are_rejected_without_enqueueing() {
    let h = harness(16);
    let _alice = join(&h.lobby, "alice", "r");
    let image = png_data_url(4, 4);

    let cases = [
        (None, Some(image.as_str())),
        (Some("  "), Some(image.as_str())),
        (Some("blur"), None),
        (Some("blur"), Some("data:image/png;base64,@@not base64@@")),
        (Some("blur"), Some("data:image/png;base64,")),
    ];
    let errors: Vec<SubmitError> = {
        let mut out = Vec::new();
        for (effect, image) in cases {
            out.push(h.gateway.submit("alice", "r", effect, image).await.unwrap_err());
        }
        out
    };

    assert!(matches!(errors[0], SubmitError::MissingEffect));
    assert!(matches!(errors[1], SubmitError::MissingEffect));
    assert!(matches!(errors[2], SubmitError::MissingImage));
    assert!(matches!(errors[3], SubmitError::InvalidImage(_)));
    assert!(matches!(errors[4], SubmitError::EmptyImage));
    assert!(h.tasks.try_pull().is_none());
}

#[tokio::test]
async fn bare_base64_is_accepted() {
    let h = harness(16);
    let _alice = join(&h.lobby, "alice", "r");
    let url = png_data_url(4, 4);
    let bare = dispatch::strip_data_url(&url);

    let task_id = h.gateway.submit("alice", "r", Some("blur"), Some(bare)).await.unwrap();
    let task = h.tasks.try_pull().unwrap();
    assert_eq!(task.task_id, task_id);
    assert_eq!(task.effect, "blur");
    assert_eq!(task.image_data, bare);
}

#[tokio::test]
async fn full_queue_rejects_and_recovers() {
    let h = harness(1);
    let _alice = join(&h.lobby, "alice", "r");
    let image = png_data_url(4, 4);

    h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap();
    let err = h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap_err();
    assert!(matches!(err, SubmitError::QueueFull));

    h.tasks.try_pull().unwrap();
    h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap();
}

#[tokio::test]
async fn closed_queue_is_unavailable() {
    let Harness {
        lobby,
        gateway,
        tasks,
        results: _results,
    } = harness(4);
    let _alice = join(&lobby, "alice", "r");
    drop(tasks);

    let err = gateway
        .submit("alice", "r", Some("blur"), Some(&png_data_url(4, 4)))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Unavailable));
}

#[tokio::test]
async fn result_after_disconnect_reaches_no_one() {
    let h = harness(16);
    let _alice = join(&h.lobby, "alice", "r");
    let mut bob = join(&h.lobby, "bob", "r");
    let image = png_data_url(4, 4);

    let abandoned = h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap();
    h.tasks.try_pull().unwrap();

    h.lobby.unregister("alice");
    h.gateway.disconnect("alice").await;

    // Commands are handled in order, so once this returns the disconnect
    // has been applied.
    let own = h.gateway.submit("bob", "r", Some("blur"), Some(&image)).await.unwrap();
    h.tasks.try_pull().unwrap();

    h.results.try_push(TaskResult::error(abandoned.clone(), "late")).unwrap();
    h.results.try_push(TaskResult::error(own.clone(), "mine")).unwrap();

    match next_processed(&mut bob).await {
        Processed::Error { task_id, .. } => assert_eq!(task_id, own),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_results_are_delivered_once() {
    let h = harness(16);
    let mut alice = join(&h.lobby, "alice", "r");
    let image = png_data_url(4, 4);

    let first = h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap();
    let second = h.gateway.submit("alice", "r", Some("blur"), Some(&image)).await.unwrap();

    h.results.try_push(TaskResult::error(first.clone(), "one")).unwrap();
    h.results.try_push(TaskResult::error(first.clone(), "again")).unwrap();
    h.results.try_push(TaskResult::error("never-issued", "?")).unwrap();
    h.results.try_push(TaskResult::error(second.clone(), "two")).unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        match next_processed(&mut alice).await {
            Processed::Error { task_id, message } => seen.push((task_id, message)),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(seen[0], (first, "one".to_owned()));
    assert_eq!(seen[1], (second, "two".to_owned()));
}

#[tokio::test]
async fn result_follows_the_submitter_to_a_new_room() {
    let h = harness(16);
    let mut alice = join(&h.lobby, "alice", "old");
    let mut bob = join(&h.lobby, "bob", "new");

    let task_id = h
        .gateway
        .submit("alice", "old", Some("blur"), Some(&png_data_url(4, 4)))
        .await
        .unwrap();
    h.lobby.join("alice", "new", "alice").unwrap();
    h.results.try_push(TaskResult::error(task_id.clone(), "moved")).unwrap();

    for rx in [&mut alice, &mut bob] {
        match next_processed(rx).await {
            Processed::Error { task_id: id, .. } => assert_eq!(id, task_id),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn oversized_snapshot_is_rejected_without_enqueueing() {
    let h = harness(16);
    let mut alice = join(&h.lobby, "alice", "r");
    pending(&mut alice);

    // 49 MiB of raw bytes is over 64 MiB once base64-encoded.
    let image = STANDARD.encode(vec![0u8; 49 * 1024 * 1024]);
    let err = h
        .gateway
        .submit("alice", "r", Some("blur"), Some(&image))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::TooLarge));
    assert!(h.tasks.try_pull().is_none());
    assert!(pending(&mut alice).is_empty());

    // The dispatcher is still serving.
    h.gateway
        .submit("alice", "r", Some("blur"), Some(&png_data_url(4, 4)))
        .await
        .unwrap();
    assert!(h.tasks.try_pull().is_some());
}
