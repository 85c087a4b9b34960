//! Getting snapshots into a view.
//!
//! A feed is a queue of snapshots. [`poll`] fills it from any async fetch
//! function on a fixed period, [`drive`] drains it into a
//! [`GraphController`] one snapshot at a time and draws after every
//! successful update. Snapshots that arrive while an update is running wait
//! in the queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::controller::GraphController;
use crate::error::{FeedError, RuntimeError};
use crate::record::NodeRecord;
use crate::render::Renderer;

/// Parse a JSON array of node records.
pub fn parse_snapshot(json: &str) -> Result<Vec<NodeRecord>, FeedError> {
    Ok(serde_json::from_str(json)?)
}

/// Call `fetch` once every `period` and queue what it returns.
///
/// Fetch errors are logged and retried on the next tick. Returns
/// [`FeedError::Closed`] once the receiving end is gone.
///
/// # Panics
/// If `period` is zero.
pub async fn poll<F, Fut>(
    period: Duration,
    mut fetch: F,
    tx: mpsc::Sender<Vec<NodeRecord>>,
) -> Result<(), FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<NodeRecord>, RuntimeError>>,
{
    assert!(!period.is_zero(), "poll period must be non-zero");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if tx.is_closed() {
            return Err(FeedError::Closed);
        }

        let records = match fetch().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Couldn't fetch snapshot, retrying next tick: {e:#}");
                continue;
            }
        };

        tracing::trace!(records = records.len(), "snapshot queued");

        if tx.send(records).await.is_err() {
            return Err(FeedError::Closed);
        }
    }
}

/// Apply queued snapshots until the feed closes, then tear the view down.
///
/// Failed updates and failed draws are logged, the view keeps showing the
/// last good tree. Returns the controller so the caller can inspect it.
pub async fn drive<R>(
    mut controller: GraphController,
    mut rx: mpsc::Receiver<Vec<NodeRecord>>,
    renderer: &mut R,
) -> GraphController
where
    R: Renderer + ?Sized,
{
    while let Some(records) = rx.recv().await {
        // Rejections are logged by the controller.
        if controller.update(&records).is_err() {
            continue;
        }

        if let Some(frame) = controller.frame()
            && let Err(e) = renderer.draw(&frame)
        {
            tracing::error!("Couldn't draw frame: {e:#}");
        }
    }

    tracing::info!("feed closed, tearing down view");
    controller.teardown();
    controller
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::config::Config;
    use crate::record::NodeId;
    use crate::render::Frame;

    #[test]
    fn test_parse_snapshot() {
        let records = parse_snapshot(
            r#"[
                { "BuildTypeId": "a", "Name": "Compile", "Running": true, "PercentageCompleted": 30 },
                { "BuildTypeId": "b", "Name": "Test", "DependencyIds": ["a"] }
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].running);
        assert_eq!(records[0].percentage_completed, 30);
        assert_eq!(records[1].dependency_ids, vec![NodeId::from("a")]);
    }

    #[test]
    fn test_parse_snapshot_from_nullable_server() {
        let records = parse_snapshot(
            r#"[
                { "BuildTypeId": "a", "Name": "A", "StatusText": null, "DependencyIds": null },
                { "BuildTypeId": "b", "Name": "B", "Running": true, "PercentageCompleted": 42.5 }
            ]"#,
        )
        .unwrap();

        assert_eq!(records[0].status_text, "");
        assert_eq!(records[1].percentage_completed, 43);
    }

    #[test]
    fn test_parse_snapshot_error() {
        assert!(matches!(parse_snapshot("{}"), Err(FeedError::Parse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_retries_and_closes() {
        let (tx, mut rx) = mpsc::channel(4);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let fetch = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    anyhow::bail!("connection refused");
                }
                Ok(vec![NodeRecord::new("a", "A").running(call as u8)])
            }
        };

        let poller = tokio::spawn(poll(Duration::from_secs(1), fetch, tx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first[0].percentage_completed, 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second[0].percentage_completed, 2);

        drop(rx);
        let result = poller.await.unwrap();
        assert!(matches!(result, Err(FeedError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    #[should_panic(expected = "poll period must be non-zero")]
    async fn test_poll_zero_period() {
        let (tx, _rx) = mpsc::channel(1);
        let fetch = || async { Ok::<_, RuntimeError>(Vec::new()) };
        let _ = poll(Duration::ZERO, fetch, tx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive() {
        let (tx, rx) = mpsc::channel(8);

        tx.send(vec![NodeRecord::new("A", "A").running(10)])
            .await
            .unwrap();
        tx.send(vec![NodeRecord::new("A", "A"), NodeRecord::new("A", "again")])
            .await
            .unwrap();
        tx.send(vec![
            NodeRecord::new("A", "A"),
            NodeRecord::new("B", "B").depends_on(["A"]).failed(),
        ])
        .await
        .unwrap();
        drop(tx);

        let mut drawn = Vec::new();
        let mut renderer = |frame: &Frame<'_>| -> Result<(), RuntimeError> {
            drawn.push(frame.tree.len());
            Ok(())
        };

        let view = GraphController::new(Config::new("A")).unwrap();
        let view = drive(view, rx, &mut renderer).await;

        assert_eq!(drawn, vec![1, 2]);
        assert!(view.tree().is_none());
        assert!(view.animations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_survives_draw_errors() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(vec![NodeRecord::new("A", "A")]).await.unwrap();
        tx.send(vec![NodeRecord::new("A", "A").failed()])
            .await
            .unwrap();
        drop(tx);

        let mut attempts = 0;
        let mut renderer = |_: &Frame<'_>| -> Result<(), RuntimeError> {
            attempts += 1;
            anyhow::bail!("terminal went away")
        };

        let view = GraphController::new(Config::new("A")).unwrap();
        drive(view, rx, &mut renderer).await;

        assert_eq!(attempts, 2);
    }
}
