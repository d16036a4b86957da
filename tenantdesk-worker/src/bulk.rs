/// Bulk operation progress
///
/// Bulk subscription changes run on the backend and report progress through
/// `get_bulk_operation_status`. The watcher polls that procedure until the
/// processed and failed counts cover every item.
///
/// # Polling
///
/// - Interval: 2 seconds (first poll immediately)
/// - Stops when `processed_items + failed_items >= total_items`
/// - A failed poll ends the watch with that error
/// - Optional cap on the number of polls
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tenantdesk_shared::backend::Backend;
/// use tenantdesk_shared::models::subscription::MemberSubscription;
/// use tenantdesk_worker::bulk::BulkOperationWatcher;
/// use uuid::Uuid;
///
/// # async fn example(backend: Arc<dyn Backend>, ids: Vec<Uuid>) -> Result<(), Box<dyn std::error::Error>> {
/// let operation_id = MemberSubscription::bulk_cancel(backend.as_ref(), &ids, false).await?;
///
/// let watcher = BulkOperationWatcher::new(backend);
/// let done = watcher
///     .wait_with_progress(operation_id, |op| println!("{}/{}", op.processed_items, op.total_items))
///     .await?;
/// println!("{} failed", done.failed_items);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use tenantdesk_shared::backend::Backend;
use tenantdesk_shared::error::ConsoleError;
use tenantdesk_shared::models::subscription::BulkOperation;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// Default time between polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    /// Status could not be read
    #[error(transparent)]
    Console(#[from] ConsoleError),

    /// Still running after the poll cap
    #[error("Bulk operation {operation_id} still running after {polls} polls")]
    Incomplete { operation_id: Uuid, polls: u32 },
}

/// Polls a bulk operation until it completes
#[derive(Clone)]
pub struct BulkOperationWatcher {
    backend: Arc<dyn Backend>,
    poll_interval: Duration,
    max_polls: Option<u32>,
}

impl BulkOperationWatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        BulkOperationWatcher {
            backend,
            poll_interval: POLL_INTERVAL,
            max_polls: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Gives up with `BulkError::Incomplete` after `max_polls` polls
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Waits for completion and returns the final status
    pub async fn wait(&self, operation_id: Uuid) -> Result<BulkOperation, BulkError> {
        self.wait_with_progress(operation_id, |_| {}).await
    }

    /// Like [`wait`](Self::wait), reporting every status read to `on_progress`
    pub async fn wait_with_progress<F>(
        &self,
        operation_id: Uuid,
        mut on_progress: F,
    ) -> Result<BulkOperation, BulkError>
    where
        F: FnMut(&BulkOperation),
    {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u32;

        loop {
            if self.max_polls.map_or(false, |max| polls >= max) {
                return Err(BulkError::Incomplete { operation_id, polls });
            }

            ticker.tick().await;
            polls += 1;

            let status = BulkOperation::fetch(self.backend.as_ref(), operation_id).await?;
            debug!(
                operation_id = %operation_id,
                processed = status.processed_items,
                failed = status.failed_items,
                total = status.total_items,
                "Bulk operation progress"
            );
            on_progress(&status);

            if status.is_complete() {
                info!(
                    operation_id = %operation_id,
                    operation_type = %status.operation_type,
                    failed = status.failed_items,
                    polls,
                    "Bulk operation complete"
                );
                return Ok(status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicI64, Ordering};
    use tenantdesk_shared::backend::MockBackend;
    use tokio::time::Instant;

    fn status(processed: i64, failed: i64, total: i64) -> JsonValue {
        json!({
            "operation_type": "cancel",
            "total_items": total,
            "processed_items": processed,
            "failed_items": failed,
            "details": [],
            "created_at": "2024-01-05T10:00:00Z",
        })
    }

    /// Backend whose operation advances by one item per poll
    fn advancing_backend(total: i64) -> MockBackend {
        let backend = MockBackend::new();
        let processed = Arc::new(AtomicI64::new(0));
        backend.on_rpc("get_bulk_operation_status", move |_| {
            let done = processed.fetch_add(1, Ordering::SeqCst).min(total);
            Ok(status(done, 0, total))
        });
        backend
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_two_seconds_until_complete() {
        let backend = advancing_backend(3);
        let watcher = BulkOperationWatcher::new(Arc::new(backend.clone()));
        let operation_id = Uuid::new_v4();

        let start = Instant::now();
        let mut seen = Vec::new();
        let done = watcher
            .wait_with_progress(operation_id, |op| seen.push(op.processed_items))
            .await
            .unwrap();

        assert!(done.is_complete());
        assert_eq!(seen, vec![0, 1, 2, 3]);
        // First poll is immediate, then three waits
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_millis(6010));

        let calls = backend.rpc_calls("get_bulk_operation_status");
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0]["p_operation_id"], json!(operation_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_items_count_toward_completion() {
        let backend = MockBackend::new();
        backend.on_rpc("get_bulk_operation_status", |_| {
            Ok(json!({
                "operation_type": "update_status",
                "total_items": 2,
                "processed_items": 1,
                "failed_items": 1,
                "details": [{ "id": "a" }, { "id": "b", "error": "Subscription not found" }],
                "created_at": "2024-01-05T10:00:00Z",
            }))
        });

        let done = BulkOperationWatcher::new(Arc::new(backend)).wait(Uuid::new_v4()).await.unwrap();
        assert_eq!(done.errors(), vec!["Subscription not found"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_surfaces_immediately() {
        let backend = MockBackend::new();
        backend.on_rpc("get_bulk_operation_status", |_| Ok(JsonValue::Null));

        let result = BulkOperationWatcher::new(Arc::new(backend.clone()))
            .wait(Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(BulkError::Console(ConsoleError::NotFound(_)))));
        assert_eq!(backend.rpc_calls("get_bulk_operation_status").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_polls() {
        let backend = MockBackend::new();
        backend.on_rpc("get_bulk_operation_status", |_| Ok(status(0, 0, 10)));

        let result = BulkOperationWatcher::new(Arc::new(backend))
            .with_poll_interval(Duration::from_millis(100))
            .with_max_polls(5)
            .wait(Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(BulkError::Incomplete { polls: 5, .. })));
    }
}
