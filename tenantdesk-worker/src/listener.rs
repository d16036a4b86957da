/// Webhook listener
///
/// Watches a tenant's `mock_webhooks` table and yields every webhook created
/// after the subscription started. The table is polled; a background task
/// keeps a cursor on the newest `created_at` seen and pushes new rows into a
/// channel the subscriber reads as a stream.
///
/// The cursor starts at the tenant's newest existing row, so only
/// server-assigned timestamps are ever compared.
///
/// # Lifecycle
///
/// ```text
/// WebhookListener::subscribe()
///   ├─> Read newest existing rows (cursor = their created_at)
///   ├─> Spawn poll task
///   ├─> Every poll_interval: list rows at or after cursor, send unseen ones
///   └─> Stop when cancelled, dropped, or the receiver goes away
/// ```
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tenantdesk_shared::backend::Backend;
/// use tenantdesk_worker::listener::WebhookListener;
///
/// # async fn example(backend: Arc<dyn Backend>) -> Result<(), Box<dyn std::error::Error>> {
/// let listener = WebhookListener::for_current_tenant(backend).await?;
/// let mut subscription = listener.subscribe().await?;
///
/// while let Some(event) = subscription.next().await {
///     println!("{}: {}", event.event_type, event.data);
/// }
/// # Ok(())
/// # }
/// ```

use crate::events::{PAYMENT_FAILED, PAYMENT_SUCCEEDED};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use tenantdesk_shared::backend::{current_tenant_id, Backend};
use tenantdesk_shared::error::ConsoleError;
use tenantdesk_shared::models::webhook::MockWebhook;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Listener setup errors
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Tenant could not be resolved, or the starting rows could not be read
    #[error(transparent)]
    Console(#[from] ConsoleError),
}

/// A webhook seen by the listener
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub data: JsonValue,
}

/// Polls a tenant's webhooks
#[derive(Clone)]
pub struct WebhookListener {
    backend: Arc<dyn Backend>,
    tenant_id: Uuid,
    poll_interval: Duration,
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 64;
/// Existing rows read to place the starting cursor
const BASELINE_ROWS: usize = 50;

impl WebhookListener {
    pub fn new(backend: Arc<dyn Backend>, tenant_id: Uuid) -> Self {
        WebhookListener {
            backend,
            tenant_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Listener for the signed-in user's tenant
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` or `MissingTenant` when there is no tenant to watch
    pub async fn for_current_tenant(backend: Arc<dyn Backend>) -> Result<Self, ListenerError> {
        let tenant_id = current_tenant_id(backend.as_ref()).await?;
        Ok(Self::new(backend, tenant_id))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Starts polling; events are webhooks created from now on
    ///
    /// # Errors
    ///
    /// Fails when the tenant's existing webhooks cannot be read
    pub async fn subscribe(&self) -> Result<Subscription, ListenerError> {
        let latest = MockWebhook::list_latest(self.backend.as_ref(), self.tenant_id, BASELINE_ROWS).await?;
        let cursor = Cursor::after(&latest);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(self.clone(), cursor, tx, cancel.clone()));

        info!(tenant_id = %self.tenant_id, "Subscribed to webhooks");
        Ok(Subscription {
            events: ReceiverStream::new(rx),
            cancel,
            handle: Some(handle),
        })
    }
}

/// Newest `created_at` seen plus the ids already yielded at that timestamp
#[derive(Debug, Default)]
struct Cursor {
    at: Option<DateTime<Utc>>,
    seen_at: HashSet<Uuid>,
}

impl Cursor {
    /// Cursor past `latest`, which is ordered newest first
    fn after(latest: &[MockWebhook]) -> Self {
        let Some(newest) = latest.first() else {
            return Cursor::default();
        };
        Cursor {
            at: Some(newest.created_at),
            seen_at: latest
                .iter()
                .filter(|w| w.created_at == newest.created_at)
                .map(|w| w.id)
                .collect(),
        }
    }

    /// Advances over `webhook`; false when it was already yielded or is older
    fn accept(&mut self, webhook: &MockWebhook) -> bool {
        if let Some(at) = self.at {
            if webhook.created_at < at || (webhook.created_at == at && self.seen_at.contains(&webhook.id)) {
                return false;
            }
        }
        if self.at.map_or(true, |at| webhook.created_at > at) {
            self.at = Some(webhook.created_at);
            self.seen_at.clear();
        }
        self.seen_at.insert(webhook.id);
        true
    }
}

async fn poll_loop(
    listener: WebhookListener,
    mut cursor: Cursor,
    tx: mpsc::Sender<WebhookEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(listener.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'poll: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let webhooks =
            match MockWebhook::list_since(listener.backend.as_ref(), listener.tenant_id, cursor.at).await {
                Ok(webhooks) => webhooks,
                Err(e) => {
                    warn!(tenant_id = %listener.tenant_id, error = %e, "Webhook poll failed");
                    continue;
                }
            };

        for webhook in webhooks {
            if !cursor.accept(&webhook) {
                continue;
            }

            debug!(webhook_id = %webhook.id, event_type = %webhook.event_type, "Webhook received");
            let event = WebhookEvent {
                event_type: webhook.event_type,
                data: webhook.data,
            };
            // A full channel must not keep the task alive past cancellation
            tokio::select! {
                _ = cancel.cancelled() => break 'poll,
                sent = tx.send(event) => {
                    if sent.is_err() {
                        break 'poll;
                    }
                }
            }
        }
    }

    debug!(tenant_id = %listener.tenant_id, "Webhook listener stopped");
}

/// A running listener
///
/// Dropping the subscription stops the poll task.
pub struct Subscription {
    events: ReceiverStream<WebhookEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Next event; `None` once the subscription is cancelled
    pub async fn next(&mut self) -> Option<WebhookEvent> {
        self.events.next().await
    }

    /// Token that stops the subscription when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops polling and waits for the poll task to finish
    ///
    /// Unread events are discarded.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Routes payment events to callbacks until the subscription ends
///
/// `payment_intent.succeeded` goes to `on_success`, `payment_intent.failed`
/// to `on_failure`; other events are ignored.
pub fn payment_events<S, F>(mut subscription: Subscription, mut on_success: S, mut on_failure: F) -> JoinHandle<()>
where
    S: FnMut(JsonValue) + Send + 'static,
    F: FnMut(JsonValue) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            match event.event_type.as_str() {
                PAYMENT_SUCCEEDED => on_success(event.data),
                PAYMENT_FAILED => on_failure(event.data),
                _ => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, SecondsFormat};
    use serde_json::json;
    use std::sync::Mutex;
    use tenantdesk_shared::backend::{AuthUser, MockBackend};
    use tokio::time::{sleep, timeout};

    fn webhook_row(tenant_id: Uuid, event_type: &str, created_at: DateTime<Utc>) -> JsonValue {
        json!({
            "id": Uuid::new_v4(),
            "tenant_id": tenant_id,
            "event_type": event_type,
            "data": { "type": event_type },
            "created_at": created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }

    async fn next_event(subscription: &mut Subscription) -> Option<WebhookEvent> {
        timeout(Duration::from_secs(5), subscription.next()).await.ok().flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_only_new_webhooks_once() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        let now = Utc::now();
        backend.seed(
            "mock_webhooks",
            vec![webhook_row(tenant_id, "charge.refunded", now - ChronoDuration::hours(1))],
        );

        let listener = WebhookListener::new(Arc::new(backend.clone()), tenant_id);
        let mut subscription = listener.subscribe().await.unwrap();

        backend.seed(
            "mock_webhooks",
            vec![
                webhook_row(tenant_id, PAYMENT_SUCCEEDED, now + ChronoDuration::minutes(1)),
                webhook_row(Uuid::new_v4(), PAYMENT_FAILED, now + ChronoDuration::minutes(1)),
            ],
        );

        let event = next_event(&mut subscription).await.unwrap();
        assert_eq!(event.event_type, PAYMENT_SUCCEEDED);
        assert_eq!(event.data["type"], PAYMENT_SUCCEEDED);

        // Later polls do not repeat it
        assert!(timeout(Duration::from_secs(5), subscription.next()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_picks_up_webhooks_across_polls() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        let mut subscription = WebhookListener::new(Arc::new(backend.clone()), tenant_id)
            .with_poll_interval(Duration::from_secs(2))
            .subscribe()
            .await
            .unwrap();

        let base = Utc::now() + ChronoDuration::minutes(1);
        backend.seed("mock_webhooks", vec![webhook_row(tenant_id, PAYMENT_SUCCEEDED, base)]);
        let first = next_event(&mut subscription).await.unwrap();
        assert_eq!(first.event_type, PAYMENT_SUCCEEDED);

        backend.seed(
            "mock_webhooks",
            vec![webhook_row(tenant_id, PAYMENT_FAILED, base + ChronoDuration::seconds(1))],
        );
        let second = next_event(&mut subscription).await.unwrap();
        assert_eq!(second.event_type, PAYMENT_FAILED);

        subscription.unsubscribe().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_timestamp_on_later_poll_is_delivered() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        let mut subscription = WebhookListener::new(Arc::new(backend.clone()), tenant_id)
            .subscribe()
            .await
            .unwrap();

        let at = Utc::now() + ChronoDuration::minutes(1);
        backend.seed("mock_webhooks", vec![webhook_row(tenant_id, PAYMENT_SUCCEEDED, at)]);
        assert_eq!(next_event(&mut subscription).await.unwrap().event_type, PAYMENT_SUCCEEDED);

        backend.seed("mock_webhooks", vec![webhook_row(tenant_id, PAYMENT_FAILED, at)]);
        assert_eq!(next_event(&mut subscription).await.unwrap().event_type, PAYMENT_FAILED);

        // Neither row at the shared timestamp comes back
        assert!(timeout(Duration::from_secs(5), subscription.next()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_starts_at_newest_existing_row() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        // Backend clock an hour behind ours
        let server_now = Utc::now() - ChronoDuration::hours(1);
        backend.seed(
            "mock_webhooks",
            vec![
                webhook_row(tenant_id, "charge.refunded", server_now - ChronoDuration::minutes(5)),
                webhook_row(tenant_id, "customer.subscription.created", server_now),
            ],
        );

        let mut subscription = WebhookListener::new(Arc::new(backend.clone()), tenant_id)
            .subscribe()
            .await
            .unwrap();
        backend.seed(
            "mock_webhooks",
            vec![webhook_row(tenant_id, PAYMENT_SUCCEEDED, server_now + ChronoDuration::seconds(1))],
        );

        assert_eq!(next_event(&mut subscription).await.unwrap().event_type, PAYMENT_SUCCEEDED);
        assert!(timeout(Duration::from_secs(5), subscription.next()).await.is_err());
    }

    #[test]
    fn test_cursor_skips_seen_ids_at_its_timestamp() {
        let at = Utc::now();
        let webhook = |created_at| MockWebhook {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            event_type: PAYMENT_SUCCEEDED.to_string(),
            data: json!({}),
            delivery_attempts: 0,
            last_attempt_at: None,
            delivered_at: None,
            created_at,
            logs: Vec::new(),
        };
        let (a, b, older) = (webhook(at), webhook(at), webhook(at - ChronoDuration::seconds(1)));

        let mut cursor = Cursor::after(&[a.clone()]);
        assert!(!cursor.accept(&a));
        assert!(!cursor.accept(&older));
        assert!(cursor.accept(&b));
        assert!(!cursor.accept(&b));

        let mut empty = Cursor::after(&[]);
        assert!(empty.accept(&older));
        assert!(empty.accept(&a));
        assert!(!empty.accept(&older));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_with_full_channel_finishes() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        let subscription = WebhookListener::new(Arc::new(backend.clone()), tenant_id)
            .subscribe()
            .await
            .unwrap();

        let base = Utc::now() + ChronoDuration::minutes(1);
        let backlog = (0..CHANNEL_CAPACITY as i64 + 36)
            .map(|i| webhook_row(tenant_id, PAYMENT_SUCCEEDED, base + ChronoDuration::seconds(i)))
            .collect();
        backend.seed("mock_webhooks", backlog);
        sleep(Duration::from_secs(3)).await;

        assert!(timeout(Duration::from_secs(60), subscription.unsubscribe()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_ends_stream() {
        let backend = MockBackend::new();
        let listener = WebhookListener::new(Arc::new(backend), Uuid::new_v4());
        let mut subscription = listener.subscribe().await.unwrap();

        subscription.cancel_token().cancel();
        assert_eq!(timeout(Duration::from_secs(5), subscription.next()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_requires_tenant() {
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::new());
        let result = WebhookListener::for_current_tenant(backend).await;
        assert!(matches!(result, Err(ListenerError::Console(ConsoleError::NotAuthenticated))));

        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
        };
        let tenant_id = Uuid::new_v4();
        let mock = MockBackend::new().with_user(user.clone());
        mock.seed("user_profiles", vec![json!({ "id": user.id, "tenant_id": tenant_id })]);
        let listener = WebhookListener::for_current_tenant(Arc::new(mock)).await.unwrap();
        assert_eq!(listener.tenant_id(), tenant_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_events_routing() {
        let backend = MockBackend::new();
        let tenant_id = Uuid::new_v4();
        let subscription = WebhookListener::new(Arc::new(backend.clone()), tenant_id)
            .subscribe()
            .await
            .unwrap();
        let cancel = subscription.cancel_token();

        let succeeded = Arc::new(Mutex::new(Vec::new()));
        let failed = Arc::new(Mutex::new(Vec::new()));
        let (s, f) = (succeeded.clone(), failed.clone());
        let router = payment_events(
            subscription,
            move |data| s.lock().unwrap().push(data),
            move |data| f.lock().unwrap().push(data),
        );

        let base = Utc::now() + ChronoDuration::minutes(1);
        backend.seed(
            "mock_webhooks",
            vec![
                webhook_row(tenant_id, PAYMENT_SUCCEEDED, base),
                webhook_row(tenant_id, "charge.refunded", base + ChronoDuration::seconds(1)),
                webhook_row(tenant_id, PAYMENT_FAILED, base + ChronoDuration::seconds(2)),
            ],
        );

        sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        router.await.unwrap();

        assert_eq!(succeeded.lock().unwrap().len(), 1);
        assert_eq!(failed.lock().unwrap().len(), 1);
    }
}
