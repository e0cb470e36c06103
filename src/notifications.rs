use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::core::{Event, EventType, Home, Severity, WebhookTarget};
use crate::db::{CarrierDirectory, Store};
use crate::error::NotifyError;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// JSON body delivered to a carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub home_id: String,
    pub policy_number: String,
    pub severity: Severity,
    pub data: Event,
}

/// A serialized, signed request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedWebhook {
    pub url: String,
    pub body: String,
    pub signature: String,
    pub timestamp: String,
}

/// Hex HMAC-SHA256 of `body` keyed with the carrier secret.
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    hex::encode(hmac_sha256::HMAC::mac(body, secret.as_bytes()))
}

/// Serialize and sign; the signature covers exactly the bytes sent.
pub fn build_request(
    event: &Event,
    home: &Home,
    target: &WebhookTarget,
) -> Result<SignedWebhook, NotifyError> {
    let payload = WebhookPayload {
        event_type: event.event_type.clone(),
        timestamp: event.timestamp,
        home_id: event.home_id.clone(),
        policy_number: home.policy_number.clone(),
        severity: event.severity,
        data: event.clone(),
    };
    let body = serde_json::to_string(&payload)?;
    let signature = sign_payload(body.as_bytes(), &target.secret);
    Ok(SignedWebhook {
        url: target.url.clone(),
        body,
        signature,
        timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, request: &SignedWebhook) -> Result<(), NotifyError>;
}

/// POSTs over HTTP with a bounded per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, request: &SignedWebhook) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, &request.signature)
            .header(TIMESTAMP_HEADER, &request.timestamp)
            .body(request.body.clone())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NotifierStats {
    pub queued: AtomicU64,
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

impl NotifierStats {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Non-blocking entry point into the delivery queue.
#[derive(Clone)]
pub struct NotifierHandle {
    tx: Option<mpsc::Sender<Event>>,
    stats: Arc<NotifierStats>,
}

impl NotifierHandle {
    fn with_stats(capacity: usize, stats: Arc<NotifierStats>) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx), stats }, rx)
    }

    /// Discards everything; used when notifications are turned off.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            stats: Arc::new(NotifierStats::default()),
        }
    }

    /// Queue an event for delivery without waiting. A full or closed queue
    /// drops the event. Returns whether it was queued.
    pub fn submit(&self, event: Event) -> bool {
        let Some(tx) = &self.tx else {
            debug!("Notifications disabled, skipping {}", event.event_type);
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Notification queue full, dropping {} for home {}",
                    event.event_type, event.home_id
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Notification worker gone, dropping {}", event.event_type);
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<NotifierStats> {
        Arc::clone(&self.stats)
    }
}

/// Background webhook worker. Best effort: failures are logged, never
/// retried and never reported back to the alerting path.
pub struct Notifier {
    store: Arc<dyn Store>,
    directory: Arc<dyn CarrierDirectory>,
    transport: Arc<dyn WebhookTransport>,
    stats: Arc<NotifierStats>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn CarrierDirectory>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            store,
            directory,
            transport,
            stats: Arc::new(NotifierStats::default()),
        }
    }

    /// A bounded queue and the receiving end a worker drains.
    pub fn channel(capacity: usize) -> (NotifierHandle, mpsc::Receiver<Event>) {
        NotifierHandle::with_stats(capacity, Arc::new(NotifierStats::default()))
    }

    /// Start the worker from config, or hand back a disabled handle.
    pub fn start(
        config: &NotificationConfig,
        store: Arc<dyn Store>,
        directory: Arc<dyn CarrierDirectory>,
    ) -> Result<(NotifierHandle, Option<JoinHandle<()>>), NotifyError> {
        if !config.enabled {
            info!("Webhook notifications disabled");
            return Ok((NotifierHandle::disabled(), None));
        }
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_seconds))?;
        let notifier = Self::new(store, directory, Arc::new(transport));
        let (handle, worker) = notifier.spawn(config.queue_capacity);
        Ok((handle, Some(worker)))
    }

    /// Spawn the worker on the current runtime. It exits once every
    /// handle has been dropped and the queue drained.
    pub fn spawn(self, capacity: usize) -> (NotifierHandle, JoinHandle<()>) {
        let (handle, rx) = NotifierHandle::with_stats(capacity, self.stats.clone());
        let worker = tokio::spawn(self.run(rx));
        (handle, worker)
    }

    pub async fn run(self, mut rx: mpsc::Receiver<Event>) {
        info!("Notifier started");
        while let Some(event) = rx.recv().await {
            match self.deliver(&event).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!("Delivered {} webhook for home {}", event.event_type, event.home_id);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Webhook for {} ({}) not delivered: {e}",
                        event.event_id, event.event_type
                    );
                }
            }
        }
        info!(
            "Notifier stopped: {} delivered, {} failed",
            self.stats.delivered(),
            self.stats.failed()
        );
    }

    pub async fn deliver(&self, event: &Event) -> Result<(), NotifyError> {
        let home = self.store.home_by_id(&event.home_id).await?;
        let target = self
            .directory
            .webhook_target(&home.carrier_id)
            .await?
            .ok_or_else(|| NotifyError::NoWebhook(home.carrier_id.clone()))?;
        let request = build_request(event, &home, &target)?;
        self.transport.post(&request).await
    }
}
