//! # TenantDesk Worker Library
//!
//! Background simulations for the TenantDesk console: webhook delivery with
//! retries, mock payments, and pollers for webhooks and bulk operations.
//!
//! ## Modules
//!
//! - `network`: Simulated network latency and timeouts
//! - `events`: Webhook event catalog, payloads, and signatures
//! - `simulator`: Webhook delivery with exponential backoff
//! - `payments`: Test cards and mock charges and refunds
//! - `listener`: Polling subscription to a tenant's webhooks
//! - `bulk`: Progress watcher for bulk subscription operations
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tenantdesk_shared::backend::MockBackend;
//! use tenantdesk_worker::simulator::WebhookSimulator;
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let simulator = WebhookSimulator::new(Arc::new(MockBackend::new())).for_tenant(Uuid::new_v4());
//! let handle = simulator.spawn_delivery("payment_intent.succeeded");
//! # let _ = handle;
//! # }
//! ```

pub mod bulk;
pub mod events;
pub mod listener;
pub mod network;
pub mod payments;
pub mod simulator;
