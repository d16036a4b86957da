/// Mock payment transactions
///
/// The payment testbed charges test cards through the
/// `process_mock_payment` procedure, which records a row in
/// `mock_transactions`. The simulated processing delays live in the worker;
/// this module is the data access.

use crate::backend::{call, fetch_all, require_user, Backend, TableQuery};
use crate::error::{ConsoleError, ConsoleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }
}

/// Why a charge failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Machine-readable code, e.g. `card_declined`
    pub code: String,
    pub message: String,
}

/// A recorded mock charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTransaction {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Amount in dollars
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub error: Option<PaymentError>,
    #[serde(default)]
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// What `process_mock_payment` returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeResponse {
    /// Transaction ID
    pub id: Uuid,
    pub status: TransactionStatus,
    #[serde(default)]
    pub error: Option<PaymentError>,
}

impl MockTransaction {
    /// Charges a test card for a tenant
    pub async fn charge(
        backend: &dyn Backend,
        tenant_id: Uuid,
        amount: f64,
        card_number: &str,
        metadata: JsonValue,
    ) -> ConsoleResult<ChargeResponse> {
        let response: ChargeResponse = call(
            backend,
            "process_mock_payment",
            json!({
                "p_tenant_id": tenant_id,
                "p_amount": amount,
                "p_card_number": card_number,
                "p_metadata": metadata,
            }),
        )
        .await?;
        info!(
            transaction_id = %response.id,
            status = response.status.as_str(),
            amount,
            "Processed mock payment"
        );
        Ok(response)
    }

    /// Lists transactions newest first, optionally only those with `status`
    pub async fn list(
        backend: &dyn Backend,
        status: Option<TransactionStatus>,
    ) -> ConsoleResult<Vec<Self>> {
        require_user(backend)?;

        let mut query = TableQuery::new("mock_transactions").order("created_at", false);
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        fetch_all(backend, &query).await
    }

    /// Marks a transaction refunded and returns it
    pub async fn mark_refunded(backend: &dyn Backend, id: Uuid) -> ConsoleResult<Self> {
        require_user(backend)?;

        let rows = backend
            .update(
                &TableQuery::new("mock_transactions").eq("id", id),
                json!({ "status": TransactionStatus::Refunded }),
            )
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ConsoleError::NotFound("Transaction".to_string()))?;

        info!(transaction_id = %id, "Refunded mock transaction");
        Ok(serde_json::from_value(row)?)
    }
}
