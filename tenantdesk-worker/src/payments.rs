/// Mock payment processing
///
/// Charges test cards through the backend's mock processor with simulated
/// processing delays. Which card number maps to which outcome is decided by
/// the backend; this module only knows the catalog.
///
/// # Delays
///
/// - Charge: 500-1500 ms before the call
/// - Refund: 200-700 ms before the update
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::backend::Backend;
/// use tenantdesk_worker::payments::{process_payment, test_card};
///
/// # async fn example(backend: &dyn Backend) {
/// let card = test_card("decline").unwrap();
/// let result = process_payment(backend, 29.0, card.number, serde_json::json!({})).await;
/// assert!(!result.success);
/// # }
/// ```

use crate::network::random_delay;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tenantdesk_shared::backend::{current_tenant_id, require_user, Backend};
use tenantdesk_shared::error::ConsoleResult;
use tenantdesk_shared::models::payment::{MockTransaction, PaymentError, TransactionStatus};
use tracing::warn;
use uuid::Uuid;

/// A card number with a known outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestCard {
    /// Short name, e.g. `insufficient_funds`
    pub name: &'static str,
    pub number: &'static str,
    pub description: &'static str,
}

pub const TEST_CARDS: [TestCard; 6] = [
    TestCard {
        name: "success",
        number: "4242424242424242",
        description: "Always succeeds",
    },
    TestCard {
        name: "decline",
        number: "4000000000000002",
        description: "Always declined",
    },
    TestCard {
        name: "insufficient_funds",
        number: "4000000000009995",
        description: "Insufficient funds error",
    },
    TestCard {
        name: "expired",
        number: "4000000000000069",
        description: "Expired card error",
    },
    TestCard {
        name: "incorrect_cvc",
        number: "4000000000000127",
        description: "Incorrect CVC error",
    },
    TestCard {
        name: "processing_error",
        number: "4000000000000119",
        description: "Processing error",
    },
];

/// Looks up a test card by short name
pub fn test_card(name: &str) -> Option<&'static TestCard> {
    TEST_CARDS.iter().find(|card| card.name == name)
}

/// Description of a test card number
pub fn describe_card(number: &str) -> Option<&'static str> {
    TEST_CARDS
        .iter()
        .find(|card| card.number == number)
        .map(|card| card.description)
}

/// Outcome of a charge as shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResult {
    pub success: bool,

    /// Empty when the charge never reached the processor
    pub transaction_id: String,

    pub error: Option<PaymentError>,
}

impl PaymentResult {
    fn processing_error(message: String) -> Self {
        PaymentResult {
            success: false,
            transaction_id: String::new(),
            error: Some(PaymentError {
                code: "processing_error".to_string(),
                message,
            }),
        }
    }
}

/// Charges `card_number` for the signed-in user's tenant
///
/// Never fails: errors before or during the charge are folded into a
/// `processing_error` result.
pub async fn process_payment(
    backend: &dyn Backend,
    amount: f64,
    card_number: &str,
    metadata: JsonValue,
) -> PaymentResult {
    random_delay(500..=1500).await;

    let charged = async {
        let tenant_id = current_tenant_id(backend).await?;
        MockTransaction::charge(backend, tenant_id, amount, card_number, metadata).await
    }
    .await;

    match charged {
        Ok(response) => PaymentResult {
            success: response.status == TransactionStatus::Completed,
            transaction_id: response.id.to_string(),
            error: response.error,
        },
        Err(e) => {
            warn!(amount, error = %e, "Mock payment failed");
            PaymentResult::processing_error(e.user_message())
        }
    }
}

/// Transactions newest first, optionally only those with `status`
pub async fn list_transactions(
    backend: &dyn Backend,
    status: Option<TransactionStatus>,
) -> ConsoleResult<Vec<MockTransaction>> {
    MockTransaction::list(backend, status).await
}

/// Refunds a transaction after a short simulated delay
pub async fn refund_transaction(backend: &dyn Backend, id: Uuid) -> ConsoleResult<MockTransaction> {
    require_user(backend)?;
    random_delay(200..=700).await;
    MockTransaction::mark_refunded(backend, id).await
}
