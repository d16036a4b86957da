//! Payment testbed

use crate::app::Console;
use crate::cli::PaymentsCommand;
use crate::error::{CliError, CliResult};
use crate::output::{or_dash, Printer};
use serde_json::{json, Value as JsonValue};
use tenantdesk_shared::auth::authorization::Permission;
use tenantdesk_shared::format::{format_currency, format_date};
use tenantdesk_worker::payments::{
    describe_card, list_transactions, process_payment, refund_transaction, test_card, TEST_CARDS,
};

/// Card number for a test card name; anything else is taken as a number
pub fn resolve_card(card: &str) -> &str {
    test_card(card).map_or(card, |c| c.number)
}

/// Parses `--metadata`, which must be a JSON object
pub fn parse_metadata(metadata: Option<&str>) -> CliResult<JsonValue> {
    let Some(raw) = metadata else {
        return Ok(json!({}));
    };
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(CliError::InvalidInput("metadata must be a JSON object".to_string())),
        Err(e) => Err(CliError::InvalidInput(format!("metadata is not valid JSON: {}", e))),
    }
}

pub async fn run(console: &Console, command: PaymentsCommand, out: &mut Printer<'_>) -> CliResult<()> {
    let backend = console.backend.as_ref();

    match command {
        PaymentsCommand::Cards => {
            let rows = TEST_CARDS
                .iter()
                .map(|c| vec![c.name.to_string(), c.number.to_string(), c.description.to_string()])
                .collect();
            out.table(&["NAME", "NUMBER", "OUTCOME"], rows, &TEST_CARDS)?;
        }

        PaymentsCommand::Charge { amount, card, metadata } => {
            console.require(Permission::UsePaymentTestbed).await?;
            if amount.is_nan() || amount <= 0.0 {
                return Err(CliError::InvalidInput("amount must be positive".to_string()));
            }
            let metadata = parse_metadata(metadata.as_deref())?;
            let number = resolve_card(&card);

            out.note(&format!(
                "Charging {} to {} ({})",
                format_currency(amount),
                number,
                describe_card(number).unwrap_or("unknown card")
            ))?;
            let result = process_payment(backend, amount, number, metadata).await;

            let text = match &result.error {
                None if result.success => format!("Payment succeeded: transaction {}", result.transaction_id),
                Some(error) => format!("Payment failed ({}): {}", error.code, error.message),
                None => format!("Payment not completed: transaction {}", result.transaction_id),
            };
            out.message(&text, &result)?;
        }

        PaymentsCommand::List { status } => {
            console.require(Permission::UsePaymentTestbed).await?;
            let transactions = list_transactions(backend, status).await?;
            let rows = transactions
                .iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        format_currency(t.amount),
                        t.status.as_str().to_string(),
                        or_dash(t.error.as_ref().map(|e| e.code.clone())),
                        format_date(&t.created_at),
                    ]
                })
                .collect();
            out.table(&["ID", "AMOUNT", "STATUS", "ERROR", "CREATED"], rows, &transactions)?;
        }

        PaymentsCommand::Refund { id } => {
            console.require(Permission::UsePaymentTestbed).await?;
            let transaction = refund_transaction(backend, id).await?;
            out.message(
                &format!("Refunded {} ({})", format_currency(transaction.amount), transaction.id),
                &transaction,
            )?;
        }
    }
    Ok(())
}
