/// Webhook event catalog and payload synthesis
///
/// The simulator can send three payment-provider style events. Each has a
/// description for operators and sample data; a delivered payload wraps the
/// sample in an envelope:
///
/// ```json
/// {
///   "id": "evt_5f0c6e1b9a3d4c2e8f7a6b5c4d3e2f1a",
///   "type": "payment_intent.succeeded",
///   "created": 1704448800,
///   "data": { "object": { "amount": 1000, "currency": "usd", "status": "succeeded" } }
/// }
/// ```
///
/// # Signatures
///
/// With a signing secret the envelope gets a `signature` field: the
/// hex-encoded HMAC-SHA256 of the envelope as serialized without it.
///
/// # Example
///
/// ```
/// use tenantdesk_worker::events::{find_event, sign_payload, verify_signature};
///
/// let event = find_event("charge.refunded").unwrap();
/// let payload = event.envelope();
/// assert_eq!(payload["type"], "charge.refunded");
///
/// let sig = sign_payload(b"secret", b"body").unwrap();
/// assert!(verify_signature(b"secret", b"body", &sig));
/// ```

use chrono::Utc;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use serde_json::{json, Value as JsonValue};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.failed";
pub const CHARGE_REFUNDED: &str = "charge.refunded";

/// Every event type the simulator knows, in display order
pub const EVENT_TYPES: [&str; 3] = [PAYMENT_SUCCEEDED, PAYMENT_FAILED, CHARGE_REFUNDED];

/// A simulatable event
#[derive(Debug, Clone, PartialEq)]
pub struct EventSpec {
    pub event_type: &'static str,
    pub description: &'static str,
    pub data: JsonValue,
}

impl EventSpec {
    /// Wraps the sample data in a fresh event envelope
    pub fn envelope(&self) -> JsonValue {
        json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": self.event_type,
            "created": Utc::now().timestamp(),
            "data": { "object": self.data },
        })
    }

    /// Envelope with a `signature` field
    pub fn signed_envelope(&self, secret: &[u8]) -> Result<JsonValue, InvalidLength> {
        let mut envelope = self.envelope();
        let signature = sign_payload(secret, envelope.to_string().as_bytes())?;
        if let Some(object) = envelope.as_object_mut() {
            object.insert("signature".to_string(), JsonValue::String(signature));
        }
        Ok(envelope)
    }
}

/// Looks up an event by type
pub fn find_event(event_type: &str) -> Option<EventSpec> {
    let (description, data) = match event_type {
        PAYMENT_SUCCEEDED => (
            "Simulate a successful payment",
            json!({ "amount": 1000, "currency": "usd", "status": "succeeded" }),
        ),
        PAYMENT_FAILED => (
            "Simulate a failed payment",
            json!({
                "amount": 1000,
                "currency": "usd",
                "status": "failed",
                "error": { "code": "card_declined", "message": "Your card was declined" },
            }),
        ),
        CHARGE_REFUNDED => (
            "Simulate a refund",
            json!({ "amount": 1000, "currency": "usd", "status": "refunded" }),
        ),
        _ => return None,
    };

    let event_type = EVENT_TYPES.iter().find(|t| **t == event_type)?;
    Some(EventSpec {
        event_type,
        description,
        data,
    })
}

/// The full catalog
pub fn catalog() -> Vec<EventSpec> {
    EVENT_TYPES.iter().filter_map(|t| find_event(t)).collect()
}

/// Hex-encoded HMAC-SHA256 of `payload`
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex signature in constant time
pub fn verify_signature(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(payload);
            mac.verify_slice(&expected).is_ok()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        let events = catalog();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, PAYMENT_SUCCEEDED);

        let failed = find_event(PAYMENT_FAILED).unwrap();
        assert_eq!(failed.data["error"]["code"], "card_declined");
        assert_eq!(failed.data["amount"], 1000);
        assert!(find_event("invoice.paid").is_none());
    }

    #[test]
    fn test_envelope_shape() {
        let payload = find_event(PAYMENT_SUCCEEDED).unwrap().envelope();

        let id = payload["id"].as_str().unwrap();
        assert!(id.starts_with("evt_"));
        assert_eq!(id.len(), 4 + 32);
        assert_eq!(payload["type"], PAYMENT_SUCCEEDED);
        assert!(payload["created"].as_i64().unwrap() > 0);
        assert_eq!(payload["data"]["object"]["status"], "succeeded");
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let event = find_event(CHARGE_REFUNDED).unwrap();
        assert_ne!(event.envelope()["id"], event.envelope()["id"]);
    }

    #[test]
    fn test_signature_format() {
        let sig = sign_payload(b"test_secret", b"test payload").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sign_payload(b"test_secret", b"test payload").unwrap());
        assert_ne!(sig, sign_payload(b"other_secret", b"test payload").unwrap());
    }

    #[test]
    fn test_signed_envelope_verifies() {
        let event = find_event(PAYMENT_SUCCEEDED).unwrap();
        let mut envelope = event.signed_envelope(b"whsec").unwrap();

        let signature = envelope["signature"].as_str().unwrap().to_string();
        envelope.as_object_mut().unwrap().remove("signature");
        let body = envelope.to_string();

        assert!(verify_signature(b"whsec", body.as_bytes(), &signature));
        assert!(!verify_signature(b"wrong", body.as_bytes(), &signature));
        assert!(!verify_signature(b"whsec", body.as_bytes(), "not-hex"));
    }
}
