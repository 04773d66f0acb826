/// Validation of client-submitted transactions
use crate::error::ChainError;
use crate::transaction::types::{Amount, Transaction};
use serde_json::Value;

const REQUIRED_FIELDS: [&str; 3] = ["sender", "recipient", "amount"];

/// Build a transaction from a submitted JSON document.
///
/// Every field in [`REQUIRED_FIELDS`] must be present. Addresses must be strings and
/// the amount a non-negative number. Balances and signatures are not checked.
pub fn parse_submission(body: &Value) -> Result<Transaction, ChainError> {
    let fields = body
        .as_object()
        .ok_or_else(|| ChainError::InvalidInput("Missing values".to_string()))?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|k| !fields.contains_key(**k)) {
        return Err(ChainError::InvalidInput(format!(
            "Missing values: '{}' is required",
            missing
        )));
    }

    let sender = address_field(body, "sender")?;
    let recipient = address_field(body, "recipient")?;
    let amount = match &body["amount"] {
        Value::Number(n) => Amount::from_number(n.clone()),
        _ => None,
    }
    .ok_or_else(|| ChainError::InvalidInput("Missing values: 'amount' must be a non-negative number".to_string()))?;

    Ok(Transaction::with_amount(sender, recipient, amount))
}

fn address_field(body: &Value, key: &str) -> Result<String, ChainError> {
    body[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ChainError::InvalidInput(format!("Missing values: '{}' must be a string", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_complete_submission() {
        let tx = parse_submission(&json!({"sender": "A", "recipient": "B", "amount": 5})).unwrap();
        assert_eq!(tx, Transaction::new("A", "B", 5));
        assert!(!tx.is_reward());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        for body in [
            json!({"recipient": "B", "amount": 5}),
            json!({"sender": "A", "amount": 5}),
            json!({"sender": "A", "recipient": "B"}),
            json!([]),
            json!(null),
        ] {
            let err = parse_submission(&body).unwrap_err();
            assert!(matches!(err, ChainError::InvalidInput(ref m) if m.starts_with("Missing values")));
        }
    }

    #[test]
    fn test_malformed_fields_are_rejected() {
        assert!(parse_submission(&json!({"sender": 1, "recipient": "B", "amount": 5})).is_err());
        assert!(parse_submission(&json!({"sender": "A", "recipient": "B", "amount": -5})).is_err());
        assert!(parse_submission(&json!({"sender": "A", "recipient": "B", "amount": -0.5})).is_err());
        assert!(parse_submission(&json!({"sender": "A", "recipient": "B", "amount": "5"})).is_err());
    }

    #[test]
    fn test_fractional_amount_is_accepted() {
        let tx = parse_submission(&json!({"sender": "A", "recipient": "B", "amount": 2.5})).unwrap();
        assert_eq!(tx.amount.as_f64(), 2.5);

        let tx = parse_submission(&json!({"sender": "A", "recipient": "B", "amount": 5.0})).unwrap();
        assert_eq!(tx.amount.to_string(), "5.0");
    }

    #[test]
    fn test_reward_sender_is_accepted_from_clients() {
        let tx = parse_submission(&json!({"sender": "0", "recipient": "B", "amount": 1})).unwrap();
        assert!(tx.is_reward());
    }
}
