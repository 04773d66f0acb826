/// Transaction types for powledger
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;
use std::fmt;

/// Sender recorded on the reward transaction a miner pays itself.
pub const REWARD_SENDER: &str = "0";

/// A non-negative JSON number.
///
/// Integers and fractions are both kept exactly as they were written, so `5` and
/// `5.0` stay distinct and hash the same way on every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Amount(Number);

impl Amount {
    /// Accepts `number` when it is zero or positive.
    pub fn from_number(number: Number) -> Option<Self> {
        let non_negative = number.is_u64() || number.as_f64().is_some_and(|v| v >= 0.0);
        non_negative.then_some(Amount(number))
    }

    pub fn as_number(&self) -> &Number {
        &self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or_default()
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(Number::from(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = Number::deserialize(deserializer)?;
        Amount::from_number(number.clone())
            .ok_or_else(|| serde::de::Error::custom(format!("amount must be non-negative, got {}", number)))
    }
}

/// A transfer of `amount` units from `sender` to `recipient`.
///
/// Transactions carry no identity of their own; two identical submissions are two
/// separate entries in the pending pool and later in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: Amount,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self::with_amount(sender, recipient, Amount::from(amount))
    }

    pub fn with_amount(sender: impl Into<String>, recipient: impl Into<String>, amount: Amount) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// The mining reward paid to `beneficiary`.
    pub fn reward(beneficiary: impl Into<String>, amount: u64) -> Self {
        Self::new(REWARD_SENDER, beneficiary, amount)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_amount_round_trips_through_json() {
        let tx: Transaction = serde_json::from_str(r#"{"sender":"A","recipient":"B","amount":2.5}"#).unwrap();
        assert_eq!(tx.amount.as_f64(), 2.5);
        assert_eq!(serde_json::to_string(&tx.amount).unwrap(), "2.5");

        let whole_float: Amount = serde_json::from_str("5.0").unwrap();
        assert_eq!(serde_json::to_string(&whole_float).unwrap(), "5.0");
        assert_ne!(whole_float, Amount::from(5u64));
    }

    #[test]
    fn test_negative_amount_fails_to_decode() {
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert!(serde_json::from_str::<Amount>("-0.5").is_err());
        assert!(serde_json::from_str::<Amount>("\"5\"").is_err());
        assert!(serde_json::from_str::<Amount>("0").is_ok());
    }
}
