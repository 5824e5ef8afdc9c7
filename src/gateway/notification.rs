//! Snap-style notification payload and its normalization.

use serde::Deserialize;

use super::{FailureKind, GatewayError, GatewayNotification, PaymentOutcome};

#[derive(Debug, Clone, Deserialize)]
pub struct RawNotification {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    /// Gateway-side identifier of the payment.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

impl RawNotification {
    pub fn outcome(&self) -> Result<PaymentOutcome, GatewayError> {
        let fraud = self.fraud_status.as_deref();
        match self.transaction_status.as_str() {
            "settlement" => Ok(PaymentOutcome::Success),
            "capture" => match fraud {
                Some("challenge") => Ok(PaymentOutcome::Pending),
                Some("deny") => Ok(PaymentOutcome::Failure(FailureKind::Denied)),
                _ => Ok(PaymentOutcome::Success),
            },
            "deny" => Ok(PaymentOutcome::Failure(FailureKind::Denied)),
            "expire" => Ok(PaymentOutcome::Failure(FailureKind::Expired)),
            "cancel" => Ok(PaymentOutcome::Failure(FailureKind::Canceled)),
            "pending" => Ok(PaymentOutcome::Pending),
            other => Err(GatewayError::MalformedNotification(format!(
                "unknown transaction_status '{}'",
                other
            ))),
        }
    }

    pub fn normalize(self) -> Result<GatewayNotification, GatewayError> {
        let outcome = self.outcome()?;
        let transaction_id = self.order_id.trim().parse::<i64>().map_err(|_| {
            GatewayError::MalformedNotification(format!("order_id '{}' is not numeric", self.order_id))
        })?;
        let gross_amount = self
            .gross_amount
            .as_deref()
            .map(parse_gross_amount)
            .transpose()?;

        Ok(GatewayNotification {
            transaction_id,
            payment_code: self.transaction_id,
            outcome,
            gross_amount,
        })
    }
}

pub fn parse_notification(payload: &[u8]) -> Result<GatewayNotification, GatewayError> {
    let raw: RawNotification = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::MalformedNotification(e.to_string()))?;
    raw.normalize()
}

/// Amounts arrive as decimal strings such as `"100000.00"`. Only whole
/// minor units are accepted.
fn parse_gross_amount(raw: &str) -> Result<i64, GatewayError> {
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if !fraction.chars().all(|c| c == '0') {
        return Err(GatewayError::MalformedNotification(format!(
            "gross_amount '{}' has a fractional part",
            raw
        )));
    }
    whole
        .parse::<i64>()
        .map_err(|_| GatewayError::MalformedNotification(format!("gross_amount '{}' is not numeric", raw)))
}
