//! Payment gateway boundary.
//!
//! The funding service only sees [`PaymentGateway`]: charge creation and
//! notification parsing. Everything gateway-specific lives behind it.

pub mod notification;
pub mod signature;
pub mod snap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::TransactionStatus;

pub use notification::RawNotification;
pub use snap::SnapGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Gateway rejected the charge: {0}")]
    Rejected(String),

    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),

    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    #[error("Notification signature mismatch")]
    InvalidSignature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub transaction_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub payment_code: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Denied,
    Expired,
    Canceled,
}

/// Gateway outcome, normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failure(FailureKind),
    Pending,
}

impl PaymentOutcome {
    /// Terminal status this outcome drives a transaction to, if any.
    pub fn target_status(&self) -> Option<TransactionStatus> {
        match self {
            PaymentOutcome::Success => Some(TransactionStatus::Paid),
            PaymentOutcome::Failure(FailureKind::Denied) => Some(TransactionStatus::Denied),
            PaymentOutcome::Failure(FailureKind::Expired) => Some(TransactionStatus::Expired),
            PaymentOutcome::Failure(FailureKind::Canceled) => Some(TransactionStatus::Canceled),
            PaymentOutcome::Pending => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub transaction_id: i64,
    pub payment_code: Option<String>,
    pub outcome: PaymentOutcome,
    pub gross_amount: Option<i64>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError>;

    /// Verifies and normalizes a raw notification body.
    fn parse_notification(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<GatewayNotification, GatewayError>;
}
