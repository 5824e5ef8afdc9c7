use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{notification, signature};
use super::{Charge, ChargeRequest, GatewayError, GatewayNotification, PaymentGateway};

#[derive(Debug, Serialize)]
struct SnapChargeBody {
    transaction_details: TransactionDetails,
}

#[derive(Debug, Serialize)]
struct TransactionDetails {
    order_id: String,
    gross_amount: i64,
}

/// Response from the Snap /transactions endpoint
#[derive(Debug, Clone, Deserialize)]
struct SnapChargeResponse {
    token: String,
    redirect_url: String,
}

/// HTTP client for a Snap-style hosted payment page API
#[derive(Clone)]
pub struct SnapGateway {
    client: Client,
    base_url: String,
    server_key: String,
    webhook_secret: Option<String>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl SnapGateway {
    /// Creates a new SnapGateway with the default circuit breaker
    pub fn new(base_url: String, server_key: String, webhook_secret: Option<String>) -> Self {
        Self::with_circuit_breaker(base_url, server_key, webhook_secret, 3, 60)
    }

    /// Creates a new SnapGateway with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        server_key: String,
        webhook_secret: Option<String>,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        SnapGateway {
            client,
            base_url,
            server_key,
            webhook_secret,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let url = format!("{}/snap/v1/transactions", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let server_key = self.server_key.clone();
        let body = SnapChargeBody {
            transaction_details: TransactionDetails {
                order_id: request.transaction_id.to_string(),
                gross_amount: request.amount,
            },
        };

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(server_key, Some(""))
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let detail = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected(format!("{}: {}", status, detail)));
                }

                let charge = response
                    .json::<SnapChargeResponse>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                Ok(charge)
            })
            .await;

        match result {
            Ok(charge) => Ok(Charge {
                payment_code: charge.token,
                redirect_url: charge.redirect_url,
            }),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn parse_notification(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<GatewayNotification, GatewayError> {
        if let Some(secret) = &self.webhook_secret {
            match signature {
                Some(sig) if signature::verify(secret, payload, sig) => {}
                _ => return Err(GatewayError::InvalidSignature),
            }
        }
        notification::parse_notification(payload)
    }
}
