#![allow(dead_code)]

use async_trait::async_trait;
use crowdfund_core::adapters::InMemoryStore;
use crowdfund_core::domain::{Campaign, NewCampaign};
use crowdfund_core::gateway::{
    notification, Charge, ChargeRequest, GatewayError, GatewayNotification, PaymentGateway,
};
use crowdfund_core::ports::CampaignStore;
use crowdfund_core::services::FundingService;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Gateway double: issues predictable charges and can be told to fail.
#[derive(Default)]
pub struct ScriptedGateway {
    failing: AtomicBool,
    charges: AtomicUsize,
}

impl ScriptedGateway {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("503 Service Unavailable".to_string()));
        }
        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(Charge {
            payment_code: format!("snap-token-{}", request.transaction_id),
            redirect_url: format!("https://pay.example/v2/{}", request.transaction_id),
        })
    }

    fn parse_notification(
        &self,
        payload: &[u8],
        _signature: Option<&str>,
    ) -> Result<GatewayNotification, GatewayError> {
        notification::parse_notification(payload)
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub funding: FundingService,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let funding = FundingService::new(store.clone(), store.clone(), gateway.clone());
    Harness {
        store,
        gateway,
        funding,
    }
}

pub async fn seed_campaign(store: &InMemoryStore, owner: i64, name: &str) -> Campaign {
    CampaignStore::create(
        store,
        &NewCampaign {
            user_id: owner,
            name: name.to_string(),
            short_description: "Short".to_string(),
            description: "Long description".to_string(),
            goal_amount: 1_000_000,
            perks: vec!["Sticker".to_string()],
        },
    )
    .await
    .unwrap()
}

pub fn notification_body(transaction_id: i64, status: &str, gross_amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "order_id": transaction_id.to_string(),
        "transaction_status": status,
        "payment_type": "bank_transfer",
        "transaction_id": format!("gw-{}", transaction_id),
        "gross_amount": format!("{}.00", gross_amount),
    }))
    .unwrap()
}
