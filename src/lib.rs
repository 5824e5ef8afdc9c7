pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod utils;
pub mod validation;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::adapters::{InMemoryStore, PostgresCampaignStore, PostgresTransactionStore};
use crate::config::{Config, StorageBackend};
use crate::gateway::{PaymentGateway, SnapGateway};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::{CampaignStore, TransactionStore};
use crate::services::{CampaignService, FundingService};

#[derive(Clone)]
pub struct AppState {
    pub campaigns: CampaignService,
    pub funding: FundingService,
}

impl AppState {
    pub fn new(
        campaign_store: Arc<dyn CampaignStore>,
        transaction_store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            campaigns: CampaignService::new(campaign_store.clone()),
            funding: FundingService::new(campaign_store, transaction_store, gateway),
        }
    }

    /// Wires stores and gateway according to `config`.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SnapGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_server_key.clone(),
            config.gateway_webhook_secret.clone(),
        ));

        let campaign_store: Arc<dyn CampaignStore>;
        let transaction_store: Arc<dyn TransactionStore>;
        match config.storage {
            StorageBackend::Postgres => {
                let pool = db::create_pool(config).await?;
                campaign_store = Arc::new(PostgresCampaignStore::new(pool.clone()));
                transaction_store = Arc::new(PostgresTransactionStore::new(pool));
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage, data is lost on restart");
                let store = Arc::new(InMemoryStore::new());
                campaign_store = store.clone();
                transaction_store = store;
            }
        }

        let mut state = Self::new(campaign_store, transaction_store, gateway);
        state.funding = state.funding.with_charge_timeout(config.gateway_timeout);
        Ok(state)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::campaigns::list_campaigns,
        handlers::campaigns::get_campaign,
        handlers::campaigns::create_campaign,
        handlers::campaigns::update_campaign,
        handlers::campaigns::add_campaign_image,
        handlers::transactions::submit_transaction,
        handlers::transactions::list_campaign_transactions,
        handlers::transactions::list_user_transactions,
        handlers::webhook::notification,
    ),
    components(schemas(
        handlers::HealthStatus,
        domain::Campaign,
        domain::CampaignImage,
        domain::Transaction,
        domain::TransactionStatus,
        domain::UserTransaction,
        services::campaigns::CampaignInput,
        services::campaigns::CampaignImageInput,
        services::campaigns::CampaignDetail,
        services::funding::SubmittedTransaction,
        services::funding::NotificationAck,
        handlers::transactions::SubmitTransactionRequest,
    )),
    tags(
        (name = "Health"),
        (name = "Campaigns"),
        (name = "Transactions"),
        (name = "Gateway")
    )
)]
pub struct ApiDoc;

pub fn create_app(state: AppState) -> Router {
    create_app_with(state, RequestLogConfig::default(), None)
}

pub fn create_app_with(
    state: AppState,
    log_config: RequestLogConfig,
    cors_allowed_origins: Option<&[String]>,
) -> Router {
    let api = Router::new()
        .route(
            "/campaigns",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route(
            "/campaigns/:id",
            get(handlers::campaigns::get_campaign).put(handlers::campaigns::update_campaign),
        )
        .route(
            "/campaigns/:id/transactions",
            get(handlers::transactions::list_campaign_transactions),
        )
        .route("/campaign-images", post(handlers::campaigns::add_campaign_image))
        .route(
            "/transactions",
            get(handlers::transactions::list_user_transactions)
                .post(handlers::transactions::submit_transaction),
        )
        .route("/transactions/notification", post(handlers::webhook::notification));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(cors_allowed_origins))
        .layer(axum::middleware::from_fn_with_state(
            log_config,
            request_logger_middleware,
        ))
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let origin = match allowed_origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any)
}
