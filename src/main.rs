use clap::Parser;
use crowdfund_core::cli::{Cli, CampaignCommands, Commands, DbCommands};
use crowdfund_core::config::{Config, LogFormat, StorageBackend};
use crowdfund_core::middleware::request_logger::RequestLogConfig;
use crowdfund_core::{cli, create_app_with, db, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Campaign(CampaignCommands::AuditTotals)) => {
            cli::handle_campaign_audit_totals(&config).await
        }
        Some(Commands::Config) => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if config.storage == StorageBackend::Postgres {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
    }

    let state = AppState::from_config(&config).await?;
    tracing::info!(
        gateway = %config.gateway_base_url,
        storage = ?config.storage,
        "payment gateway client initialized"
    );

    let app = create_app_with(
        state,
        RequestLogConfig {
            log_body: config.log_request_body,
        },
        config.cors_allowed_origins.as_deref(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
