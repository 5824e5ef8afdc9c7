use clap::{Parser, Subcommand};
use sqlx::PgPool;
use crate::config::{Config, StorageBackend};

#[derive(Parser)]
#[command(name = "crowdfund-core")]
#[command(about = "Crowdfund Core - campaign funding and payment settlement backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Campaign maintenance commands
    #[command(subcommand)]
    Campaign(CampaignCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// Compare each campaign's backed amount with the sum of its paid transactions
    AuditTotals,
}

/// A campaign whose stored backed amount disagrees with its paid transactions.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TotalsDrift {
    pub campaign_id: i64,
    pub slug: String,
    pub backed_amount: i64,
    pub paid_total: i64,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    require_postgres(config)?;
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Storage: {:?}", config.storage);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (not set)"),
    }
    println!("  Gateway URL: {}", config.gateway_base_url);
    println!("  Gateway Server Key: {}", mask_secret(&config.gateway_server_key));
    println!(
        "  Webhook Signature Check: {}",
        if config.gateway_webhook_secret.is_some() { "enabled" } else { "disabled" }
    );
    println!("  Gateway Timeout: {}s", config.gateway_timeout.as_secs());

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub async fn handle_campaign_audit_totals(config: &Config) -> anyhow::Result<()> {
    require_postgres(config)?;
    let pool = crate::db::create_pool(config).await?;

    let drifts = find_totals_drift(&pool).await?;
    if drifts.is_empty() {
        println!("✓ All campaign totals match their paid transactions");
        return Ok(());
    }

    for drift in &drifts {
        tracing::warn!(
            campaign_id = drift.campaign_id,
            backed_amount = drift.backed_amount,
            paid_total = drift.paid_total,
            "campaign total drift"
        );
        println!(
            "✗ campaign {} ({}): backed_amount={} paid_total={}",
            drift.campaign_id, drift.slug, drift.backed_amount, drift.paid_total
        );
    }
    anyhow::bail!("{} campaign(s) have drifted totals", drifts.len())
}

/// Read-only; never rewrites `backed_amount`.
pub async fn find_totals_drift(pool: &PgPool) -> anyhow::Result<Vec<TotalsDrift>> {
    let drifts = sqlx::query_as::<_, TotalsDrift>(
        r#"
        SELECT c.id AS campaign_id, c.slug, c.backed_amount,
               COALESCE(SUM(t.amount) FILTER (WHERE t.status = 'paid'), 0)::BIGINT AS paid_total
        FROM campaigns c
        LEFT JOIN transactions t ON t.campaign_id = c.id
        GROUP BY c.id, c.slug, c.backed_amount
        HAVING c.backed_amount <> COALESCE(SUM(t.amount) FILTER (WHERE t.status = 'paid'), 0)
        ORDER BY c.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(drifts)
}

fn require_postgres(config: &Config) -> anyhow::Result<()> {
    if config.storage != StorageBackend::Postgres {
        anyhow::bail!("this command requires STORAGE=postgres");
    }
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}
