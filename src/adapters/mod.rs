//! Store implementations behind the `ports` traits.

pub mod memory;
pub mod postgres_campaign_store;
pub mod postgres_transaction_store;

pub use memory::InMemoryStore;
pub use postgres_campaign_store::PostgresCampaignStore;
pub use postgres_transaction_store::PostgresTransactionStore;
