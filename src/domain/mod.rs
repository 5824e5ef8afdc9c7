//! Framework-agnostic domain entities.

pub mod campaign;
pub mod transaction;

pub use campaign::{Campaign, CampaignChanges, CampaignImage, NewCampaign, NewCampaignImage};
pub use transaction::{
    NewTransaction, StatusChange, Transaction, TransactionStatus, TransitionError,
    UserTransaction,
};
