pub mod access;
pub mod campaigns;
pub mod funding;

pub use campaigns::CampaignService;
pub use funding::FundingService;
