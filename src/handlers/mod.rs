pub mod accounting;
pub mod limits;
pub mod modules;
pub mod public;
pub mod subscriptions;
