pub mod history;
pub mod push_subscription;
pub mod scheduled;
