pub mod address;
pub mod auth;
pub mod dashboard;
pub mod delivery;
pub mod location;
pub mod menu;
pub mod notification;
pub mod order;
pub mod payment;
pub mod realtime;
pub mod restaurant;
pub mod review;
pub mod user;

mod router;
pub use router::get_router;
