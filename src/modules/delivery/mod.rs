pub mod dispatch;
pub mod job;
pub mod repository;
mod routes;
pub mod service;

pub use routes::get_router;
