pub mod hours;
pub mod repository;
mod routes;
pub mod service;

pub use routes::get_router;
