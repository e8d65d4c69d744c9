#[cfg(test)]
pub mod fixtures;
pub mod repository;
mod routes;
pub mod service;
pub mod status;

pub use routes::get_router;
