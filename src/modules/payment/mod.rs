pub mod gateway;
mod routes;

pub use routes::get_router;
