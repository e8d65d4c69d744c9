pub mod hub;
mod routes;

pub use hub::{room, Event, Hub};
pub use routes::get_router;
