pub mod database;
pub mod pagination;
pub mod validation;
pub mod time;
