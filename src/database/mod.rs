#[allow(clippy::module_inception)]
mod database;

pub use database::Database;
