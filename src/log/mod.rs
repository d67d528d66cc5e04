#[allow(clippy::module_inception)]
mod log;

pub use log::init_log;
