#[allow(clippy::module_inception)]
mod error;
mod error_code;
mod error_into;

pub use error::Error;
pub use error::Result;
