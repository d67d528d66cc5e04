mod command;
mod replicate;
mod restore;

pub use command::command;
pub use command::Command;
pub use replicate::Replicate;
pub use restore::Restore;
