use super::Replicate;
use super::Restore;
use crate::config::Arg;
use crate::config::ArgCommand;
use crate::error::Result;

#[async_trait::async_trait]
pub trait Command {
    async fn run(&mut self) -> Result<()>;
}

pub fn command(arg: Arg) -> Result<Box<dyn Command>> {
    match arg.command {
        ArgCommand::Replicate(options) => Ok(Replicate::try_create(&options.config)?),
        ArgCommand::Restore(options) => Ok(Restore::try_create(&options.config, options)?),
    }
}
