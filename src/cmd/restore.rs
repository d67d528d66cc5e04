use super::command::Command;
use crate::config::Config;
use crate::config::RestoreOptions;
use crate::error::Error;
use crate::error::Result;
use crate::log::init_log;
use crate::restore::run_restore;

pub struct Restore {
    config: Config,
    options: RestoreOptions,
}

impl Restore {
    pub fn try_create(config_file: &str, options: RestoreOptions) -> Result<Box<Self>> {
        let config = Config::load(config_file)?;
        init_log(config.log.clone())?;
        Ok(Box::new(Restore { config, options }))
    }
}

#[async_trait::async_trait]
impl Command for Restore {
    async fn run(&mut self) -> Result<()> {
        self.options.validate()?;

        let db_config = self
            .config
            .database(&self.options.db)
            .ok_or_else(|| {
                Error::InvalidArg(format!(
                    "no [[database]] entry with db = \"{}\" in config",
                    self.options.db
                ))
            })?
            .clone();

        run_restore(&db_config, &self.options).await
    }
}
