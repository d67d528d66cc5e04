use std::sync::Arc;

use super::command::Command;
use crate::config::Config;
use crate::database::Database;
use crate::error::Result;
use crate::log::init_log;

pub struct Replicate {
    databases: Vec<Arc<Database>>,
}

impl Replicate {
    pub fn try_create(config_file: &str) -> Result<Box<Self>> {
        let config = Config::load(config_file)?;
        init_log(config.log.clone())?;

        let mut databases = vec![];
        for db in &config.database {
            let database = Database::try_create(db.clone())?;
            databases.push(Arc::new(database));
        }
        Ok(Box::new(Replicate { databases }))
    }
}

#[async_trait::async_trait]
impl Command for Replicate {
    async fn run(&mut self) -> Result<()> {
        let mut handles = vec![];
        for database in &self.databases {
            let database = database.clone();
            let handle = tokio::spawn(async move {
                let _ = database.as_ref().run().await;
            });

            handles.push(handle);
        }

        for h in handles {
            h.await.unwrap();
        }
        Ok(())
    }
}
