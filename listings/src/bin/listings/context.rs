use std::path::PathBuf;

use anyhow::{Context, Result};
use listings::{Client, MemoryStore, MongoStore, PlannerConfig, seed};

/// Connection and configuration settings shared by every subcommand.
pub struct CliContext {
    pub config: PlannerConfig,
    pub config_path: Option<PathBuf>,
    pub mongodb_uri: String,
    pub database: String,
}

impl CliContext {
    pub fn load(config_path: Option<PathBuf>, mongodb_uri: String, database: String) -> Result<Self> {
        let config = match &config_path {
            Some(path) => PlannerConfig::load(path)
                .with_context(|| format!("Failed to load planner config from {}", path.display()))?,
            None => PlannerConfig::default(),
        };
        Ok(Self {
            config,
            config_path,
            mongodb_uri,
            database,
        })
    }

    pub async fn mongo_client(&self) -> Result<Client<MongoStore>> {
        Client::connect(&self.mongodb_uri, &self.database, self.config.clone())
            .await
            .with_context(|| format!("Failed to connect to {}", self.mongodb_uri))
    }

    /// In-memory client with every collection indexed and seeded with `fixtures` documents.
    pub async fn memory_client(&self, fixtures: usize) -> Result<Client<MemoryStore>> {
        let client = Client::new(MemoryStore::new(), self.config.clone())?;
        for profile in client.profiles() {
            listings::indexes::ensure_indexes(client.store(), profile).await?;
            seed::seed_if_empty(client.store(), profile, fixtures).await?;
        }
        Ok(client)
    }
}
