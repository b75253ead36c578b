use anyhow::Context;

use crate::lifecycle::TransitionPolicy;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub transition_policy: TransitionPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("GRIEVANCE_DB_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("invalid GRIEVANCE_DB_MAX_CONNECTIONS '{value}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let transition_policy = match lookup("GRIEVANCE_TRANSITION_POLICY") {
            Some(value) => value.parse()?,
            None => TransitionPolicy::default(),
        };

        Ok(Self {
            database_url,
            max_connections,
            transition_policy,
        })
    }
}
