use std::path::PathBuf;

use clap::Parser;

use crate::error::{ReportError, Result};
use crate::types::CostMergePolicy;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Monthly waste weight and cost report", long_about = None)]
pub struct Settings {
    /// Query the live warehouse and database instead of the demo CSVs.
    #[arg(long, env = "WASTE_REPORT_LIVE", default_value_t = false)]
    pub live: bool,

    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Primary (DBU) weight export, relative to `--data-dir`.
    #[arg(long, default_value = "dbu.csv")]
    pub primary_file: PathBuf,

    /// Secondary weight export, relative to `--data-dir`.
    #[arg(long, default_value = "roissy.csv")]
    pub secondary_file: PathBuf,

    /// Cost sheet(s) to preload; more can be loaded from the menu.
    #[arg(long = "cost-file")]
    pub cost_files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = CostMergePolicy::Reject)]
    pub cost_policy: CostMergePolicy,

    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseCredentials {
    pub user: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseCredentials {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Connection settings for live mode.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveCredentials {
    pub warehouse: WarehouseCredentials,
    pub database: DatabaseCredentials,
}

impl LiveCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from any key lookup; `POSTGRES_PORT` defaults to 5432.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ReportError::Config(format!("missing {key}")))
        };

        let warehouse = WarehouseCredentials {
            user: get("SNOWFLAKE_USER")?,
            password: get("SNOWFLAKE_PASSWORD")?,
            account: get("SNOWFLAKE_ACCOUNT")?,
            warehouse: get("SNOWFLAKE_WAREHOUSE")?,
            database: get("SNOWFLAKE_DATABASE")?,
            schema: get("SNOWFLAKE_SCHEMA")?,
            role: get("SNOWFLAKE_ROLE")?,
        };
        let port = match lookup("POSTGRES_PORT").filter(|v| !v.is_empty()) {
            Some(p) => p
                .parse()
                .map_err(|_| ReportError::Config(format!("invalid POSTGRES_PORT '{p}'")))?,
            None => 5432,
        };
        let database = DatabaseCredentials {
            host: get("POSTGRES_HOST")?,
            port,
            database: get("POSTGRES_DATABASE")?,
            user: get("POSTGRES_USER")?,
            password: get("POSTGRES_PASSWORD")?,
        };
        Ok(LiveCredentials { warehouse, database })
    }
}
