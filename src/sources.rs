//! Where weight records come from.
//!
//! Demo mode reads two CSV files; live mode runs one query against the
//! warehouse and one against the operations database. The connectors
//! themselves are supplied by the caller through [`QueryRunner`].

use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::info;

use crate::config::{LiveCredentials, Settings};
use crate::error::{ReportError, Result};
use crate::loader::{load_weight_file, weight_records_from_rows};
use crate::types::{WeightRecord, WeightSource};

/// DBU boxes bound to a PMC, from the warehouse.
pub const PRIMARY_QUERY: &str = "SELECT BOX_ID, PRODUIT, BOX_WEIGHT, NET_WEIGHT, \
     DBU_STOCK_IN_AT, DBU_STOCK_IN_PDA_VERSION, ROI_BIND_PMC \
     FROM DBU \
     WHERE PRODUIT IN ('FR-DBU-S', 'FR-DBU-R') AND ROI_BIND_PMC = TRUE";

/// Non-PMC boxes stocked in at the Roissy warehouse, from the operations database.
pub const SECONDARY_QUERY: &str = "SELECT wbo.reference, sob.transporter, sob.weight, sob.netweight, \
     wbo.stock_in_at, wbo.stock_in_pda_version \
     FROM whs_box_operation wbo \
     JOIN sale_order_box sob ON wbo.reference = sob.id \
     WHERE wbo.warehouse = 'EP_CL1' \
     AND wbo.stock_in_at > '2024-01-01' \
     AND wbo.bind_pmc = false \
     AND wbo.stock_in_pda_version IS NOT NULL";

/// Capability to fetch both weight collections.
pub trait WeightProvider {
    fn fetch_primary(&self) -> Result<Vec<WeightRecord>>;
    fn fetch_secondary(&self) -> Result<Vec<WeightRecord>>;
}

/// Static CSV exports on disk.
#[derive(Debug, Clone)]
pub struct StaticFileSource {
    primary_path: PathBuf,
    secondary_path: PathBuf,
}

impl StaticFileSource {
    pub fn new(primary_path: impl Into<PathBuf>, secondary_path: impl Into<PathBuf>) -> Self {
        Self {
            primary_path: primary_path.into(),
            secondary_path: secondary_path.into(),
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary_path
    }

    pub fn secondary_path(&self) -> &Path {
        &self.secondary_path
    }
}

impl WeightProvider for StaticFileSource {
    fn fetch_primary(&self) -> Result<Vec<WeightRecord>> {
        load_weight_file(&self.primary_path, WeightSource::Primary)
    }

    fn fetch_secondary(&self) -> Result<Vec<WeightRecord>> {
        load_weight_file(&self.secondary_path, WeightSource::Secondary)
    }
}

/// Column names plus string cells, as returned by a database driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A connection able to run one SQL query and hand back its rows.
pub trait QueryRunner {
    fn name(&self) -> &str;
    fn query(&self, sql: &str) -> Result<QueryResult>;
}

/// Live mode: queries the warehouse for primary weights and the operations
/// database for secondary weights.
pub struct RemoteQuerySource<W, D> {
    warehouse: W,
    database: D,
}

impl<W: QueryRunner, D: QueryRunner> RemoteQuerySource<W, D> {
    pub fn new(warehouse: W, database: D) -> Self {
        Self { warehouse, database }
    }

    fn fetch(runner: &dyn QueryRunner, sql: &str, source: WeightSource) -> Result<Vec<WeightRecord>> {
        let result = runner
            .query(sql)
            .map_err(|e| match e {
                ReportError::SourceUnavailable { .. } => e,
                other => ReportError::unavailable(runner.name(), other.to_string()),
            })?;
        let headers = StringRecord::from(result.columns);
        let rows = result
            .rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| (Some(idx as u64 + 1), StringRecord::from(row)));
        let records = weight_records_from_rows(&headers, rows, source, runner.name())?;
        info!("Fetched {} {} weight rows from {}", records.len(), source.label(), runner.name());
        Ok(records)
    }
}

impl<W: QueryRunner, D: QueryRunner> WeightProvider for RemoteQuerySource<W, D> {
    fn fetch_primary(&self) -> Result<Vec<WeightRecord>> {
        Self::fetch(&self.warehouse, PRIMARY_QUERY, WeightSource::Primary)
    }

    fn fetch_secondary(&self) -> Result<Vec<WeightRecord>> {
        Self::fetch(&self.database, SECONDARY_QUERY, WeightSource::Secondary)
    }
}

/// Pick the provider the settings ask for.
///
/// Live mode validates credentials first. No warehouse or database driver is
/// linked into this binary, so a valid live configuration still ends in
/// `SourceUnavailable`; embedders build a [`RemoteQuerySource`] with their own
/// runners instead.
pub fn create_provider(settings: &Settings) -> Result<Box<dyn WeightProvider>> {
    if settings.live {
        let creds = LiveCredentials::from_env()?;
        return Err(ReportError::unavailable(
            "warehouse",
            format!(
                "live mode for account '{}' needs a query runner; none is linked into this build",
                creds.warehouse.account
            ),
        ));
    }
    let provider = StaticFileSource::new(
        settings.data_dir.join(&settings.primary_file),
        settings.data_dir.join(&settings.secondary_file),
    );
    info!(
        "Demo mode: reading {} and {}",
        provider.primary_path().display(),
        provider.secondary_path().display()
    );
    Ok(Box::new(provider))
}
