use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::aggregation::Aggregator;
use crate::error::Result;
use crate::types::{CostMergePolicy, CostRecord, MonthlyReport, WeightRecord};

/// Hex SHA-256 over the canonical JSON form of the aggregation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct FingerprintInput<'a> {
    policy: CostMergePolicy,
    primary: &'a [WeightRecord],
    secondary: &'a [WeightRecord],
    costs: &'a [CostRecord],
}

impl Fingerprint {
    pub fn of(
        primary: &[WeightRecord],
        secondary: &[WeightRecord],
        costs: &[CostRecord],
        policy: CostMergePolicy,
    ) -> Result<Self> {
        let bytes = serde_json::to_vec(&FingerprintInput {
            policy,
            primary,
            secondary,
            costs,
        })?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Fingerprint raw bytes, e.g. an uploaded sheet before parsing.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Fingerprint(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Memoizes aggregation results by input fingerprint.
///
/// Failed runs are not stored, so a corrected input is recomputed.
#[derive(Debug, Default)]
pub struct AggregationCache {
    entries: HashMap<Fingerprint, MonthlyReport>,
    hits: u64,
    misses: u64,
}

impl AggregationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        aggregator: &Aggregator,
        primary: &[WeightRecord],
        secondary: &[WeightRecord],
        costs: &[CostRecord],
    ) -> Result<&MonthlyReport> {
        let key = Fingerprint::of(primary, secondary, costs, aggregator.policy())?;
        if self.entries.contains_key(&key) {
            self.hits += 1;
            debug!(fingerprint = key.as_str(), "aggregation cache hit");
        } else {
            self.misses += 1;
            debug!(fingerprint = key.as_str(), "aggregation cache miss");
            let report = aggregator.aggregate(primary, secondary, costs)?;
            self.entries.insert(key.clone(), report);
        }
        Ok(&self.entries[&key])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
