//! Monthly aggregation of weight and cost records.
//!
//! Everything here is a pure transform: no I/O, no shared state, and output
//! order is fixed by `BTreeMap` keys so identical inputs always produce
//! identical reports.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::sources::WeightProvider;
use crate::types::{
    CostMergePolicy, CostRecord, Metric, MonthlyAggregate, MonthlyReport, ReportWarning,
    TransporterMonth, WeightRecord, WeightSource, YearMonth, YoyPoint, YoySeries,
};

#[derive(Debug, Default, Clone)]
struct SourceTotals {
    weight: f64,
    net_weight: f64,
    references: BTreeSet<String>,
}

impl SourceTotals {
    fn add(&mut self, rec: &WeightRecord) {
        self.weight += rec.weight;
        self.net_weight += rec.net_weight.unwrap_or(0.0);
        if !rec.reference.is_empty() {
            self.references.insert(rec.reference.clone());
        }
    }
}

/// Stateless aggregator; the only setting is how duplicate cost months merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: CostMergePolicy,
}

impl Aggregator {
    pub fn new(policy: CostMergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CostMergePolicy {
        self.policy
    }

    /// Fetch both weight collections from `provider` and aggregate them.
    pub fn run(&self, provider: &dyn WeightProvider, costs: &[CostRecord]) -> Result<MonthlyReport> {
        let primary = provider.fetch_primary()?;
        let secondary = provider.fetch_secondary()?;
        self.aggregate(&primary, &secondary, costs)
    }

    /// Aggregate weights by month, compute the primary share and join costs.
    pub fn aggregate(
        &self,
        primary: &[WeightRecord],
        secondary: &[WeightRecord],
        costs: &[CostRecord],
    ) -> Result<MonthlyReport> {
        let primary_by_month = sum_by_month(primary, WeightSource::Primary)?;
        let secondary_by_month = sum_by_month(secondary, WeightSource::Secondary)?;
        let cost_by_month = merge_costs(costs, self.policy)?;

        let months: BTreeSet<YearMonth> = primary_by_month
            .keys()
            .chain(secondary_by_month.keys())
            .copied()
            .collect();

        let empty = SourceTotals::default();
        let mut rows = Vec::with_capacity(months.len());
        for month in months {
            let a = primary_by_month.get(&month).unwrap_or(&empty);
            let b = secondary_by_month.get(&month).unwrap_or(&empty);
            let total_weight = a.weight + b.weight;
            if !total_weight.is_finite() {
                return Err(ReportError::validation(
                    "weight records",
                    None,
                    format!("total weight for {month} overflows"),
                ));
            }
            let box_count = a.references.union(&b.references).count();
            rows.push(MonthlyAggregate {
                month,
                total_weight,
                primary_weight: a.weight,
                secondary_weight: b.weight,
                primary_share: share(a.weight, total_weight),
                net_weight: a.net_weight + b.net_weight,
                box_count,
                cost: cost_by_month.get(&month).copied(),
            });
        }

        let mut warnings = Vec::new();
        let unmatched: Vec<YearMonth> = cost_by_month
            .keys()
            .filter(|m| !primary_by_month.contains_key(m) && !secondary_by_month.contains_key(m))
            .copied()
            .collect();
        if !unmatched.is_empty() {
            warn!(count = unmatched.len(), "cost months without weight data left out of the join");
            warnings.push(ReportWarning::UnmatchedCostMonths(unmatched));
        }
        if rows.is_empty() {
            warn!("aggregation produced no months");
            warnings.push(ReportWarning::EmptyResult);
        }

        debug!(months = rows.len(), "aggregated monthly weights");
        Ok(MonthlyReport { months: rows, warnings })
    }
}

/// `part / total`, defined as 0 when `total` is 0 or the ratio is not
/// finite. Clamped to `[0, 1]`.
pub fn share(part: f64, total: f64) -> f64 {
    let ratio = part / total;
    if total <= 0.0 || !ratio.is_finite() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

fn sum_by_month(records: &[WeightRecord], source: WeightSource) -> Result<BTreeMap<YearMonth, SourceTotals>> {
    let mut map: BTreeMap<YearMonth, SourceTotals> = BTreeMap::new();
    for (idx, rec) in records.iter().enumerate() {
        if !rec.weight.is_finite() || rec.weight < 0.0 {
            return Err(ReportError::validation(
                format!("{} records", source.label()),
                None,
                format!("record #{} ({}) has negative or non-finite weight {}", idx + 1, rec.reference, rec.weight),
            ));
        }
        let month = rec.month();
        let totals = map.entry(month).or_default();
        totals.add(rec);
        if !totals.weight.is_finite() {
            return Err(ReportError::validation(
                format!("{} records", source.label()),
                None,
                format!("{} weight for {month} overflows", source.label()),
            ));
        }
    }
    Ok(map)
}

/// Collapse cost records to one value per month according to `policy`.
pub fn merge_costs(costs: &[CostRecord], policy: CostMergePolicy) -> Result<BTreeMap<YearMonth, f64>> {
    let mut map: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for rec in costs {
        if !rec.cost.is_finite() || rec.cost < 0.0 {
            return Err(ReportError::validation(
                "cost records",
                None,
                format!("negative or non-finite cost {} for {}", rec.cost, rec.month),
            ));
        }
        match map.get_mut(&rec.month) {
            None => {
                map.insert(rec.month, rec.cost);
            }
            Some(existing) => match policy {
                CostMergePolicy::Reject => {
                    return Err(ReportError::validation(
                        "cost records",
                        None,
                        format!("duplicate cost entries for {}", rec.month),
                    ));
                }
                CostMergePolicy::Sum => {
                    *existing += rec.cost;
                    if !existing.is_finite() {
                        return Err(ReportError::validation(
                            "cost records",
                            None,
                            format!("summed cost for {} overflows", rec.month),
                        ));
                    }
                }
                CostMergePolicy::LastWins => *existing = rec.cost,
            },
        }
    }
    Ok(map)
}

/// Reshape monthly rows into one series per calendar month, ordered by year.
///
/// Calendar months with no values are omitted; so are years whose metric is
/// absent (e.g. a month with no cost).
pub fn yoy_series(months: &[MonthlyAggregate], metric: Metric) -> Vec<YoySeries> {
    let mut by_calendar: BTreeMap<u32, BTreeMap<i32, f64>> = BTreeMap::new();
    for agg in months {
        if let Some(value) = metric.value(agg) {
            by_calendar
                .entry(agg.month.month)
                .or_default()
                .insert(agg.month.year, value);
        }
    }
    by_calendar
        .into_iter()
        .map(|(calendar_month, years)| YoySeries {
            calendar_month,
            points: years
                .into_iter()
                .map(|(year, value)| YoyPoint { year, value })
                .collect(),
        })
        .collect()
}

/// Distinct boxes, weight and net weight per (month, transporter).
pub fn summarize_by_transporter(records: &[WeightRecord]) -> Vec<TransporterMonth> {
    let mut map: BTreeMap<(YearMonth, String), SourceTotals> = BTreeMap::new();
    for rec in records {
        map.entry((rec.month(), rec.transporter.clone()))
            .or_default()
            .add(rec);
    }
    map.into_iter()
        .map(|((month, transporter), t)| TransporterMonth {
            month,
            transporter,
            box_count: t.references.len(),
            total_weight: t.weight,
            total_net_weight: t.net_weight,
        })
        .collect()
}
