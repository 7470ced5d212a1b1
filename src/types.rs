use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Transporter label forced onto every primary-source record.
pub const DBU_TRANSPORTER: &str = "DBU-PMC";

/// Row shape shared by the weight CSVs and the live query results.
///
/// Headers are lower-cased before deserializing, so the aliases cover both the
/// raw warehouse export and the processed column names.
#[derive(Debug, Deserialize)]
pub struct RawWeightRow {
    #[serde(alias = "box_id")]
    pub reference: Option<String>,
    #[serde(alias = "produit")]
    pub transporter: Option<String>,
    #[serde(alias = "box_weight")]
    pub weight: Option<String>,
    #[serde(alias = "net_weight")]
    pub netweight: Option<String>,
    #[serde(alias = "dbu_stock_in_at")]
    pub stock_in_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeightSource {
    /// DBU boxes bound to a PMC, fetched from the warehouse.
    Primary,
    /// All other inbound boxes, fetched from the operations database.
    Secondary,
}

impl WeightSource {
    pub fn label(&self) -> &'static str {
        match self {
            WeightSource::Primary => "dbu",
            WeightSource::Secondary => "inrooissy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub source: WeightSource,
    pub reference: String,
    pub transporter: String,
    pub stock_in_at: NaiveDateTime,
    pub weight: f64,
    pub net_weight: Option<f64>,
}

impl WeightRecord {
    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(&self.stock_in_at)
    }
}

/// A calendar month. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }

    pub fn from_date<D: Datelike>(d: &D) -> Self {
        YearMonth {
            year: d.year(),
            month: d.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `YYYY-MM` or `YYYY/MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once(['-', '/'])
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("bad year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub month: YearMonth,
    pub cost: f64,
}

/// How duplicate cost months are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, ValueEnum)]
pub enum CostMergePolicy {
    /// Duplicate months are a validation error.
    #[default]
    Reject,
    Sum,
    LastWins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub month: YearMonth,
    pub total_weight: f64,
    pub primary_weight: f64,
    pub secondary_weight: f64,
    /// `primary_weight / total_weight`, or 0 when the month has no weight.
    pub primary_share: f64,
    pub net_weight: f64,
    pub box_count: usize,
    /// `None` when no cost was supplied for the month.
    pub cost: Option<f64>,
}

impl MonthlyAggregate {
    pub fn other_weight(&self) -> f64 {
        self.total_weight - self.primary_weight
    }

    pub fn share_pct(&self) -> f64 {
        self.primary_share * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportWarning {
    /// Aggregation succeeded but produced no months.
    EmptyResult,
    /// Cost months that have no weight data and were left out of the join.
    UnmatchedCostMonths(Vec<YearMonth>),
}

impl fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportWarning::EmptyResult => write!(f, "no months to report"),
            ReportWarning::UnmatchedCostMonths(months) => {
                let list: Vec<String> = months.iter().map(|m| m.to_string()).collect();
                write!(f, "cost supplied for months without weight data: {}", list.join(", "))
            }
        }
    }
}

/// Output of one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub months: Vec<MonthlyAggregate>,
    pub warnings: Vec<ReportWarning>,
}

impl MonthlyReport {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn get(&self, month: YearMonth) -> Option<&MonthlyAggregate> {
        self.months
            .binary_search_by(|m| m.month.cmp(&month))
            .ok()
            .map(|idx| &self.months[idx])
    }
}

/// The per-month value a year-over-year series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    TotalWeight,
    PrimaryWeight,
    SecondaryWeight,
    Share,
    Cost,
}

impl Metric {
    pub fn value(&self, agg: &MonthlyAggregate) -> Option<f64> {
        match self {
            Metric::TotalWeight => Some(agg.total_weight),
            Metric::PrimaryWeight => Some(agg.primary_weight),
            Metric::SecondaryWeight => Some(agg.secondary_weight),
            Metric::Share => Some(agg.primary_share),
            Metric::Cost => agg.cost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YoyPoint {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YoyDelta {
    pub year: i32,
    pub previous_year: i32,
    pub change: f64,
    /// Percent change; `None` when the previous value is zero.
    pub change_pct: Option<f64>,
}

/// One calendar month's metric across years, ordered by year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoySeries {
    pub calendar_month: u32,
    pub points: Vec<YoyPoint>,
}

impl YoySeries {
    pub fn deltas(&self) -> Vec<YoyDelta> {
        self.points
            .windows(2)
            .map(|w| {
                let (prev, cur) = (w[0], w[1]);
                let change = cur.value - prev.value;
                let change_pct = if prev.value.abs() < f64::EPSILON {
                    None
                } else {
                    Some(change / prev.value.abs() * 100.0)
                };
                YoyDelta {
                    year: cur.year,
                    previous_year: prev.year,
                    change,
                    change_pct,
                }
            })
            .collect()
    }
}

/// Weight, box and net-weight totals for one transporter in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransporterMonth {
    pub month: YearMonth,
    pub transporter: String,
    pub box_count: usize,
    pub total_weight: f64,
    pub total_net_weight: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyDetailRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: u32,
    #[serde(rename = "TotalWeight")]
    #[tabled(rename = "TotalWeight")]
    pub total_weight: String,
    #[serde(rename = "DbuWeight")]
    #[tabled(rename = "DbuWeight")]
    pub dbu_weight: String,
    #[serde(rename = "DbuRatio")]
    #[tabled(rename = "DbuRatio")]
    pub dbu_ratio: String,
    #[serde(rename = "TotalCost")]
    #[tabled(rename = "TotalCost")]
    pub total_cost: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ComboChartRow {
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "DbuWeight")]
    #[tabled(rename = "DbuWeight")]
    pub dbu_weight: f64,
    #[serde(rename = "OtherWeight")]
    #[tabled(rename = "OtherWeight")]
    pub other_weight: f64,
    #[serde(rename = "TotalWeight")]
    #[tabled(rename = "TotalWeight")]
    pub total_weight: f64,
    #[serde(rename = "Cost")]
    #[tabled(rename = "Cost")]
    pub cost: String,
    #[serde(rename = "RatioLabel")]
    #[tabled(rename = "RatioLabel")]
    pub ratio_label: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct TransporterRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Transporter")]
    #[tabled(rename = "Transporter")]
    pub transporter: String,
    #[serde(rename = "Boxes")]
    #[tabled(rename = "Boxes")]
    pub boxes: usize,
    #[serde(rename = "TotalWeight")]
    #[tabled(rename = "TotalWeight")]
    pub total_weight: String,
    #[serde(rename = "TotalNetWeight")]
    #[tabled(rename = "TotalNetWeight")]
    pub total_net_weight: String,
}

/// One year's bar group inside a calendar-month panel.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PanelYear {
    pub year: i32,
    pub dbu_weight: f64,
    pub other_weight: f64,
    pub total_weight: f64,
    pub cost: Option<f64>,
    pub ratio_label: String,
}

/// Small-multiple panel: one calendar month, every year with data.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthPanel {
    pub month: u32,
    pub years: Vec<PanelYear>,
    pub weight_yoy: Vec<YoyDelta>,
    pub cost_yoy: Vec<YoyDelta>,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_months: usize,
    pub total_dbu_weight: f64,
    pub total_all_weight: f64,
    /// Mean DBU ratio in percent over months that have weight.
    pub avg_dbu_ratio: f64,
    pub total_cost: f64,
    pub months_missing_cost: usize,
}
