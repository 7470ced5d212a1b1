//! CSV loaders for the two weight sources and the monthly cost sheet.
//!
//! Every row either becomes a typed record or fails the whole load with a
//! validation error that names the file and line. Nothing is silently dropped
//! except fully blank rows.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::types::{CostRecord, RawWeightRow, WeightRecord, WeightSource, YearMonth, DBU_TRANSPORTER};
use crate::util::{parse_date_safe, parse_day_month, parse_f64_safe, parse_timestamp_safe, year_from_name};

const DATE_HEADERS: &[&str] = &["date", "日期", "day"];
const AMOUNT_HEADERS: &[&str] = &["tot. h.t", "total_price", "cost", "amount"];

/// Lower-case and trim every header so column lookups are case-insensitive.
pub fn normalize_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect()
}

/// Convert one deserialized row into a record, validating weight and timestamp.
pub fn weight_record_from_raw(
    row: RawWeightRow,
    source: WeightSource,
    origin: &str,
    line: Option<u64>,
) -> Result<WeightRecord> {
    let invalid = |msg: String| ReportError::validation(origin, line, msg);

    let stock_in_at = parse_timestamp_safe(row.stock_in_at.as_deref()).ok_or_else(|| {
        invalid(format!(
            "unparseable stock-in timestamp '{}'",
            row.stock_in_at.as_deref().unwrap_or("")
        ))
    })?;
    let weight = parse_f64_safe(row.weight.as_deref()).ok_or_else(|| {
        invalid(format!("unparseable weight '{}'", row.weight.as_deref().unwrap_or("")))
    })?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(invalid(format!("negative or non-finite weight {weight}")));
    }
    let net_weight = parse_f64_safe(row.netweight.as_deref());

    let reference = row.reference.unwrap_or_default().trim().to_string();
    let transporter = match source {
        WeightSource::Primary => DBU_TRANSPORTER.to_string(),
        WeightSource::Secondary => row
            .transporter
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
    };

    Ok(WeightRecord {
        source,
        reference,
        transporter,
        stock_in_at,
        weight,
        net_weight,
    })
}

/// Turn raw string records into weight records.
///
/// Shared by the CSV path and the live query path so both validate identically.
pub fn weight_records_from_rows<I>(
    headers: &StringRecord,
    rows: I,
    source: WeightSource,
    origin: &str,
) -> Result<Vec<WeightRecord>>
where
    I: IntoIterator<Item = (Option<u64>, StringRecord)>,
{
    let headers = normalize_headers(headers);
    let mut out = Vec::new();
    for (line, record) in rows {
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let raw: RawWeightRow = record
            .deserialize(Some(&headers))
            .map_err(|e| ReportError::validation(origin, line, e.to_string()))?;
        out.push(weight_record_from_raw(raw, source, origin, line)?);
    }
    Ok(out)
}

pub fn load_weight_reader<R: Read>(reader: R, source: WeightSource, origin: &str) -> Result<Vec<WeightRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line());
            ReportError::validation(origin, line, e.to_string())
        })?;
        rows.push((record.position().map(|p| p.line()), record));
    }
    let records = weight_records_from_rows(&headers, rows, source, origin)?;
    debug!(origin, source = source.label(), rows = records.len(), "parsed weight rows");
    Ok(records)
}

/// Load a weight CSV. A missing or unreadable file is `SourceUnavailable`.
pub fn load_weight_file(path: &Path, source: WeightSource) -> Result<Vec<WeightRecord>> {
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|e| ReportError::unavailable(source.label(), format!("{origin}: {e}")))?;
    let records = load_weight_reader(file, source, &origin)?;
    info!("Loaded {} {} weight rows from {}", records.len(), source.label(), origin);
    Ok(records)
}

fn find_column(headers: &StringRecord, candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|h| candidates.contains(&h))
}

#[derive(Debug, Clone, Copy)]
enum SheetLayout {
    Monthly { month: usize, cost: usize },
    Daily { date: usize, amount: usize },
}

fn detect_layout(headers: &StringRecord, name: &str) -> Result<SheetLayout> {
    if let (Some(month), Some(cost)) = (find_column(headers, &["month"]), find_column(headers, &["cost"])) {
        return Ok(SheetLayout::Monthly { month, cost });
    }
    if let (Some(date), Some(amount)) = (
        find_column(headers, DATE_HEADERS),
        find_column(headers, AMOUNT_HEADERS),
    ) {
        return Ok(SheetLayout::Daily { date, amount });
    }
    Err(ReportError::validation(
        name,
        None,
        "no 'month'/'cost' or 'date'/'Tot. H.T' columns found",
    ))
}

/// Parse a cost sheet from any byte source.
///
/// Monthly sheets yield one record per row, so repeated months are kept and
/// left for the aggregator's merge policy. Daily sheets are summed into one
/// record per month. Day cells written as `DD/MM` take the year from `name`.
pub fn load_cost_reader<R: Read>(reader: R, name: &str) -> Result<Vec<CostRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = normalize_headers(rdr.headers()?);
    let layout = detect_layout(&headers, name)?;
    let sheet_year = year_from_name(name);

    let mut monthly: Vec<CostRecord> = Vec::new();
    let mut daily: BTreeMap<YearMonth, f64> = BTreeMap::new();

    for result in rdr.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line());
            ReportError::validation(name, line, e.to_string())
        })?;
        let line = record.position().map(|p| p.line());
        let invalid = |msg: String| ReportError::validation(name, line, msg);

        let (key_idx, amount_idx) = match layout {
            SheetLayout::Monthly { month, cost } => (month, cost),
            SheetLayout::Daily { date, amount } => (date, amount),
        };
        let key = record.get(key_idx).unwrap_or("").trim();
        let amount_cell = record.get(amount_idx).unwrap_or("").trim();
        if key.is_empty() && amount_cell.is_empty() {
            continue;
        }

        let amount = parse_f64_safe(Some(amount_cell))
            .ok_or_else(|| invalid(format!("unparseable cost '{amount_cell}'")))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(invalid(format!("negative or non-finite cost {amount}")));
        }

        match layout {
            SheetLayout::Monthly { .. } => {
                let month: YearMonth = key.parse().map_err(invalid)?;
                monthly.push(CostRecord { month, cost: amount });
            }
            SheetLayout::Daily { .. } => {
                let date = parse_date_safe(Some(key))
                    .or_else(|| sheet_year.and_then(|y| parse_day_month(key, y)))
                    .ok_or_else(|| invalid(format!("unparseable date '{key}'")))?;
                let month = YearMonth::from_date(&date);
                let total = daily.entry(month).or_insert(0.0);
                *total += amount;
                if !total.is_finite() {
                    return Err(invalid(format!("cost total for {month} overflows")));
                }
            }
        }
    }

    let records: Vec<CostRecord> = match layout {
        SheetLayout::Monthly { .. } => monthly,
        SheetLayout::Daily { .. } => daily
            .into_iter()
            .map(|(month, cost)| CostRecord { month, cost })
            .collect(),
    };
    debug!(sheet = name, months = records.len(), "parsed cost sheet");
    Ok(records)
}

pub fn load_cost_file(path: &Path) -> Result<Vec<CostRecord>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = File::open(path).map_err(|e| ReportError::unavailable("cost sheet", format!("{}: {e}", path.display())))?;
    load_cost_reader(file, &name)
}

/// Load several sheets (e.g. one per year) into a single collection.
pub fn load_cost_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<CostRecord>> {
    let mut all = Vec::new();
    for p in paths {
        all.extend(load_cost_file(p.as_ref())?);
    }
    if all.is_empty() {
        return Err(ReportError::validation("cost sheets", None, "no cost rows found"));
    }
    info!("Loaded {} monthly cost records from {} sheet(s)", all.len(), paths.len());
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ym(y: i32, m: u32) -> YearMonth {
        YearMonth::new(y, m).unwrap()
    }

    #[test]
    fn test_load_raw_warehouse_layout() {
        let csv = "BOX_ID,PRODUIT,BOX_WEIGHT,NET_WEIGHT,DBU_STOCK_IN_AT,DBU_STOCK_IN_PDA_VERSION\n\
                   B1,FR-DBU-S,12.5,11.0,2024-01-03 10:00:00,3.2\n\
                   B2,FR-DBU-R,7.5,,2024-02-01,3.2\n";
        let recs = load_weight_reader(csv.as_bytes(), WeightSource::Primary, "dbu.csv").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].reference, "B1");
        assert_eq!(recs[0].transporter, DBU_TRANSPORTER);
        assert_eq!(recs[0].weight, 12.5);
        assert_eq!(recs[0].net_weight, Some(11.0));
        assert_eq!(recs[1].net_weight, None);
        assert_eq!(recs[1].month(), ym(2024, 2));
    }

    #[test]
    fn test_load_processed_layout_keeps_transporter() {
        let csv = "reference,transporter,weight,netweight,stock_in_at,stock_in_pda_version\n\
                   R1,COLISSIMO,3,2.5,2024-01-05T09:00:00,1\n\
                   R2,,4,3,2024-01-06,1\n";
        let recs = load_weight_reader(csv.as_bytes(), WeightSource::Secondary, "roissy.csv").unwrap();
        assert_eq!(recs[0].transporter, "COLISSIMO");
        assert_eq!(recs[1].transporter, "Unknown");
    }

    #[test]
    fn test_negative_weight_names_line() {
        let csv = "reference,transporter,weight,stock_in_at\nR1,X,3,2024-01-05\nR2,X,-1,2024-01-06\n";
        let err = load_weight_reader(csv.as_bytes(), WeightSource::Secondary, "roissy.csv").unwrap_err();
        match err {
            ReportError::Validation { origin, line, message } => {
                assert_eq!(origin, "roissy.csv");
                assert_eq!(line, Some(3));
                assert!(message.contains("negative"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_timestamp_is_validation_error() {
        let csv = "reference,transporter,weight,stock_in_at\nR1,X,3,not-a-date\n";
        let err = load_weight_reader(csv.as_bytes(), WeightSource::Secondary, "roissy.csv").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let csv = "reference,transporter,weight,stock_in_at\nR1,X,3,2024-01-05\n,,,\n";
        let recs = load_weight_reader(csv.as_bytes(), WeightSource::Secondary, "roissy.csv").unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn test_missing_weight_file_is_unavailable() {
        let err = load_weight_file(Path::new("/definitely/not/here.csv"), WeightSource::Primary).unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_monthly_cost_sheet_keeps_duplicates() {
        let csv = "Month,Cost\n2024-01,500\n2024-02,\"1,200.50\"\n2024-01,10\n";
        let recs = load_cost_reader(csv.as_bytes(), "costs.csv").unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[1], CostRecord { month: ym(2024, 2), cost: 1200.5 });
        assert_eq!(recs[2].month, ym(2024, 1));
    }

    #[test]
    fn test_daily_cost_sheet_sums_per_month() {
        let csv = "日期,Tot. H.T\n03/01,100\n17/01,50.5\n02/02,20\n,\n";
        let recs = load_cost_reader(csv.as_bytes(), "raw2024.csv").unwrap();
        assert_eq!(
            recs,
            vec![
                CostRecord { month: ym(2024, 1), cost: 150.5 },
                CostRecord { month: ym(2024, 2), cost: 20.0 },
            ]
        );
    }

    #[test]
    fn test_daily_cost_sheet_without_year_fails() {
        let csv = "date,Tot. H.T\n03/01,100\n";
        let err = load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_cost_sheet_unknown_layout() {
        let csv = "foo,bar\n1,2\n";
        let err = load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err();
        assert!(err.to_string().contains("Tot. H.T"));
    }

    #[test]
    fn test_negative_cost_rejected() {
        let csv = "month,cost\n2024-01,-5\n";
        assert!(load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err().is_validation());
    }

    #[test]
    fn test_decimal_comma_cost_rejected_with_line() {
        let csv = "month,cost\n2024-01,\"1,250.00\"\n2024-02,\"12,50\"\n";
        match load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err() {
            ReportError::Validation { line, message, .. } => {
                assert_eq!(line, Some(3));
                assert!(message.contains("12,50"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stray_comma_cost_rejected() {
        let csv = "month,cost\n2024-02,\"1,2,3\"\n";
        assert!(load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err().is_validation());
    }

    #[test]
    fn test_decimal_comma_weight_rejected() {
        let csv = "reference,transporter,weight,stock_in_at\nR1,X,\"3,5\",2024-01-05\n";
        let err = load_weight_reader(csv.as_bytes(), WeightSource::Secondary, "roissy.csv").unwrap_err();
        assert!(err.to_string().contains("unparseable weight '3,5'"));
    }

    #[test]
    fn test_daily_cost_overflow_rejected() {
        let big = format!("{}", f64::MAX);
        let csv = format!("date,Tot. H.T\n2024-01-03,{big}\n2024-01-04,{big}\n");
        let err = load_cost_reader(csv.as_bytes(), "costs.csv").unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_load_cost_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("raw2024.csv");
        let p2 = dir.path().join("raw2025.csv");
        writeln!(File::create(&p1).unwrap(), "date,Tot. H.T\n10/01,40\n11/01,60").unwrap();
        writeln!(File::create(&p2).unwrap(), "date,Tot. H.T\n10/01,70").unwrap();
        let recs = load_cost_files(&[p1, p2]).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], CostRecord { month: ym(2024, 1), cost: 100.0 });
        assert_eq!(recs[1], CostRecord { month: ym(2025, 1), cost: 70.0 });
    }

    #[test]
    fn test_load_cost_files_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("raw2024.csv");
        writeln!(File::create(&p).unwrap(), "month,cost").unwrap();
        assert!(load_cost_files(&[p]).unwrap_err().is_validation());
    }
}
