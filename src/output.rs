use std::path::Path;

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

use crate::error::{ReportError, Result};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

/// Markdown rendering of the first `max_rows` rows, or `(no rows)`.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransporterRow;

    fn row(t: &str) -> TransporterRow {
        TransporterRow {
            month: "2024-01".to_string(),
            transporter: t.to_string(),
            boxes: 2,
            total_weight: "5.00".to_string(),
            total_net_weight: "4.00".to_string(),
        }
    }

    #[test]
    fn test_render_table_limits_rows() {
        let out = render_table(&[row("UPS"), row("DHL")], 1);
        assert!(out.contains("| Transporter"));
        assert!(out.contains("UPS"));
        assert!(!out.contains("DHL"));
        assert_eq!(render_table::<TransporterRow>(&[], 5), "(no rows)");
    }

    #[test]
    fn test_write_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("rows.csv");
        write_csv(&csv_path, &[row("UPS")]).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text, "Month,Transporter,Boxes,TotalWeight,TotalNetWeight\n2024-01,UPS,2,5.00,4.00\n");

        let json_path = dir.path().join("rows.json");
        write_json(&json_path, &vec![1, 2]).unwrap();
        assert_eq!(std::fs::read_to_string(&json_path).unwrap(), "[\n  1,\n  2\n]");
    }

    #[test]
    fn test_write_csv_bad_dir() {
        let err = write_csv(Path::new("/no/such/dir/rows.csv"), &[row("UPS")]).unwrap_err();
        assert!(matches!(err, ReportError::Csv(_)));
    }
}
