use crate::aggregation::yoy_series;
use crate::types::{
    ComboChartRow, Metric, MonthPanel, MonthlyDetailRow, MonthlyReport, PanelYear, SummaryStats,
    TransporterMonth, TransporterRow, YearMonth,
};
use crate::util::{average, format_number, format_pct};

/// Rows for the stacked-bar + cost-line chart, grouped by calendar month so
/// the same month of each year sits side by side (`01-2024`, `01-2025`, ...).
pub fn combo_chart_rows(report: &MonthlyReport) -> Vec<ComboChartRow> {
    let mut months: Vec<_> = report.months.iter().collect();
    months.sort_by_key(|m| (m.month.month, m.month.year));
    months
        .into_iter()
        .map(|m| ComboChartRow {
            label: format!("{:02}-{}", m.month.month, m.month.year),
            dbu_weight: m.primary_weight,
            other_weight: m.other_weight(),
            total_weight: m.total_weight,
            cost: m.cost.map(|c| format!("{:.2}", c)).unwrap_or_default(),
            ratio_label: format_pct(m.share_pct()),
        })
        .collect()
}

/// One small-multiple panel per calendar month that has data.
pub fn month_panels(report: &MonthlyReport) -> Vec<MonthPanel> {
    let weight_series = yoy_series(&report.months, Metric::TotalWeight);
    let cost_series = yoy_series(&report.months, Metric::Cost);

    weight_series
        .iter()
        .map(|series| {
            let years = series
                .points
                .iter()
                .filter_map(|p| {
                    let month = YearMonth::new(p.year, series.calendar_month)?;
                    let agg = report.get(month)?;
                    Some(PanelYear {
                        year: p.year,
                        dbu_weight: agg.primary_weight,
                        other_weight: agg.other_weight(),
                        total_weight: agg.total_weight,
                        cost: agg.cost,
                        ratio_label: format_pct(agg.share_pct()),
                    })
                })
                .collect();
            let cost_yoy = cost_series
                .iter()
                .find(|c| c.calendar_month == series.calendar_month)
                .map(|c| c.deltas())
                .unwrap_or_default();
            MonthPanel {
                month: series.calendar_month,
                years,
                weight_yoy: series.deltas(),
                cost_yoy,
            }
        })
        .collect()
}

pub fn detail_rows(report: &MonthlyReport) -> Vec<MonthlyDetailRow> {
    report
        .months
        .iter()
        .map(|m| MonthlyDetailRow {
            year: m.month.year,
            month: m.month.month,
            total_weight: format_number(m.total_weight, 2),
            dbu_weight: format_number(m.primary_weight, 2),
            dbu_ratio: format_number(m.share_pct(), 2),
            total_cost: m.cost.map(|c| format_number(c, 2)).unwrap_or_else(|| "n/a".to_string()),
        })
        .collect()
}

pub fn transporter_rows(summary: &[TransporterMonth]) -> Vec<TransporterRow> {
    summary
        .iter()
        .map(|t| TransporterRow {
            month: t.month.to_string(),
            transporter: t.transporter.clone(),
            boxes: t.box_count,
            total_weight: format_number(t.total_weight, 2),
            total_net_weight: format_number(t.total_net_weight, 2),
        })
        .collect()
}

pub fn generate_summary(report: &MonthlyReport) -> SummaryStats {
    let ratios: Vec<f64> = report
        .months
        .iter()
        .filter(|m| m.total_weight > 0.0)
        .map(|m| m.share_pct())
        .collect();
    SummaryStats {
        total_months: report.months.len(),
        total_dbu_weight: report.months.iter().map(|m| m.primary_weight).sum(),
        total_all_weight: report.months.iter().map(|m| m.total_weight).sum(),
        avg_dbu_ratio: average(&ratios),
        total_cost: report.months.iter().filter_map(|m| m.cost).sum(),
        months_missing_cost: report.months.iter().filter(|m| m.cost.is_none()).count(),
    }
}
