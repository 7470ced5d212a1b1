// Entry point and interactive menu.
//
// - Option [1] loads one or more cost sheets.
// - Option [2] fetches weights (demo CSVs or live sources), aggregates them
//   with the loaded costs, writes the chart tables and prints previews.
// - After generating reports, the user can go back to the menu or exit.
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use once_cell::sync::Lazy;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use waste_report::aggregation::{summarize_by_transporter, Aggregator};
use waste_report::cache::AggregationCache;
use waste_report::config::Settings;
use waste_report::error::Result;
use waste_report::sources::create_provider;
use waste_report::types::{CostRecord, ReportWarning};
use waste_report::util::{format_int, format_number, format_pct};
use waste_report::{loader, output, reports};

// Loaded costs and memoized reports survive across menu rounds so repeated
// generation with unchanged inputs skips the aggregation.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        costs: None,
        cache: AggregationCache::new(),
    })
});

struct AppState {
    costs: Option<Vec<CostRecord>>,
    cache: AggregationCache,
}

impl AppState {
    /// Replace the loaded costs. Reports memoized for earlier cost sets are
    /// dropped so the cache only holds entries for the current sheets.
    fn set_costs(&mut self, costs: Vec<CostRecord>) {
        if !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "evicting cached reports for previous cost data");
        }
        self.cache.clear();
        self.costs = Some(costs);
    }
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn load_costs(paths: &[PathBuf]) {
    match loader::load_cost_files(paths) {
        Ok(costs) => {
            println!(
                "Cost data loaded: {} monthly records from {} sheet(s).",
                format_int(costs.len()),
                paths.len()
            );
            for c in &costs {
                println!("  {}  €{}", c.month, format_number(c.cost, 2));
            }
            println!();
            let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
            state.set_costs(costs);
        }
        Err(e) => {
            error!("cost sheet load failed: {e}");
            eprintln!("Error while parsing cost data: {}\n", e);
        }
    }
}

/// Handle option [1]: ask for cost sheet paths and load them.
fn handle_load(settings: &Settings) {
    let default_hint = if settings.cost_files.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = settings.cost_files.iter().map(|p| p.display().to_string()).collect();
        format!(" [{}]", names.join(", "))
    };
    let answer = prompt(&format!("Cost sheet path(s), comma separated{default_hint}: "));
    let paths: Vec<PathBuf> = if answer.is_empty() {
        settings.cost_files.clone()
    } else {
        answer
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    };
    if paths.is_empty() {
        println!("No cost sheet given.\n");
        return;
    }
    load_costs(&paths);
}

/// Handle option [2]: aggregate and write every chart table.
fn handle_generate_reports(settings: &Settings) -> Result<()> {
    let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
    let AppState { costs, cache } = &mut *state;
    let Some(costs) = costs.as_ref() else {
        println!("Error: No cost data loaded. Please load a cost sheet first (option 1).\n");
        return Ok(());
    };

    println!("Loading weight data ...");
    let provider = create_provider(settings)?;
    let primary = provider.fetch_primary()?;
    let secondary = provider.fetch_secondary()?;
    println!(
        "Weight data loaded: {} DBU rows, {} other rows.\n",
        format_int(primary.len()),
        format_int(secondary.len())
    );

    let aggregator = Aggregator::new(settings.cost_policy);
    let report = cache.get_or_compute(&aggregator, &primary, &secondary, costs)?.clone();
    info!(hits = cache.hits(), misses = cache.misses(), "aggregation cache");

    for w in &report.warnings {
        if *w != ReportWarning::EmptyResult {
            println!("Warning: {}", w);
        }
    }
    if report.is_empty() {
        println!("No months to report: the weight sources returned no rows.\n");
        return Ok(());
    }

    std::fs::create_dir_all(&settings.out_dir)?;
    let out = |name: &str| settings.out_dir.join(name);

    let summary = reports::generate_summary(&report);
    println!("Data Summary");
    println!("  Total Months:     {}", summary.total_months);
    println!("  Total DBU Weight: {} kg", format_number(summary.total_dbu_weight, 0));
    println!("  Total All Weight: {} kg", format_number(summary.total_all_weight, 0));
    println!("  Avg DBU Ratio:    {}", format_pct(summary.avg_dbu_ratio));
    println!("  Total Cost:       €{}", format_number(summary.total_cost, 0));
    if summary.months_missing_cost > 0 {
        println!("  Months w/o cost:  {}", summary.months_missing_cost);
    }
    println!();
    output::write_json(&out("summary.json"), &summary)?;

    let detail = reports::detail_rows(&report);
    output::write_csv(&out("monthly_detail.csv"), &detail)?;
    println!("Total Weight & Waste Cost (by month)\n");
    output::preview_table_rows(&detail, 24);

    let combo = reports::combo_chart_rows(&report);
    output::write_csv(&out("chart_combo.csv"), &combo)?;
    println!("(Combo chart input exported to {})\n", out("chart_combo.csv").display());

    let panels = reports::month_panels(&report);
    output::write_json(&out("month_panels.json"), &panels)?;
    println!(
        "Monthly Analysis: {} calendar-month panels exported to {}\n",
        panels.len(),
        out("month_panels.json").display()
    );

    let mut all_records = primary;
    all_records.extend(secondary);
    let transporters = reports::transporter_rows(&summarize_by_transporter(&all_records));
    output::write_csv(&out("transporter_summary.csv"), &transporters)?;
    println!("Weight by Transporter\n");
    output::preview_table_rows(&transporters, 6);
    println!(
        "(Full table exported to {})\n",
        out("transporter_summary.csv").display()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let settings = Settings::parse();
    info!(
        live = settings.live,
        data_dir = %settings.data_dir.display(),
        policy = ?settings.cost_policy,
        "starting waste report"
    );
    if settings.live {
        println!("Live mode: loading weights from the warehouse and operations database.\n");
    } else {
        println!("Demo mode: using CSV samples from {}.\n", settings.data_dir.display());
    }

    if !settings.cost_files.is_empty() {
        load_costs(&settings.cost_files);
    }

    loop {
        println!("Waste Cost Report");
        println!("[1] Load cost sheet");
        println!("[2] Generate Reports\n");
        match prompt("Enter choice: ").as_str() {
            "1" => handle_load(&settings),
            "2" => {
                println!();
                if let Err(e) = handle_generate_reports(&settings) {
                    error!("report generation failed: {e}");
                    eprintln!("Error while loading or processing weight data: {}", e);
                    if settings.live {
                        eprintln!("Please check your database connections and credentials.");
                    }
                    println!();
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waste_report::types::YearMonth;

    #[test]
    fn test_set_costs_evicts_cached_reports() {
        let agg = Aggregator::default();
        let costs = vec![CostRecord { month: YearMonth::new(2024, 1).unwrap(), cost: 5.0 }];
        let mut state = AppState { costs: None, cache: AggregationCache::new() };
        state.cache.get_or_compute(&agg, &[], &[], &costs).unwrap();
        assert_eq!(state.cache.len(), 1);

        state.set_costs(costs.clone());
        assert!(state.cache.is_empty());
        assert_eq!(state.costs.as_deref(), Some(costs.as_slice()));
    }
}
