use chrono::NaiveDate;
use waste_report::loader::load_cost_files;
use waste_report::reports::{combo_chart_rows, month_panels};
use waste_report::{
    Aggregator, CostMergePolicy, CostRecord, MonthlyReport, ReportError, ReportWarning,
    StaticFileSource, WeightProvider, WeightRecord, WeightSource, YearMonth,
};

fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

fn weight(source: WeightSource, reference: &str, y: i32, m: u32, d: u32, kg: f64) -> WeightRecord {
    WeightRecord {
        source,
        reference: reference.to_string(),
        transporter: match source {
            WeightSource::Primary => "DBU-PMC".to_string(),
            WeightSource::Secondary => "UPS".to_string(),
        },
        stock_in_at: NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(9, 0, 0).unwrap(),
        weight: kg,
        net_weight: None,
    }
}

fn cost(y: i32, m: u32, c: f64) -> CostRecord {
    CostRecord { month: ym(y, m), cost: c }
}

/// A: {2024-01: 100}, B: {2024-01: 50, 2024-02: 20}, cost: {2024-01: 500}.
fn scenario() -> MonthlyReport {
    let a = vec![
        weight(WeightSource::Primary, "A1", 2024, 1, 3, 60.0),
        weight(WeightSource::Primary, "A2", 2024, 1, 28, 40.0),
    ];
    let b = vec![
        weight(WeightSource::Secondary, "B1", 2024, 1, 10, 50.0),
        weight(WeightSource::Secondary, "B2", 2024, 2, 1, 20.0),
    ];
    Aggregator::default().aggregate(&a, &b, &[cost(2024, 1, 500.0)]).unwrap()
}

#[test]
fn scenario_two_months_with_partial_cost() {
    let report = scenario();
    assert_eq!(report.months.len(), 2);

    let jan = &report.months[0];
    assert_eq!(jan.month, ym(2024, 1));
    assert_eq!(jan.total_weight, 150.0);
    assert!((jan.primary_share - 0.667).abs() < 0.001);
    assert_eq!(jan.cost, Some(500.0));

    let feb = &report.months[1];
    assert_eq!(feb.month, ym(2024, 2));
    assert_eq!(feb.total_weight, 20.0);
    assert_eq!(feb.primary_weight, 0.0);
    assert_eq!(feb.primary_share, 0.0);
    assert_eq!(feb.cost, None);
    assert!(report.warnings.is_empty());
}

#[test]
fn totals_equal_sum_of_sources_and_share_in_bounds() {
    let a: Vec<_> = (1..=12)
        .map(|m| weight(WeightSource::Primary, &format!("A{m}"), 2024, m, 1, m as f64 * 3.5))
        .collect();
    let b: Vec<_> = (3..=12)
        .step_by(2)
        .map(|m| weight(WeightSource::Secondary, &format!("B{m}"), 2024, m, 2, 100.0 / m as f64))
        .collect();
    let report = Aggregator::default().aggregate(&a, &b, &[]).unwrap();
    assert_eq!(report.months.len(), 12);
    for m in &report.months {
        assert_eq!(m.total_weight, m.primary_weight + m.secondary_weight);
        assert!((0.0..=1.0).contains(&m.primary_share));
        assert_eq!(m.cost, None);
    }
}

#[test]
fn aggregation_is_deterministic() {
    let first = serde_json::to_string(&scenario()).unwrap();
    let second = serde_json::to_string(&scenario()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn empty_inputs_give_empty_report() {
    let report = Aggregator::default().aggregate(&[], &[], &[]).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.warnings, vec![ReportWarning::EmptyResult]);
}

#[test]
fn duplicate_cost_months_need_a_policy() {
    let a = vec![weight(WeightSource::Primary, "A1", 2024, 1, 1, 10.0)];
    let costs = vec![cost(2024, 1, 300.0), cost(2024, 1, 200.0)];

    let err = Aggregator::default().aggregate(&a, &[], &costs).unwrap_err();
    assert!(matches!(err, ReportError::Validation { .. }));
    assert!(err.to_string().contains("2024-01"));

    let summed = Aggregator::new(CostMergePolicy::Sum).aggregate(&a, &[], &costs).unwrap();
    assert_eq!(summed.months[0].cost, Some(500.0));
    let last = Aggregator::new(CostMergePolicy::LastWins).aggregate(&a, &[], &costs).unwrap();
    assert_eq!(last.months[0].cost, Some(200.0));
}

#[test]
fn demo_data_end_to_end() {
    let data = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
    let provider = StaticFileSource::new(data.join("dbu.csv"), data.join("roissy.csv"));
    let costs = load_cost_files(&[data.join("costs_2024.csv"), data.join("costs_2025.csv")]).unwrap();
    assert_eq!(costs.len(), 18);

    let report = Aggregator::default().run(&provider, &costs).unwrap();
    assert_eq!(report.months.len(), 19);
    assert_eq!(report.get(ym(2025, 7)).unwrap().cost, None);
    assert_eq!(report.get(ym(2025, 7)).unwrap().primary_weight, 0.0);
    assert!(report.get(ym(2025, 6)).unwrap().cost.is_some());

    let primary_total: f64 = provider.fetch_primary().unwrap().iter().map(|r| r.weight).sum();
    let reported: f64 = report.months.iter().map(|m| m.primary_weight).sum();
    assert!((primary_total - reported).abs() < 1e-6);

    assert_eq!(combo_chart_rows(&report).len(), 19);
    let panels = month_panels(&report);
    assert_eq!(panels.len(), 12);
    assert_eq!(panels[0].years.len(), 2);
    assert_eq!(panels[11].years.len(), 1);
}
