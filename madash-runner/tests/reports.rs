//! Report rendering from hand-built rows; no database involved.

use chrono::NaiveDate;

use madash_core::domain::{EntityKind, PortfolioId, PriceSource};
use madash_core::quality::{HoldingCoverage, PortfolioCoverage, QualityStats};
use madash_core::risk::{RiskParams, RiskReport};
use madash_runner::store::{PortfolioReturnRow, QualityStatusRow, SourceBreakdown};
use madash_runner::{GenerationSummary, PopulateReport, QualityReport, RiskRun};

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn status(kind: EntityKind, id: i32, ident: &str, real: u64, synthetic: u64) -> QualityStatusRow {
    QualityStatusRow::from_stats(
        kind,
        id,
        ident.into(),
        format!("{ident} name"),
        QualityStats {
            total: real + synthetic,
            real,
            synthetic,
            first_real: (real > 0).then(|| date(1, 2)),
            last_real: (real > 0).then(|| date(6, 28)),
        },
    )
}

#[test]
fn populate_summary_per_entity_kind() {
    let report = PopulateReport {
        rows: vec![
            status(EntityKind::Security, 1, "CBA.AX", 120, 0),
            status(EntityKind::Security, 2, "CASH", 0, 252),
            status(EntityKind::Security, 3, "NEW", 0, 0),
            status(EntityKind::Benchmark, 1, "ASX200", 100, 100),
        ],
    };

    let securities = report.summary(EntityKind::Security);
    assert_eq!(securities.entities, 3);
    assert_eq!(securities.with_real_data, 1);
    assert!((securities.average_score - 1.0 / 3.0).abs() < 1e-12);

    let benchmarks = report.summary(EntityKind::Benchmark);
    assert_eq!(benchmarks.with_real_data, 1);
    assert!((benchmarks.average_score - 0.5).abs() < 1e-12);
    // Equal counts do not make the benchmark real.
    assert_eq!(report.rows[3].source, PriceSource::Synthetic);

    let text = report.to_string();
    assert!(text.contains("security   1/3 with real data, average score 0.333"));
    assert!(text.contains("benchmark  1/1 with real data, average score 0.500"));
}

fn coverage() -> PortfolioCoverage {
    let holding = |ticker: &str, weight, real, synthetic| HoldingCoverage {
        ticker: ticker.into(),
        weight,
        real_records: real,
        synthetic_records: synthetic,
    };
    PortfolioCoverage::from_holdings(vec![
        holding("CASH", 0.1, 0, 252),
        holding("DHHF", 0.6, 1000, 10),
        holding("CBA.AX", 0.3, 900, 1),
    ])
}

#[test]
fn quality_report_shows_sources_coverage_and_verdict() {
    let report = QualityReport {
        securities: vec![SourceBreakdown {
            identifier: "CBA.AX".into(),
            name: "Commonwealth Bank of Australia".into(),
            source_tag: Some("yfinance".into()),
            records: 900,
            first_date: Some(date(1, 2)),
            last_date: Some(date(6, 28)),
        }],
        benchmarks: vec![SourceBreakdown {
            identifier: "ASX200".into(),
            name: "ASX 200 Index".into(),
            source_tag: None,
            records: 252,
            first_date: None,
            last_date: None,
        }],
        portfolio: PortfolioId(1),
        as_of: date(6, 30),
        coverage: coverage(),
        status: None,
    };

    let text = report.to_string();
    assert!(text.contains("Commonwealth Bank of Austral "));
    assert!(text.contains("N/A"));
    assert!(text.contains("Real data: 90.0%  Synthetic: 10.0%"));
    assert!(text.contains("EXCELLENT"));
    assert!(!text.contains("Data quality status"));

    // Holdings are listed heaviest first.
    let dhhf = text.find("DHHF").unwrap();
    let cash = text.find("CASH").unwrap();
    assert!(dhhf < cash);
}

#[test]
fn quality_report_status_view_includes_ratings() {
    let report = QualityReport {
        securities: Vec::new(),
        benchmarks: Vec::new(),
        portfolio: PortfolioId(1),
        as_of: date(6, 30),
        coverage: PortfolioCoverage::from_holdings(Vec::new()),
        status: Some(vec![
            status(EntityKind::Security, 1, "CBA.AX", 95, 5),
            status(EntityKind::Security, 2, "CASH", 0, 252),
        ]),
    };

    let text = report.to_string();
    assert!(text.contains("Data quality status"));
    assert!(text.contains("Excellent"));
    assert!(text.contains("Poor"));
    assert!(text.contains("(no holdings)"));
}

#[test]
fn risk_run_renders_statistics() {
    let rows: Vec<PortfolioReturnRow> = (1..=40)
        .map(|i| {
            let r = if i % 3 == 0 { -0.012 } else { 0.007 };
            PortfolioReturnRow {
                date: date(3, 1) + chrono::Duration::days(i),
                daily_return: r,
                portfolio_value: 50_000.0,
                benchmark_return: Some(r * 0.8),
                active_return: Some(r * 0.2),
            }
        })
        .collect();
    let daily: Vec<f64> = rows.iter().map(|r| r.daily_return).collect();
    let bench: Vec<f64> = rows.iter().filter_map(|r| r.benchmark_return).collect();
    let report = RiskReport::compute(&daily, Some((&daily, &bench)), &RiskParams::default());

    let run = RiskRun {
        portfolio: PortfolioId(1),
        calculation_date: date(4, 10),
        method: "historical".into(),
        benchmark_code: "ASX200".into(),
        generation: Some(GenerationSummary {
            benchmark_code: "ASX200".into(),
            benchmark_generated: true,
            benchmark_rows: 252,
            anchors_inserted: 2,
            securities_generated: 10,
            securities_with_real_data: 1,
            security_rows: 2510,
        }),
        holdings: Vec::new(),
        returns: rows,
        report,
    };

    let text = run.to_string();
    assert!(text.contains("benchmark ASX200: 252 rows generated"));
    assert!(text.contains("Risk (historical, ASX200) as of 2024-04-10"));
    assert!(text.contains("1-day VaR 95%"));
    assert!(text.contains("Beta"));
    assert!(text.contains("1.250"));
    assert!(text.contains("$50,000"));
}
