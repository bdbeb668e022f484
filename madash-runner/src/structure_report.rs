//! Structure validation report: reference data, fund-of-funds lookthrough and
//! identifier coverage, printed as nested tables.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

use madash_core::domain::{PortfolioId, Security};
use madash_core::lookthrough::{expand, level_name, FundGraph, Lookthrough, LookthroughRow, Position};

use crate::config::StructureConfig;
use crate::format::{money, or_na, pct, rule, truncate};
use crate::store::{
    FundConstituent, HeldSecurity, IdentifierCoverage, PortfolioSummary, Store, StoreError,
};

/// One fund's appearances in the lookthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct FundAnalysis {
    pub ticker: String,
    /// Portfolio share held through the fund, summed over every path.
    pub effective_weight: f64,
    pub constituents: Vec<LookthroughRow>,
}

impl FundAnalysis {
    /// `None` when the fund does not appear in the lookthrough.
    pub fn from_lookthrough(lookthrough: &Lookthrough, ticker: &str) -> Option<Self> {
        let appearances: Vec<&LookthroughRow> =
            lookthrough.rows.iter().filter(|r| r.ticker == ticker).collect();
        let fund_id = appearances.first()?.security_id;
        Some(Self {
            ticker: ticker.to_string(),
            effective_weight: appearances.iter().map(|r| r.effective_weight).sum(),
            constituents: lookthrough.held_through(fund_id).cloned().collect(),
        })
    }
}

/// Resolve direct holdings through every fund's constituent list.
pub fn build_lookthrough(
    holdings: &[HeldSecurity],
    constituents: &[FundConstituent],
    max_depth: usize,
) -> Lookthrough {
    let direct: Vec<Position> = holdings
        .iter()
        .map(|h| Position::new(h.security_id, h.ticker.clone(), h.weight))
        .collect();
    let graph: FundGraph = constituents
        .iter()
        .map(|c| (c.fund_id, Position::new(c.security_id, c.ticker.clone(), c.weight)))
        .collect();
    expand(&direct, &graph, max_depth)
}

/// Constituents grouped by fund ticker.
pub fn group_by_fund(constituents: &[FundConstituent]) -> BTreeMap<&str, Vec<&FundConstituent>> {
    let mut funds: BTreeMap<&str, Vec<&FundConstituent>> = BTreeMap::new();
    for c in constituents {
        funds.entry(c.fund_ticker.as_str()).or_default().push(c);
    }
    funds
}

#[derive(Debug, Clone)]
pub struct StructureReport {
    pub portfolio: PortfolioId,
    pub as_of: NaiveDate,
    pub tables: Vec<String>,
    pub identifiers: Vec<Security>,
    pub holdings: Vec<HeldSecurity>,
    pub constituents: Vec<FundConstituent>,
    pub lookthrough: Lookthrough,
    pub summary: Option<PortfolioSummary>,
    pub fund: Option<FundAnalysis>,
    pub fund_ticker: String,
    pub coverage: Vec<IdentifierCoverage>,
}

impl StructureReport {
    pub async fn collect(
        store: &Store,
        config: &StructureConfig,
        portfolio: PortfolioId,
        as_of: NaiveDate,
    ) -> Result<Self, StoreError> {
        let tables = store.list_tables().await?;
        let identifiers = store.securities_by_tickers(&config.identifier_tickers).await?;
        let holdings = store.holdings_as_of(portfolio, as_of).await?;
        let constituents = store.fund_constituents_as_of(as_of).await?;
        let lookthrough = build_lookthrough(&holdings, &constituents, config.max_depth);
        let summary = store.portfolio_summary(portfolio, as_of).await?;
        let fund = FundAnalysis::from_lookthrough(&lookthrough, &config.fund);
        let coverage = store.identifier_coverage().await?;

        tracing::info!(
            holdings = holdings.len(),
            lookthrough_rows = lookthrough.rows.len(),
            levels = lookthrough.max_level(),
            "structure report collected"
        );

        Ok(Self {
            portfolio,
            as_of,
            tables,
            identifiers,
            holdings,
            constituents,
            lookthrough,
            summary,
            fund,
            fund_ticker: config.fund.clone(),
            coverage,
        })
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "=".repeat(title.len()))
}

impl StructureReport {
    fn write_identifiers(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Security identifiers")?;
        writeln!(
            f,
            "{:<8} {:<28} {:<12} {:<8} {:<10} {:<8}",
            "Ticker", "Name", "ISIN", "SEDOL", "CUSIP", "Country"
        )?;
        writeln!(f, "{}", rule(79))?;
        for s in &self.identifiers {
            writeln!(
                f,
                "{:<8} {:<28} {:<12} {:<8} {:<10} {:<8}",
                truncate(&s.ticker, 8),
                truncate(&s.name, 28),
                or_na(s.isin.as_deref()),
                or_na(s.sedol.as_deref()),
                or_na(s.cusip.as_deref()),
                or_na(s.country_of_domicile.as_deref())
            )?;
        }
        Ok(())
    }

    fn write_holdings(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Direct holdings")?;
        writeln!(
            f,
            "{:<8} {:<28} {:<8} {:>8} {:>12}",
            "Ticker", "Name", "Type", "Weight", "Value"
        )?;
        writeln!(f, "{}", rule(68))?;
        if self.holdings.is_empty() {
            writeln!(f, "(no holdings on or before {})", self.as_of)?;
        }
        for h in &self.holdings {
            writeln!(
                f,
                "{:<8} {:<28} {:<8} {:>8} {:>12}",
                truncate(&h.ticker, 8),
                truncate(&h.name, 28),
                truncate(&h.security_type, 8),
                pct(h.weight, 1),
                h.market_value.map(money).unwrap_or_else(|| "-".into())
            )?;
        }
        Ok(())
    }

    fn write_funds(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Fund holdings")?;
        for (fund, rows) in group_by_fund(&self.constituents) {
            let total: f64 = rows.iter().map(|c| c.weight).sum();
            let name = rows.first().map(|c| c.fund_name.as_str()).unwrap_or("");
            writeln!(f, "{fund} ({}), {} constituents, {} allocated", name, rows.len(), pct(total, 1))?;
            for c in rows {
                writeln!(
                    f,
                    "  {:<8} {:<28} {:<6} {:<8} {:>7}",
                    truncate(&c.ticker, 8),
                    truncate(&c.name, 28),
                    truncate(&c.security_type, 6),
                    or_na(c.exchange.as_deref()),
                    pct(c.weight, 1)
                )?;
            }
        }
        Ok(())
    }

    fn write_lookthrough(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Lookthrough")?;
        let totals = self.lookthrough.level_totals();
        for (level, total) in &totals {
            writeln!(f, "{} (total {})", level_name(*level), pct(*total, 2))?;
            for r in self.lookthrough.at_level(*level) {
                let marker = if r.expanded { "+" } else { " " };
                writeln!(
                    f,
                    "  {marker} {:<8} {:>8} {:>8}  {}",
                    truncate(&r.ticker, 8),
                    pct(r.effective_weight, 2),
                    pct(r.weight_in_parent, 1),
                    r.path
                )?;
            }
        }

        let deepest: Vec<&LookthroughRow> = self.lookthrough.at_level(3).collect();
        if !deepest.is_empty() {
            section(f, "Level 3 stock exposures")?;
            for r in deepest {
                writeln!(f, "  {:<8} {:>8}  via {}", truncate(&r.ticker, 8), pct(r.effective_weight, 2), r.path)?;
            }
        }

        section(f, "Aggregated exposure")?;
        for e in self.lookthrough.exposures() {
            writeln!(
                f,
                "  {:<8} {:>8}  ({} path{})",
                truncate(&e.ticker, 8),
                pct(e.effective_weight, 2),
                e.paths,
                if e.paths == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Portfolio summary")?;
        match &self.summary {
            Some(s) => {
                writeln!(f, "{:<16} {} ({})", "Portfolio", s.name, s.code)?;
                writeln!(f, "{:<16} {}", "As of", s.as_of)?;
                writeln!(f, "{:<16} {}", "Holdings", s.holdings)?;
                writeln!(f, "{:<16} {}", "Total value", money(s.total_value))?;
            }
            None => writeln!(f, "portfolio {} has no holdings", self.portfolio)?,
        }
        Ok(())
    }

    fn write_fund_analysis(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, &format!("Fund analysis: {}", self.fund_ticker))?;
        let Some(fund) = &self.fund else {
            return writeln!(f, "{} is not held by portfolio {}", self.fund_ticker, self.portfolio);
        };
        writeln!(f, "Effective exposure: {}", pct(fund.effective_weight, 2))?;
        writeln!(f, "{:<8} {:>10} {:>10}", "Holding", "In fund", "Effective")?;
        writeln!(f, "{}", rule(30))?;
        for r in &fund.constituents {
            writeln!(
                f,
                "{:<8} {:>10} {:>10}",
                truncate(&r.ticker, 8),
                pct(r.weight_in_parent, 1),
                pct(r.effective_weight, 2)
            )?;
        }
        Ok(())
    }

    fn write_coverage(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        section(f, "Identifier coverage")?;
        writeln!(
            f,
            "{:<10} {:>6} {:>6} {:>6} {:>6} {:>10}",
            "Type", "Total", "ISIN", "SEDOL", "CUSIP", "Global ID"
        )?;
        writeln!(f, "{}", rule(49))?;
        for c in &self.coverage {
            let global = if c.total == 0 {
                0.0
            } else {
                c.global_id as f64 / c.total as f64
            };
            writeln!(
                f,
                "{:<10} {:>6} {:>6} {:>6} {:>6} {:>10}",
                truncate(&c.security_type, 10),
                c.total,
                c.isin,
                c.sedol,
                c.cusip,
                pct(global, 0)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for StructureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tables ({})", self.tables.len())?;
        for t in &self.tables {
            writeln!(f, "  {t}")?;
        }
        self.write_identifiers(f)?;
        self.write_holdings(f)?;
        self.write_funds(f)?;
        self.write_lookthrough(f)?;
        self.write_summary(f)?;
        self.write_fund_analysis(f)?;
        self.write_coverage(f)
    }
}
