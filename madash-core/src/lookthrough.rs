//! Fund-of-funds lookthrough.
//!
//! Direct holdings are level 1. A holding that is itself a fund is expanded
//! into its constituents at the next level, with effective weight equal to the
//! product of weights along the path. Expansion stops at `max_depth` and never
//! revisits a security already on the current path.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::SecurityId;

/// Default number of levels resolved (direct, in-fund, in-fund-of-fund).
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Separator between tickers in a holding path.
pub const PATH_SEPARATOR: &str = " > ";

/// A weighted position: in a portfolio (direct) or in a fund (constituent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub security_id: SecurityId,
    pub ticker: String,
    pub weight: f64,
}

impl Position {
    pub fn new(security_id: SecurityId, ticker: impl Into<String>, weight: f64) -> Self {
        Self {
            security_id,
            ticker: ticker.into(),
            weight,
        }
    }
}

/// Fund → constituents adjacency.
#[derive(Debug, Clone, Default)]
pub struct FundGraph {
    constituents: HashMap<SecurityId, Vec<Position>>,
}

impl FundGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fund: SecurityId, constituent: Position) {
        self.constituents.entry(fund).or_default().push(constituent);
    }

    pub fn constituents(&self, fund: SecurityId) -> &[Position] {
        self.constituents
            .get(&fund)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_fund(&self, id: SecurityId) -> bool {
        self.constituents.get(&id).is_some_and(|c| !c.is_empty())
    }
}

impl FromIterator<(SecurityId, Position)> for FundGraph {
    fn from_iter<I: IntoIterator<Item = (SecurityId, Position)>>(iter: I) -> Self {
        let mut graph = Self::new();
        for (fund, constituent) in iter {
            graph.add(fund, constituent);
        }
        graph
    }
}

/// One resolved holding at some level of the lookthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookthroughRow {
    pub level: usize,
    pub security_id: SecurityId,
    pub ticker: String,
    /// Share of the portfolio held through this path.
    pub effective_weight: f64,
    /// Share of the immediate parent (portfolio or fund).
    pub weight_in_parent: f64,
    pub parent: Option<SecurityId>,
    /// Tickers from the direct holding down to this one.
    pub path: String,
    /// True when this row was expanded into further rows.
    pub expanded: bool,
}

/// Aggregated exposure to one security across every path reaching it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub security_id: SecurityId,
    pub ticker: String,
    pub effective_weight: f64,
    pub paths: usize,
}

/// The full resolved tree, ordered by level then descending effective weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lookthrough {
    pub rows: Vec<LookthroughRow>,
}

/// Expand `direct` holdings through `graph`.
pub fn expand(direct: &[Position], graph: &FundGraph, max_depth: usize) -> Lookthrough {
    let mut rows = Vec::new();
    let mut trail: Vec<SecurityId> = Vec::new();
    let mut tickers: Vec<&str> = Vec::new();
    for holding in direct {
        visit(
            holding,
            1,
            holding.weight,
            None,
            graph,
            max_depth,
            &mut trail,
            &mut tickers,
            &mut rows,
        );
    }

    rows.sort_by(|a, b| {
        a.level.cmp(&b.level).then_with(|| {
            b.effective_weight
                .partial_cmp(&a.effective_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    Lookthrough { rows }
}

#[allow(clippy::too_many_arguments)]
fn visit<'a>(
    position: &'a Position,
    level: usize,
    effective_weight: f64,
    parent: Option<SecurityId>,
    graph: &'a FundGraph,
    max_depth: usize,
    trail: &mut Vec<SecurityId>,
    tickers: &mut Vec<&'a str>,
    rows: &mut Vec<LookthroughRow>,
) {
    trail.push(position.security_id);
    tickers.push(&position.ticker);

    let expand = level < max_depth && graph.is_fund(position.security_id);
    let children: Vec<&Position> = if expand {
        graph
            .constituents(position.security_id)
            .iter()
            .filter(|c| !trail.contains(&c.security_id))
            .collect()
    } else {
        Vec::new()
    };

    rows.push(LookthroughRow {
        level,
        security_id: position.security_id,
        ticker: position.ticker.clone(),
        effective_weight,
        weight_in_parent: position.weight,
        parent,
        path: tickers.join(PATH_SEPARATOR),
        expanded: !children.is_empty(),
    });

    for child in children {
        visit(
            child,
            level + 1,
            effective_weight * child.weight,
            Some(position.security_id),
            graph,
            max_depth,
            trail,
            tickers,
            rows,
        );
    }

    trail.pop();
    tickers.pop();
}

impl Lookthrough {
    pub fn at_level(&self, level: usize) -> impl Iterator<Item = &LookthroughRow> {
        self.rows.iter().filter(move |r| r.level == level)
    }

    pub fn max_level(&self) -> usize {
        self.rows.iter().map(|r| r.level).max().unwrap_or(0)
    }

    /// Sum of effective weights per level.
    pub fn level_totals(&self) -> BTreeMap<usize, f64> {
        let mut totals = BTreeMap::new();
        for r in &self.rows {
            *totals.entry(r.level).or_insert(0.0) += r.effective_weight;
        }
        totals
    }

    /// Rows held directly inside `fund`, wherever the fund appears in the tree.
    pub fn held_through(&self, fund: SecurityId) -> impl Iterator<Item = &LookthroughRow> {
        self.rows.iter().filter(move |r| r.parent == Some(fund))
    }

    /// Exposure per security over the rows that were not expanded further,
    /// in descending weight order.
    pub fn exposures(&self) -> Vec<Exposure> {
        let mut by_id: HashMap<SecurityId, Exposure> = HashMap::new();
        for r in self.rows.iter().filter(|r| !r.expanded) {
            let e = by_id.entry(r.security_id).or_insert_with(|| Exposure {
                security_id: r.security_id,
                ticker: r.ticker.clone(),
                effective_weight: 0.0,
                paths: 0,
            });
            e.effective_weight += r.effective_weight;
            e.paths += 1;
        }
        let mut out: Vec<Exposure> = by_id.into_values().collect();
        out.sort_by(|a, b| {
            b.effective_weight
                .partial_cmp(&a.effective_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        out
    }
}

/// Human label for a lookthrough level.
pub fn level_name(level: usize) -> String {
    match level {
        1 => "Direct".to_string(),
        2 => "Fund Level 1".to_string(),
        3 => "Fund Level 2".to_string(),
        n => format!("Level {n}"),
    }
}
