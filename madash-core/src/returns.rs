//! Return derivation: price series → daily returns, holdings × prices →
//! portfolio returns, and date alignment of two return series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::{DatedValue, SecurityId};

/// Notional starting value of the compounded portfolio value series.
pub const DEFAULT_INITIAL_VALUE: f64 = 50_000.0;

/// One row of the derived `portfolio_returns` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReturn {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub portfolio_value: f64,
}

/// Two return series restricted to the dates they share, in date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Simple returns between consecutive closes. Non-positive bases yield 0.0.
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Daily benchmark returns keyed by the later date of each consecutive pair.
///
/// `closes` must be sorted by date. The first close has no return unless
/// `prev_close` (the last close already on file) is supplied, in which case the
/// first row is measured against it.
pub fn benchmark_return_rows(
    closes: &[(NaiveDate, f64)],
    prev_close: Option<f64>,
) -> Vec<DatedValue> {
    let mut rows = Vec::with_capacity(closes.len());
    let mut prev = prev_close;
    for &(date, close) in closes {
        if let Some(p) = prev {
            if p > 0.0 {
                rows.push(DatedValue::new(date, (close - p) / p));
            }
        }
        prev = Some(close);
    }
    rows
}

/// Portfolio daily returns from static weights and a price panel.
///
/// The panel is pivoted to date × security. Missing prices are carried forward
/// from the previous date before differencing. A date is dropped when any
/// security in the panel still lacks a return on it (typically the first date,
/// or dates before a security's first price). Held securities with no prices
/// at all contribute nothing. The value series compounds from `initial_value`.
pub fn portfolio_returns(
    weights: &[(SecurityId, f64)],
    prices: &[(SecurityId, NaiveDate, f64)],
    initial_value: f64,
) -> Vec<PortfolioReturn> {
    let mut panel: BTreeMap<NaiveDate, HashMap<SecurityId, f64>> = BTreeMap::new();
    for &(id, date, price) in prices {
        panel.entry(date).or_default().insert(id, price);
    }

    let columns: Vec<SecurityId> = {
        let mut ids: Vec<SecurityId> = prices.iter().map(|p| p.0).collect();
        ids.sort();
        ids.dedup();
        ids
    };

    let mut last_price: HashMap<SecurityId, f64> = HashMap::new();
    let mut out = Vec::new();
    let mut value = initial_value;

    for (date, row) in &panel {
        let mut day_returns: HashMap<SecurityId, f64> = HashMap::with_capacity(columns.len());
        let mut complete = true;

        for id in &columns {
            let prev = last_price.get(id).copied();
            let current = row.get(id).copied().or(prev);
            match (prev, current) {
                (Some(p), Some(c)) if p > 0.0 => {
                    day_returns.insert(*id, (c - p) / p);
                }
                _ => complete = false,
            }
            if let Some(c) = current {
                last_price.insert(*id, c);
            }
        }

        if !complete {
            continue;
        }

        let daily_return: f64 = weights
            .iter()
            .filter_map(|(id, w)| day_returns.get(id).map(|r| w * r))
            .sum();
        value *= 1.0 + daily_return;
        out.push(PortfolioReturn {
            date: *date,
            daily_return,
            portfolio_value: value,
        });
    }

    out
}

/// Inner join of two dated series on date.
pub fn align_by_date(left: &[DatedValue], right: &[DatedValue]) -> AlignedReturns {
    let right_by_date: HashMap<NaiveDate, f64> =
        right.iter().map(|d| (d.date, d.value)).collect();

    let mut pairs: Vec<(NaiveDate, f64, f64)> = left
        .iter()
        .filter_map(|l| right_by_date.get(&l.date).map(|r| (l.date, l.value, *r)))
        .collect();
    pairs.sort_by_key(|p| p.0);
    pairs.dedup_by_key(|p| p.0);

    let mut aligned = AlignedReturns::default();
    for (date, l, r) in pairs {
        aligned.dates.push(date);
        aligned.left.push(l);
        aligned.right.push(r);
    }
    aligned
}
