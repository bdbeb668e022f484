use serde::{Deserialize, Serialize};

use super::ids::{BenchmarkId, SecurityId};

/// A tradable instrument with its global identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub id: SecurityId,
    pub ticker: String,
    pub name: String,
    pub security_type: Option<String>,
    pub exchange: Option<String>,
    pub isin: Option<String>,
    pub sedol: Option<String>,
    pub cusip: Option<String>,
    pub country_of_domicile: Option<String>,
    pub expense_ratio: Option<f64>,
}

impl Security {
    /// True when the security carries an ISIN or a SEDOL.
    pub fn has_global_id(&self) -> bool {
        self.isin.is_some() || self.sedol.is_some()
    }
}

/// A reference index the portfolio is measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: BenchmarkId,
    pub code: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security(ticker: &str) -> Security {
        Security {
            id: SecurityId(1),
            ticker: ticker.into(),
            name: "Test".into(),
            security_type: Some("Stock".into()),
            exchange: None,
            isin: None,
            sedol: None,
            cusip: None,
            country_of_domicile: None,
            expense_ratio: None,
        }
    }

    #[test]
    fn global_id_requires_isin_or_sedol() {
        let mut s = security("CBA.AX");
        assert!(!s.has_global_id());
        s.cusip = Some("037833100".into());
        assert!(!s.has_global_id());
        s.sedol = Some("6215035".into());
        assert!(s.has_global_id());
    }
}
