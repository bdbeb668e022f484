//! Job configuration, loaded from `madash.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working local setup. `DATABASE_URL` overrides the connection settings.

use chrono::NaiveDate;
use madash_core::synthetic::{BenchmarkModel, BetaProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "madash.toml";

/// Environment variable that replaces the configured connection settings.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub database: DatabaseConfig,
    pub loader: LoaderConfig,
    pub synthetic: SyntheticConfig,
    pub risk: RiskConfig,
    pub structure: StructureConfig,
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `madash.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Replace the connection URL when `url` is set (normally `DATABASE_URL`).
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.synthetic.days < 2 {
            return Err(ConfigError::Invalid(format!(
                "synthetic.days must be at least 2, got {}",
                self.synthetic.days
            )));
        }
        if self.risk.lookback_days == 0 {
            return Err(ConfigError::Invalid("risk.lookback_days must be positive".into()));
        }
        if !(self.risk.initial_value > 0.0) {
            return Err(ConfigError::Invalid("risk.initial_value must be positive".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ─── Database ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; when set, the individual fields are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".into(),
            port: 5432,
            name: "madashboard".into(),
            user: "ma_user".into(),
            password: None,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let auth = match &self.password {
            Some(pw) => format!("{}:{}", self.user, pw),
            None => self.user.clone(),
        };
        format!("postgres://{auth}@{}:{}/{}", self.host, self.port, self.name)
    }

    /// Connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        match (url.find("://"), url.rfind('@')) {
            (Some(scheme), Some(at)) if at > scheme => {
                let creds = &url[scheme + 3..at];
                match creds.find(':') {
                    Some(colon) => format!(
                        "{}{}:***{}",
                        &url[..scheme + 3],
                        &creds[..colon],
                        &url[at..]
                    ),
                    None => url,
                }
            }
            _ => url,
        }
    }
}

// ─── Loader ─────────────────────────────────────────────────────────

/// Yahoo symbol → stored security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMapping {
    pub ticker: String,
    pub name: String,
}

/// Yahoo symbol → stored benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMapping {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub start_date: NaiveDate,
    /// Pause between provider requests.
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub securities: BTreeMap<String, SecurityMapping>,
    pub benchmarks: BTreeMap<String, BenchmarkMapping>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let security = |ticker: &str, name: &str| SecurityMapping {
            ticker: ticker.into(),
            name: name.into(),
        };
        let benchmark = |code: &str, name: &str| BenchmarkMapping {
            code: code.into(),
            name: name.into(),
        };

        let securities = [
            ("DHHF.AX", security("DHHF", "BetaShares Diversified High Growth ETF")),
            ("STW.AX", security("STW", "SPDR S&P ASX 200 ETF")),
            ("VEU", security("VEU", "Vanguard FTSE Developed Markets ETF")),
            ("VGS.AX", security("VGS", "Vanguard MSCI Index International Shares ETF")),
            ("CBA.AX", security("CBA.AX", "Commonwealth Bank of Australia")),
            ("CSL.AX", security("CSL.AX", "CSL Limited")),
            ("BHP.AX", security("BHP.AX", "BHP Group Limited")),
            ("AAPL", security("AAPL", "Apple Inc")),
            ("MSFT", security("MSFT", "Microsoft Corp")),
            ("GOOGL", security("GOOGL", "Alphabet Inc")),
        ];
        let benchmarks = [
            ("^AXJO", benchmark("ASX200", "ASX 200 Index")),
            ("^AXKO", benchmark("ASX300", "ASX 300 Index")),
            ("URTH", benchmark("MSCI_WORLD", "MSCI World ETF")),
            ("ACWI", benchmark("MSCI_ACWI", "MSCI ACWI ETF")),
        ];

        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            request_delay_ms: 500,
            max_retries: 3,
            securities: securities
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            benchmarks: benchmarks
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

// ─── Synthetic generation ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Length of generated series in calendar days, ending today.
    pub days: usize,
    /// Benchmark whose series is generated and used for beta.
    pub benchmark_code: String,
    pub benchmark: BenchmarkModel,
    /// Security seeds are `security_seed + security_id`.
    pub security_seed: u64,
    /// Per-ticker overrides of the built-in beta table.
    pub profiles: HashMap<String, BetaProfile>,
    /// Per-ticker overrides of the built-in anchor prices.
    pub anchor_prices: HashMap<String, f64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            days: 252,
            benchmark_code: "ASX200".into(),
            benchmark: BenchmarkModel::default(),
            security_seed: 42,
            profiles: HashMap::new(),
            anchor_prices: HashMap::new(),
        }
    }
}

impl SyntheticConfig {
    pub fn anchor_price(&self, ticker: &str) -> f64 {
        self.anchor_prices
            .get(ticker)
            .copied()
            .unwrap_or_else(|| madash_core::synthetic::default_anchor_price(ticker))
    }
}

// ─── Risk ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub portfolio_id: i32,
    /// Calendar days of prices used for portfolio returns.
    pub lookback_days: u32,
    pub risk_free_rate: f64,
    pub min_overlap: usize,
    pub initial_value: f64,
    /// Tag stored in `portfolio_risk_calculations.calculation_method`.
    pub method: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            portfolio_id: 1,
            lookback_days: 365,
            risk_free_rate: madash_core::risk::DEFAULT_RISK_FREE_RATE,
            min_overlap: madash_core::risk::DEFAULT_MIN_OVERLAP,
            initial_value: madash_core::returns::DEFAULT_INITIAL_VALUE,
            method: "historical".into(),
        }
    }
}

impl RiskConfig {
    pub fn params(&self) -> madash_core::risk::RiskParams {
        madash_core::risk::RiskParams {
            risk_free_rate: self.risk_free_rate,
            min_overlap: self.min_overlap,
        }
    }
}

// ─── Structure report ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub max_depth: usize,
    /// Tickers shown in the identifier table.
    pub identifier_tickers: Vec<String>,
    /// Fund analysed in detail.
    pub fund: String,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            max_depth: madash_core::lookthrough::DEFAULT_MAX_DEPTH,
            identifier_tickers: vec!["DHHF".into(), "CBA.AX".into(), "AAPL".into()],
            fund: "DHHF".into(),
        }
    }
}
