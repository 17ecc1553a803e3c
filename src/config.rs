//! Configuration management
//!
//! Handles loading and parsing of the JSON configuration file with
//! environment variable overrides for deployment-specific paths.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::session::TimezoneSelection;
use crate::{Money, RiskSettings, TradingState};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading_plan: TradingPlanConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("PROP_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }
        if let Ok(tz) = std::env::var("PROP_TIMEZONE") {
            self.session.timezone = tz
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid PROP_TIMEZONE")?;
        }
        Ok(())
    }
}

/// A percentage given either as a number (`1.5`) or as text (`"1.5%"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PercentValue {
    Number(f64),
    Text(String),
}

impl PercentValue {
    pub fn parse(&self) -> Option<f64> {
        match self {
            PercentValue::Number(v) => Some(*v),
            PercentValue::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        }
        .filter(|v: &f64| v.is_finite() && *v >= 0.0)
    }
}

/// Trading plan values used to seed a fresh account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingPlanConfig {
    /// Starting equity; no currency conversion is performed
    #[serde(default)]
    pub account_equity: Option<f64>,
    #[serde(default)]
    pub base_trade_risk_pct: Option<PercentValue>,
    #[serde(default)]
    pub max_daily_risk_pct: Option<PercentValue>,
    #[serde(default = "default_consecutive_losses_limit")]
    pub consecutive_losses_limit: u32,
}

fn default_consecutive_losses_limit() -> u32 {
    3
}

const DEFAULT_EQUITY: f64 = 100_000.0;
const DEFAULT_RISK_PER_TRADE: f64 = 1.0;
const DEFAULT_DAILY_LOSS_LIMIT: f64 = 5.0;

impl Default for TradingPlanConfig {
    fn default() -> Self {
        TradingPlanConfig {
            account_equity: None,
            base_trade_risk_pct: None,
            max_daily_risk_pct: None,
            consecutive_losses_limit: default_consecutive_losses_limit(),
        }
    }
}

fn percent_or(value: &Option<PercentValue>, default: f64, field: &str) -> f64 {
    match value {
        None => default,
        Some(v) => v.parse().unwrap_or_else(|| {
            warn!("Unparseable {} {:?}, using {}%", field, v, default);
            default
        }),
    }
}

impl TradingPlanConfig {
    pub fn initial_equity(&self) -> Money {
        match self.account_equity {
            Some(e) if e.is_finite() && e > 0.0 => Money::from_f64(e),
            Some(e) => {
                warn!("Invalid account_equity {}, using {}", e, DEFAULT_EQUITY);
                Money::from_f64(DEFAULT_EQUITY)
            }
            None => Money::from_f64(DEFAULT_EQUITY),
        }
    }

    pub fn risk_settings(&self) -> RiskSettings {
        let settings = RiskSettings {
            risk_per_trade: percent_or(
                &self.base_trade_risk_pct,
                DEFAULT_RISK_PER_TRADE,
                "base_trade_risk_pct",
            ),
            daily_loss_limit: percent_or(
                &self.max_daily_risk_pct,
                DEFAULT_DAILY_LOSS_LIMIT,
                "max_daily_risk_pct",
            ),
            consecutive_losses_limit: self.consecutive_losses_limit,
        };
        if settings.daily_loss_limit == 0.0 {
            warn!("max_daily_risk_pct is 0%: every new trade will be blocked");
        }
        if settings.consecutive_losses_limit == 0 {
            warn!("consecutive_losses_limit is 0: every new trade will be blocked");
        }
        settings
    }

    /// Fresh account state for this plan
    pub fn seed_state(&self, today: NaiveDate) -> TradingState {
        TradingState::new(self.initial_equity(), self.risk_settings(), today)
    }
}

/// Where snapshots are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
    /// Mirror every save into a pretty JSON file next to the database
    pub json_backup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            state_dir: PathBuf::from("state"),
            json_backup: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub timezone: TimezoneSelection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_strings_parse() {
        assert_eq!(PercentValue::Text("1.5%".into()).parse(), Some(1.5));
        assert_eq!(PercentValue::Text(" 2 % ".into()).parse(), Some(2.0));
        assert_eq!(PercentValue::Number(0.5).parse(), Some(0.5));
        assert_eq!(PercentValue::Text("lots".into()).parse(), None);
        assert_eq!(PercentValue::Number(-1.0).parse(), None);
    }

    #[test]
    fn test_plan_defaults() {
        let plan = TradingPlanConfig::default();
        let risk = plan.risk_settings();
        assert_eq!(plan.initial_equity(), Money::from_i64(100_000));
        assert_eq!(risk.risk_per_trade, 1.0);
        assert_eq!(risk.daily_loss_limit, 5.0);
        assert_eq!(risk.consecutive_losses_limit, 3);
    }

    #[test]
    fn test_config_json_with_text_percentages() {
        let json = r#"{
            "trading_plan": {
                "account_equity": 25000,
                "base_trade_risk_pct": "0.5%",
                "max_daily_risk_pct": 4
            },
            "session": { "timezone": "UTC+9" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let risk = config.trading_plan.risk_settings();
        assert_eq!(config.trading_plan.initial_equity(), Money::from_i64(25_000));
        assert_eq!(risk.risk_per_trade, 0.5);
        assert_eq!(risk.daily_loss_limit, 4.0);
        assert_eq!(config.session.timezone, TimezoneSelection::UtcPlus9);
        assert_eq!(config.storage.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let plan = TradingPlanConfig {
            account_equity: Some(-5.0),
            base_trade_risk_pct: Some(PercentValue::Text("abc".into())),
            ..TradingPlanConfig::default()
        };
        assert_eq!(plan.initial_equity(), Money::from_i64(100_000));
        assert_eq!(plan.risk_settings().risk_per_trade, 1.0);
    }
}
