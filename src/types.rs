//! Core data types for the trading state
//!
//! Everything here is part of the persisted snapshot, so field names
//! serialize in camelCase and dates as ISO-8601 strings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a trade within one account's ledger
pub type TradeId = u64;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "long", alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "short", alias = "SELL", alias = "Sell")]
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Direction::Buy),
            "sell" | "short" => Ok(Direction::Sell),
            other => Err(format!("unknown direction '{}' (expected buy or sell)", other)),
        }
    }
}

/// How the trader reported a closed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
    #[serde(alias = "break-even", alias = "be")]
    Breakeven,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Win => write!(f, "win"),
            TradeOutcome::Loss => write!(f, "loss"),
            TradeOutcome::Breakeven => write!(f, "breakeven"),
        }
    }
}

impl std::str::FromStr for TradeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(TradeOutcome::Win),
            "loss" => Ok(TradeOutcome::Loss),
            "breakeven" | "break-even" | "be" => Ok(TradeOutcome::Breakeven),
            other => Err(format!(
                "unknown outcome '{}' (expected win, loss or breakeven)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// External trade recommendation.
///
/// Direction and entry price are optional because signal feeds are not
/// trusted to be complete; the ledger rejects incomplete signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub pair: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub entry_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Money>,
}

impl Signal {
    pub fn new(pair: impl Into<String>, direction: Direction, entry_price: Money) -> Self {
        Self {
            pair: pair.into(),
            direction: Some(direction),
            entry_price: Some(entry_price),
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_targets(mut self, stop_loss: Option<Money>, take_profit: Option<Money>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }
}

/// One position, open or closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: TradeId,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: Money,
    pub entry_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TradeOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<Money>,
    pub status: TradeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Money>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Realized pnl, zero while the trade is still open
    pub fn realized_pnl(&self) -> Money {
        self.pnl.unwrap_or(Money::ZERO)
    }
}

/// Per-account risk policy, percentages expressed as whole numbers (1.0 = 1%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSettings {
    pub risk_per_trade: f64,
    pub daily_loss_limit: f64,
    pub consecutive_losses_limit: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_per_trade: 1.0,
            daily_loss_limit: 5.0,
            consecutive_losses_limit: 3,
        }
    }
}

/// Statistics derived from the closed-trade history.
///
/// `gross_loss` and `average_loss` are kept negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_pnl: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,
}

/// Counters for the current trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub pnl: Money,
    pub trades: u32,
    /// Equity at the start of the day
    pub initial_equity: Money,
    /// UTC day these counters belong to; absent in older payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl DailyStats {
    pub fn fresh(equity: Money, date: NaiveDate) -> Self {
        Self {
            pnl: Money::ZERO,
            trades: 0,
            initial_equity: equity,
            date: Some(date),
        }
    }
}

/// Full account snapshot, replaced wholesale on every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingState {
    pub initial_equity: Money,
    pub current_equity: Money,
    pub trades: Vec<Trade>,
    pub open_positions: Vec<Trade>,
    pub risk_settings: RiskSettings,
    pub performance_metrics: PerformanceMetrics,
    pub daily_stats: DailyStats,
}

impl TradingState {
    /// Fresh account with no trades
    pub fn new(initial_equity: Money, risk_settings: RiskSettings, today: NaiveDate) -> Self {
        Self {
            initial_equity,
            current_equity: initial_equity,
            trades: Vec::new(),
            open_positions: Vec::new(),
            risk_settings,
            performance_metrics: PerformanceMetrics::default(),
            daily_stats: DailyStats::fresh(initial_equity, today),
        }
    }

    /// Sum of pnl over all closed trades
    pub fn realized_pnl(&self) -> Money {
        self.trades
            .iter()
            .filter(|t| !t.is_open())
            .map(Trade::realized_pnl)
            .sum()
    }

    /// Check the invariants a loaded snapshot must satisfy: unique ids,
    /// `open_positions` mirroring the open trades exactly, and current equity
    /// equal to initial equity plus realized pnl.
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for trade in &self.trades {
            if !seen.insert(trade.id) {
                return Err(format!("duplicate trade id {}", trade.id));
            }
            if trade.is_open() != trade.close_time.is_none() {
                return Err(format!("trade {} has status/close time mismatch", trade.id));
            }
        }

        let open_in_trades: Vec<&Trade> = self.trades.iter().filter(|t| t.is_open()).collect();
        if open_in_trades.len() != self.open_positions.len() {
            return Err(format!(
                "{} open trades but {} open positions",
                open_in_trades.len(),
                self.open_positions.len()
            ));
        }
        for pos in &self.open_positions {
            match open_in_trades.iter().find(|t| t.id == pos.id) {
                Some(t) if *t == pos => {}
                Some(_) => return Err(format!("open position {} differs from its trade", pos.id)),
                None => return Err(format!("open position {} has no open trade", pos.id)),
            }
        }

        let expected = self.initial_equity + self.realized_pnl();
        if self.current_equity != expected {
            return Err(format!(
                "current equity {} does not match initial equity plus realized pnl {}",
                self.current_equity, expected
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Money Type - Precise Decimal Arithmetic for Monetary Values
// ============================================================================

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Money type for precise decimal arithmetic in monetary calculations.
///
/// Wraps `rust_decimal::Decimal` so equity stays exactly equal to the
/// initial equity plus the sum of realized pnl, however many trades are
/// journaled. Serialized as a JSON number to match the persisted schema.
///
/// # Example
/// ```
/// use prop_risk_engine::Money;
/// let equity = Money::from_f64(10_000.0);
/// let pnl = Money::from_f64(-125.5);
/// assert_eq!((equity + pnl).to_f64(), 9_874.5);
/// ```
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub const ONE: Money = Money(Decimal::ONE);

    pub const fn new(value: Decimal) -> Self {
        Money(value)
    }

    /// Create from f64.
    /// Note: NaN and infinities collapse to zero
    pub fn from_f64(value: f64) -> Self {
        Money(Decimal::try_from(value).unwrap_or_else(|_| {
            if value.is_nan() || value.is_infinite() {
                Decimal::ZERO
            } else {
                Decimal::from_f64_retain(value).unwrap_or(Decimal::ZERO)
            }
        }))
    }

    pub fn to_f64(self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn from_i64(value: i64) -> Self {
        Money(Decimal::from(value))
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn round_dp(self, dp: u32) -> Self {
        Money(self.0.round_dp(dp))
    }

    /// Percentage of this amount, `pct` given as a whole number (5.0 = 5%)
    pub fn percent(self, pct: f64) -> Self {
        self * Money::from_f64(pct) / Money::from_i64(100)
    }

    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s.trim()).map(Money)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::hash::Hash for Money {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Money {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Money(self.0 * rhs.0)
    }
}

impl Div for Money {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        if rhs.0.is_zero() {
            Money::ZERO
        } else {
            Money(self.0 / rhs.0)
        }
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Money::from_f64(value)
    }
}

impl From<Money> for f64 {
    fn from(value: Money) -> Self {
        value.to_f64()
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money::from_i64(value)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

impl<'a> std::iter::Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, x| acc + *x)
    }
}
