//! Risk gate
//!
//! Decides whether the account may take another trade. The gate is
//! advisory: it never mutates state and the ledger does not consult it on
//! its own. Callers check the permission before opening a trade.
//!
//! Rules, in evaluation order:
//! 1. **Daily loss limit**: blocked once the day's realized pnl is at or
//!    below `-(daily_loss_limit / 100) * day-start equity`
//! 2. **Consecutive losses**: blocked once the trailing loss streak reaches
//!    `consecutive_losses_limit`
//!
//! Zero limits are not special: a 0% daily limit trips at any pnl <= 0 and
//! a streak limit of 0 always blocks.

use serde::{Deserialize, Serialize};

use crate::{Money, TradingState};

/// Why the gate refused a new trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockReason {
    DailyLossLimit {
        /// Realized pnl for the day (negative)
        current_pnl: Money,
        /// Maximum allowed loss for the day (positive)
        limit: Money,
    },
    ConsecutiveLosses { count: u32, limit: u32 },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DailyLossLimit { current_pnl, limit } => write!(
                f,
                "Daily loss limit reached: {:.2} loss >= {:.2} limit",
                current_pnl.abs().to_f64(),
                limit.to_f64()
            ),
            BlockReason::ConsecutiveLosses { count, limit } => write!(
                f,
                "Consecutive loss limit reached: {} losses >= {} max",
                count, limit
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePermission {
    pub allowed: bool,
    pub reason: Option<BlockReason>,
}

impl TradePermission {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn block(reason: BlockReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Absolute loss allowed for the current day
pub fn daily_loss_limit_amount(state: &TradingState) -> Money {
    state
        .daily_stats
        .initial_equity
        .percent(state.risk_settings.daily_loss_limit)
}

/// Loss still available before the daily limit trips (never negative)
pub fn remaining_daily_loss(state: &TradingState) -> Money {
    (daily_loss_limit_amount(state) + state.daily_stats.pnl).max(Money::ZERO)
}

/// Amount risked on one trade at the current equity, rounded to cents
pub fn risk_amount_per_trade(state: &TradingState) -> Money {
    state
        .current_equity
        .percent(state.risk_settings.risk_per_trade)
        .round_dp(2)
}

/// True once the day's pnl is at or below the negative daily limit. A 0%
/// limit is reached immediately.
pub fn is_daily_loss_limit_reached(state: &TradingState) -> bool {
    state.daily_stats.pnl <= -daily_loss_limit_amount(state)
}

/// Evaluate every rule in order and report the first one violated
pub fn evaluate_trade_permission(state: &TradingState) -> TradePermission {
    if is_daily_loss_limit_reached(state) {
        let reason = BlockReason::DailyLossLimit {
            current_pnl: state.daily_stats.pnl,
            limit: daily_loss_limit_amount(state),
        };
        tracing::debug!("Trade blocked: {}", reason);
        return TradePermission::block(reason);
    }

    let limit = state.risk_settings.consecutive_losses_limit;
    let count = state.performance_metrics.consecutive_losses;
    if count >= limit {
        let reason = BlockReason::ConsecutiveLosses { count, limit };
        tracing::debug!("Trade blocked: {}", reason);
        return TradePermission::block(reason);
    }

    TradePermission::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RiskSettings;
    use chrono::NaiveDate;

    fn state_with_daily_pnl(pnl: i64) -> TradingState {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut state = TradingState::new(Money::from_i64(10_000), RiskSettings::default(), today);
        state.daily_stats.pnl = Money::from_i64(pnl);
        state.current_equity = state.initial_equity + Money::from_i64(pnl);
        state
    }

    #[test]
    fn test_daily_limit_reached_exactly_at_threshold() {
        let state = state_with_daily_pnl(-500);
        assert_eq!(state.risk_settings.daily_loss_limit, 5.0);
        assert!(is_daily_loss_limit_reached(&state));
    }

    #[test]
    fn test_daily_limit_not_reached_above_threshold() {
        let state = state_with_daily_pnl(-499);
        assert!(!is_daily_loss_limit_reached(&state));
        assert_eq!(remaining_daily_loss(&state), Money::from_i64(1));
    }

    #[test]
    fn test_daily_limit_checked_before_streak() {
        let mut state = state_with_daily_pnl(-600);
        state.performance_metrics.consecutive_losses = 5;

        let permission = evaluate_trade_permission(&state);
        assert!(!permission.allowed);
        assert!(matches!(
            permission.reason,
            Some(BlockReason::DailyLossLimit { .. })
        ));
    }

    #[test]
    fn test_consecutive_losses_block() {
        let mut state = state_with_daily_pnl(-100);
        state.performance_metrics.consecutive_losses = 3;

        let permission = evaluate_trade_permission(&state);
        assert_eq!(
            permission.reason,
            Some(BlockReason::ConsecutiveLosses { count: 3, limit: 3 })
        );
    }

    #[test]
    fn test_zero_daily_limit_blocks_any_loss() {
        let mut state = state_with_daily_pnl(-50);
        state.risk_settings.daily_loss_limit = 0.0;
        assert!(is_daily_loss_limit_reached(&state));
        assert_eq!(
            evaluate_trade_permission(&state).reason,
            Some(BlockReason::DailyLossLimit {
                current_pnl: Money::from_i64(-50),
                limit: Money::ZERO,
            })
        );
    }

    #[test]
    fn test_zero_streak_limit_always_blocks() {
        let mut state = state_with_daily_pnl(0);
        state.risk_settings.consecutive_losses_limit = 0;
        assert_eq!(
            evaluate_trade_permission(&state).reason,
            Some(BlockReason::ConsecutiveLosses { count: 0, limit: 0 })
        );
    }

    #[test]
    fn test_risk_amount_per_trade() {
        let state = state_with_daily_pnl(0);
        assert_eq!(risk_amount_per_trade(&state), Money::from_i64(100));
    }

    #[test]
    fn test_block_reason_display() {
        let reason = BlockReason::DailyLossLimit {
            current_pnl: Money::from_i64(-500),
            limit: Money::from_i64(500),
        };
        assert_eq!(
            reason.to_string(),
            "Daily loss limit reached: 500.00 loss >= 500.00 limit"
        );
    }
}
