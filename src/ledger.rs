//! Trade ledger
//!
//! State transitions for opening and closing trades. Every transition takes
//! the current snapshot by reference and returns a new one; the input is
//! never modified, so a failed call leaves the caller's state untouched.
//! Persisting the returned snapshot is the caller's job.
//!
//! # Daily counters
//!
//! `daily_stats` belongs to one UTC calendar day. Before a transition
//! touches the counters it rolls them over if the day has changed, seeding
//! the new day with the current equity.
//!
//! # Omitted pnl
//!
//! When a close does not report a pnl, the trade is booked at one unit of
//! risk: `current_equity * risk_per_trade / 100` (rounded to cents), positive
//! for a win, negative for a loss, zero for breakeven.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::metrics;
use crate::risk::{self, BlockReason, TradePermission};
use crate::{DailyStats, Direction, Money, Signal, Trade, TradeId, TradeOutcome, TradeStatus, TradingState};

/// What a transition did, for the caller to act on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeEvent {
    Closed {
        trade: Trade,
        /// Gate decision for the next trade, evaluated on the new state
        permission: TradePermission,
    },
    Blocked {
        reason: BlockReason,
    },
}

/// New state plus the event describing the change
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: TradingState,
    pub event: TradeEvent,
}

/// Next id: one past the largest id ever recorded
pub fn next_trade_id(state: &TradingState) -> TradeId {
    state.trades.iter().map(|t| t.id).max().unwrap_or(0) + 1
}

fn validate_signal(signal: &Signal) -> LedgerResult<(Direction, Money)> {
    if signal.pair.trim().is_empty() {
        return Err(LedgerError::InvalidSignal("missing pair".to_string()));
    }
    let direction = signal
        .direction
        .ok_or_else(|| LedgerError::InvalidSignal(format!("{}: missing direction", signal.pair)))?;
    let price = signal
        .entry_price
        .ok_or_else(|| LedgerError::InvalidSignal(format!("{}: missing entry price", signal.pair)))?;
    if !price.is_positive() {
        return Err(LedgerError::InvalidSignal(format!(
            "{}: entry price must be positive, got {}",
            signal.pair, price
        )));
    }
    Ok((direction, price))
}

/// Reset the daily counters if `now` falls on a later UTC day.
///
/// An earlier `now` (clock skew, backdated entries) keeps the counters of the
/// recorded day. Snapshots without a recorded day adopt today's date and keep
/// their counters.
pub fn roll_daily_stats(state: &TradingState, now: DateTime<Utc>) -> TradingState {
    let today = now.date_naive();
    let mut next = state.clone();
    match state.daily_stats.date {
        Some(day) if day == today => {}
        Some(day) if day > today => {
            warn!(
                "Clock at {} is behind daily stats for {}, keeping counters",
                today, day
            );
        }
        Some(day) => {
            debug!(
                "Day rollover {} -> {}: day pnl {:.2} over {} trades",
                day,
                today,
                state.daily_stats.pnl.to_f64(),
                state.daily_stats.trades
            );
            next.daily_stats = DailyStats::fresh(state.current_equity, today);
        }
        None => next.daily_stats.date = Some(today),
    }
    next
}

pub fn open_trade(state: &TradingState, signal: &Signal) -> LedgerResult<TradingState> {
    open_trade_at(state, signal, Utc::now())
}

/// Record a new open position from `signal`. Equity is unchanged.
pub fn open_trade_at(
    state: &TradingState,
    signal: &Signal,
    now: DateTime<Utc>,
) -> LedgerResult<TradingState> {
    let (direction, entry_price) = validate_signal(signal)?;

    let mut next = roll_daily_stats(state, now);
    let trade = Trade {
        id: next_trade_id(state),
        pair: signal.pair.trim().to_string(),
        direction,
        entry_price,
        entry_time: now,
        close_time: None,
        outcome: None,
        pnl: None,
        status: TradeStatus::Open,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit,
    };

    debug!(
        "Opened trade #{} {} {} @ {}",
        trade.id, trade.direction, trade.pair, trade.entry_price
    );

    next.trades.push(trade.clone());
    next.open_positions.push(trade);
    Ok(next)
}

/// Pnl booked for a close that did not report one
pub fn default_pnl(state: &TradingState, outcome: TradeOutcome) -> Money {
    let risk = risk::risk_amount_per_trade(state);
    match outcome {
        TradeOutcome::Win => risk,
        TradeOutcome::Loss => -risk,
        TradeOutcome::Breakeven => Money::ZERO,
    }
}

pub fn close_trade(
    state: &TradingState,
    trade_id: TradeId,
    outcome: TradeOutcome,
    pnl: Option<Money>,
) -> LedgerResult<TradingState> {
    close_trade_at(state, trade_id, outcome, pnl, Utc::now())
}

/// Close an open position, book its pnl, and refresh the metrics
pub fn close_trade_at(
    state: &TradingState,
    trade_id: TradeId,
    outcome: TradeOutcome,
    pnl: Option<Money>,
    now: DateTime<Utc>,
) -> LedgerResult<TradingState> {
    let pos_idx = state
        .open_positions
        .iter()
        .position(|t| t.id == trade_id)
        .ok_or(LedgerError::TradeNotFound(trade_id))?;

    let mut next = roll_daily_stats(state, now);
    let pnl = pnl.unwrap_or_else(|| default_pnl(&next, outcome));

    match outcome {
        TradeOutcome::Win if pnl.is_negative() => {
            warn!("Trade #{} reported as win with negative pnl {}", trade_id, pnl)
        }
        TradeOutcome::Loss if pnl.is_positive() => {
            warn!("Trade #{} reported as loss with positive pnl {}", trade_id, pnl)
        }
        _ => {}
    }

    let mut trade = next.open_positions.remove(pos_idx);
    trade.close_time = Some(now);
    trade.outcome = Some(outcome);
    trade.pnl = Some(pnl);
    trade.status = TradeStatus::Closed;

    match next.trades.iter_mut().find(|t| t.id == trade_id) {
        Some(slot) => *slot = trade.clone(),
        None => next.trades.push(trade.clone()),
    }

    next.current_equity += pnl;
    next.daily_stats.pnl += pnl;
    next.daily_stats.trades += 1;
    next.performance_metrics = metrics::recompute(&next.trades, next.initial_equity);

    debug!(
        "Closed trade #{} {} as {} pnl={} equity={}",
        trade.id, trade.pair, outcome, pnl, next.current_equity
    );

    Ok(next)
}

pub fn take_signal(
    state: &TradingState,
    signal: &Signal,
    outcome: TradeOutcome,
    pnl: Option<Money>,
) -> LedgerResult<Transition> {
    take_signal_at(state, signal, outcome, pnl, Utc::now())
}

/// Journal a signal the trader already acted on: gate check, open, close.
///
/// A blocked gate is not an error: the returned state equals the input
/// (after the day rollover) and the event carries the reason.
pub fn take_signal_at(
    state: &TradingState,
    signal: &Signal,
    outcome: TradeOutcome,
    pnl: Option<Money>,
    now: DateTime<Utc>,
) -> LedgerResult<Transition> {
    let rolled = roll_daily_stats(state, now);

    let permission = risk::evaluate_trade_permission(&rolled);
    if let Some(reason) = permission.reason {
        return Ok(Transition {
            state: rolled,
            event: TradeEvent::Blocked { reason },
        });
    }

    let opened = open_trade_at(&rolled, signal, now)?;
    let trade_id = next_trade_id(&rolled);
    let closed = close_trade_at(&opened, trade_id, outcome, pnl, now)?;

    let trade = closed
        .trades
        .iter()
        .find(|t| t.id == trade_id)
        .cloned()
        .ok_or(LedgerError::TradeNotFound(trade_id))?;
    let permission = risk::evaluate_trade_permission(&closed);

    Ok(Transition {
        state: closed,
        event: TradeEvent::Closed { trade, permission },
    })
}

pub fn find_open(state: &TradingState, trade_id: TradeId) -> Option<&Trade> {
    state.open_positions.iter().find(|t| t.id == trade_id)
}

pub fn closed_trades(state: &TradingState) -> Vec<&Trade> {
    state.trades.iter().filter(|t| !t.is_open()).collect()
}

/// Last `n` recorded trades, most recent first
pub fn recent_trades(state: &TradingState, n: usize) -> Vec<&Trade> {
    state.trades.iter().rev().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RiskSettings;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn fresh() -> TradingState {
        TradingState::new(Money::from_i64(10_000), RiskSettings::default(), t0().date_naive())
    }

    fn eurusd() -> Signal {
        Signal::new("EURUSD", Direction::Buy, Money::from_f64(1.0850))
    }

    #[test]
    fn test_open_appends_to_trades_and_positions() {
        let state = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        assert_eq!(state.trades.len(), 1);
        assert_eq!(state.open_positions.len(), 1);
        assert_eq!(state.open_positions[0].id, 1);
        assert_eq!(state.open_positions[0].entry_time, t0());
        assert_eq!(state.current_equity, Money::from_i64(10_000));
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_open_rejects_incomplete_signal() {
        let base = fresh();
        let mut signal = eurusd();
        signal.entry_price = None;
        assert!(matches!(
            open_trade_at(&base, &signal, t0()),
            Err(LedgerError::InvalidSignal(_))
        ));

        let mut signal = eurusd();
        signal.direction = None;
        assert!(matches!(
            open_trade_at(&base, &signal, t0()),
            Err(LedgerError::InvalidSignal(_))
        ));

        let mut signal = eurusd();
        signal.entry_price = Some(Money::ZERO);
        assert!(open_trade_at(&base, &signal, t0()).is_err());
    }

    #[test]
    fn test_close_moves_position_to_history() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let later = t0() + Duration::minutes(45);
        let closed =
            close_trade_at(&opened, 1, TradeOutcome::Win, Some(Money::from_i64(150)), later).unwrap();

        assert!(closed.open_positions.is_empty());
        let trade = &closed.trades[0];
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.close_time, Some(later));
        assert_eq!(trade.pnl, Some(Money::from_i64(150)));
        assert_eq!(closed.current_equity, Money::from_i64(10_150));
        assert_eq!(closed.daily_stats.pnl, Money::from_i64(150));
        assert_eq!(closed.daily_stats.trades, 1);
        assert_eq!(closed.performance_metrics.total_trades, 1);
        assert_eq!(closed.performance_metrics.consecutive_wins, 1);
    }

    #[test]
    fn test_close_unknown_id_leaves_state_untouched() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let before = opened.clone();
        let err = close_trade_at(&opened, 42, TradeOutcome::Loss, None, t0()).unwrap_err();
        assert_eq!(err, LedgerError::TradeNotFound(42));
        assert_eq!(opened, before);
    }

    #[test]
    fn test_close_twice_fails() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let closed = close_trade_at(&opened, 1, TradeOutcome::Breakeven, None, t0()).unwrap();
        assert!(close_trade_at(&closed, 1, TradeOutcome::Win, None, t0()).is_err());
    }

    #[test]
    fn test_default_pnl_uses_risk_per_trade() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let lost = close_trade_at(&opened, 1, TradeOutcome::Loss, None, t0()).unwrap();
        assert_eq!(lost.trades[0].pnl, Some(Money::from_i64(-100)));

        let reopened = open_trade_at(&lost, &eurusd(), t0()).unwrap();
        let won = close_trade_at(&reopened, 2, TradeOutcome::Win, None, t0()).unwrap();
        // 1% of 9900
        assert_eq!(won.trades[1].pnl, Some(Money::from_i64(99)));

        let reopened = open_trade_at(&won, &eurusd(), t0()).unwrap();
        let flat = close_trade_at(&reopened, 3, TradeOutcome::Breakeven, None, t0()).unwrap();
        assert_eq!(flat.trades[2].pnl, Some(Money::ZERO));
    }

    #[test]
    fn test_ids_stay_unique_after_closes() {
        let mut state = fresh();
        for _ in 0..3 {
            state = open_trade_at(&state, &eurusd(), t0()).unwrap();
        }
        state = close_trade_at(&state, 2, TradeOutcome::Win, None, t0()).unwrap();
        state = open_trade_at(&state, &eurusd(), t0()).unwrap();

        let ids: Vec<TradeId> = state.trades.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_day_rollover_resets_counters() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let closed =
            close_trade_at(&opened, 1, TradeOutcome::Loss, Some(Money::from_i64(-300)), t0()).unwrap();
        assert_eq!(closed.daily_stats.pnl, Money::from_i64(-300));

        let tomorrow = t0() + Duration::days(1);
        let rolled = roll_daily_stats(&closed, tomorrow);
        assert_eq!(rolled.daily_stats.pnl, Money::ZERO);
        assert_eq!(rolled.daily_stats.trades, 0);
        assert_eq!(rolled.daily_stats.initial_equity, Money::from_i64(9_700));
        assert_eq!(rolled.daily_stats.date, Some(tomorrow.date_naive()));
    }

    #[test]
    fn test_earlier_clock_keeps_day_counters() {
        let opened = open_trade_at(&fresh(), &eurusd(), t0()).unwrap();
        let closed =
            close_trade_at(&opened, 1, TradeOutcome::Loss, Some(Money::from_i64(-600)), t0()).unwrap();
        assert!(risk::is_daily_loss_limit_reached(&closed));

        let yesterday = t0() - Duration::hours(13);
        let rolled = roll_daily_stats(&closed, yesterday);
        assert_eq!(rolled.daily_stats, closed.daily_stats);
        assert!(risk::is_daily_loss_limit_reached(&rolled));

        // A backdated transition books into the recorded day
        let again = open_trade_at(&rolled, &eurusd(), yesterday).unwrap();
        assert_eq!(again.daily_stats.date, Some(t0().date_naive()));
    }

    #[test]
    fn test_missing_day_adopts_today_without_reset() {
        let mut state = fresh();
        state.daily_stats.date = None;
        state.daily_stats.pnl = Money::from_i64(-20);
        let rolled = roll_daily_stats(&state, t0());
        assert_eq!(rolled.daily_stats.pnl, Money::from_i64(-20));
        assert_eq!(rolled.daily_stats.date, Some(t0().date_naive()));
    }

    #[test]
    fn test_take_signal_blocks_after_daily_limit() {
        let first = take_signal_at(
            &fresh(),
            &eurusd(),
            TradeOutcome::Loss,
            Some(Money::from_i64(-500)),
            t0(),
        )
        .unwrap();
        match &first.event {
            TradeEvent::Closed { permission, .. } => assert!(!permission.allowed),
            other => panic!("expected close, got {:?}", other),
        }

        let second =
            take_signal_at(&first.state, &eurusd(), TradeOutcome::Win, None, t0()).unwrap();
        assert!(matches!(
            second.event,
            TradeEvent::Blocked {
                reason: BlockReason::DailyLossLimit { .. }
            }
        ));
        assert_eq!(second.state, first.state);

        // The next day the limit is lifted
        let next_day = t0() + Duration::days(1);
        let third =
            take_signal_at(&first.state, &eurusd(), TradeOutcome::Win, None, next_day).unwrap();
        assert!(matches!(third.event, TradeEvent::Closed { .. }));
    }

    #[test]
    fn test_recent_trades_newest_first() {
        let mut state = fresh();
        for _ in 0..7 {
            state = open_trade_at(&state, &eurusd(), t0()).unwrap();
        }
        let recent: Vec<TradeId> = recent_trades(&state, 5).iter().map(|t| t.id).collect();
        assert_eq!(recent, vec![7, 6, 5, 4, 3]);
        assert!(find_open(&state, 3).is_some());
        assert!(closed_trades(&state).is_empty());
    }
}
