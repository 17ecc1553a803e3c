//! Performance aggregation
//!
//! Derives the account statistics from the closed-trade history. Every
//! ratio with an empty denominator is defined as 0 so the snapshot never
//! carries NaN or infinity into persistence.

use itertools::Itertools;

use crate::{Money, PerformanceMetrics, Trade};

/// Recompute all metrics from scratch.
///
/// Open trades in `closed_trades` are ignored. Drawdown and streaks walk the
/// trades by close time (ties by id), starting the equity curve at
/// `initial_equity`.
pub fn recompute(closed_trades: &[Trade], initial_equity: Money) -> PerformanceMetrics {
    let trades: Vec<&Trade> = closed_trades
        .iter()
        .filter(|t| !t.is_open())
        .sorted_by_key(|t| (t.close_time, t.id))
        .collect();

    if trades.is_empty() {
        return PerformanceMetrics::default();
    }

    let pnls: Vec<Money> = trades.iter().map(|t| t.realized_pnl()).collect();

    let total_trades = pnls.len();
    let winning_trades = pnls.iter().filter(|p| p.is_positive()).count();
    let losing_trades = pnls.iter().filter(|p| p.is_negative()).count();

    let total_pnl: Money = pnls.iter().sum();
    let gross_profit: Money = pnls.iter().filter(|p| p.is_positive()).sum();
    let gross_loss: Money = pnls.iter().filter(|p| p.is_negative()).sum();

    let win_rate = winning_trades as f64 / total_trades as f64 * 100.0;

    let profit_factor = if gross_loss.is_zero() {
        0.0
    } else {
        (gross_profit / gross_loss.abs()).to_f64()
    };

    let average_win = if winning_trades > 0 {
        gross_profit.to_f64() / winning_trades as f64
    } else {
        0.0
    };
    let average_loss = if losing_trades > 0 {
        gross_loss.to_f64() / losing_trades as f64
    } else {
        0.0
    };

    let (max_drawdown, current_drawdown) = drawdowns(&pnls, initial_equity);
    let (consecutive_wins, consecutive_losses) = streaks(&pnls);

    PerformanceMetrics {
        total_pnl: total_pnl.to_f64(),
        win_rate,
        total_trades,
        winning_trades,
        losing_trades,
        average_win,
        average_loss,
        profit_factor,
        max_drawdown,
        current_drawdown,
        gross_profit: gross_profit.to_f64(),
        gross_loss: gross_loss.to_f64(),
        consecutive_wins,
        consecutive_losses,
    }
}

/// Walk the equity curve, returning (max, current) drawdown in percent of peak
fn drawdowns(pnls: &[Money], initial_equity: Money) -> (f64, f64) {
    let mut equity = initial_equity;
    let mut peak = initial_equity;
    let mut max_dd = 0.0_f64;
    let mut current_dd = 0.0_f64;

    for pnl in pnls {
        equity += *pnl;
        peak = peak.max(equity);
        current_dd = drawdown_pct(peak, equity);
        max_dd = max_dd.max(current_dd);
    }

    (max_dd, current_dd)
}

fn drawdown_pct(peak: Money, equity: Money) -> f64 {
    if !peak.is_positive() {
        return 0.0;
    }
    ((peak - equity) / peak).to_f64() * 100.0
}

/// Trailing (wins, losses) streak; a flat trade breaks both
fn streaks(pnls: &[Money]) -> (u32, u32) {
    pnls.iter().fold((0, 0), |(wins, losses), pnl| {
        if pnl.is_positive() {
            (wins + 1, 0)
        } else if pnl.is_negative() {
            (0, losses + 1)
        } else {
            (0, 0)
        }
    })
}
