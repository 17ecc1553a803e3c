//! Account commands: status, export, reset

use anyhow::Result;
use chrono::Utc;
use prop_risk_engine::state_manager::{self, StateStore};
use prop_risk_engine::{compute_session_status, journal, ledger, risk, Config};
use std::path::Path;
use tracing::info;

use super::open_account;

pub fn status(config: &Config, user: &str, recent: usize) -> Result<()> {
    let (_store, _key, state) = open_account(config, user)?;
    let state = ledger::roll_daily_stats(&state, Utc::now());
    let m = &state.performance_metrics;
    let permission = risk::evaluate_trade_permission(&state);
    let session = compute_session_status(Utc::now(), config.session.timezone);

    println!("\n{}", "=".repeat(60));
    println!("ACCOUNT STATUS: {}", user);
    println!("{}", "=".repeat(60));
    println!("Initial Equity:     {:.2}", state.initial_equity.to_f64());
    println!("Current Equity:     {:.2}", state.current_equity.to_f64());
    println!("Total P&L:          {:+.2}", m.total_pnl);
    println!("Win Rate:           {:.1}%", m.win_rate);
    println!("Total Trades:       {}", m.total_trades);
    println!("Winning Trades:     {}", m.winning_trades);
    println!("Losing Trades:      {}", m.losing_trades);
    println!("Average Win:        {:.2}", m.average_win);
    println!("Average Loss:       {:.2}", m.average_loss);
    println!("Profit Factor:      {:.2}", m.profit_factor);
    println!("Max Drawdown:       {:.2}%", m.max_drawdown);
    println!("Current Drawdown:   {:.2}%", m.current_drawdown);
    println!("Streak:             {}W / {}L", m.consecutive_wins, m.consecutive_losses);
    println!("{}", "-".repeat(60));
    println!("Open Positions:     {}", state.open_positions.len());
    println!(
        "Today:              {:+.2} over {} trades",
        state.daily_stats.pnl.to_f64(),
        state.daily_stats.trades
    );
    println!(
        "Daily Loss Left:    {:.2} of {:.2}",
        risk::remaining_daily_loss(&state).to_f64(),
        risk::daily_loss_limit_amount(&state).to_f64()
    );
    println!(
        "Risk Per Trade:     {:.2}",
        risk::risk_amount_per_trade(&state).to_f64()
    );
    match &permission.reason {
        None => println!("Trading:            ALLOWED"),
        Some(reason) => println!("Trading:            BLOCKED - {}", reason),
    }
    println!(
        "Market:             {} ({}), next {} in {}",
        if session.is_open { "Open" } else { "Closed" },
        session.current_label(),
        session.next_session,
        session.time_until_next
    );

    let trades = ledger::recent_trades(&state, recent);
    if !trades.is_empty() {
        println!("{}", "-".repeat(60));
        println!("Recent Trades:");
        for t in trades {
            println!(
                "  #{:<4} {:<10} {:<4} {:<9} {:>10} {}",
                t.id,
                t.pair,
                t.direction.to_string().to_uppercase(),
                t.outcome.map(|o| o.to_string()).unwrap_or_else(|| "open".to_string()),
                format!("{:+.2}", t.realized_pnl().to_f64()),
                t.entry_time.format("%Y-%m-%d %H:%M")
            );
        }
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

pub fn export(config: &Config, user: &str, output: &Path) -> Result<()> {
    let (_store, _key, state) = open_account(config, user)?;
    let rows = journal::export_trades_csv_to_path(&state, output)?;
    info!("Exported {} trades to {}", rows, output.display());
    println!("Exported {} trades to {}", rows, output.display());
    Ok(())
}

pub fn reset(config: &Config, user: &str) -> Result<()> {
    let store = state_manager::create_state_manager(
        &config.storage.state_dir,
        config.storage.json_backup,
    )?;
    let key = state_manager::user_key(user);
    let fresh = config.trading_plan.seed_state(Utc::now().date_naive());
    store.save(&key, &fresh)?;
    println!(
        "Account {} reset to {:.2}",
        user,
        fresh.current_equity.to_f64()
    );
    Ok(())
}
