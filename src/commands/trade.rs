//! Trade journaling commands

use anyhow::{Context, Result};
use prop_risk_engine::{ledger, risk, Config, Money, Signal, TradeEvent, TradeOutcome};
use tracing::{info, warn};

use super::{open_account, persist};

/// Signal fields as typed on the command line
pub struct SignalArgs {
    pub pair: String,
    pub direction: String,
    pub price: String,
    pub stop_loss: Option<String>,
    pub take_profit: Option<String>,
}

fn parse_money(raw: &str, what: &str) -> Result<Money> {
    raw.parse::<Money>()
        .with_context(|| format!("Invalid {}: {}", what, raw))
}

impl SignalArgs {
    fn to_signal(&self) -> Result<Signal> {
        let direction = self.direction.parse().map_err(anyhow::Error::msg)?;
        let price = parse_money(&self.price, "price")?;
        let stop_loss = self
            .stop_loss
            .as_deref()
            .map(|s| parse_money(s, "stop loss"))
            .transpose()?;
        let take_profit = self
            .take_profit
            .as_deref()
            .map(|s| parse_money(s, "take profit"))
            .transpose()?;
        Ok(Signal::new(self.pair.clone(), direction, price).with_targets(stop_loss, take_profit))
    }
}

fn parse_outcome(raw: &str) -> Result<TradeOutcome> {
    raw.parse().map_err(anyhow::Error::msg)
}

pub fn open(config: &Config, user: &str, args: SignalArgs, force: bool) -> Result<()> {
    let signal = args.to_signal()?;
    let (store, key, state) = open_account(config, user)?;

    let state = ledger::roll_daily_stats(&state, chrono::Utc::now());
    let permission = risk::evaluate_trade_permission(&state);
    if let Some(reason) = &permission.reason {
        if !force {
            anyhow::bail!("{} (use --force to record anyway)", reason);
        }
        warn!("Recording trade despite risk gate: {}", reason);
    }

    let next = ledger::open_trade(&state, &signal)?;
    persist(&store, &key, &next)?;

    if let Some(trade) = next.open_positions.last() {
        println!(
            "Opened #{} {} {} @ {}",
            trade.id,
            trade.direction.to_string().to_uppercase(),
            trade.pair,
            trade.entry_price
        );
    }
    Ok(())
}

pub fn close(config: &Config, user: &str, id: u64, outcome: &str, pnl: Option<&str>) -> Result<()> {
    let outcome = parse_outcome(outcome)?;
    let pnl = pnl.map(|p| parse_money(p, "pnl")).transpose()?;
    let (store, key, state) = open_account(config, user)?;

    let next = ledger::close_trade(&state, id, outcome, pnl)?;
    persist(&store, &key, &next)?;

    if let Some(trade) = next.trades.iter().find(|t| t.id == id) {
        println!(
            "Closed #{} {} as {} | pnl {} | equity {}",
            trade.id,
            trade.pair,
            outcome,
            trade.realized_pnl(),
            next.current_equity
        );
    }

    let permission = risk::evaluate_trade_permission(&next);
    if let Some(reason) = permission.reason {
        println!("No further trades allowed: {}", reason);
    }
    Ok(())
}

pub fn take(
    config: &Config,
    user: &str,
    args: SignalArgs,
    outcome: &str,
    pnl: Option<&str>,
) -> Result<()> {
    let signal = args.to_signal()?;
    let outcome = parse_outcome(outcome)?;
    let pnl = pnl.map(|p| parse_money(p, "pnl")).transpose()?;
    let (store, key, state) = open_account(config, user)?;

    let transition = ledger::take_signal(&state, &signal, outcome, pnl)?;

    match &transition.event {
        TradeEvent::Blocked { reason } => {
            info!("Signal {} rejected by risk gate", signal.pair);
            println!("Trade not recorded: {}", reason);
        }
        TradeEvent::Closed { trade, permission } => {
            persist(&store, &key, &transition.state)?;
            println!(
                "Journaled #{} {} as {} | pnl {} | equity {}",
                trade.id,
                trade.pair,
                outcome,
                trade.realized_pnl(),
                transition.state.current_equity
            );
            if let Some(reason) = &permission.reason {
                println!("No further trades allowed: {}", reason);
            }
        }
    }
    Ok(())
}
