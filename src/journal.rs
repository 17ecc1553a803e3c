//! Trade journal export

use anyhow::Result;
use csv::Writer;
use std::io::Write;
use std::path::Path;

use crate::{Trade, TradingState};

const HEADER: [&str; 9] = [
    "id",
    "pair",
    "direction",
    "entry_price",
    "entry_time",
    "close_time",
    "outcome",
    "pnl",
    "status",
];

fn record(trade: &Trade) -> [String; 9] {
    [
        trade.id.to_string(),
        trade.pair.clone(),
        trade.direction.to_string(),
        trade.entry_price.to_string(),
        trade.entry_time.to_rfc3339(),
        trade.close_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        trade.outcome.map(|o| o.to_string()).unwrap_or_default(),
        trade.pnl.map(|p| p.to_string()).unwrap_or_default(),
        if trade.is_open() { "open" } else { "closed" }.to_string(),
    ]
}

/// Write one row per trade, in ledger order
pub fn export_trades_csv<W: Write>(state: &TradingState, writer: W) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(HEADER)?;
    for trade in &state.trades {
        wtr.write_record(record(trade))?;
    }
    wtr.flush()?;
    Ok(state.trades.len())
}

pub fn export_trades_csv_to_path(state: &TradingState, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    export_trades_csv(state, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger;
    use crate::{Direction, Money, RiskSettings, Signal, TradeOutcome};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_export_rows() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap();
        let state = TradingState::new(Money::from_i64(5_000), RiskSettings::default(), now.date_naive());
        let signal = Signal::new("XAU/USD", Direction::Buy, Money::from_f64(2650.5));
        let state = ledger::open_trade_at(&state, &signal, now).unwrap();
        let state =
            ledger::close_trade_at(&state, 1, TradeOutcome::Loss, Some(Money::from_i64(-40)), now).unwrap();
        let state = ledger::open_trade_at(&state, &signal, now).unwrap();

        let mut buf = Vec::new();
        assert_eq!(export_trades_csv(&state, &mut buf).unwrap(), 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,pair,direction,entry_price,entry_time,close_time,outcome,pnl,status");
        assert_eq!(
            lines[1],
            "1,XAU/USD,buy,2650.5,2025-01-15T09:30:00+00:00,2025-01-15T09:30:00+00:00,loss,-40,closed"
        );
        assert_eq!(lines[2], "2,XAU/USD,buy,2650.5,2025-01-15T09:30:00+00:00,,,,open");
    }
}
