pub mod account;
pub mod session;
pub mod trade;

use anyhow::Result;
use chrono::Utc;
use prop_risk_engine::state_manager::{self, SqliteStateManager, StateStore};
use prop_risk_engine::{Config, TradingState};

/// Open the configured store and load (or seed) the account for `user`
pub(crate) fn open_account(config: &Config, user: &str) -> Result<(SqliteStateManager, String, TradingState)> {
    let store = state_manager::create_state_manager(
        &config.storage.state_dir,
        config.storage.json_backup,
    )?;
    let key = state_manager::user_key(user);
    let state = state_manager::load_or_seed(&store, &key, &config.trading_plan, Utc::now())?;
    Ok((store, key, state))
}

pub(crate) fn persist(store: &SqliteStateManager, key: &str, state: &TradingState) -> Result<()> {
    store.save(key, state)?;
    Ok(())
}
