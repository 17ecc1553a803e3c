// State Manager for account snapshots
// SQLite-based persistence with JSON backup
//
// One JSON snapshot per user key. Payloads carry a SHA-256 checksum so a
// truncated or hand-edited row is detected and reseeded instead of loaded.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::TradingPlanConfig;
use crate::error::{StateError, StateResult};
use crate::TradingState;

// =============================================================================
// Persistence Port
// =============================================================================

/// Load/save contract the engine needs from storage
pub trait StateStore {
    fn load(&self, user_key: &str) -> StateResult<Option<TradingState>>;
    fn save(&self, user_key: &str, state: &TradingState) -> StateResult<()>;
}

/// Storage key for a user identity (e.g. an email address)
pub fn user_key(identity: &str) -> String {
    format!("trading_state_{}", identity.trim().to_lowercase())
}

pub fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

pub fn encode_state(state: &TradingState) -> StateResult<String> {
    serde_json::to_string(state).map_err(|e| StateError::Storage(e.to_string()))
}

/// Parse a snapshot and check its structural invariants
pub fn decode_state(payload: &str) -> StateResult<TradingState> {
    let state: TradingState = serde_json::from_str(payload)?;
    state.check_consistency().map_err(StateError::Corrupt)?;
    Ok(state)
}

/// Load the snapshot for `user_key`, seeding a fresh one from the trading
/// plan when none exists or the stored one is corrupt.
pub fn load_or_seed<S: StateStore + ?Sized>(
    store: &S,
    user_key: &str,
    plan: &TradingPlanConfig,
    now: DateTime<Utc>,
) -> StateResult<TradingState> {
    match store.load(user_key) {
        Ok(Some(state)) => {
            debug!("Loaded state for {}: {} trades", user_key, state.trades.len());
            return Ok(state);
        }
        Ok(None) => info!("No saved state for {}, seeding from trading plan", user_key),
        Err(e) if e.is_corrupt() => {
            warn!("Discarding saved state for {}: {}", user_key, e);
        }
        Err(e) => return Err(e),
    }

    let state = plan.seed_state(now.date_naive());
    store.save(user_key, &state)?;
    Ok(state)
}

// =============================================================================
// In-memory store
// =============================================================================

/// Keeps raw payloads in memory, so corrupt data can be injected in tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    payloads: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, HashMap<String, String>>> {
        self.payloads
            .lock()
            .map_err(|_| StateError::Storage("state store mutex poisoned".to_string()))
    }

    /// Store a payload verbatim, bypassing encoding
    pub fn put_raw(&self, user_key: &str, payload: impl Into<String>) -> StateResult<()> {
        self.lock()?.insert(user_key.to_string(), payload.into());
        Ok(())
    }

    pub fn get_raw(&self, user_key: &str) -> StateResult<Option<String>> {
        Ok(self.lock()?.get(user_key).cloned())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, user_key: &str) -> StateResult<Option<TradingState>> {
        match self.get_raw(user_key)? {
            Some(payload) => decode_state(&payload).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, user_key: &str, state: &TradingState) -> StateResult<()> {
        let payload = encode_state(state)?;
        self.put_raw(user_key, payload)
    }
}

// =============================================================================
// State Manager Implementation
// =============================================================================

pub struct SqliteStateManager {
    conn: Arc<Mutex<Connection>>,
    json_backup_path: Option<PathBuf>,
}

impl SqliteStateManager {
    pub fn new<P: AsRef<Path>>(db_path: P, json_backup_path: Option<PathBuf>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = json_backup_path.as_ref().and_then(|p| p.parent()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
            json_backup_path,
        };

        manager.create_tables()?;
        info!("SQLite state manager initialized: {}", db_path.display());

        Ok(manager)
    }

    /// Non-persistent database, for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let manager = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            json_backup_path: None,
        };
        manager.create_tables()?;
        Ok(manager)
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StateError::Storage("database mutex poisoned".to_string()))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS trading_states (
                user_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                checksum TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    /// Write a payload as-is with the given checksum
    pub fn put_raw(&self, user_key: &str, payload: &str, checksum: &str) -> StateResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO trading_states (user_key, payload, checksum, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_key, payload, checksum, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete(&self, user_key: &str) -> StateResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM trading_states WHERE user_key = ?1",
            params![user_key],
        )?;
        Ok(removed > 0)
    }

    pub fn user_keys(&self) -> StateResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT user_key FROM trading_states ORDER BY user_key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Dump every stored snapshot that still decodes to a JSON file
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let mut states = serde_json::Map::new();
        for key in self.user_keys()? {
            match self.load(&key) {
                Ok(Some(state)) => {
                    states.insert(key, serde_json::to_value(&state)?);
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping {} in export: {}", key, e),
            }
        }

        let doc = serde_json::json!({
            "exported_at": Utc::now().to_rfc3339(),
            "states": states,
        });

        std::fs::write(path, serde_json::to_string_pretty(&doc)?)
            .with_context(|| format!("Failed to write backup: {}", path.display()))?;
        debug!("State exported to: {}", path.display());
        Ok(())
    }
}

impl StateStore for SqliteStateManager {
    fn load(&self, user_key: &str) -> StateResult<Option<TradingState>> {
        let row: Option<(String, String)> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT payload, checksum FROM trading_states WHERE user_key = ?1",
                params![user_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let Some((payload, stored_checksum)) = row else {
            debug!("No state stored for {}", user_key);
            return Ok(None);
        };

        if checksum(&payload) != stored_checksum {
            return Err(StateError::ChecksumMismatch {
                user_key: user_key.to_string(),
            });
        }

        decode_state(&payload).map(Some)
    }

    fn save(&self, user_key: &str, state: &TradingState) -> StateResult<()> {
        let payload = encode_state(state)?;
        self.put_raw(user_key, &payload, &checksum(&payload))?;

        info!(
            "State saved: {} equity={} trades={} open={}",
            user_key,
            state.current_equity,
            state.trades.len(),
            state.open_positions.len()
        );

        if let Some(path) = &self.json_backup_path {
            self.export_json(path)
                .map_err(|e| StateError::Storage(format!("{:#}", e)))?;
        }

        Ok(())
    }
}

// =============================================================================
// Factory Function
// =============================================================================

pub fn create_state_manager<P: AsRef<Path>>(state_dir: P, json_backup: bool) -> Result<SqliteStateManager> {
    let state_dir = state_dir.as_ref();
    std::fs::create_dir_all(state_dir)?;

    let db_path = state_dir.join("trading_state.db");
    let json_path = json_backup.then(|| state_dir.join("trading_state.json"));

    SqliteStateManager::new(db_path, json_path)
}
