//! Durable store for every persisted entity. Each entity table
//! is guarded by its own `parking_lot::RwLock` — a single writer per
//! entity type, concurrent readers, and no entity type blocks another's
//! writer. Durability is a simple append-only JSON-lines journal per
//! table (generalizing `jackbot-data::redis_store`'s serialize-to-string
//! pattern into on-disk persistence, since restart recovery is normative
//! here and there's no SQL/KV client dependency to reuse instead).

use crate::error::StoreError;
use crate::model::{
    EpisodeId, MarketPattern, PatternId, Position, PositionId, PositionStatus, RuleId, Trade,
    TradeEpisode, TradingRule,
};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Append-only, JSON-lines-backed table. `T` must carry its own identity so
/// replay can apply "latest record wins" semantics.
struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    fn disabled() -> Self {
        Self { path: None }
    }

    fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn append<T: Serialize>(&self, record: &T) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()) };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        Ok(())
    }

    fn replay<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        let Some(path) = &self.path else { return Ok(Vec::new()) };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }
}

pub struct Store {
    positions: RwLock<HashMap<PositionId, Position>>,
    trades: RwLock<Vec<Trade>>,
    episodes: RwLock<Vec<TradeEpisode>>,
    rules: RwLock<HashMap<RuleId, TradingRule>>,
    patterns: RwLock<HashMap<PatternId, MarketPattern>>,
    schema_version: RwLock<u32>,

    positions_journal: Journal,
    trades_journal: Journal,
    episodes_journal: Journal,
    rules_journal: Journal,
    patterns_journal: Journal,
}

impl Store {
    /// In-memory only; no restart recovery. Used by tests and by
    /// backtests/optimizers that reuse the engine as a library.
    pub fn in_memory() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            trades: RwLock::new(Vec::new()),
            episodes: RwLock::new(Vec::new()),
            rules: RwLock::new(HashMap::new()),
            patterns: RwLock::new(HashMap::new()),
            schema_version: RwLock::new(CURRENT_SCHEMA_VERSION),
            positions_journal: Journal::disabled(),
            trades_journal: Journal::disabled(),
            episodes_journal: Journal::disabled(),
            rules_journal: Journal::disabled(),
            patterns_journal: Journal::disabled(),
        }
    }

    /// Open (or create) a journal-backed store rooted at `dir`, replaying
    /// its tables to faithfully reconstruct state after a restart.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let positions_journal = Journal::at(dir.join("positions.jsonl"));
        let trades_journal = Journal::at(dir.join("trades.jsonl"));
        let episodes_journal = Journal::at(dir.join("episodes.jsonl"));
        let rules_journal = Journal::at(dir.join("rules.jsonl"));
        let patterns_journal = Journal::at(dir.join("patterns.jsonl"));

        let mut positions = HashMap::new();
        for position in positions_journal.replay::<Position>()? {
            positions.insert(position.id, position);
        }

        let trades = trades_journal.replay::<Trade>()?;
        let episodes = episodes_journal.replay::<TradeEpisode>()?;

        let mut rules = HashMap::new();
        for rule in rules_journal.replay::<TradingRule>()? {
            rules.insert(rule.id, rule);
        }

        let mut patterns = HashMap::new();
        for pattern in patterns_journal.replay::<MarketPattern>()? {
            patterns.insert(pattern.id, pattern);
        }

        Ok(Self {
            positions: RwLock::new(positions),
            trades: RwLock::new(trades),
            episodes: RwLock::new(episodes),
            rules: RwLock::new(rules),
            patterns: RwLock::new(patterns),
            schema_version: RwLock::new(CURRENT_SCHEMA_VERSION),
            positions_journal,
            trades_journal,
            episodes_journal,
            rules_journal,
            patterns_journal,
        })
    }

    pub fn schema_version(&self) -> u32 {
        *self.schema_version.read()
    }

    // -- positions --------------------------------------------------------

    pub fn upsert_position(&self, position: Position) -> Result<(), StoreError> {
        self.positions_journal.append(&position)?;
        self.positions.write().insert(position.id, position);
        Ok(())
    }

    pub fn get_position(&self, id: PositionId) -> Option<Position> {
        self.positions.read().get(&id).cloned()
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.positions
            .read()
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect()
    }

    // -- trades -------------------------------------------------------------

    pub fn append_trade(&self, trade: Trade) -> Result<(), StoreError> {
        self.trades_journal.append(&trade)?;
        self.trades.write().push(trade);
        Ok(())
    }

    /// Most recent `limit` closed trades, newest first (REST surface
    /// `/api/trades` returns the last 50).
    pub fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        let trades = self.trades.read();
        trades.iter().rev().take(limit).cloned().collect()
    }

    pub fn all_trades(&self) -> Vec<Trade> {
        self.trades.read().clone()
    }

    // -- episodes -----------------------------------------------------------

    pub fn append_episode(&self, episode: TradeEpisode) -> Result<(), StoreError> {
        self.episodes_journal.append(&episode)?;
        self.episodes.write().push(episode);
        Ok(())
    }

    pub fn episodes_for_symbol(&self, symbol: &keryxflow_instrument::Symbol) -> Vec<TradeEpisode> {
        self.episodes.read().iter().filter(|e| &e.symbol == symbol).cloned().collect()
    }

    pub fn all_episodes(&self) -> Vec<TradeEpisode> {
        self.episodes.read().clone()
    }

    // -- rules ----------------------------------------------------------------

    pub fn upsert_rule(&self, rule: TradingRule) -> Result<(), StoreError> {
        self.rules_journal.append(&rule)?;
        self.rules.write().insert(rule.id, rule);
        Ok(())
    }

    pub fn active_rules(&self) -> Vec<TradingRule> {
        self.rules.read().values().filter(|r| r.active).cloned().collect()
    }

    // -- patterns ---------------------------------------------------------------

    pub fn upsert_pattern(&self, pattern: MarketPattern) -> Result<(), StoreError> {
        self.patterns_journal.append(&pattern)?;
        self.patterns.write().insert(pattern.id, pattern);
        Ok(())
    }

    pub fn all_patterns(&self) -> Vec<MarketPattern> {
        self.patterns.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sample_position() -> Position {
        Position {
            id: PositionId::new(),
            symbol: keryxflow_instrument::Symbol::new("BTC/USDT"),
            side: keryxflow_instrument::Side::Buy,
            quantity: dec!(1),
            entry_price: dec!(100),
            opened_at: Utc::now(),
            stop_loss: Some(dec!(95)),
            take_profit: None,
            trailing_state: None,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
        }
    }

    #[test]
    fn in_memory_store_round_trips_positions() {
        let store = Store::in_memory();
        let position = sample_position();
        store.upsert_position(position.clone()).unwrap();
        assert_eq!(store.get_position(position.id), Some(position.clone()));
        assert_eq!(store.open_positions(), vec![position]);
    }

    #[test]
    fn journal_backed_store_survives_restart() {
        let dir = std::env::temp_dir().join(format!("keryxflow-store-test-{}", uuid::Uuid::new_v4()));

        let position = sample_position();
        {
            let store = Store::open(&dir).unwrap();
            store.upsert_position(position.clone()).unwrap();

            let trade = Trade::new(
                TradeId::new(),
                keryxflow_instrument::Symbol::new("BTC/USDT"),
                keryxflow_instrument::Side::Buy,
                dec!(1),
                dec!(100),
                dec!(110),
                Utc::now(),
                Utc::now(),
                dec!(10),
                dec!(0.1),
                ExitReason::Target,
                true,
            );
            store.append_trade(trade).unwrap();
        }

        // Reopen: must reconstruct the same open position and trade count.
        let reopened = Store::open(&dir).unwrap();
        assert_eq!(reopened.open_positions().len(), 1);
        assert_eq!(reopened.open_positions()[0].id, position.id);
        assert_eq!(reopened.all_trades().len(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn closing_a_position_is_the_latest_record_on_replay() {
        let dir = std::env::temp_dir().join(format!("keryxflow-store-test-{}", uuid::Uuid::new_v4()));
        let mut position = sample_position();
        {
            let store = Store::open(&dir).unwrap();
            store.upsert_position(position.clone()).unwrap();
            position.status = PositionStatus::Closed;
            store.upsert_position(position.clone()).unwrap();
        }

        let reopened = Store::open(&dir).unwrap();
        assert!(reopened.open_positions().is_empty());
        assert_eq!(reopened.get_position(position.id).unwrap().status, PositionStatus::Closed);

        fs::remove_dir_all(&dir).ok();
    }
}
