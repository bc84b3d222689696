//! Paper Matching Engine. Owns a virtual balance and the set
//! of open paper positions; this is the only component that mutates them.
//! Matching is deterministic — the same tick sequence always produces the
//! same fills.

use crate::adapter::{AdapterError, Balance, ExchangeAdapter, PriceTick};
use async_trait::async_trait;
use chrono::Utc;
use keryxflow_instrument::{Side, Symbol};
use keryxflow_store::{ExitReason, OrderIntent, Position, PositionId, PositionStatus, Store, Trade, TradeId};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_INITIAL_BALANCE: Decimal = dec!(10000);
pub const DEFAULT_SLIPPAGE: Decimal = dec!(0.001);
pub const DEFAULT_COMMISSION: Decimal = dec!(0.001);

#[derive(Debug, Clone, Copy)]
pub struct PaperEngineConfig {
    pub initial_balance: Decimal,
    pub slippage: Decimal,
    pub commission: Decimal,
}

impl Default for PaperEngineConfig {
    fn default() -> Self {
        Self { initial_balance: DEFAULT_INITIAL_BALANCE, slippage: DEFAULT_SLIPPAGE, commission: DEFAULT_COMMISSION }
    }
}

struct State {
    cash_free: Decimal,
    positions: HashMap<Symbol, Position>,
}

/// Capacity of each per-symbol tick channel created by `subscribe_ticks`.
/// Bounded so a stalled consumer applies backpressure to `push_tick` rather
/// than growing without limit.
const TICK_CHANNEL_CAPACITY: usize = 1024;

/// Owns `{balance, open positions}` under one lock — the exclusive writer
/// so a fill, the resulting position, and the balance debit move
/// together. Persists through `store` after each atomic update.
pub struct PaperEngine {
    config: PaperEngineConfig,
    state: Mutex<State>,
    store: Arc<Store>,
    /// Sender half of each symbol's tick channel, kept alive so the
    /// receiver handed out by `subscribe_ticks` stays open. An external
    /// price source (or a test) drives the pipeline by calling
    /// [`PaperEngine::push_tick`]; nothing here generates ticks itself.
    tick_senders: Mutex<HashMap<Symbol, mpsc::Sender<PriceTick>>>,
}

impl PaperEngine {
    pub fn new(config: PaperEngineConfig, store: Arc<Store>) -> Self {
        Self {
            config,
            state: Mutex::new(State { cash_free: config.initial_balance, positions: HashMap::new() }),
            store,
            tick_senders: Mutex::new(HashMap::new()),
        }
    }

    /// Push a tick to `symbol`'s subscriber, if one is currently subscribed.
    /// Returns `false` if nobody has called `subscribe_ticks` for `symbol`
    /// yet, or if the channel is full.
    pub fn push_tick(&self, symbol: &Symbol, price: Decimal, volume: Decimal) -> bool {
        let senders = self.tick_senders.lock();
        let Some(tx) = senders.get(symbol) else { return false };
        tx.try_send(PriceTick { price, timestamp: Utc::now(), volume }).is_ok()
    }

    pub fn cash_free(&self) -> Decimal {
        self.state.lock().cash_free
    }

    pub fn open_position(&self, symbol: &Symbol) -> Option<Position> {
        self.state.lock().positions.get(symbol).cloned()
    }

    fn fill_price(&self, reference_price: Decimal, side: Side) -> Decimal {
        match side {
            Side::Buy => reference_price * (Decimal::ONE + self.config.slippage),
            Side::Sell => reference_price * (Decimal::ONE - self.config.slippage),
        }
    }

    /// Execute a market order against `reference_price`. Debits cash,
    /// opens a position, and persists both.
    pub fn execute(&self, order: &OrderIntent, reference_price: Decimal) -> Result<Position, AdapterError> {
        let fill_price = self.fill_price(reference_price, order.side);
        let notional = order.quantity * fill_price;
        let commission = notional * self.config.commission;

        let mut state = self.state.lock();
        if state.cash_free < notional + commission {
            return Err(AdapterError::InsufficientBalance);
        }
        state.cash_free -= notional + commission;

        let position = Position {
            id: PositionId::new(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            entry_price: fill_price,
            opened_at: Utc::now(),
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            trailing_state: None,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
        };
        state.positions.insert(order.symbol.clone(), position.clone());
        drop(state);

        self.store.upsert_position(position.clone()).ok();
        Ok(position)
    }

    /// Mark-to-market every open position against a tick. If the tick
    /// crosses a stop or target, the position is closed **at the stop/
    /// target price**, not the triggering tick price (conservative fill
    /// semantics) and the resulting trade is returned.
    pub fn on_price_update(&self, symbol: &Symbol, price: Decimal) -> Option<Trade> {
        let triggered = {
            let state = self.state.lock();
            let position = state.positions.get(symbol)?;
            match position.side {
                Side::Buy => {
                    if let Some(stop) = position.stop_loss {
                        if price <= stop {
                            Some((stop, ExitReason::Stop))
                        } else {
                            position.take_profit.filter(|&tp| price >= tp).map(|tp| (tp, ExitReason::Target))
                        }
                    } else {
                        position.take_profit.filter(|&tp| price >= tp).map(|tp| (tp, ExitReason::Target))
                    }
                }
                Side::Sell => {
                    if let Some(stop) = position.stop_loss {
                        if price >= stop {
                            Some((stop, ExitReason::Stop))
                        } else {
                            position.take_profit.filter(|&tp| price <= tp).map(|tp| (tp, ExitReason::Target))
                        }
                    } else {
                        position.take_profit.filter(|&tp| price <= tp).map(|tp| (tp, ExitReason::Target))
                    }
                }
            }
        };

        let (close_price, reason) = triggered?;
        self.close_at(symbol, close_price, reason)
    }

    /// Close `symbol`'s position at the current market `price` with
    /// slippage applied, crediting proceeds and computing realized pnl.
    pub fn close(&self, symbol: &Symbol, price: Decimal, reason: ExitReason) -> Option<Trade> {
        let exit_side = {
            let state = self.state.lock();
            state.positions.get(symbol)?.side.opposite()
        };
        let fill_price = self.fill_price(price, exit_side);
        self.close_at(symbol, fill_price, reason)
    }

    fn close_at(&self, symbol: &Symbol, exit_price: Decimal, reason: ExitReason) -> Option<Trade> {
        let mut state = self.state.lock();
        let mut position = state.positions.remove(symbol)?;

        let notional = position.quantity * exit_price;
        let commission = notional * self.config.commission;
        let pnl = (exit_price - position.entry_price) * position.quantity * Decimal::from(position.side.sign()) - commission;

        state.cash_free += notional - commission;
        drop(state);

        position.status = PositionStatus::Closed;
        position.realized_pnl = pnl;
        self.store.upsert_position(position.clone()).ok();

        let pnl_pct = if position.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            pnl / (position.entry_price * position.quantity)
        };

        let trade = Trade::new(
            TradeId::new(),
            symbol.clone(),
            position.side,
            position.quantity,
            position.entry_price,
            exit_price,
            position.opened_at,
            Utc::now(),
            pnl,
            pnl_pct,
            reason,
            true,
        );
        self.store.append_trade(trade.clone()).ok();
        Some(trade)
    }

    /// Close every open position in deterministic lexicographic symbol
    /// order (used for panic-close).
    pub fn close_all(&self, price_lookup: impl Fn(&Symbol) -> Option<Decimal>, reason: ExitReason) -> Vec<Trade> {
        let mut symbols: Vec<Symbol> = self.state.lock().positions.keys().cloned().collect();
        symbols.sort();

        symbols
            .into_iter()
            .filter_map(|symbol| {
                let price = price_lookup(&symbol)?;
                self.close(&symbol, price, reason.clone())
            })
            .collect()
    }
}

#[async_trait]
impl ExchangeAdapter for PaperEngine {
    async fn subscribe_ticks(&self, symbol: Symbol) -> Result<ReceiverStream<PriceTick>, AdapterError> {
        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        self.tick_senders.lock().insert(symbol, tx);
        Ok(ReceiverStream::new(rx))
    }

    async fn fetch_ohlcv(&self, _symbol: Symbol, _timeframe_minutes: u32, _limit: usize) -> Result<Vec<keryxflow_ta::Candle>, AdapterError> {
        Ok(Vec::new())
    }

    async fn place_order(&self, intent: OrderIntent) -> Result<String, AdapterError> {
        let reference = intent.price.unwrap_or_default();
        let position = self.execute(&intent, reference)?;
        Ok(position.id.0.to_string())
    }

    async fn cancel_order(&self, _order_id: String) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<Balance, AdapterError> {
        let cash_free = self.cash_free();
        Ok(Balance { total: cash_free, free: cash_free })
    }

    async fn fetch_open_positions(&self) -> Result<Vec<(Symbol, Side, Decimal)>, AdapterError> {
        Ok(self
            .state
            .lock()
            .positions
            .values()
            .map(|p| (p.symbol.clone(), p.side, p.quantity))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keryxflow_store::OrderKind;

    fn engine() -> PaperEngine {
        PaperEngine::new(PaperEngineConfig::default(), Arc::new(Store::in_memory()))
    }

    fn long_order(symbol: Symbol, qty: Decimal, stop: Decimal, target: Decimal) -> OrderIntent {
        OrderIntent::new(symbol, Side::Buy, qty, OrderKind::Market, Some(dec!(100)), Some(stop), Some(target), "client-1".into())
    }

    #[test]
    fn execute_applies_slippage_and_commission() {
        let engine = engine();
        let order = long_order(Symbol::new("BTC/USDT"), dec!(1), dec!(95), dec!(110));
        let position = engine.execute(&order, dec!(100)).unwrap();
        assert_eq!(position.entry_price, dec!(100) * (Decimal::ONE + DEFAULT_SLIPPAGE));
        assert!(engine.cash_free() < DEFAULT_INITIAL_BALANCE);
    }

    #[test]
    fn stop_triggers_close_at_stop_price_not_tick_price() {
        let engine = engine();
        let order = long_order(Symbol::new("BTC/USDT"), dec!(1), dec!(95), dec!(110));
        engine.execute(&order, dec!(100)).unwrap();

        let trade = engine.on_price_update(&Symbol::new("BTC/USDT"), dec!(80)).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Stop);
        assert_eq!(trade.exit_price, dec!(95) * (Decimal::ONE - DEFAULT_SLIPPAGE));
    }

    #[test]
    fn target_triggers_close_at_target_price() {
        let engine = engine();
        let order = long_order(Symbol::new("BTC/USDT"), dec!(1), dec!(95), dec!(110));
        engine.execute(&order, dec!(100)).unwrap();

        let trade = engine.on_price_update(&Symbol::new("BTC/USDT"), dec!(150)).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert_eq!(trade.exit_price, dec!(110) * (Decimal::ONE - DEFAULT_SLIPPAGE));
    }

    #[test]
    fn close_all_is_lex_ordered_and_closes_every_position() {
        let engine = engine();
        engine.execute(&long_order(Symbol::new("ETH/USDT"), dec!(1), dec!(90), dec!(120)), dec!(100)).unwrap();
        engine.execute(&long_order(Symbol::new("BTC/USDT"), dec!(1), dec!(90), dec!(120)), dec!(100)).unwrap();

        let trades = engine.close_all(|_| Some(dec!(100)), ExitReason::Panic);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].symbol, Symbol::new("BTC/USDT"));
        assert_eq!(trades[1].symbol, Symbol::new("ETH/USDT"));
    }

    #[test]
    fn insufficient_balance_rejects_execute() {
        let engine = engine();
        let order = long_order(Symbol::new("BTC/USDT"), dec!(1000), dec!(95), dec!(110));
        assert_eq!(engine.execute(&order, dec!(100)), Err(AdapterError::InsufficientBalance));
    }

    #[test]
    fn push_tick_without_a_subscriber_is_a_noop() {
        let engine = engine();
        assert!(!engine.push_tick(&Symbol::new("BTC/USDT"), dec!(100), dec!(1)));
    }

    #[tokio::test]
    async fn subscribed_symbol_receives_pushed_ticks() {
        use futures::StreamExt;

        let engine = engine();
        let symbol = Symbol::new("BTC/USDT");
        let mut stream = engine.subscribe_ticks(symbol.clone()).await.unwrap();

        assert!(engine.push_tick(&symbol, dec!(101.5), dec!(2)));
        let tick = stream.next().await.unwrap();
        assert_eq!(tick.price, dec!(101.5));
        assert_eq!(tick.volume, dec!(2));

        assert!(!engine.push_tick(&Symbol::new("ETH/USDT"), dec!(1), dec!(1)));
    }
}
