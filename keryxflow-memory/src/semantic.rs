//! Semantic store: learned rules and market patterns, each
//! carrying simple application counters. Rule activation is a flag;
//! pattern accuracy is `times_correct / times_identified`.

use chrono::Utc;
use keryxflow_store::{MarketPattern, PatternId, RuleId, RuleSource, Store, TradingRule};
use rust_decimal::Decimal;

/// Create and persist a new rule, active by default.
pub fn learn_rule(store: &Store, text: impl Into<String>, rationale: impl Into<String>, source: RuleSource) -> TradingRule {
    let rule = TradingRule {
        id: RuleId::new(),
        text: text.into(),
        rationale: rationale.into(),
        source,
        times_applied: 0,
        times_helpful: 0,
        active: true,
        created_at: Utc::now(),
    };
    store.upsert_rule(rule.clone()).ok();
    rule
}

/// Record that `rule` was applied to a decision, optionally marking it
/// helpful once the outcome is known.
pub fn record_application(store: &Store, mut rule: TradingRule, was_helpful: bool) -> TradingRule {
    rule.times_applied += 1;
    if was_helpful {
        rule.times_helpful += 1;
    }
    store.upsert_rule(rule.clone()).ok();
    rule
}

pub fn deactivate(store: &Store, mut rule: TradingRule) -> TradingRule {
    rule.active = false;
    store.upsert_rule(rule.clone()).ok();
    rule
}

/// Record a new pattern the first time it's identified.
pub fn identify_pattern(store: &Store, name: impl Into<String>, conditions: serde_json::Value, expected_outcome: impl Into<String>) -> MarketPattern {
    let pattern = MarketPattern {
        id: PatternId::new(),
        name: name.into(),
        conditions,
        expected_outcome: expected_outcome.into(),
        times_identified: 1,
        times_correct: 0,
        avg_return_when_correct: Decimal::ZERO,
        last_seen: Utc::now(),
    };
    store.upsert_pattern(pattern.clone()).ok();
    pattern
}

/// Record a subsequent sighting of an already-known pattern, updating its
/// accuracy counters and (if `realized_return` is given, i.e. the pattern
/// played out correctly) the running average return.
pub fn record_sighting(store: &Store, mut pattern: MarketPattern, realized_return: Option<Decimal>) -> MarketPattern {
    pattern.times_identified += 1;
    pattern.last_seen = Utc::now();
    if let Some(realized_return) = realized_return {
        let prior_correct = Decimal::from(pattern.times_correct);
        pattern.times_correct += 1;
        pattern.avg_return_when_correct =
            (pattern.avg_return_when_correct * prior_correct + realized_return) / Decimal::from(pattern.times_correct);
    }
    store.upsert_pattern(pattern.clone()).ok();
    pattern
}
