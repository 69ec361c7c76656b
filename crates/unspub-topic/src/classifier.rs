use std::fmt;

use serde_json::{Map, Value};
use unspub_schema::{Classification, SchemaName};

use crate::topic::Topic;

/// A substring test against the full topic path.
///
/// Patterns carry their leading slash so `pump-101/assets` matches `/asset`
/// while `subasset` does not.
#[derive(Debug, Clone, Copy)]
enum TopicRule {
    Contains(&'static str),
    ContainsWithout {
        pattern: &'static str,
        excluded: &'static str,
    },
}

impl TopicRule {
    fn matches(self, topic: &Topic) -> bool {
        let path = topic.as_str();
        match self {
            TopicRule::Contains(pattern) => path.contains(pattern),
            TopicRule::ContainsWithout { pattern, excluded } => {
                path.contains(pattern) && !path.contains(excluded)
            }
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            TopicRule::Contains(pattern) | TopicRule::ContainsWithout { pattern, .. } => pattern,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ShapeRule {
    Key(&'static str),
    AllKeys(&'static [&'static str]),
}

impl ShapeRule {
    fn matches(self, object: &Map<String, Value>) -> bool {
        match self {
            ShapeRule::Key(key) => object.contains_key(key),
            ShapeRule::AllKeys(keys) => keys.iter().all(|key| object.contains_key(*key)),
        }
    }

    fn matched(self) -> MatchedRule {
        match self {
            ShapeRule::Key(key) => MatchedRule::PayloadKey(key),
            ShapeRule::AllKeys(keys) => MatchedRule::PayloadKeys(keys),
        }
    }
}

// First match wins. Value buckets (`/edge/`, `/kpi/`, ...) must be a whole
// segment followed by more path; entity leaves (`/asset`, `/state`, ...) only
// need to start a segment. `/product` is also a prefix of `/production`, so
// the product rule excludes it and the order here is part of the contract.
const TOPIC_RULES: [(TopicRule, SchemaName); 11] = [
    (TopicRule::Contains("/edge/"), SchemaName::Reading),
    (TopicRule::Contains("/reading/"), SchemaName::Reading),
    (TopicRule::Contains("/measurement/"), SchemaName::Measurement),
    (TopicRule::Contains("/count/"), SchemaName::Count),
    (TopicRule::Contains("/kpi/"), SchemaName::Kpi),
    (TopicRule::Contains("/asset"), SchemaName::Asset),
    (TopicRule::Contains("/alert"), SchemaName::Alert),
    (TopicRule::Contains("/state"), SchemaName::State),
    (
        TopicRule::ContainsWithout {
            pattern: "/product",
            excluded: "/production",
        },
        SchemaName::Product,
    ),
    (TopicRule::Contains("/production"), SchemaName::Production),
    (TopicRule::Contains("/value"), SchemaName::Value),
];

const READING_KEYS: &[&str] = &["type", "value", "unit"];

const SHAPE_RULES: [(ShapeRule, SchemaName); 10] = [
    (ShapeRule::Key("assetId"), SchemaName::Asset),
    (ShapeRule::Key("alertId"), SchemaName::Alert),
    (ShapeRule::Key("stateId"), SchemaName::State),
    (ShapeRule::Key("measurementId"), SchemaName::Measurement),
    (ShapeRule::Key("countId"), SchemaName::Count),
    (ShapeRule::Key("kpiId"), SchemaName::Kpi),
    (ShapeRule::Key("productId"), SchemaName::Product),
    (ShapeRule::Key("productionId"), SchemaName::Production),
    (ShapeRule::Key("valueId"), SchemaName::Value),
    (ShapeRule::AllKeys(READING_KEYS), SchemaName::Reading),
];

/// The rule that decided a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedRule {
    TopicPattern(&'static str),
    PayloadKey(&'static str),
    PayloadKeys(&'static [&'static str]),
    None,
}

impl fmt::Display for MatchedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedRule::TopicPattern(pattern) => write!(f, "topic contains '{pattern}'"),
            MatchedRule::PayloadKey(key) => write!(f, "payload key '{key}'"),
            MatchedRule::PayloadKeys(keys) => write!(f, "payload keys '{}'", keys.join("', '")),
            MatchedRule::None => f.write_str("no rule matched"),
        }
    }
}

/// A classification together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Explanation {
    pub classification: Classification,
    pub rule: MatchedRule,
}

/// Decide which schema governs `payload` published on `topic`.
///
/// Topic patterns are consulted first; the payload's top-level keys only when
/// no topic rule matches.
pub fn classify(topic: &Topic, payload: &Value) -> Classification {
    explain(topic, payload).classification
}

/// Like [`classify`], also reporting which rule matched.
pub fn explain(topic: &Topic, payload: &Value) -> Explanation {
    if let Some((rule, name)) = TOPIC_RULES.iter().find(|(rule, _)| rule.matches(topic)) {
        return Explanation {
            classification: Classification::Resolved(*name),
            rule: MatchedRule::TopicPattern(rule.pattern()),
        };
    }

    if let Some(object) = payload.as_object() {
        if let Some((rule, name)) = SHAPE_RULES.iter().find(|(rule, _)| rule.matches(object)) {
            return Explanation {
                classification: Classification::Resolved(*name),
                rule: rule.matched(),
            };
        }
    }

    Explanation {
        classification: Classification::Unknown,
        rule: MatchedRule::None,
    }
}
