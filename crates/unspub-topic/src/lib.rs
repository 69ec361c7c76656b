//! UNS topic paths and topic-to-schema classification.
//!
//! Topics follow `enterprise/site/area/line/cell/asset/[bucket/]leaf`.
//! The classifier maps a topic (and, failing that, the payload shape) to the
//! schema that governs the payload.

pub mod classifier;
pub mod error;
pub mod topic;

pub use classifier::{classify, explain, Explanation, MatchedRule};
pub use error::{Result, TopicError};
pub use topic::{AssetTopics, Topic, TopicPrefix};
