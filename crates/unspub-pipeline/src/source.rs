use serde_json::Value;
use unspub_topic::Topic;

/// One payload waiting to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundItem {
    pub topic: Topic,
    pub payload: Value,
}

impl OutboundItem {
    pub fn new(topic: Topic, payload: Value) -> Self {
        Self { topic, payload }
    }
}

/// Produces the payloads for each publish cycle.
pub trait PayloadSource {
    /// Items for the next cycle, in publish order.
    fn next_cycle(&mut self) -> Vec<OutboundItem>;
}

impl PayloadSource for Vec<OutboundItem> {
    fn next_cycle(&mut self) -> Vec<OutboundItem> {
        self.clone()
    }
}
