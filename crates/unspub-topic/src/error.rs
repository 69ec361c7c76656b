/// Errors raised while parsing or building topics.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopicError {
    /// A segment between two separators is empty.
    #[error("topic {topic:?} has an empty segment at position {position}")]
    EmptySegment { topic: String, position: usize },

    /// Publish topics must not carry MQTT wildcards.
    #[error("topic {topic:?} contains wildcard {wildcard:?}")]
    Wildcard { topic: String, wildcard: char },
}

pub type Result<T> = std::result::Result<T, TopicError>;
