use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TopicError};

const SEPARATOR: char = '/';

/// A concrete, lower-case publish topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    path: String,
    segments: Vec<String>,
}

impl Topic {
    /// Parse a slash-delimited topic, normalizing it to lower case.
    pub fn parse(topic: &str) -> Result<Self> {
        Self::from_segments(topic.split(SEPARATOR))
    }

    fn from_segments<'a>(parts: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut segments = Vec::new();
        for (position, part) in parts.into_iter().enumerate() {
            let segment = part.trim().to_lowercase();
            if segment.is_empty() {
                return Err(TopicError::EmptySegment {
                    topic: segments.join("/"),
                    position,
                });
            }
            if let Some(wildcard) = segment.chars().find(|c| matches!(c, '+' | '#')) {
                return Err(TopicError::Wildcard {
                    topic: segments.join("/"),
                    wildcard,
                });
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(TopicError::EmptySegment {
                topic: String::new(),
                position: 0,
            });
        }

        Ok(Self {
            path: segments.join("/"),
            segments,
        })
    }

    /// Append one or more slash-delimited segments.
    pub fn join(&self, suffix: &str) -> Result<Self> {
        Self::from_segments(
            self.segments
                .iter()
                .map(String::as_str)
                .chain(suffix.split(SEPARATOR)),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment of the topic.
    pub fn leaf(&self) -> &str {
        // Construction guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// The fixed `enterprise/site/area/line/cell` head of every topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPrefix {
    pub enterprise: String,
    pub site: String,
    pub area: String,
    pub line: String,
    pub cell: String,
}

impl TopicPrefix {
    pub fn to_topic(&self) -> Result<Topic> {
        Topic::from_segments([
            self.enterprise.as_str(),
            self.site.as_str(),
            self.area.as_str(),
            self.line.as_str(),
            self.cell.as_str(),
        ])
    }

    /// Topics for one asset below this prefix.
    pub fn asset(&self, asset_name: &str) -> Result<AssetTopics> {
        Ok(AssetTopics {
            base: self.to_topic()?.join(asset_name)?,
        })
    }
}

/// Topic factory rooted at one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTopics {
    base: Topic,
}

impl AssetTopics {
    pub fn base(&self) -> &Topic {
        &self.base
    }

    /// `<base>/<leaf>`, e.g. `.../pump-101/state`.
    pub fn leaf(&self, leaf: &str) -> Result<Topic> {
        self.base.join(leaf)
    }

    /// `<base>/<bucket>/<leaf>`, e.g. `.../pump-101/kpi/oee/availability`.
    pub fn value(&self, bucket: &str, leaf: &str) -> Result<Topic> {
        self.base.join(bucket)?.join(leaf)
    }
}
