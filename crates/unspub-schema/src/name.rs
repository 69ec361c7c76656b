use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SchemaError;

/// One of the fixed payload contracts of the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaName {
    Asset,
    Alert,
    State,
    Measurement,
    Count,
    Kpi,
    Product,
    Production,
    Reading,
    Value,
}

impl SchemaName {
    /// Every schema name, in load order.
    pub const ALL: [SchemaName; 10] = [
        SchemaName::Asset,
        SchemaName::Alert,
        SchemaName::State,
        SchemaName::Measurement,
        SchemaName::Count,
        SchemaName::Kpi,
        SchemaName::Product,
        SchemaName::Production,
        SchemaName::Reading,
        SchemaName::Value,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaName::Asset => "asset",
            SchemaName::Alert => "alert",
            SchemaName::State => "state",
            SchemaName::Measurement => "measurement",
            SchemaName::Count => "count",
            SchemaName::Kpi => "kpi",
            SchemaName::Product => "product",
            SchemaName::Production => "production",
            SchemaName::Reading => "reading",
            SchemaName::Value => "value",
        }
    }

    /// Conventional location of the document below the schema root,
    /// e.g. `measurement/measurement.json`.
    pub fn relative_path(self) -> PathBuf {
        let name = self.as_str();
        PathBuf::from(name).join(format!("{name}.json"))
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        SchemaName::ALL
            .into_iter()
            .find(|name| name.as_str() == lower)
            .ok_or_else(|| SchemaError::UnknownName(s.to_string()))
    }
}

/// Result of deciding which schema governs a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Resolved(SchemaName),
    Unknown,
}

impl Classification {
    pub fn schema(self) -> Option<SchemaName> {
        match self {
            Classification::Resolved(name) => Some(name),
            Classification::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Classification::Unknown)
    }
}

impl From<Option<SchemaName>> for Classification {
    fn from(name: Option<SchemaName>) -> Self {
        name.map_or(Classification::Unknown, Classification::Resolved)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Resolved(name) => name.fmt(f),
            Classification::Unknown => f.write_str("unknown"),
        }
    }
}
