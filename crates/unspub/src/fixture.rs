//! Synthetic payload catalog for the pump-station and tank-area demos.
//!
//! The catalog is deliberately small: a handful of assets per profile, each
//! publishing the five asset-level documents and a few value series. Numbers
//! are base values with a uniform ±3 % jitter when simulation is enabled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use unspub_pipeline::{OutboundItem, PayloadSource};
use unspub_topic::{Topic, TopicError, TopicPrefix};

const JITTER: f64 = 0.03;

/// Which demo site to simulate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Profile {
    #[default]
    Pump,
    Tank,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Pump => "pump",
            Profile::Tank => "tank",
        }
    }

    /// Cell segment used when none is configured.
    pub fn default_cell(self) -> &'static str {
        match self {
            Profile::Pump => "pump-station",
            Profile::Tank => "tank-area",
        }
    }

    fn catalog(self) -> &'static Catalog {
        match self {
            Profile::Pump => &PUMP_STATION,
            Profile::Tank => &TANK_AREA,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pump" => Ok(Profile::Pump),
            "tank" => Ok(Profile::Tank),
            other => Err(format!("unknown profile '{other}' (expected pump or tank)")),
        }
    }
}

struct Reference {
    id: i64,
    name: &'static str,
    description: &'static str,
}

impl Reference {
    fn to_json(&self) -> Value {
        json!({ "id": self.id, "name": self.name, "description": self.description })
    }
}

struct AssetSpec {
    id: i64,
    name: &'static str,
    description: &'static str,
}

struct StateSpec {
    kind: Reference,
    color: &'static str,
}

struct AlertSpec {
    severity: u8,
    code: &'static str,
    message: &'static str,
}

struct SeriesSpec {
    id: i64,
    name: &'static str,
    leaf: &'static str,
    unit: &'static str,
    base: f64,
}

struct Catalog {
    assets: &'static [AssetSpec],
    asset_type: Reference,
    parent: Reference,
    states: &'static [StateSpec],
    alerts: &'static [AlertSpec],
    product: Reference,
    family: Reference,
    measurements: &'static [SeriesSpec],
    counts: &'static [SeriesSpec],
    kpis: &'static [SeriesSpec],
    oee: &'static [SeriesSpec],
    edge: &'static [SeriesSpec],
}

const fn reference(id: i64, name: &'static str, description: &'static str) -> Reference {
    Reference {
        id,
        name,
        description,
    }
}

const fn series(
    id: i64,
    name: &'static str,
    leaf: &'static str,
    unit: &'static str,
    base: f64,
) -> SeriesSpec {
    SeriesSpec {
        id,
        name,
        leaf,
        unit,
        base,
    }
}

const fn state(id: i64, name: &'static str, description: &'static str, color: &'static str) -> StateSpec {
    StateSpec {
        kind: reference(id, name, description),
        color,
    }
}

static PUMP_STATION: Catalog = Catalog {
    assets: &[
        AssetSpec {
            id: 101,
            name: "Pump-101",
            description: "Centrifugal water pump for cooling system",
        },
        AssetSpec {
            id: 102,
            name: "Pump-102",
            description: "Centrifugal water pump for cooling system",
        },
        AssetSpec {
            id: 103,
            name: "Pump-103",
            description: "Centrifugal water pump for cooling system",
        },
    ],
    asset_type: reference(1, "Centrifugal Pump", "Centrifugal pump equipment"),
    parent: reference(22, "Pump Station 1", "Primary water pump station"),
    states: &[
        state(1, "Running", "Equipment is operating normally", "#00FF00"),
        state(2, "Starting", "Equipment startup sequence", "#FFFF00"),
        state(3, "Stopping", "Equipment shutdown sequence", "#FFA500"),
        state(4, "Fault", "Equipment fault condition", "#FF0000"),
    ],
    alerts: &[
        AlertSpec {
            severity: 2,
            code: "TEMP_WARN",
            message: "Pump bearing temperature approaching warning threshold",
        },
        AlertSpec {
            severity: 1,
            code: "MAINT_DUE",
            message: "Pump maintenance due within 100 hours",
        },
        AlertSpec {
            severity: 3,
            code: "PRESSURE_HIGH",
            message: "Pump discharge pressure exceeds safety limit",
        },
    ],
    product: reference(1, "Cooling Water", "Process cooling water for heat exchange systems"),
    family: reference(1, "Utilities", "Utility products and services"),
    measurements: &[
        series(1, "Bearing Temperature", "bearing-temperature", "°C", 72.5),
        series(2, "Vibration Analysis", "vibration-analysis", "mm/s", 1.8),
        series(3, "Insulation Resistance", "insulation-resistance", "MΩ", 850.0),
    ],
    counts: &[
        series(1, "Water Delivered", "water-delivered", "m³", 473.0),
        series(2, "Runtime Hours", "runtime-hours", "hours", 1250.0),
        series(3, "Starts", "starts", "count", 150.0),
    ],
    kpis: &[
        series(1, "Pump Efficiency", "efficiency", "%", 96.5),
        series(2, "Energy Efficiency", "energy-efficiency", "kWh/m³", 0.115),
    ],
    oee: &[
        series(4, "Availability", "availability", "%", 98.2),
        series(5, "Performance", "performance", "%", 95.5),
        series(6, "Quality", "quality", "%", 99.8),
        series(7, "OEE", "oee", "%", 94.5),
    ],
    edge: &[
        series(1, "Temperature", "temperature", "°C", 72.5),
        series(2, "Pressure", "pressure", "bar", 7.2),
        series(3, "Flow", "flow", "m³/h", 42.8),
        series(5, "Current", "current", "A", 9.2),
    ],
};

static TANK_AREA: Catalog = Catalog {
    assets: &[
        AssetSpec {
            id: 201,
            name: "Tank-201",
            description: "Raw water storage tank for process supply",
        },
        AssetSpec {
            id: 202,
            name: "Tank-202",
            description: "Treated water tank for distribution",
        },
    ],
    asset_type: reference(2, "Water Tank", "Water storage tank equipment"),
    parent: reference(31, "Tank Area 1", "Primary water tank area"),
    states: &[
        state(1, "Filling", "Tank is filling", "#00BFFF"),
        state(2, "Holding", "Tank level is stable", "#00FF00"),
        state(3, "Draining", "Tank is draining", "#FFD700"),
        state(4, "Low Level", "Tank water level is low", "#FF4500"),
    ],
    alerts: &[
        AlertSpec {
            severity: 2,
            code: "LEVEL_LOW",
            message: "Tank water level below minimum threshold",
        },
        AlertSpec {
            severity: 1,
            code: "MAINT_DUE",
            message: "Tank maintenance due within 50 hours",
        },
        AlertSpec {
            severity: 3,
            code: "QUALITY_ALARM",
            message: "Water quality exceeds alarm threshold",
        },
    ],
    product: reference(2, "Process Water", "Treated water for process supply"),
    family: reference(1, "Utilities", "Utility products and services"),
    measurements: &[
        series(1, "Water Level", "water-level", "m", 3.8),
        series(3, "pH", "ph", "pH", 7.2),
        series(4, "Conductivity", "conductivity", "µS/cm", 320.0),
    ],
    counts: &[
        series(1, "Total Inflow", "total-inflow", "m³", 12000.0),
        series(3, "Fill Cycles", "fill-cycles", "count", 45.0),
    ],
    kpis: &[
        series(1, "Fill Efficiency", "fill-efficiency", "%", 97.5),
        series(3, "Water Quality Index", "quality-index", "index", 98.8),
    ],
    oee: &[],
    edge: &[
        series(1, "Inflow Rate", "inflow-rate", "m³/h", 38.5),
        series(2, "Outflow Rate", "outflow-rate", "m³/h", 36.2),
        series(4, "Pressure", "pressure", "bar", 1.2),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Asset,
    State,
    Alert,
    Product,
    Production,
    Measurement(usize),
    Count(usize),
    Kpi(usize),
    Oee(usize),
    Edge(usize),
}

#[derive(Debug, Clone)]
struct PlannedItem {
    asset: usize,
    topic: Topic,
    kind: PayloadKind,
}

/// [`PayloadSource`] producing one sweep over every asset of a profile.
pub struct FixtureSource {
    profile: Profile,
    simulation: bool,
    plan: Vec<PlannedItem>,
    cycle: u64,
    rng: StdRng,
}

impl FixtureSource {
    pub fn new(profile: Profile, prefix: &TopicPrefix, simulation: bool) -> Result<Self, TopicError> {
        Self::with_rng(profile, prefix, simulation, StdRng::from_entropy())
    }

    /// Like [`FixtureSource::new`] with a fixed jitter seed.
    pub fn with_seed(
        profile: Profile,
        prefix: &TopicPrefix,
        simulation: bool,
        seed: u64,
    ) -> Result<Self, TopicError> {
        Self::with_rng(profile, prefix, simulation, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        profile: Profile,
        prefix: &TopicPrefix,
        simulation: bool,
        rng: StdRng,
    ) -> Result<Self, TopicError> {
        let catalog = profile.catalog();
        let mut plan = Vec::new();

        for (asset, entry) in catalog.assets.iter().enumerate() {
            let topics = prefix.asset(entry.name)?;
            let mut push = |topic: Topic, kind: PayloadKind| {
                plan.push(PlannedItem { asset, topic, kind });
            };

            push(topics.leaf("asset")?, PayloadKind::Asset);
            push(topics.leaf("state")?, PayloadKind::State);
            push(topics.leaf("alert")?, PayloadKind::Alert);
            push(topics.leaf("product")?, PayloadKind::Product);
            push(topics.leaf("production")?, PayloadKind::Production);
            for (i, s) in catalog.measurements.iter().enumerate() {
                push(topics.value("measurement", s.leaf)?, PayloadKind::Measurement(i));
            }
            for (i, s) in catalog.counts.iter().enumerate() {
                push(topics.value("count", s.leaf)?, PayloadKind::Count(i));
            }
            for (i, s) in catalog.kpis.iter().enumerate() {
                push(topics.value("kpi", s.leaf)?, PayloadKind::Kpi(i));
            }
            for (i, s) in catalog.oee.iter().enumerate() {
                push(topics.value("kpi", &format!("oee/{}", s.leaf))?, PayloadKind::Oee(i));
            }
            for (i, s) in catalog.edge.iter().enumerate() {
                push(topics.value("edge", s.leaf)?, PayloadKind::Edge(i));
            }
        }

        Ok(Self {
            profile,
            simulation,
            plan,
            cycle: 0,
            rng,
        })
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Asset names in publish order.
    pub fn asset_names(&self) -> Vec<&'static str> {
        self.profile.catalog().assets.iter().map(|a| a.name).collect()
    }

    /// Every topic a cycle publishes to, in publish order.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.plan.iter().map(|item| &item.topic)
    }

    fn vary(&mut self, base: f64) -> f64 {
        if !self.simulation {
            return base;
        }
        let factor = self.rng.gen_range(-JITTER..=JITTER);
        round(base * (1.0 + factor), 3)
    }

    fn build(&mut self, item: &PlannedItem, now: &DateTime<Utc>) -> Value {
        let catalog = self.profile.catalog();
        let asset = &catalog.assets[item.asset];
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let asset_ref = json!({ "id": asset.id, "name": asset.name, "description": asset.description });
        let uri = item.topic.as_str();
        let rotation = (self.cycle as usize).wrapping_add(item.asset);

        match item.kind {
            PayloadKind::Asset => json!({
                "timestamp": timestamp,
                "id": asset.id,
                "name": asset.name,
                "description": asset.description,
                "assetType": catalog.asset_type.to_json(),
                "parentAsset": catalog.parent.to_json(),
                "metadata": { "source": "asset-management", "uri": format!("asset://{}", asset.id) }
            }),
            PayloadKind::State => {
                let current = &catalog.states[rotation % catalog.states.len()];
                let previous =
                    &catalog.states[(rotation + catalog.states.len() - 1) % catalog.states.len()];
                json!({
                    "timestamp": timestamp,
                    "description": format!("{} is {}", asset.name, current.kind.name.to_lowercase()),
                    "color": current.color,
                    "type": current.kind.to_json(),
                    "metadata": {
                        "source": "plc-controller",
                        "uri": uri,
                        "asset": asset_ref,
                        "previousState": {
                            "id": previous.kind.id,
                            "name": previous.kind.name,
                            "description": previous.kind.description,
                            "color": previous.color,
                            "type": previous.kind.to_json()
                        }
                    }
                })
            }
            PayloadKind::Alert => {
                let alert = &catalog.alerts[rotation % catalog.alerts.len()];
                let acknowledged = rotation % 2 == 1;
                json!({
                    "timestamp": timestamp,
                    "severity": alert.severity,
                    "code": alert.code,
                    "message": alert.message,
                    "metadata": {
                        "source": "monitoring-system",
                        "uri": uri,
                        "asset": asset_ref,
                        "acknowledgment": {
                            "acknowledged": acknowledged,
                            "acknowledgedBy": acknowledged.then_some("operator"),
                            "acknowledgedAt": acknowledged.then(|| timestamp.clone())
                        }
                    }
                })
            }
            PayloadKind::Product => json!({
                "timestamp": timestamp,
                "id": catalog.product.id,
                "name": catalog.product.name,
                "description": catalog.product.description,
                "family": catalog.family.to_json(),
                "metadata": { "source": "product-management", "uri": uri, "asset": asset_ref }
            }),
            PayloadKind::Production => {
                let counts: Vec<Value> = catalog
                    .counts
                    .iter()
                    .take(2)
                    .map(|s| {
                        json!({
                            "type": { "id": s.id, "name": s.name, "unit": s.unit },
                            "quantity": self.vary(s.base / 100.0),
                            "timestamp": timestamp
                        })
                    })
                    .collect();
                json!({
                    "timestamp": timestamp,
                    "start_ts": timestamp,
                    "end_ts": null,
                    "counts": counts,
                    "metadata": {
                        "source": "production-tracker",
                        "uri": uri,
                        "asset": asset_ref,
                        "product": catalog.product.to_json()
                    }
                })
            }
            PayloadKind::Measurement(i) => {
                let s = &catalog.measurements[i];
                let value = self.vary(s.base);
                let tolerance = round(s.base * 0.05, 3);
                json!({
                    "timestamp": timestamp,
                    "type": { "id": s.id, "name": s.name },
                    "value": value,
                    "unit": s.unit,
                    "target": s.base,
                    "tolerance": tolerance,
                    "inTolerance": (value - s.base).abs() <= tolerance,
                    "metadata": { "source": "maintenance-system", "uri": uri, "asset": asset_ref },
                    "product": catalog.product.to_json()
                })
            }
            PayloadKind::Count(i) => {
                let s = &catalog.counts[i];
                let step = self.vary(s.base / 1000.0);
                json!({
                    "timestamp": timestamp,
                    "type": { "id": s.id, "name": s.name },
                    "value": round(s.base + step * self.cycle as f64, 3),
                    "unit": s.unit,
                    "metadata": {
                        "source": "counter-system",
                        "uri": uri,
                        "asset": asset_ref,
                        "product": { "id": catalog.product.id, "name": catalog.product.name }
                    }
                })
            }
            PayloadKind::Kpi(i) | PayloadKind::Oee(i) => {
                let s = match item.kind {
                    PayloadKind::Oee(_) => &catalog.oee[i],
                    _ => &catalog.kpis[i],
                };
                json!({
                    "timestamp": timestamp,
                    "type": { "id": s.id, "name": s.name },
                    "value": self.vary(s.base),
                    "unit": s.unit,
                    "product": catalog.product.to_json(),
                    "metadata": { "source": "kpi-engine", "uri": uri, "asset": asset_ref }
                })
            }
            PayloadKind::Edge(i) => {
                let s = &catalog.edge[i];
                json!({
                    "timestamp": timestamp,
                    "type": { "id": s.id, "name": s.name },
                    "value": self.vary(s.base),
                    "unit": s.unit,
                    "metadata": {
                        "source": format!("{}-sensor", s.leaf),
                        "uri": uri,
                        "asset": asset_ref
                    }
                })
            }
        }
    }
}

impl PayloadSource for FixtureSource {
    fn next_cycle(&mut self) -> Vec<OutboundItem> {
        let now = Utc::now();
        let plan = std::mem::take(&mut self.plan);
        let items = plan
            .iter()
            .map(|item| OutboundItem::new(item.topic.clone(), self.build(item, &now)))
            .collect();
        self.plan = plan;
        self.cycle += 1;
        items
    }
}

fn round(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}
