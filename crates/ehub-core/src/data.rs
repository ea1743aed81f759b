//! The data-access surface consumed by model construction.
//!
//! An [`EnergyHubData`] bundles the topology (time steps, carriers, nodes,
//! technologies per node, networks) with per-node time series, per-technology
//! performance/economic data plus fit records, and per-network connection
//! matrices. Field names follow the case-file format:
//!
//! ```json
//! {
//!   "topology": {"timesteps": 24, "carriers": ["electricity"], "nodes": ["onshore"],
//!                "technologies": {"onshore": ["PV"]}},
//!   "node_data": {"onshore": {"demand": {"electricity": [10.0, ...]}, ...}},
//!   "technology_data": {"onshore": {"PV": {"TechnologyPerf": {...}, "Economics": {...}, "fit": {...}}}},
//!   "network_data": {}
//! }
//! ```
//!
//! All lookups return [`EhubResult`] and fail with
//! [`EhubError::MissingData`] naming the absent key; nothing is defaulted
//! silently.

use crate::error::{node_entity, EhubError, EhubResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Time series per carrier name.
pub type CarrierSeries = IndexMap<String, Vec<f64>>;

/// Node × node matrix keyed by node names (`matrix[from][to]`).
pub type NodeMatrix = IndexMap<String, IndexMap<String, f64>>;

fn default_timestep_length() -> f64 {
    1.0
}

/// Global sets of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Number of time steps T; steps are indexed 1..=T.
    pub timesteps: usize,
    #[serde(default = "default_timestep_length")]
    pub timestep_length_h: f64,
    pub carriers: Vec<String>,
    pub nodes: Vec<String>,
    /// Technologies installed or candidate at each node.
    #[serde(default)]
    pub technologies: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub networks: Vec<String>,
}

impl Topology {
    pub fn new(timesteps: usize, carriers: &[&str], nodes: &[&str]) -> Self {
        Self {
            timesteps,
            timestep_length_h: 1.0,
            carriers: carriers.iter().map(|c| c.to_string()).collect(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            technologies: IndexMap::new(),
            networks: Vec::new(),
        }
    }

    /// Technologies listed for a node (empty if the node lists none).
    pub fn technologies_at(&self, node: &str) -> &[String] {
        self.technologies
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// The node-level series a Node Block reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSeries {
    Demand,
    ImportPrices,
    ExportPrices,
    ImportLimit,
    ExportLimit,
    ImportEmissionFactors,
    ExportEmissionFactors,
}

impl NodeSeries {
    pub const ALL: [NodeSeries; 7] = [
        NodeSeries::Demand,
        NodeSeries::ImportPrices,
        NodeSeries::ExportPrices,
        NodeSeries::ImportLimit,
        NodeSeries::ExportLimit,
        NodeSeries::ImportEmissionFactors,
        NodeSeries::ExportEmissionFactors,
    ];

    /// Key of the series in the case file.
    pub fn key(self) -> &'static str {
        match self {
            NodeSeries::Demand => "demand",
            NodeSeries::ImportPrices => "import_prices",
            NodeSeries::ExportPrices => "export_prices",
            NodeSeries::ImportLimit => "import_limit",
            NodeSeries::ExportLimit => "export_limit",
            NodeSeries::ImportEmissionFactors => "import_emissionfactors",
            NodeSeries::ExportEmissionFactors => "export_emissionfactors",
        }
    }
}

/// Per-node time series, each keyed by carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub demand: CarrierSeries,
    #[serde(default)]
    pub import_prices: CarrierSeries,
    #[serde(default)]
    pub export_prices: CarrierSeries,
    #[serde(default)]
    pub import_limit: CarrierSeries,
    #[serde(default)]
    pub export_limit: CarrierSeries,
    #[serde(default)]
    pub import_emissionfactors: CarrierSeries,
    #[serde(default)]
    pub export_emissionfactors: CarrierSeries,
}

impl NodeData {
    pub fn series(&self, which: NodeSeries) -> &CarrierSeries {
        match which {
            NodeSeries::Demand => &self.demand,
            NodeSeries::ImportPrices => &self.import_prices,
            NodeSeries::ExportPrices => &self.export_prices,
            NodeSeries::ImportLimit => &self.import_limit,
            NodeSeries::ExportLimit => &self.export_limit,
            NodeSeries::ImportEmissionFactors => &self.import_emissionfactors,
            NodeSeries::ExportEmissionFactors => &self.export_emissionfactors,
        }
    }

    pub fn series_mut(&mut self, which: NodeSeries) -> &mut CarrierSeries {
        match which {
            NodeSeries::Demand => &mut self.demand,
            NodeSeries::ImportPrices => &mut self.import_prices,
            NodeSeries::ExportPrices => &mut self.export_prices,
            NodeSeries::ImportLimit => &mut self.import_limit,
            NodeSeries::ExportLimit => &mut self.export_limit,
            NodeSeries::ImportEmissionFactors => &mut self.import_emissionfactors,
            NodeSeries::ExportEmissionFactors => &mut self.export_emissionfactors,
        }
    }

    /// Fill every series of `carriers` with a constant over `timesteps` steps.
    pub fn constant(carriers: &[String], timesteps: usize, value: f64) -> Self {
        let mut data = NodeData::default();
        for which in NodeSeries::ALL {
            let series = data.series_mut(which);
            for car in carriers {
                series.insert(car.clone(), vec![value; timesteps]);
            }
        }
        data
    }
}

/// Behavioural family of a technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Renewable, output only, driven by a capacity factor.
    #[serde(rename = "RES")]
    Res,
    /// n inputs -> n outputs, fuel and output substitution.
    #[serde(rename = "CONV1")]
    Conv1,
    /// n inputs -> n outputs, fuel substitution.
    #[serde(rename = "CONV2")]
    Conv2,
    /// n inputs -> n outputs, no substitution.
    #[serde(rename = "CONV3")]
    Conv3,
    /// Single-carrier storage.
    #[serde(rename = "STOR")]
    Stor,
}

impl Archetype {
    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::Res => "RES",
            Archetype::Conv1 => "CONV1",
            Archetype::Conv2 => "CONV2",
            Archetype::Conv3 => "CONV3",
            Archetype::Stor => "STOR",
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A size limit given either as a single number or as a list of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeBound {
    Value(f64),
    List(Vec<f64>),
}

impl SizeBound {
    /// Smallest admissible value (used for `size_min`).
    pub fn lower(&self) -> Option<f64> {
        match self {
            SizeBound::Value(v) => Some(*v),
            SizeBound::List(values) => values.iter().copied().reduce(f64::min),
        }
    }

    /// Largest admissible value (used for `size_max`).
    pub fn upper(&self) -> Option<f64> {
        match self {
            SizeBound::Value(v) => Some(*v),
            SizeBound::List(values) => values.iter().copied().reduce(f64::max),
        }
    }
}

/// Technology performance options (`TechnologyPerf` in case files).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyPerformance {
    pub tec_type: Archetype,
    pub size_min: SizeBound,
    pub size_max: SizeBound,
    #[serde(default)]
    pub size_is_int: bool,
    #[serde(default)]
    pub input_carrier: Vec<String>,
    #[serde(default)]
    pub output_carrier: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_input_carrier: Option<String>,
    /// RES curtailment mode; absent means no curtailment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curtailment: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emission_factor: Option<f64>,
    /// Conversion performance function; only the linear fit through the origin (1) is modelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_function_type: Option<u8>,
}

/// Technology economics (`Economics` in case files).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    #[serde(rename = "CAPEX_model", default, skip_serializing_if = "Option::is_none")]
    pub capex_model: Option<u8>,
    #[serde(rename = "unit_CAPEX_annual", default, skip_serializing_if = "Option::is_none")]
    pub unit_capex_annual: Option<f64>,
    #[serde(rename = "OPEX_variable", default, skip_serializing_if = "Option::is_none")]
    pub opex_variable: Option<f64>,
    #[serde(rename = "OPEX_fixed", default, skip_serializing_if = "Option::is_none")]
    pub opex_fixed: Option<f64>,
}

/// Everything known about one technology at one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyData {
    #[serde(rename = "TechnologyPerf")]
    pub performance: TechnologyPerformance,
    #[serde(rename = "Economics")]
    pub economics: Economics,
    #[serde(default)]
    pub fit: FitRecord,
}

/// Performance coefficients produced by the fitting step, consumed verbatim.
///
/// The record is kept as raw JSON because its shape depends on the archetype;
/// the typed accessors below turn absent or malformed fields into errors that
/// name the technology and the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitRecord {
    fields: Map<String, Value>,
    /// Location of a nested record, used in error field names.
    #[serde(skip)]
    path: String,
}

impl FitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn field_name(&self, field: &str) -> String {
        if self.path.is_empty() {
            format!("fit.{field}")
        } else {
            format!("fit.{}.{field}", self.path)
        }
    }

    fn get(&self, entity: &str, field: &str) -> EhubResult<&Value> {
        self.fields
            .get(field)
            .ok_or_else(|| EhubError::missing(entity, self.field_name(field)))
    }

    /// A required scalar.
    pub fn number(&self, entity: &str, field: &str) -> EhubResult<f64> {
        let value = self.get(entity, field)?;
        value.as_f64().ok_or_else(|| {
            EhubError::invalid(
                entity,
                self.field_name(field),
                format!("expected a number, got {value}"),
            )
        })
    }

    /// An optional scalar; present but non-numeric is still an error.
    pub fn optional_number(&self, entity: &str, field: &str) -> EhubResult<Option<f64>> {
        if self.contains(field) {
            self.number(entity, field).map(Some)
        } else {
            Ok(None)
        }
    }

    /// An on/off option given as `0|1` or a boolean; absent means off.
    pub fn flag(&self, entity: &str, field: &str) -> EhubResult<bool> {
        match self.fields.get(field) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(value) => match value.as_f64() {
                Some(v) if v == 0.0 => Ok(false),
                Some(v) if v == 1.0 => Ok(true),
                _ => Err(EhubError::invalid(
                    entity,
                    self.field_name(field),
                    format!("expected 0 or 1, got {value}"),
                )),
            },
        }
    }

    /// A series with at least `len` numeric entries (entry `t` is used for step `t + 1`).
    pub fn series(&self, entity: &str, field: &str, len: usize) -> EhubResult<Vec<f64>> {
        let value = self.get(entity, field)?;
        let items = value.as_array().ok_or_else(|| {
            EhubError::invalid(entity, self.field_name(field), "expected a list of numbers")
        })?;
        if items.len() < len {
            return Err(EhubError::missing(
                entity,
                format!("{}[t={}]", self.field_name(field), items.len() + 1),
            ));
        }
        items
            .iter()
            .take(len)
            .enumerate()
            .map(|(i, v)| {
                v.as_f64().ok_or_else(|| {
                    EhubError::invalid(
                        entity,
                        format!("{}[t={}]", self.field_name(field), i + 1),
                        format!("expected a number, got {v}"),
                    )
                })
            })
            .collect()
    }

    /// A nested record (e.g. per output carrier of a conversion technology).
    pub fn record(&self, entity: &str, field: &str) -> EhubResult<FitRecord> {
        match self.get(entity, field)? {
            Value::Object(map) => Ok(FitRecord {
                fields: map.clone(),
                path: if self.path.is_empty() {
                    field.to_string()
                } else {
                    format!("{}.{field}", self.path)
                },
            }),
            other => Err(EhubError::invalid(
                entity,
                self.field_name(field),
                format!("expected an object, got {other}"),
            )),
        }
    }
}

/// Connection data of one network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    /// Carriers transported by the network.
    pub carriers: Vec<String>,
    /// 1 where a directed connection `from -> to` exists.
    #[serde(default)]
    pub connection: NodeMatrix,
    #[serde(default)]
    pub distance: NodeMatrix,
}

impl NetworkData {
    pub fn is_connected(&self, from: &str, to: &str) -> bool {
        self.connection
            .get(from)
            .and_then(|row| row.get(to))
            .is_some_and(|v| *v != 0.0)
    }

    pub fn distance(&self, from: &str, to: &str) -> Option<f64> {
        self.distance.get(from).and_then(|row| row.get(to)).copied()
    }

    /// Connect `a` and `b` in both directions.
    pub fn connect(&mut self, a: &str, b: &str, distance: f64) {
        for (from, to) in [(a, b), (b, a)] {
            self.connection
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string(), 1.0);
            self.distance
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string(), distance);
        }
    }
}

/// The complete input of one model construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyHubData {
    pub topology: Topology,
    #[serde(default)]
    pub node_data: IndexMap<String, NodeData>,
    #[serde(default)]
    pub technology_data: IndexMap<String, IndexMap<String, TechnologyData>>,
    #[serde(default)]
    pub network_data: IndexMap<String, NetworkData>,
}

impl EnergyHubData {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            node_data: IndexMap::new(),
            technology_data: IndexMap::new(),
            network_data: IndexMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> EhubResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> EhubResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Register a technology at a node, listing it in the topology as well.
    pub fn insert_technology(&mut self, node: &str, name: &str, data: TechnologyData) {
        let listed = self
            .topology
            .technologies
            .entry(node.to_string())
            .or_default();
        if !listed.iter().any(|t| t == name) {
            listed.push(name.to_string());
        }
        self.technology_data
            .entry(node.to_string())
            .or_default()
            .insert(name.to_string(), data);
    }

    pub fn node(&self, node: &str) -> EhubResult<&NodeData> {
        self.node_data
            .get(node)
            .ok_or_else(|| EhubError::missing(node_entity(node), "node_data"))
    }

    /// Value of a node series at time step `t` (1-based).
    pub fn node_value(&self, node: &str, which: NodeSeries, car: &str, t: usize) -> EhubResult<f64> {
        let series = self
            .node(node)?
            .series(which)
            .get(car)
            .ok_or_else(|| EhubError::missing(node_entity(node), format!("{}[{car}]", which.key())))?;
        t.checked_sub(1)
            .and_then(|i| series.get(i))
            .copied()
            .ok_or_else(|| {
                EhubError::missing(node_entity(node), format!("{}[{car}][t={t}]", which.key()))
            })
    }

    pub fn technology(&self, node: &str, technology: &str) -> EhubResult<&TechnologyData> {
        self.technology_data
            .get(node)
            .and_then(|tecs| tecs.get(technology))
            .ok_or_else(|| {
                EhubError::missing(
                    node_entity(node),
                    format!("technology_data[{technology}]"),
                )
            })
    }

    pub fn network(&self, name: &str) -> EhubResult<&NetworkData> {
        self.network_data
            .get(name)
            .ok_or_else(|| EhubError::missing(format!("network '{name}'"), "network_data"))
    }
}
