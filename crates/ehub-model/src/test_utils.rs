//! Case fixtures shared by unit and integration tests.

use ehub_core::{
    Archetype, EnergyHubData, Economics, FitRecord, NodeData, NodeSeries, SizeBound,
    TechnologyData, TechnologyPerformance, Topology,
};
use serde_json::json;

/// Node series for `carriers`: no demand, free and unlimited exchange, no emissions.
pub fn open_node(carriers: &[String], timesteps: usize) -> NodeData {
    let mut node = NodeData::constant(carriers, timesteps, 0.0);
    for which in [NodeSeries::ImportLimit, NodeSeries::ExportLimit] {
        for series in node.series_mut(which).values_mut() {
            series.iter_mut().for_each(|v| *v = 1000.0);
        }
    }
    node
}

/// Set every step of `which` for `carrier` to `value`.
pub fn set_series(node: &mut NodeData, which: NodeSeries, carrier: &str, value: f64) {
    if let Some(series) = node.series_mut(which).get_mut(carrier) {
        series.iter_mut().for_each(|v| *v = value);
    }
}

fn economics(unit_capex: f64) -> Economics {
    Economics {
        capex_model: Some(1),
        unit_capex_annual: Some(unit_capex),
        opex_variable: Some(0.0),
        opex_fixed: Some(0.0),
    }
}

fn performance(tec_type: Archetype, size_min: f64, size_max: f64) -> TechnologyPerformance {
    TechnologyPerformance {
        tec_type,
        size_min: SizeBound::Value(size_min),
        size_max: SizeBound::Value(size_max),
        size_is_int: false,
        input_carrier: Vec::new(),
        output_carrier: Vec::new(),
        main_input_carrier: None,
        curtailment: None,
        emission_factor: Some(0.0),
        performance_function_type: None,
    }
}

/// Parameters of the single-node renewable case.
#[derive(Debug, Clone)]
pub struct ResCase {
    pub timesteps: usize,
    pub capacity_factor: f64,
    /// Fixed size (`size_min = size_max`).
    pub size: f64,
    pub curtailment: Option<u8>,
    pub size_is_int: bool,
    pub rated_power: f64,
    pub unit_capex: f64,
    pub demand: f64,
}

impl Default for ResCase {
    fn default() -> Self {
        Self {
            timesteps: 2,
            capacity_factor: 0.5,
            size: 10.0,
            curtailment: None,
            size_is_int: false,
            rated_power: 1.0,
            unit_capex: 100.0,
            demand: 1.0,
        }
    }
}

pub fn res_technology(case: &ResCase) -> TechnologyData {
    let mut performance = performance(Archetype::Res, case.size, case.size);
    performance.output_carrier = vec!["electricity".into()];
    performance.curtailment = case.curtailment;
    performance.size_is_int = case.size_is_int;
    TechnologyData {
        performance,
        economics: economics(case.unit_capex),
        fit: FitRecord::new()
            .with("capacity_factor", json!(vec![case.capacity_factor; case.timesteps]))
            .with("rated_power", json!(case.rated_power)),
    }
}

/// Gas boiler: gas in, heat out with efficiency `alpha1`.
pub fn conv2_technology(alpha1: f64, size_max: f64) -> TechnologyData {
    let mut performance = performance(Archetype::Conv2, 0.0, size_max);
    performance.input_carrier = vec!["gas".into()];
    performance.output_carrier = vec!["heat".into()];
    performance.main_input_carrier = Some("gas".into());
    performance.emission_factor = Some(0.2);
    TechnologyData {
        performance,
        economics: economics(50.0),
        fit: FitRecord::new().with("heat", json!({ "alpha1": alpha1 })),
    }
}

/// Parameters of an electricity storage.
#[derive(Debug, Clone)]
pub struct StorCase {
    pub timesteps: usize,
    pub eta_in: f64,
    pub eta_out: f64,
    pub lambda: f64,
    pub ambient_loss: f64,
    pub size_max: f64,
    pub one_direction: bool,
}

impl Default for StorCase {
    fn default() -> Self {
        Self {
            timesteps: 3,
            eta_in: 0.9,
            eta_out: 0.9,
            lambda: 0.01,
            ambient_loss: 0.0,
            size_max: 100.0,
            one_direction: false,
        }
    }
}

pub fn stor_technology(case: &StorCase) -> TechnologyData {
    let mut performance = performance(Archetype::Stor, 0.0, case.size_max);
    performance.input_carrier = vec!["electricity".into()];
    performance.output_carrier = vec!["electricity".into()];
    performance.main_input_carrier = Some("electricity".into());
    TechnologyData {
        performance,
        economics: economics(20.0),
        fit: FitRecord::new()
            .with("eta_in", json!(case.eta_in))
            .with("eta_out", json!(case.eta_out))
            .with("lambda", json!(case.lambda))
            .with("charge_max", json!(0.5))
            .with("discharge_max", json!(0.5))
            .with("ambient_loss_factor", json!(vec![case.ambient_loss; case.timesteps]))
            .with("allow_only_one_direction", json!(u8::from(case.one_direction))),
    }
}

/// One node `onshore`, carrier `electricity`, technology `PV`.
pub fn res_case(case: ResCase) -> EnergyHubData {
    let topology = Topology::new(case.timesteps, &["electricity"], &["onshore"]);
    let mut data = EnergyHubData::new(topology);
    let mut node = open_node(&data.topology.carriers, case.timesteps);
    set_series(&mut node, NodeSeries::Demand, "electricity", case.demand);
    data.node_data.insert("onshore".into(), node);
    data.insert_technology("onshore", "PV", res_technology(&case));
    data
}

/// One node `onshore` with carriers `electricity`, `gas`, `heat` and no technologies.
pub fn empty_case(timesteps: usize) -> EnergyHubData {
    let topology = Topology::new(timesteps, &["electricity", "gas", "heat"], &["onshore"]);
    let mut data = EnergyHubData::new(topology);
    let node = open_node(&data.topology.carriers, timesteps);
    data.node_data.insert("onshore".into(), node);
    data
}
