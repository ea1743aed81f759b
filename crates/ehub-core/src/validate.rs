//! Pre-flight checks of a case.
//!
//! [`validate`] walks the whole data surface and reports every problem it
//! finds as a [`Diagnostics`] collection. Model construction would stop at the
//! first of the errors reported here.

use crate::data::{Archetype, EnergyHubData, NodeSeries};
use crate::diagnostics::Diagnostics;
use crate::error::{node_entity, technology_entity};

/// Check a case for structural problems before building a model.
pub fn validate(data: &EnergyHubData) -> Diagnostics {
    let mut diag = Diagnostics::new();
    let topology = &data.topology;

    if topology.timesteps == 0 {
        diag.add_error("topology", "timesteps must be at least 1");
    }
    if topology.timestep_length_h.is_nan() || topology.timestep_length_h <= 0.0 {
        diag.add_error(
            "topology",
            &format!(
                "timestep_length_h must be positive, got {}",
                topology.timestep_length_h
            ),
        );
    }

    for node in &topology.nodes {
        check_node(data, node, &mut diag);
    }
    for node in topology.technologies.keys() {
        if !topology.nodes.contains(node) {
            diag.add_error_with_entity(
                "reference",
                "technologies listed for a node missing from topology.nodes",
                &node_entity(node),
            );
        }
    }
    for (node, tecs) in &topology.technologies {
        for tec in tecs {
            check_technology(data, node, tec, &mut diag);
        }
    }
    for netw in &topology.networks {
        check_network(data, netw, &mut diag);
    }

    diag
}

fn check_node(data: &EnergyHubData, node: &str, diag: &mut Diagnostics) {
    let entity = node_entity(node);
    let Some(node_data) = data.node_data.get(node) else {
        diag.add_error_with_entity("reference", "no node_data entry", &entity);
        return;
    };
    let timesteps = data.topology.timesteps;

    for which in NodeSeries::ALL {
        let series = node_data.series(which);
        for car in &data.topology.carriers {
            match series.get(car) {
                None => diag.add_error_with_entity(
                    "series",
                    &format!("{}[{car}] is missing", which.key()),
                    &entity,
                ),
                Some(values) if values.len() < timesteps => diag.add_error_with_entity(
                    "series",
                    &format!(
                        "{}[{car}] has {} values, expected {timesteps}",
                        which.key(),
                        values.len()
                    ),
                    &entity,
                ),
                Some(values) => {
                    let limit = matches!(which, NodeSeries::ImportLimit | NodeSeries::ExportLimit);
                    if limit && values.iter().any(|v| *v < 0.0) {
                        diag.add_error_with_entity(
                            "range",
                            &format!("{}[{car}] contains negative limits", which.key()),
                            &entity,
                        );
                    }
                }
            }
        }
        for car in series.keys() {
            if !data.topology.carriers.contains(car) {
                diag.add_warning_with_entity(
                    "carrier",
                    &format!("{}[{car}] refers to an unknown carrier", which.key()),
                    &entity,
                );
            }
        }
    }
}

fn check_technology(data: &EnergyHubData, node: &str, tec: &str, diag: &mut Diagnostics) {
    let entity = technology_entity(node, tec);
    let Ok(tec_data) = data.technology(node, tec) else {
        diag.add_error_with_entity("reference", "no technology_data entry", &entity);
        return;
    };
    let perf = &tec_data.performance;
    let carriers = &data.topology.carriers;

    for car in perf.input_carrier.iter().chain(&perf.output_carrier) {
        if !carriers.contains(car) {
            diag.add_error_with_entity(
                "carrier",
                &format!("carrier '{car}' is not declared in topology.carriers"),
                &entity,
            );
        }
    }

    match (perf.size_min.lower(), perf.size_max.upper()) {
        (Some(min), Some(max)) if min > max => diag.add_error_with_entity(
            "range",
            &format!("size_min {min} exceeds size_max {max}"),
            &entity,
        ),
        (None, _) | (_, None) => {
            diag.add_error_with_entity("range", "empty size bound list", &entity)
        }
        _ => {}
    }

    match tec_data.economics.capex_model {
        Some(1) => {}
        Some(other) => diag.add_error_with_entity(
            "economics",
            &format!("CAPEX_model {other} is not supported"),
            &entity,
        ),
        None => diag.add_error_with_entity("economics", "CAPEX_model is missing", &entity),
    }

    let timesteps = data.topology.timesteps;
    match perf.tec_type {
        Archetype::Res => {
            if let Ok(cf) = tec_data.fit.series(&entity, "capacity_factor", timesteps) {
                if cf.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    diag.add_warning_with_entity(
                        "range",
                        "capacity_factor outside [0, 1]",
                        &entity,
                    );
                }
            } else {
                diag.add_error_with_entity(
                    "fit",
                    &format!("capacity_factor needs {timesteps} values"),
                    &entity,
                );
            }
            if let Some(mode) = perf.curtailment {
                if mode > 2 {
                    diag.add_error_with_entity(
                        "range",
                        &format!("curtailment mode {mode} is not one of 0, 1, 2"),
                        &entity,
                    );
                }
            }
        }
        Archetype::Stor => {
            let mut inputs = perf.input_carrier.clone();
            let mut outputs = perf.output_carrier.clone();
            inputs.sort();
            outputs.sort();
            if inputs != outputs {
                diag.add_error_with_entity(
                    "carrier",
                    "storage input and output carriers differ",
                    &entity,
                );
            }
            if tec_data
                .fit
                .series(&entity, "ambient_loss_factor", timesteps)
                .is_err()
            {
                diag.add_error_with_entity(
                    "fit",
                    &format!("ambient_loss_factor needs {timesteps} values"),
                    &entity,
                );
            }
        }
        Archetype::Conv2 => {
            for car in &perf.output_carrier {
                if tec_data.fit.record(&entity, car).is_err() {
                    diag.add_error_with_entity(
                        "fit",
                        &format!("no fit record for output carrier '{car}'"),
                        &entity,
                    );
                }
            }
        }
        Archetype::Conv1 | Archetype::Conv3 => diag.add_warning_with_entity(
            "archetype",
            &format!("{} has no constraint generator", perf.tec_type),
            &entity,
        ),
    }
}

fn check_network(data: &EnergyHubData, netw: &str, diag: &mut Diagnostics) {
    let entity = format!("network '{netw}'");
    let Ok(netw_data) = data.network(netw) else {
        diag.add_error_with_entity("reference", "no network_data entry", &entity);
        return;
    };
    for car in &netw_data.carriers {
        if !data.topology.carriers.contains(car) {
            diag.add_error_with_entity(
                "carrier",
                &format!("carrier '{car}' is not declared in topology.carriers"),
                &entity,
            );
        }
    }
    for (from, row) in &netw_data.connection {
        for to in row.keys() {
            for end in [from, to] {
                if !data.topology.nodes.contains(end) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("connection refers to unknown node '{end}'"),
                        &entity,
                    );
                }
            }
        }
    }
}
