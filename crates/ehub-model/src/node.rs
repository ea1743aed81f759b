//! Node Block Builder
//!
//! One block per node, holding the node's interaction with the system
//! boundary and with networks, plus its technologies:
//!
//! ```text
//! parameters (t,c)  para_demand, para_import_price, para_export_price,
//!                   para_import_limit, para_export_limit,
//!                   para_import_emissionfactors, para_export_emissionfactors
//! variables  (t,c)  var_import_flow ∈ [0, import_limit], var_export_flow ∈ [0, export_limit],
//!                   var_{import,export}_emissions_{pos,neg} >= 0,
//!                   var_netw_inflow, var_netw_outflow, var_netw_consumption
//! variables         var_car_emissions_pos, var_car_emissions_neg >= 0
//! ```
//!
//! Emission flows are split by the sign of the factor, decided per `(t,c)`
//! from the data: a factor `>= 0` feeds the positive component and pins the
//! negative one to zero, a factor `< 0` does the opposite with `-factor`.

use crate::block::{Block, Bounds, Domain};
use crate::expr::{Index, Quantity, Scope, Sense, UExpr};
use crate::network::NetworkBlock;
use crate::options::BuildOptions;
use crate::technology::TechnologyLifecycle;
use ehub_core::{EhubResult, EnergyHubData, NodeSeries, Unit};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeBlock {
    pub name: String,
    pub block: Block,
    pub technologies: TechnologyLifecycle,
}

impl NodeBlock {
    /// Build and merge `technologies` into this node (see [`TechnologyLifecycle`]).
    pub fn add_technologies(
        &mut self,
        data: &EnergyHubData,
        technologies: &[String],
        options: &BuildOptions,
    ) -> EhubResult<bool> {
        self.technologies
            .add_technologies(data, technologies, options)
    }
}

const PARAMS: [(&str, NodeSeries, Unit); 7] = [
    ("para_demand", NodeSeries::Demand, Unit::MW),
    ("para_import_price", NodeSeries::ImportPrices, Unit::EUR_PER_MWH),
    ("para_export_price", NodeSeries::ExportPrices, Unit::EUR_PER_MWH),
    ("para_import_limit", NodeSeries::ImportLimit, Unit::MW),
    ("para_export_limit", NodeSeries::ExportLimit, Unit::MW),
    ("para_import_emissionfactors", NodeSeries::ImportEmissionFactors, Unit::TONNE_PER_MWH),
    ("para_export_emissionfactors", NodeSeries::ExportEmissionFactors, Unit::TONNE_PER_MWH),
];

/// Build the block of `node`, including its technologies.
///
/// Returns the block and whether any technology requests the big-M relaxation.
pub fn build_node_block(
    data: &EnergyHubData,
    node: &str,
    networks: &[NetworkBlock],
    options: &BuildOptions,
) -> EhubResult<(NodeBlock, bool)> {
    let timesteps = data.topology.timesteps;
    let carriers = &data.topology.carriers;
    let dt = Quantity::new(data.topology.timestep_length_h, Unit::H);
    data.node(node)?;

    let mut block = Block::new(Scope::node(node));

    for (name, series, unit) in PARAMS {
        let mut values = Vec::with_capacity(timesteps * carriers.len());
        for t in 1..=timesteps {
            for car in carriers {
                values.push((Index::tc(t, car), data.node_value(node, series, car, t)?));
            }
        }
        let param = block.declare_param(name, unit);
        for (index, value) in values {
            param.insert(index, value);
        }
    }

    // Variables
    for (var, limit) in [
        ("var_import_flow", "para_import_limit"),
        ("var_export_flow", "para_export_limit"),
    ] {
        let mut bounds = Vec::with_capacity(timesteps * carriers.len());
        for t in 1..=timesteps {
            for car in carriers {
                let idx = Index::tc(t, car);
                let upper = block.param(limit, &idx)?.value;
                bounds.push((idx, Bounds::new(0.0, upper)));
            }
        }
        let v = block.declare_var(var, Unit::MW, Domain::Continuous);
        for (idx, b) in bounds {
            v.insert(idx, b);
        }
    }
    let per_step = |block: &mut Block, name: &str, unit: Unit| {
        let v = block.declare_var(name, unit, Domain::Continuous);
        for t in 1..=timesteps {
            for car in carriers {
                v.insert(Index::tc(t, car), Bounds::NON_NEGATIVE);
            }
        }
    };
    let emission_rate = Unit::TONNE / Unit::H;
    for name in [
        "var_import_emissions_pos",
        "var_import_emissions_neg",
        "var_export_emissions_pos",
        "var_export_emissions_neg",
    ] {
        per_step(&mut block, name, emission_rate);
    }
    for name in ["var_netw_inflow", "var_netw_outflow", "var_netw_consumption"] {
        per_step(&mut block, name, Unit::MW);
    }
    for name in ["var_car_emissions_pos", "var_car_emissions_neg"] {
        block
            .declare_var(name, Unit::TONNE, Domain::Continuous)
            .insert(Index::scalar(), Bounds::NON_NEGATIVE);
    }

    // Emission split
    for (direction, flow, factor) in [
        ("import", "var_import_flow", "para_import_emissionfactors"),
        ("export", "var_export_flow", "para_export_emissionfactors"),
    ] {
        let pos_var = format!("var_{direction}_emissions_pos");
        let neg_var = format!("var_{direction}_emissions_neg");
        let pos_const = format!("const_{direction}_emissions_pos");
        let neg_const = format!("const_{direction}_emissions_neg");
        for t in 1..=timesteps {
            for car in carriers {
                let idx = Index::tc(t, car);
                let f = block.param(factor, &idx)?;
                let flow = block.var(flow, idx.clone())?;
                let pos = block.var(&pos_var, idx.clone())?;
                let neg = block.var(&neg_var, idx.clone())?;
                let zero = UExpr::zero(emission_rate);
                if f.value >= 0.0 {
                    block.constrain(&pos_const, idx.clone(), pos, Sense::Eq, f * flow)?;
                    block.constrain(&neg_const, idx, neg, Sense::Eq, zero)?;
                } else {
                    block.constrain(&pos_const, idx.clone(), pos, Sense::Eq, zero)?;
                    block.constrain(&neg_const, idx, neg, Sense::Eq, -f * flow)?;
                }
            }
        }
    }

    // Aggregate emissions
    for sign in ["pos", "neg"] {
        let mut total = UExpr::zero(Unit::TONNE);
        for t in 1..=timesteps {
            for car in carriers {
                let idx = Index::tc(t, car);
                let import = block.var(&format!("var_import_emissions_{sign}"), idx.clone())?;
                let export = block.var(&format!("var_export_emissions_{sign}"), idx)?;
                total += dt * (import + export);
            }
        }
        let aggregate = block.var(&format!("var_car_emissions_{sign}"), Index::scalar())?;
        block.constrain(
            &format!("const_car_emissions_{sign}"),
            Index::scalar(),
            aggregate,
            Sense::Eq,
            total,
        )?;
    }

    // Network coupling
    for t in 1..=timesteps {
        for car in carriers {
            let idx = Index::tc(t, car);
            let carrying = networks.iter().filter(|n| n.carries(car));

            let inflow = carrying
                .clone()
                .map(|n| n.inflow(t, car, node))
                .collect::<EhubResult<Vec<_>>>()?;
            let outflow = carrying
                .map(|n| n.outflow(t, car, node))
                .collect::<EhubResult<Vec<_>>>()?;

            let netw_inflow = block.var("var_netw_inflow", idx.clone())?;
            block.constrain(
                "const_netw_inflow",
                idx.clone(),
                netw_inflow,
                Sense::Eq,
                UExpr::sum(Unit::MW, inflow),
            )?;
            let netw_outflow = block.var("var_netw_outflow", idx.clone())?;
            block.constrain(
                "const_netw_outflow",
                idx.clone(),
                netw_outflow,
                Sense::Eq,
                UExpr::sum(Unit::MW, outflow),
            )?;
            let consumption = block.var("var_netw_consumption", idx.clone())?;
            block.constrain(
                "const_netw_consumption",
                idx,
                consumption,
                Sense::Eq,
                UExpr::zero(Unit::MW),
            )?;
        }
    }

    let mut node_block = NodeBlock {
        name: node.to_string(),
        block,
        technologies: TechnologyLifecycle::new(node),
    };
    let needs_relaxation =
        node_block.add_technologies(data, data.topology.technologies_at(node), options)?;

    debug!(
        node,
        technologies = node_block.technologies.technologies().len(),
        needs_relaxation,
        "built node block"
    );
    Ok((node_block, needs_relaxation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::build_network_block;
    use ehub_core::{EhubError, NetworkData, NodeData, Topology};

    fn data(import_factor: f64) -> EnergyHubData {
        let topology = Topology::new(2, &["electricity"], &["onshore"]);
        let mut data = EnergyHubData::new(topology);
        let mut node = NodeData::constant(&data.topology.carriers, 2, 1.0);
        node.import_emissionfactors
            .insert("electricity".into(), vec![import_factor, import_factor]);
        data.node_data.insert("onshore".into(), node);
        data
    }

    #[test]
    fn test_import_bounded_by_limit() {
        let (node, _) =
            build_node_block(&data(0.0), "onshore", &[], &BuildOptions::default()).unwrap();
        let r = node.block.var_ref("var_import_flow", Index::tc(1, "electricity"));
        assert_eq!(node.block.var_bounds(&r), Some(Bounds::new(0.0, 1.0)));
    }

    #[test]
    fn test_positive_factor_feeds_positive_component() {
        let (node, _) =
            build_node_block(&data(0.4), "onshore", &[], &BuildOptions::default()).unwrap();
        let idx = Index::tc(1, "electricity");
        let flow = node.block.var_ref("var_import_flow", idx.clone());
        let pos = node
            .block
            .constraint("const_import_emissions_pos", &idx)
            .unwrap();
        let neg = node
            .block
            .constraint("const_import_emissions_neg", &idx)
            .unwrap();
        assert_eq!(pos.coefficient(&flow), -0.4);
        assert!(!neg.references(&flow));
    }

    #[test]
    fn test_negative_factor_feeds_negative_component() {
        let (node, _) =
            build_node_block(&data(-0.3), "onshore", &[], &BuildOptions::default()).unwrap();
        let idx = Index::tc(2, "electricity");
        let flow = node.block.var_ref("var_import_flow", idx.clone());
        let pos = node
            .block
            .constraint("const_import_emissions_pos", &idx)
            .unwrap();
        let neg = node
            .block
            .constraint("const_import_emissions_neg", &idx)
            .unwrap();
        assert!(!pos.references(&flow));
        assert_eq!(neg.coefficient(&flow), -0.3);
    }

    #[test]
    fn test_missing_node_data_fails_fast() {
        let mut data = data(0.0);
        data.node_data.clear();
        let err = build_node_block(&data, "onshore", &[], &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, EhubError::MissingData { .. }));
    }

    #[test]
    fn test_missing_series_names_field() {
        let mut data = data(0.0);
        data.node_data["onshore"].export_prices.clear();
        let err = build_node_block(&data, "onshore", &[], &BuildOptions::default()).unwrap_err();
        assert!(err.to_string().contains("export_prices[electricity]"));
    }

    #[test]
    fn test_export_split_follows_sign_per_step() {
        let mut data = data(0.0);
        data.node_data["onshore"]
            .export_emissionfactors
            .insert("electricity".into(), vec![0.2, -0.5]);
        let (node, _) = build_node_block(&data, "onshore", &[], &BuildOptions::default()).unwrap();
        let block = &node.block;

        let first = Index::tc(1, "electricity");
        let flow = block.var_ref("var_export_flow", first.clone());
        let pos = block.constraint("const_export_emissions_pos", &first).unwrap();
        let neg = block.constraint("const_export_emissions_neg", &first).unwrap();
        assert_eq!(pos.coefficient(&flow), -0.2);
        assert!(!neg.references(&flow));

        let second = Index::tc(2, "electricity");
        let flow = block.var_ref("var_export_flow", second.clone());
        let pos = block.constraint("const_export_emissions_pos", &second).unwrap();
        let neg = block.constraint("const_export_emissions_neg", &second).unwrap();
        assert!(!pos.references(&flow));
        assert_eq!(neg.coefficient(&flow), -0.5);
    }

    #[test]
    fn test_aggregate_emissions_sum_both_directions() {
        let mut data = data(0.4);
        data.topology.timestep_length_h = 2.0;
        let (node, _) = build_node_block(&data, "onshore", &[], &BuildOptions::default()).unwrap();
        let block = &node.block;

        for sign in ["pos", "neg"] {
            let c = block
                .constraint(&format!("const_car_emissions_{sign}"), &Index::scalar())
                .unwrap();
            assert_eq!(c.sense, Sense::Eq);
            assert_eq!(c.unit, Unit::TONNE);
            assert_eq!(c.rhs, 0.0);
            let total = block.var_ref(&format!("var_car_emissions_{sign}"), Index::scalar());
            assert_eq!(c.coefficient(&total), 1.0);
            for t in 1..=2 {
                for direction in ["import", "export"] {
                    let rate = block.var_ref(
                        &format!("var_{direction}_emissions_{sign}"),
                        Index::tc(t, "electricity"),
                    );
                    // two-hour steps
                    assert_eq!(c.coefficient(&rate), -2.0);
                }
            }
        }
    }

    #[test]
    fn test_network_coupling_and_zero_consumption() {
        let mut data = data(0.0);
        data.topology.nodes.push("offshore".into());
        data.topology.networks.push("electricitySimple".into());
        let offshore = NodeData::constant(&data.topology.carriers, 2, 1.0);
        data.node_data.insert("offshore".into(), offshore);
        let mut netw = NetworkData {
            carriers: vec!["electricity".into()],
            ..NetworkData::default()
        };
        netw.connect("onshore", "offshore", 10.0);
        data.network_data.insert("electricitySimple".into(), netw);

        let network = build_network_block(&data, "electricitySimple").unwrap();
        let (node, _) = build_node_block(
            &data,
            "onshore",
            std::slice::from_ref(&network),
            &BuildOptions::default(),
        )
        .unwrap();
        let block = &node.block;
        let idx = Index::tc(2, "electricity");

        let outflow = block.constraint("const_netw_outflow", &idx).unwrap();
        let own = block.var_ref("var_netw_outflow", idx.clone());
        let leaving = network
            .block
            .var_ref("var_outflow", idx.clone().with("onshore"));
        assert_eq!(outflow.sense, Sense::Eq);
        assert_eq!(outflow.coefficient(&own), 1.0);
        assert_eq!(outflow.coefficient(&leaving), -1.0);

        let consumption = block.constraint("const_netw_consumption", &idx).unwrap();
        let used = block.var_ref("var_netw_consumption", idx.clone());
        assert_eq!(consumption.sense, Sense::Eq);
        assert_eq!(consumption.expr.len(), 1);
        assert_eq!(consumption.coefficient(&used), 1.0);
        assert_eq!(consumption.rhs, 0.0);
    }
}
