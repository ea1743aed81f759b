//! End-to-end model construction (and solving, with clarabel)

use ehub_core::{NetworkData, NodeSeries};
use ehub_model::test_utils::{open_node, res_case, set_series, ResCase};
use ehub_model::{BuildOptions, EnergyHub, Index, Sense, VarRef};
use std::collections::HashMap;

fn single_res_hub() -> EnergyHub {
    let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
    hub.construct_model().unwrap();
    hub.construct_balances().unwrap();
    hub
}

#[test]
fn test_single_res_symbolic() {
    let hub = single_res_hub();
    let pv = &hub.node("onshore").unwrap().technologies.get("PV").unwrap().block;
    let size = pv.var_ref("var_size", Index::scalar());
    let capex = pv.var_ref("var_CAPEX", Index::scalar());

    let mut at: HashMap<VarRef, f64> = HashMap::new();
    at.insert(size.clone(), 10.0);
    at.insert(capex.clone(), 1000.0);
    for t in 1..=2 {
        at.insert(pv.var_ref("var_output", Index::tc(t, "electricity")), 5.0);
    }
    let value = |v: &VarRef| at.get(v).copied().unwrap_or(0.0);

    for t in 1..=2 {
        let c = pv
            .constraint("const_input_output", &Index::tc(t, "electricity"))
            .unwrap();
        assert_eq!(c.sense, Sense::Eq);
        assert!(c.is_satisfied(value, 1e-9));
    }
    assert!(pv
        .constraint("const_CAPEX", &Index::scalar())
        .unwrap()
        .is_satisfied(value, 1e-9));

    // renewables emit nothing
    for name in ["const_tec_emissions_pos", "const_tec_emissions_neg"] {
        let c = pv.constraint(name, &Index::scalar()).unwrap();
        assert_eq!(c.expr.len(), 1);
        assert_eq!(c.rhs, 0.0);
    }
}

#[test]
fn test_two_nodes_share_a_network() {
    let mut data = res_case(ResCase::default());
    data.topology.nodes.push("offshore".into());
    data.topology.networks.push("electricitySimple".into());
    let mut offshore = open_node(&data.topology.carriers, 2);
    set_series(&mut offshore, NodeSeries::Demand, "electricity", 3.0);
    data.node_data.insert("offshore".into(), offshore);
    let mut netw = NetworkData {
        carriers: vec!["electricity".into()],
        ..NetworkData::default()
    };
    netw.connect("onshore", "offshore", 50.0);
    data.network_data.insert("electricitySimple".into(), netw);

    let mut hub = EnergyHub::new(data, BuildOptions::default());
    hub.construct_model().unwrap();
    hub.construct_balances().unwrap();

    let netw = hub.network("electricitySimple").unwrap();
    let node = &hub.node("offshore").unwrap().block;
    let coupling = node
        .constraint("const_netw_inflow", &Index::tc(1, "electricity"))
        .unwrap();
    let inflow = netw.block.var_ref(
        "var_inflow",
        Index::tc(1, "electricity").with("offshore"),
    );
    assert_eq!(coupling.coefficient(&inflow), -1.0);

    let stats = hub.stats();
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.networks, 1);
    // network, two nodes, PV, global
    assert_eq!(stats.blocks.len(), 5);
}

#[cfg(feature = "solver-clarabel")]
mod solved {
    use super::*;
    use ehub_model::{solve, SolverOptions};

    #[test]
    fn test_single_res_solution() {
        let hub = single_res_hub();
        let solution = solve(&hub, &SolverOptions::default()).unwrap();
        let pv = &hub.node("onshore").unwrap().technologies.get("PV").unwrap().block;

        for t in 1..=2 {
            let output = pv.var_ref("var_output", Index::tc(t, "electricity"));
            assert!((solution.value(&output).unwrap() - 5.0).abs() < 1e-5);
        }
        let capex = pv.var_ref("var_CAPEX", Index::scalar());
        assert!((solution.value(&capex).unwrap() - 1000.0).abs() < 1e-3);
        assert!(solution.summary(&hub).emissions_net.abs() < 1e-6);
    }

    #[test]
    fn test_surplus_flows_to_the_neighbour() {
        // both nodes are islanded except for the network
        let mut data = res_case(ResCase::default());
        data.topology.nodes.push("offshore".into());
        data.topology.networks.push("electricitySimple".into());
        let mut offshore = open_node(&data.topology.carriers, 2);
        set_series(&mut offshore, NodeSeries::Demand, "electricity", 4.0);
        for which in [NodeSeries::ImportLimit, NodeSeries::ExportLimit] {
            set_series(&mut offshore, which, "electricity", 0.0);
            set_series(&mut data.node_data["onshore"], which, "electricity", 0.0);
        }
        data.node_data.insert("offshore".into(), offshore);
        let mut netw = NetworkData {
            carriers: vec!["electricity".into()],
            ..NetworkData::default()
        };
        netw.connect("onshore", "offshore", 50.0);
        data.network_data.insert("electricitySimple".into(), netw);

        let mut hub = EnergyHub::new(data, BuildOptions::default());
        hub.construct_model().unwrap();
        hub.construct_balances().unwrap();
        let solution = solve(&hub, &SolverOptions::default()).unwrap();

        let netw = hub.network("electricitySimple").unwrap();
        let there = solution
            .value(&netw.flow_ref(1, "electricity", "onshore", "offshore"))
            .unwrap();
        let back = solution
            .value(&netw.flow_ref(1, "electricity", "offshore", "onshore"))
            .unwrap();
        // 5 MW produced onshore, 1 MW used there
        assert!((there - back - 4.0).abs() < 1e-4);
    }
}
