//! Technology lifecycle and incremental model construction tests

use ehub_core::{Archetype, EhubError, EnergyHubData, FitRecord};
use ehub_model::test_utils::{
    conv2_technology, empty_case, res_technology, stor_technology, ResCase, StorCase,
};
use ehub_model::{BuildOptions, EnergyHub, Index, TechnologyLifecycle};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn case() -> EnergyHubData {
    let mut data = empty_case(2);
    data.insert_technology("onshore", "PV", res_technology(&ResCase::default()));
    data.insert_technology("onshore", "boiler", conv2_technology(0.9, 25.0));
    data
}

#[test]
fn test_rebuild_is_identical() {
    let data = case();
    let options = BuildOptions::default();
    let mut lifecycle = TechnologyLifecycle::new("onshore");
    lifecycle.add_technologies(&data, &names(&["PV"]), &options).unwrap();
    let before = lifecycle.clone();

    lifecycle.add_technologies(&data, &names(&["PV"]), &options).unwrap();
    assert_eq!(lifecycle, before);
    assert!(!lifecycle.has_pending_new());
}

#[test]
fn test_growth_keeps_existing_blocks() {
    let data = case();
    let options = BuildOptions::default();
    let mut lifecycle = TechnologyLifecycle::new("onshore");
    lifecycle.add_technologies(&data, &names(&["PV"]), &options).unwrap();
    let pv = lifecycle.get("PV").cloned().unwrap();

    lifecycle.add_technologies(&data, &names(&["boiler"]), &options).unwrap();
    let installed: Vec<&str> = lifecycle.technologies().iter().map(String::as_str).collect();
    assert_eq!(installed, ["PV", "boiler"]);
    assert_eq!(lifecycle.get("PV"), Some(&pv));
    assert_eq!(lifecycle.get("boiler").unwrap().archetype, Archetype::Conv2);
    assert_eq!(lifecycle.active().count(), 2);
}

#[test]
fn test_empty_addition_keeps_everything() {
    let data = case();
    let options = BuildOptions::default();
    let mut lifecycle = TechnologyLifecycle::new("onshore");
    lifecycle.add_technologies(&data, &names(&["PV", "boiler"]), &options).unwrap();
    let before = lifecycle.clone();
    assert!(!lifecycle.add_technologies(&data, &[], &options).unwrap());
    assert_eq!(lifecycle, before);
}

#[test]
fn test_failed_addition_leaves_node_unchanged() {
    let mut data = case();
    let mut broken = conv2_technology(0.9, 25.0);
    broken.fit = FitRecord::new();
    data.insert_technology("onshore", "broken", broken);

    let options = BuildOptions::default();
    let mut lifecycle = TechnologyLifecycle::new("onshore");
    lifecycle.add_technologies(&data, &names(&["PV"]), &options).unwrap();
    let before = lifecycle.clone();

    let err = lifecycle
        .add_technologies(&data, &names(&["boiler", "broken"]), &options)
        .unwrap_err();
    assert!(matches!(err, EhubError::MissingData { .. }));
    assert_eq!(lifecycle, before);
}

#[test]
fn test_redefinition_with_other_archetype() {
    let mut data = case();
    let options = BuildOptions::default();
    let mut lifecycle = TechnologyLifecycle::new("onshore");
    lifecycle.add_technologies(&data, &names(&["PV"]), &options).unwrap();

    data.insert_technology("onshore", "PV", conv2_technology(0.9, 25.0));
    let err = lifecycle
        .add_technologies(&data, &names(&["PV"]), &options)
        .unwrap_err();
    match err {
        EhubError::TechnologyRedefinition {
            technology,
            existing,
            requested,
            ..
        } => {
            assert_eq!(technology, "PV");
            assert_eq!(existing, "RES");
            assert_eq!(requested, "CONV2");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(lifecycle.get("PV").unwrap().archetype, Archetype::Res);
}

#[test]
fn test_relaxation_flag_reflects_new_blocks() {
    let mut data = empty_case(3);
    let one_way = StorCase {
        one_direction: true,
        ..StorCase::default()
    };
    data.insert_technology("onshore", "battery", stor_technology(&one_way));
    data.insert_technology("onshore", "boiler", conv2_technology(0.9, 25.0));
    let options = BuildOptions::default();

    let mut lifecycle = TechnologyLifecycle::new("onshore");
    assert!(lifecycle.add_technologies(&data, &names(&["battery"]), &options).unwrap());
    assert!(!lifecycle.add_technologies(&data, &names(&["boiler"]), &options).unwrap());
    assert!(lifecycle.needs_relaxation());
}

#[test]
fn test_hub_adds_technologies_after_construction() {
    let mut data = empty_case(2);
    data.insert_technology("onshore", "PV", res_technology(&ResCase::default()));
    let mut hub = EnergyHub::new(data, BuildOptions::default());
    hub.construct_model().unwrap();
    assert!(!hub.needs_relaxation());

    let one_way = StorCase {
        timesteps: 2,
        one_direction: true,
        ..StorCase::default()
    };
    hub.data_mut()
        .insert_technology("onshore", "battery", stor_technology(&one_way));
    hub.add_technologies("onshore", &names(&["battery"])).unwrap();
    assert!(hub.needs_relaxation());

    hub.construct_balances().unwrap();
    let node = hub.node("onshore").unwrap();
    assert_eq!(node.technologies.technologies().len(), 2);

    // battery output enters the electricity balance
    let balance = hub
        .global()
        .unwrap()
        .constraint("const_energybalance", &Index::tc(1, "electricity").with("onshore"))
        .unwrap();
    let discharge = node
        .technologies
        .get("battery")
        .unwrap()
        .block
        .var_ref("var_output", Index::tc(1, "electricity"));
    let charge = node
        .technologies
        .get("battery")
        .unwrap()
        .block
        .var_ref("var_input", Index::tc(1, "electricity"));
    assert_eq!(balance.coefficient(&discharge), 1.0);
    assert_eq!(balance.coefficient(&charge), -1.0);

    // the relaxed model has no disjunctions left
    let relaxed = hub.relaxed_blocks();
    assert!(relaxed.iter().all(|b| !b.has_disjunctions()));
    assert!(relaxed.iter().any(|b| b
        .constraint_family("disjunction_input_output_xor")
        .is_some()));
}
