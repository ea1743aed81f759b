//! Technology block tests: common part and archetype constraints

use ehub_core::{Archetype, EhubError, EnergyHubData, Unit};
use ehub_model::test_utils::{
    conv2_technology, empty_case, res_technology, stor_technology, ResCase, StorCase,
};
use ehub_model::{build_technology_block, Bounds, BuildOptions, Domain, Index, Sense, VarRef};
use std::collections::HashMap;

fn with_technology(timesteps: usize, name: &str, tec: ehub_core::TechnologyData) -> EnergyHubData {
    let mut data = empty_case(timesteps);
    data.insert_technology("onshore", name, tec);
    data
}

fn build(data: &EnergyHubData, name: &str) -> ehub_model::TechnologyBlock {
    build_technology_block(data, "onshore", name, &BuildOptions::default()).unwrap()
}

/// Evaluate with the given values, zero elsewhere.
fn values(pairs: &[(VarRef, f64)]) -> impl Fn(&VarRef) -> f64 {
    let map: HashMap<VarRef, f64> = pairs.iter().cloned().collect();
    move |v| map.get(v).copied().unwrap_or(0.0)
}

// ----------------------------------------------------------------------------
// Common part
// ----------------------------------------------------------------------------

#[test]
fn test_flows_non_negative_and_size_bounded() {
    let data = with_technology(2, "boiler", conv2_technology(0.9, 25.0));
    let tec = build(&data, "boiler");
    let block = &tec.block;

    let size = block.var_ref("var_size", Index::scalar());
    assert_eq!(block.var_bounds(&size), Some(Bounds::new(0.0, 25.0)));
    for t in 1..=2 {
        for (var, car) in [("var_input", "gas"), ("var_output", "heat")] {
            let r = block.var_ref(var, Index::tc(t, car));
            let b = block.var_bounds(&r).unwrap();
            assert_eq!(b.lower, 0.0);
            assert_eq!(b.upper, 25.0);
        }
    }
}

#[test]
fn test_res_has_no_input_variables() {
    let data = with_technology(2, "PV", res_technology(&ResCase::default()));
    let tec = build(&data, "PV");
    assert!(tec.block.vars().get("var_input").is_none());
    assert!(tec.block.has_var("var_output", &Index::tc(2, "electricity")));
}

#[test]
fn test_capex_and_fixed_opex() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.economics.opex_fixed = Some(0.05);
    let data = with_technology(2, "boiler", boiler);
    let tec = build(&data, "boiler");
    let block = &tec.block;

    let capex = block.constraint("const_CAPEX", &Index::scalar()).unwrap();
    let size = block.var_ref("var_size", Index::scalar());
    assert_eq!(capex.coefficient(&size), -50.0);
    assert_eq!(capex.unit, Unit::EUR);

    let fixed = block.constraint("const_OPEX_fixed", &Index::scalar()).unwrap();
    let capex_var = block.var_ref("var_CAPEX", Index::scalar());
    assert_eq!(fixed.coefficient(&capex_var), -0.05);
}

#[test]
fn test_size_list_uses_extremes() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.performance.size_min = ehub_core::SizeBound::List(vec![5.0, 2.0]);
    boiler.performance.size_max = ehub_core::SizeBound::List(vec![10.0, 40.0]);
    let data = with_technology(1, "boiler", boiler);
    let tec = build(&data, "boiler");
    let size = tec.block.var_ref("var_size", Index::scalar());
    assert_eq!(tec.block.var_bounds(&size), Some(Bounds::new(2.0, 40.0)));
}

#[test]
fn test_unsupported_capex_model() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.economics.capex_model = Some(2);
    let data = with_technology(1, "boiler", boiler);
    let err = build_technology_block(&data, "onshore", "boiler", &BuildOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("CAPEX_model"));
}

// ----------------------------------------------------------------------------
// Emissions
// ----------------------------------------------------------------------------

fn emission_constraints(factor: f64) -> (ehub_model::TechnologyBlock, VarRef) {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.performance.emission_factor = Some(factor);
    let data = with_technology(2, "boiler", boiler);
    let tec = build(&data, "boiler");
    let input = tec.block.var_ref("var_input", Index::tc(1, "gas"));
    (tec, input)
}

#[test]
fn test_positive_emission_factor() {
    let (tec, input) = emission_constraints(0.2);
    let pos = tec.block.constraint("const_tec_emissions_pos", &Index::scalar()).unwrap();
    let neg = tec.block.constraint("const_tec_emissions_neg", &Index::scalar()).unwrap();
    assert_eq!(pos.coefficient(&input), -0.2);
    assert!(!neg.references(&input));
    assert_eq!(neg.sense, Sense::Eq);
    assert_eq!(neg.rhs, 0.0);
}

#[test]
fn test_negative_emission_factor() {
    let (tec, input) = emission_constraints(-0.2);
    let pos = tec.block.constraint("const_tec_emissions_pos", &Index::scalar()).unwrap();
    let neg = tec.block.constraint("const_tec_emissions_neg", &Index::scalar()).unwrap();
    assert!(!pos.references(&input));
    assert_eq!(neg.coefficient(&input), -0.2);
}

#[test]
fn test_zero_emission_factor_takes_positive_path() {
    let (tec, input) = emission_constraints(0.0);
    let pos = tec.block.constraint("const_tec_emissions_pos", &Index::scalar()).unwrap();
    let neg = tec.block.constraint("const_tec_emissions_neg", &Index::scalar()).unwrap();
    assert!(pos.references(&input));
    assert!(!neg.references(&input));
}

#[test]
fn test_main_input_must_be_an_input() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.performance.main_input_carrier = Some("hydrogen".into());
    let data = with_technology(1, "boiler", boiler);
    let err = build_technology_block(&data, "onshore", "boiler", &BuildOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("main_input_carrier"));
}

// ----------------------------------------------------------------------------
// RES
// ----------------------------------------------------------------------------

#[test]
fn test_res_without_curtailment_is_equality() {
    let data = with_technology(2, "PV", res_technology(&ResCase::default()));
    let tec = build(&data, "PV");
    let c = tec
        .block
        .constraint("const_input_output", &Index::tc(2, "electricity"))
        .unwrap();
    let size = tec.block.var_ref("var_size", Index::scalar());
    assert_eq!(c.sense, Sense::Eq);
    assert_eq!(c.coefficient(&size), -0.5);
}

#[test]
fn test_res_continuous_curtailment_admits_less() {
    let case = ResCase {
        curtailment: Some(1),
        ..ResCase::default()
    };
    let data = with_technology(2, "PV", res_technology(&case));
    let tec = build(&data, "PV");
    let c = tec
        .block
        .constraint("const_input_output", &Index::tc(1, "electricity"))
        .unwrap();
    assert_eq!(c.sense, Sense::Le);

    let size = tec.block.var_ref("var_size", Index::scalar());
    let output = tec.block.var_ref("var_output", Index::tc(1, "electricity"));
    assert!(c.is_satisfied(values(&[(size.clone(), 10.0), (output.clone(), 2.0)]), 1e-9));
    assert!(!c.is_satisfied(values(&[(size, 10.0), (output, 6.0)]), 1e-9));
}

#[test]
fn test_res_discrete_curtailment_switches_modules() {
    let case = ResCase {
        curtailment: Some(2),
        size_is_int: true,
        rated_power: 2.0,
        ..ResCase::default()
    };
    let data = with_technology(2, "PV", res_technology(&case));
    let tec = build(&data, "PV");
    let block = &tec.block;

    assert_eq!(block.vars()["var_size_on"].domain, Domain::Integer);
    assert_eq!(block.vars()["var_size"].domain, Domain::Integer);

    let on = block.var_ref("var_size_on", Index::t(1));
    let size = block.var_ref("var_size", Index::scalar());
    let units = block.constraint("const_curtailed_units", &Index::t(1)).unwrap();
    assert!(units.is_satisfied(values(&[(on.clone(), 10.0), (size.clone(), 10.0)]), 1e-9));
    assert!(!units.is_satisfied(values(&[(on.clone(), 11.0), (size, 10.0)]), 1e-9));

    // cf 0.5 · rated power 2 per module
    let output = block
        .constraint("const_input_output", &Index::tc(1, "electricity"))
        .unwrap();
    assert_eq!(output.coefficient(&on), -1.0);
}

#[test]
fn test_res_unknown_curtailment_mode() {
    let case = ResCase {
        curtailment: Some(3),
        ..ResCase::default()
    };
    let data = with_technology(2, "PV", res_technology(&case));
    assert!(matches!(
        build_technology_block(&data, "onshore", "PV", &BuildOptions::default()),
        Err(EhubError::InvalidValue { .. })
    ));
}

#[test]
fn test_res_short_capacity_factor() {
    let data = with_technology(3, "PV", res_technology(&ResCase::default()));
    let err = build_technology_block(&data, "onshore", "PV", &BuildOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("capacity_factor"));
}

// ----------------------------------------------------------------------------
// CONV2
// ----------------------------------------------------------------------------

#[test]
fn test_conv2_output_linear_in_input() {
    let data = with_technology(2, "boiler", conv2_technology(0.9, 25.0));
    let tec = build(&data, "boiler");
    let block = &tec.block;
    let c = block.constraint("const_input_output", &Index::tc(1, "heat")).unwrap();
    let input = block.var_ref("var_input", Index::tc(1, "gas"));
    let output = block.var_ref("var_output", Index::tc(1, "heat"));

    for x in [0.0, 1.0, 12.5] {
        let at = values(&[(input.clone(), x), (output.clone(), 0.9 * x)]);
        assert!(c.is_satisfied(at, 1e-9));
    }
    let off = values(&[(input.clone(), 10.0), (output.clone(), 10.0)]);
    assert!(!c.is_satisfied(off, 1e-9));

    let size = block.constraint("const_size", &Index::t(1)).unwrap();
    assert_eq!(size.coefficient(&input), 1.0);
}

#[test]
fn test_conv2_missing_alpha() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.fit = ehub_core::FitRecord::new().with("heat", serde_json::json!({}));
    let data = with_technology(1, "boiler", boiler);
    let err = build_technology_block(&data, "onshore", "boiler", &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(err, EhubError::MissingData { .. }));
    assert!(err.to_string().contains("fit.heat.alpha1"));
}

// ----------------------------------------------------------------------------
// STOR
// ----------------------------------------------------------------------------

#[test]
fn test_storage_level_is_cyclic() {
    let data = with_technology(3, "battery", stor_technology(&StorCase::default()));
    let tec = build(&data, "battery");
    let block = &tec.block;
    let c = block
        .constraint("const_storage_level", &Index::tc(1, "electricity"))
        .unwrap();
    let last = block.var_ref("var_storage_level", Index::tc(3, "electricity"));
    let second = block.var_ref("var_storage_level", Index::tc(2, "electricity"));
    assert!((c.coefficient(&last) + 0.99).abs() < 1e-12);
    assert!(!c.references(&second));
    assert_eq!(c.unit, Unit::MWH);
}

#[test]
fn test_lossless_round_trip_returns_to_start() {
    let case = StorCase {
        eta_in: 1.0,
        eta_out: 1.0,
        lambda: 0.0,
        ..StorCase::default()
    };
    let data = with_technology(3, "battery", stor_technology(&case));
    let tec = build(&data, "battery");
    let block = &tec.block;
    let r = |name: &str, t: usize| block.var_ref(name, Index::tc(t, "electricity"));

    // start at 20, charge 10 in step 1, discharge 10 in step 2, idle in step 3
    let at = values(&[
        (block.var_ref("var_size", Index::scalar()), 100.0),
        (r("var_input", 1), 10.0),
        (r("var_output", 2), 10.0),
        (r("var_storage_level", 1), 30.0),
        (r("var_storage_level", 2), 20.0),
        (r("var_storage_level", 3), 20.0),
    ]);
    for t in 1..=3 {
        let c = block
            .constraint("const_storage_level", &Index::tc(t, "electricity"))
            .unwrap();
        assert!(c.is_satisfied(&at, 1e-9), "step {t}: {c}");
    }
}

#[test]
fn test_storage_one_direction_requests_relaxation() {
    let plain = with_technology(3, "battery", stor_technology(&StorCase::default()));
    assert!(!build(&plain, "battery").needs_relaxation);

    let case = StorCase {
        one_direction: true,
        ..StorCase::default()
    };
    let data = with_technology(3, "battery", stor_technology(&case));
    let tec = build(&data, "battery");
    assert!(tec.needs_relaxation);
    assert_eq!(tec.block.disjunctions()["disjunction_input_output"].len(), 3);
}

#[test]
fn test_storage_needs_matching_carriers() {
    let mut battery = stor_technology(&StorCase::default());
    battery.performance.output_carrier = vec!["heat".into()];
    let data = with_technology(3, "battery", battery);
    assert!(matches!(
        build_technology_block(&data, "onshore", "battery", &BuildOptions::default()),
        Err(EhubError::InvalidValue { .. })
    ));
}

#[test]
fn test_storage_wrap_uses_last_ambient_loss() {
    let case = StorCase {
        lambda: 0.0,
        ..StorCase::default()
    };
    let mut battery = stor_technology(&case);
    battery.fit = battery
        .fit
        .with("ambient_loss_factor", serde_json::json!([0.1, 0.0, 0.3]));
    let data = with_technology(3, "battery", battery);
    let tec = build(&data, "battery");
    let block = &tec.block;
    let level = |t: usize| block.var_ref("var_storage_level", Index::tc(t, "electricity"));
    let row = |t: usize| {
        block
            .constraint("const_storage_level", &Index::tc(t, "electricity"))
            .unwrap()
    };

    // step 1 carries over level(3) with the factor of step 3
    assert!((row(1).coefficient(&level(3)) + 0.7).abs() < 1e-12);
    assert!((row(2).coefficient(&level(1)) + 1.0).abs() < 1e-12);
    assert!((row(3).coefficient(&level(2)) + 0.7).abs() < 1e-12);
}

#[test]
fn test_storage_charge_and_discharge_caps() {
    let data = with_technology(3, "battery", stor_technology(&StorCase::default()));
    let tec = build(&data, "battery");
    let block = &tec.block;
    let idx = Index::tc(2, "electricity");
    let size = block.var_ref("var_size", Index::scalar());

    for (name, var) in [("const_max_charge", "var_input"), ("const_max_discharge", "var_output")] {
        let c = block.constraint(name, &idx).unwrap();
        let flow = block.var_ref(var, idx.clone());
        assert_eq!(c.sense, Sense::Le);
        assert_eq!(c.unit, Unit::MW);
        assert_eq!(c.coefficient(&flow), 1.0);
        assert!((c.coefficient(&size) + 0.5).abs() < 1e-12);

        // 0.5 per hour of a 10 MWh storage
        assert!(c.is_satisfied(values(&[(size.clone(), 10.0), (flow.clone(), 5.0)]), 1e-9));
        assert!(!c.is_satisfied(values(&[(size.clone(), 10.0), (flow, 6.0)]), 1e-9));
    }
}

#[test]
fn test_integer_storage_counts_modules() {
    let mut battery = stor_technology(&StorCase::default());
    battery.performance.size_is_int = true;
    battery.fit = battery.fit.with("rated_power", serde_json::json!(50.0));
    let data = with_technology(3, "battery", battery);
    let tec = build(&data, "battery");
    let block = &tec.block;
    let idx = Index::tc(1, "electricity");
    let size = block.var_ref("var_size", Index::scalar());

    assert_eq!(block.vars()["var_size"].domain, Domain::Integer);
    let capacity = block.constraint("const_size", &idx).unwrap();
    assert_eq!(capacity.unit, Unit::MWH);
    assert!((capacity.coefficient(&size) + 50.0).abs() < 1e-12);
    let charge = block.constraint("const_max_charge", &idx).unwrap();
    assert!((charge.coefficient(&size) + 25.0).abs() < 1e-12);
}

#[test]
fn test_integer_conversion_counts_modules() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.performance.size_is_int = true;
    let data = with_technology(2, "boiler", boiler.clone());
    let tec = build(&data, "boiler");
    let size = tec.block.var_ref("var_size", Index::scalar());
    let c = tec.block.constraint("const_size", &Index::t(1)).unwrap();
    assert_eq!(c.unit, Unit::MW);
    // one MW per module without a rating
    assert_eq!(c.coefficient(&size), -1.0);

    boiler.fit = boiler.fit.with("rated_power", serde_json::json!(5.0));
    let data = with_technology(2, "boiler", boiler);
    let tec = build(&data, "boiler");
    let c = tec.block.constraint("const_size", &Index::t(1)).unwrap();
    assert!((c.coefficient(&size) + 5.0).abs() < 1e-12);
}

#[test]
fn test_module_rating_must_be_positive() {
    let mut boiler = conv2_technology(0.9, 25.0);
    boiler.performance.size_is_int = true;
    boiler.fit = boiler.fit.with("rated_power", serde_json::json!(0.0));
    let data = with_technology(2, "boiler", boiler);
    let err = build_technology_block(&data, "onshore", "boiler", &BuildOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("fit.rated_power"));
}

// ----------------------------------------------------------------------------
// Unimplemented archetypes
// ----------------------------------------------------------------------------

#[test]
fn test_conv1_is_unsupported() {
    let mut tec = conv2_technology(0.9, 25.0);
    tec.performance.tec_type = Archetype::Conv1;
    let data = with_technology(2, "chp", tec);
    let err = build_technology_block(&data, "onshore", "chp", &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(err, EhubError::UnsupportedArchetype { .. }));
}

#[test]
fn test_conv3_passes_when_allowed() {
    let mut tec = conv2_technology(0.9, 25.0);
    tec.performance.tec_type = Archetype::Conv3;
    let data = with_technology(2, "chp", tec);
    let options = BuildOptions {
        allow_unimplemented_archetypes: true,
        ..BuildOptions::default()
    };
    let built = build_technology_block(&data, "onshore", "chp", &options).unwrap();
    assert!(built.block.constraint("const_CAPEX", &Index::scalar()).is_some());
    assert!(built.block.constraint_family("const_input_output").is_none());
}
