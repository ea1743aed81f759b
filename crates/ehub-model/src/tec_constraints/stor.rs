//! Storage technologies (STOR).
//!
//! Carriers are stored one-to-one (the input and output carrier sets are the
//! same). With `p(t)` the step preceding `t`, cyclic so that `p(1) = T`,
//! and `a(1) = ambient_loss(T)`, `a(t) = ambient_loss(t)` otherwise:
//!
//! ```text
//! level(t,c) = level(p(t),c) · (1 - lambda - a(t))
//!            + eta_in · Δt · input(t,c) - Δt / eta_out · output(t,c)
//! level(t,c) <= size · rated_power
//! input(t,c)  <= charge_max    · size · rated_power
//! output(t,c) <= discharge_max · size · rated_power
//! ```
//!
//! `rated_power` is the capacity of one module (MWh) for integer sizes and 1
//! otherwise.
//!
//! With `allow_only_one_direction` set, each step carries a disjunction
//! "charge only (output = 0)" or "discharge only (input = 0)"; the block then
//! needs the big-M relaxation.

use super::TecContext;
use crate::block::{Block, Bounds, Disjunct, Disjunction, Domain};
use crate::expr::{Index, Quantity, Sense, UExpr};
use ehub_core::{EhubError, EhubResult, Unit};
use indexmap::IndexSet;

/// Step whose ambient loss applies to the transition into `t`; the wrap into
/// step 1 uses the last step's factor.
pub fn ambient_step(t: usize, timesteps: usize) -> usize {
    if t == 1 {
        timesteps
    } else {
        t
    }
}

/// Step preceding `t` on a cyclic horizon of `timesteps` steps.
pub fn previous_step(t: usize, timesteps: usize) -> usize {
    if t == 1 {
        timesteps
    } else {
        t - 1
    }
}

pub fn constraints(block: &mut Block, ctx: &TecContext<'_>) -> EhubResult<bool> {
    let perf = &ctx.data.performance;
    let inputs: IndexSet<&String> = perf.input_carrier.iter().collect();
    let outputs: IndexSet<&String> = perf.output_carrier.iter().collect();
    if inputs != outputs {
        return Err(EhubError::invalid(
            &ctx.entity,
            "TechnologyPerf.output_carrier",
            "storage input and output carrier sets must be identical",
        ));
    }

    let fit = &ctx.data.fit;
    let entity = ctx.entity.as_str();
    let eta_out = fit.number(entity, "eta_out")?;
    if eta_out <= 0.0 {
        return Err(EhubError::invalid(
            entity,
            "fit.eta_out",
            format!("discharge efficiency must be positive, got {eta_out}"),
        ));
    }
    let scalars = [
        ("para_eta_in", fit.number(entity, "eta_in")?, Unit::DIMENSIONLESS),
        ("para_eta_out", eta_out, Unit::DIMENSIONLESS),
        ("para_lambda", fit.number(entity, "lambda")?, Unit::DIMENSIONLESS),
        ("para_charge_max", fit.number(entity, "charge_max")?, Unit::PER_H),
        ("para_discharge_max", fit.number(entity, "discharge_max")?, Unit::PER_H),
    ];
    for (name, value, unit) in scalars {
        block.declare_param(name, unit).insert(Index::scalar(), value);
    }
    let ambient = fit.series(entity, "ambient_loss_factor", ctx.timesteps)?;
    let ambient_param = block.declare_param("para_ambient_loss_factor", Unit::DIMENSIONLESS);
    for (i, value) in ambient.iter().enumerate() {
        ambient_param.insert(Index::t(i + 1), *value);
    }
    let one_direction = fit.flag(entity, "allow_only_one_direction")?;

    let carriers = block.set("set_input_carriers")?.to_vec();
    let level = block.declare_var("var_storage_level", Unit::MWH, Domain::Continuous);
    for t in 1..=ctx.timesteps {
        for car in &carriers {
            level.insert(Index::tc(t, car), Bounds::NON_NEGATIVE);
        }
    }

    let scalar = |block: &Block, name: &str| block.param(name, &Index::scalar());
    let eta_in = scalar(block, "para_eta_in")?;
    let lambda = scalar(block, "para_lambda")?;
    let charge_max = scalar(block, "para_charge_max")?;
    let discharge_max = scalar(block, "para_discharge_max")?;
    let discharge_eff = Quantity::scalar(1.0 / eta_out);

    for t in 1..=ctx.timesteps {
        let prev = previous_step(t, ctx.timesteps);
        let ambient_idx = Index::t(ambient_step(t, ctx.timesteps));
        let ambient_t = block.param("para_ambient_loss_factor", &ambient_idx)?;
        let retention = Quantity::scalar(1.0 - lambda.value - ambient_t.value);

        for car in &carriers {
            let idx = Index::tc(t, car);
            let size = ctx.rated_power * block.var("var_size", Index::scalar())?;

            let level_t = block.var("var_storage_level", idx.clone())?;
            block.constrain("const_size", idx.clone(), level_t.clone(), Sense::Le, size.clone())?;

            let input = block.var("var_input", idx.clone())?;
            let output = block.var("var_output", idx.clone())?;
            let balance = retention * block.var("var_storage_level", Index::tc(prev, car))?
                + eta_in * ctx.dt * input.clone()
                - discharge_eff * ctx.dt * output.clone();
            block.constrain("const_storage_level", idx.clone(), level_t, Sense::Eq, balance)?;

            block.constrain(
                "const_max_charge",
                idx.clone(),
                input,
                Sense::Le,
                charge_max * size.clone(),
            )?;
            block.constrain("const_max_discharge", idx, output, Sense::Le, discharge_max * size)?;
        }
    }

    if one_direction {
        for t in 1..=ctx.timesteps {
            let mut charge = Disjunct::new("charge", "const_output_to_zero");
            let mut discharge = Disjunct::new("discharge", "const_input_to_zero");
            for car in &carriers {
                let zero = UExpr::zero(Unit::MW);
                let output = block.var("var_output", Index::tc(t, car))?;
                let input = block.var("var_input", Index::tc(t, car))?;
                charge.constraints.insert(
                    Index::name(car),
                    block.disjunct_constraint("const_output_to_zero", output, Sense::Eq, zero.clone())?,
                );
                discharge.constraints.insert(
                    Index::name(car),
                    block.disjunct_constraint("const_input_to_zero", input, Sense::Eq, zero)?,
                );
            }
            block.add_disjunction(
                "disjunction_input_output",
                Index::t(t),
                Disjunction {
                    disjuncts: vec![charge, discharge],
                },
            );
        }
    }

    Ok(one_direction)
}
