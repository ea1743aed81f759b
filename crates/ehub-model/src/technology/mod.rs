//! Technology Block Builder
//!
//! Builds one [`TechnologyBlock`] per technology at a node: the sets,
//! parameters, variables and constraints common to all archetypes, followed
//! by the archetype-specific part from [`crate::tec_constraints`].
//!
//! ## Common part
//!
//! ```text
//! sets        set_input_carriers (not RES), set_output_carriers
//! parameters  para_size_min, para_size_max, para_output_max, para_rated_power,
//!             para_unit_CAPEX, para_OPEX_variable, para_OPEX_fixed, para_tec_emissionfactor
//! variables   var_size, var_input(t,c) (not RES), var_output(t,c),
//!             var_CAPEX, var_OPEX_fixed, var_OPEX_variable(t),
//!             var_tec_emissions_pos, var_tec_emissions_neg
//!
//! CAPEX            = size · unit_CAPEX
//! OPEX_fixed       = CAPEX · OPEX_fixed
//! OPEX_variable(t) = Σ_c output(t,c) · OPEX_variable · Δt
//! emissions        RES: both zero
//!                  factor >= 0: pos = Σ_t input(t,main) · factor · Δt, neg = 0
//!                  factor <  0: neg = Σ_t input(t,main) · (-factor) · Δt, pos = 0
//! ```
//!
//! Sizes are in MW (MWh for storage) when continuous and a dimensionless
//! module count when integer. Output and input are bounded by
//! `size_max · rated_power`, where `rated_power` is the module rating for
//! integer-sized technologies and 1 otherwise.
//!
//! Building is all-or-nothing: the block is returned only if every part
//! succeeded.

mod lifecycle;

pub use lifecycle::TechnologyLifecycle;

use crate::block::{Block, Bounds, Domain};
use crate::expr::{Index, Quantity, Scope, Sense, UExpr};
use crate::options::BuildOptions;
use crate::tec_constraints::{self, TecContext};
use ehub_core::{
    technology_entity, Archetype, EhubError, EhubResult, EnergyHubData, TechnologyData, Unit,
};
use tracing::{debug, warn};

/// A built technology block together with its archetype.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyBlock {
    pub name: String,
    pub archetype: Archetype,
    pub block: Block,
    /// The block holds disjunctions that need the big-M relaxation.
    pub needs_relaxation: bool,
}

impl TechnologyBlock {
    pub fn block(&self) -> &Block {
        &self.block
    }
}

fn required(value: Option<f64>, entity: &str, field: &str) -> EhubResult<f64> {
    value.ok_or_else(|| EhubError::missing(entity, field))
}

/// Unit of `var_size` for a technology.
pub fn size_unit(data: &TechnologyData) -> Unit {
    if data.performance.size_is_int {
        Unit::DIMENSIONLESS
    } else if data.performance.tec_type == Archetype::Stor {
        Unit::MWH
    } else {
        Unit::MW
    }
}

/// Capacity of one unit of size: MW per unit, or MWh per unit for storage.
///
/// Continuous sizes are capacities already (rating 1). Integer sizes count
/// modules rated by the fit record's `rated_power`, 1 per module if absent.
pub fn rated_power(data: &TechnologyData, entity: &str) -> EhubResult<Quantity> {
    let capacity_unit = if data.performance.tec_type == Archetype::Stor {
        Unit::MWH
    } else {
        Unit::MW
    };
    let value = if data.performance.size_is_int {
        data.fit.optional_number(entity, "rated_power")?.unwrap_or(1.0)
    } else {
        1.0
    };
    if value.is_nan() || value <= 0.0 {
        return Err(EhubError::invalid(
            entity,
            "fit.rated_power",
            format!("module rating must be positive, got {value}"),
        ));
    }
    Ok(Quantity::new(value, capacity_unit / size_unit(data)))
}

/// Build the block of technology `technology` at `node`.
pub fn build_technology_block(
    data: &EnergyHubData,
    node: &str,
    technology: &str,
    options: &BuildOptions,
) -> EhubResult<TechnologyBlock> {
    let tec_data = data.technology(node, technology)?;
    let perf = &tec_data.performance;
    let economics = &tec_data.economics;
    let archetype = perf.tec_type;
    let entity = technology_entity(node, technology);

    let implemented = !matches!(archetype, Archetype::Conv1 | Archetype::Conv3);
    if !implemented {
        if !options.allow_unimplemented_archetypes {
            return Err(EhubError::UnsupportedArchetype {
                node: node.to_string(),
                technology: technology.to_string(),
                archetype: archetype.to_string(),
            });
        }
        warn!(
            node,
            technology,
            %archetype,
            "archetype has no constraint generator; building common constraints only"
        );
    }

    match economics.capex_model {
        Some(1) => {}
        Some(other) => {
            return Err(EhubError::invalid(
                &entity,
                "Economics.CAPEX_model",
                format!("CAPEX model {other} is not supported (only 1, linear)"),
            ))
        }
        None => return Err(EhubError::missing(&entity, "Economics.CAPEX_model")),
    }

    let size_min = perf.size_min.lower().ok_or_else(|| {
        EhubError::invalid(&entity, "TechnologyPerf.size_min", "empty list of sizes")
    })?;
    let size_max = perf.size_max.upper().ok_or_else(|| {
        EhubError::invalid(&entity, "TechnologyPerf.size_max", "empty list of sizes")
    })?;
    if size_min > size_max {
        return Err(EhubError::invalid(
            &entity,
            "TechnologyPerf.size_min",
            format!("size_min {size_min} exceeds size_max {size_max}"),
        ));
    }

    let timesteps = data.topology.timesteps;
    let dt = Quantity::new(data.topology.timestep_length_h, Unit::H);
    let size_unit = size_unit(tec_data);
    let rated_power = rated_power(tec_data, &entity)?;
    let output_max = size_max * rated_power.value;
    let has_inputs = archetype != Archetype::Res;

    let mut block = Block::new(Scope::technology(node, technology));

    // Sets
    if has_inputs {
        block.add_set("set_input_carriers", perf.input_carrier.clone());
    }
    block.add_set("set_output_carriers", perf.output_carrier.clone());

    // Parameters
    let emission_factor = required(perf.emission_factor, &entity, "TechnologyPerf.emission_factor")?;
    let scalars = [
        ("para_size_min", size_min, size_unit),
        ("para_size_max", size_max, size_unit),
        ("para_output_max", output_max, Unit::MW),
        ("para_rated_power", rated_power.value, rated_power.unit),
        (
            "para_unit_CAPEX",
            required(economics.unit_capex_annual, &entity, "Economics.unit_CAPEX_annual")?,
            Unit::EUR / size_unit,
        ),
        (
            "para_OPEX_variable",
            required(economics.opex_variable, &entity, "Economics.OPEX_variable")?,
            Unit::EUR_PER_MWH,
        ),
        (
            "para_OPEX_fixed",
            required(economics.opex_fixed, &entity, "Economics.OPEX_fixed")?,
            Unit::DIMENSIONLESS,
        ),
        ("para_tec_emissionfactor", emission_factor, Unit::TONNE_PER_MWH),
    ];
    for (name, value, unit) in scalars {
        block.declare_param(name, unit).insert(Index::scalar(), value);
    }

    // Variables
    let size_domain = if perf.size_is_int {
        Domain::Integer
    } else {
        Domain::Continuous
    };
    block
        .declare_var("var_size", size_unit, size_domain)
        .insert(Index::scalar(), Bounds::new(size_min, size_max));

    if has_inputs {
        let input = block.declare_var("var_input", Unit::MW, Domain::Continuous);
        for t in 1..=timesteps {
            for car in &perf.input_carrier {
                input.insert(Index::tc(t, car), Bounds::new(0.0, output_max));
            }
        }
    }
    let output = block.declare_var("var_output", Unit::MW, Domain::Continuous);
    for t in 1..=timesteps {
        for car in &perf.output_carrier {
            output.insert(Index::tc(t, car), Bounds::new(0.0, output_max));
        }
    }

    for name in ["var_CAPEX", "var_OPEX_fixed"] {
        block
            .declare_var(name, Unit::EUR, Domain::Continuous)
            .insert(Index::scalar(), Bounds::FREE);
    }
    let opex_variable = block.declare_var("var_OPEX_variable", Unit::EUR, Domain::Continuous);
    for t in 1..=timesteps {
        opex_variable.insert(Index::t(t), Bounds::FREE);
    }
    for name in ["var_tec_emissions_pos", "var_tec_emissions_neg"] {
        block
            .declare_var(name, Unit::TONNE, Domain::Continuous)
            .insert(Index::scalar(), Bounds::NON_NEGATIVE);
    }

    // Costs
    let scalar = Index::scalar;
    let capex = block.var("var_CAPEX", scalar())?;
    let unit_capex = block.param("para_unit_CAPEX", &scalar())?;
    let size = block.var("var_size", scalar())?;
    block.constrain("const_CAPEX", scalar(), capex.clone(), Sense::Eq, unit_capex * size)?;

    let opex_fixed = block.var("var_OPEX_fixed", scalar())?;
    let fixed_share = block.param("para_OPEX_fixed", &scalar())?;
    block.constrain("const_OPEX_fixed", scalar(), opex_fixed, Sense::Eq, fixed_share * capex)?;

    let opex_rate = block.param("para_OPEX_variable", &scalar())?;
    for t in 1..=timesteps {
        let total_output = UExpr::sum(
            Unit::MW,
            perf.output_carrier
                .iter()
                .map(|car| block.var("var_output", Index::tc(t, car)))
                .collect::<EhubResult<Vec<_>>>()?,
        );
        let opex = block.var("var_OPEX_variable", Index::t(t))?;
        block.constrain(
            "const_OPEX_variable",
            Index::t(t),
            opex,
            Sense::Eq,
            opex_rate * dt * total_output,
        )?;
    }

    // Emissions
    let pos = block.var("var_tec_emissions_pos", scalar())?;
    let neg = block.var("var_tec_emissions_neg", scalar())?;
    let zero = UExpr::zero(Unit::TONNE);
    if archetype == Archetype::Res {
        block.constrain("const_tec_emissions_pos", scalar(), pos, Sense::Eq, zero.clone())?;
        block.constrain("const_tec_emissions_neg", scalar(), neg, Sense::Eq, zero)?;
    } else {
        let main = perf
            .main_input_carrier
            .as_deref()
            .ok_or_else(|| EhubError::missing(&entity, "TechnologyPerf.main_input_carrier"))?;
        if !perf.input_carrier.iter().any(|c| c == main) {
            return Err(EhubError::invalid(
                &entity,
                "TechnologyPerf.main_input_carrier",
                format!("'{main}' is not one of the input carriers"),
            ));
        }
        let factor = block.param("para_tec_emissionfactor", &scalar())?;
        let main_input = UExpr::sum(
            Unit::MW,
            (1..=timesteps)
                .map(|t| block.var("var_input", Index::tc(t, main)))
                .collect::<EhubResult<Vec<_>>>()?,
        );
        if factor.value >= 0.0 {
            block.constrain("const_tec_emissions_pos", scalar(), pos, Sense::Eq, factor * dt * main_input)?;
            block.constrain("const_tec_emissions_neg", scalar(), neg, Sense::Eq, zero)?;
        } else {
            block.constrain("const_tec_emissions_pos", scalar(), pos, Sense::Eq, zero)?;
            block.constrain("const_tec_emissions_neg", scalar(), neg, Sense::Eq, -factor * dt * main_input)?;
        }
    }

    // Archetype
    let needs_relaxation = if implemented {
        let ctx = TecContext {
            node,
            technology,
            entity: entity.clone(),
            data: tec_data,
            timesteps,
            dt,
            size_unit,
            rated_power,
        };
        tec_constraints::dispatch(archetype, &mut block, &ctx)?
    } else {
        false
    };

    debug!(
        node,
        technology,
        %archetype,
        variables = block.stats().variables,
        constraints = block.stats().constraints,
        needs_relaxation,
        "built technology block"
    );

    Ok(TechnologyBlock {
        name: technology.to_string(),
        archetype,
        block,
        needs_relaxation,
    })
}
