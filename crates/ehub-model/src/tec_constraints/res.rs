//! Renewable technologies (RES).
//!
//! Output follows the capacity factor of the fit record:
//!
//! ```text
//! mode 0 (default)  output(t,c) =  cf(t) · size     · rated_power
//! mode 1            output(t,c) <= cf(t) · size     · rated_power
//! mode 2            output(t,c) =  cf(t) · size_on(t) · rated_power,  size_on(t) <= size
//! ```
//!
//! In mode 2 `size_on` is an integer number of modules left running, so
//! output can only be curtailed by switching whole modules off.

use super::TecContext;
use crate::block::{Block, Bounds, Domain};
use crate::expr::{Index, Sense};
use ehub_core::{EhubError, EhubResult, Unit};

/// How a renewable technology may reduce its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curtailment {
    None,
    Continuous,
    Discrete,
}

impl Curtailment {
    /// Mode from the `curtailment` option; absent means no curtailment.
    pub fn from_option(mode: Option<u8>, entity: &str) -> EhubResult<Self> {
        match mode.unwrap_or(0) {
            0 => Ok(Curtailment::None),
            1 => Ok(Curtailment::Continuous),
            2 => Ok(Curtailment::Discrete),
            other => Err(EhubError::invalid(
                entity,
                "TechnologyPerf.curtailment",
                format!("unknown curtailment mode {other} (expected 0, 1 or 2)"),
            )),
        }
    }
}

pub fn constraints(block: &mut Block, ctx: &TecContext<'_>) -> EhubResult<bool> {
    let cf = ctx
        .data
        .fit
        .series(&ctx.entity, "capacity_factor", ctx.timesteps)?;
    let mode = Curtailment::from_option(ctx.data.performance.curtailment, &ctx.entity)?;

    let capfactor = block.declare_param("para_capfactor", Unit::DIMENSIONLESS);
    for (i, value) in cf.iter().enumerate() {
        capfactor.insert(Index::t(i + 1), *value);
    }

    if mode == Curtailment::Discrete {
        let size_max = block.param("para_size_max", &Index::scalar())?.value;
        let size_on = block.declare_var("var_size_on", ctx.size_unit, Domain::Integer);
        for t in 1..=ctx.timesteps {
            size_on.insert(Index::t(t), Bounds::new(0.0, size_max));
        }
        for t in 1..=ctx.timesteps {
            let on = block.var("var_size_on", Index::t(t))?;
            let size = block.var("var_size", Index::scalar())?;
            block.constrain("const_curtailed_units", Index::t(t), on, Sense::Le, size)?;
        }
    }

    let outputs = block.set("set_output_carriers")?.to_vec();
    for t in 1..=ctx.timesteps {
        let cf_t = block.param("para_capfactor", &Index::t(t))?;
        let available = match mode {
            Curtailment::Discrete => block.var("var_size_on", Index::t(t))?,
            Curtailment::None | Curtailment::Continuous => block.var("var_size", Index::scalar())?,
        };
        let available = cf_t * ctx.rated_power * available;
        let sense = match mode {
            Curtailment::Continuous => Sense::Le,
            Curtailment::None | Curtailment::Discrete => Sense::Eq,
        };
        for car in &outputs {
            let output = block.var("var_output", Index::tc(t, car))?;
            block.constrain(
                "const_input_output",
                Index::tc(t, car),
                output,
                sense,
                available.clone(),
            )?;
        }
    }

    Ok(false)
}
