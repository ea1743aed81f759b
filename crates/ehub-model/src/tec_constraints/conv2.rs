//! Conversion technologies with fuel substitution (CONV2).
//!
//! All inputs are interchangeable; every output carrier has its own linear
//! performance through the origin:
//!
//! ```text
//! output(t,c) = alpha1(c) · Σ_in input(t,in)
//! Σ_in input(t,in) <= size · rated_power
//! ```

use super::TecContext;
use crate::block::Block;
use crate::expr::{Index, Quantity, Sense, UExpr};
use ehub_core::{EhubError, EhubResult, Unit};

pub fn constraints(block: &mut Block, ctx: &TecContext<'_>) -> EhubResult<bool> {
    match ctx.data.performance.performance_function_type {
        None | Some(1) => {}
        Some(other) => {
            return Err(EhubError::invalid(
                &ctx.entity,
                "TechnologyPerf.performance_function_type",
                format!("performance function type {other} is not supported (only 1, linear through origin)"),
            ))
        }
    }

    let inputs = block.set("set_input_carriers")?.to_vec();
    let outputs = block.set("set_output_carriers")?.to_vec();

    let alpha1 = block.declare_param("para_alpha1", Unit::DIMENSIONLESS);
    for car in &outputs {
        let value = ctx
            .data
            .fit
            .record(&ctx.entity, car)?
            .number(&ctx.entity, "alpha1")?;
        alpha1.insert(Index::name(car), value);
    }

    for t in 1..=ctx.timesteps {
        let total_input = UExpr::sum(
            Unit::MW,
            inputs
                .iter()
                .map(|car| block.var("var_input", Index::tc(t, car)))
                .collect::<EhubResult<Vec<_>>>()?,
        );

        for car in &outputs {
            let alpha: Quantity = block.param("para_alpha1", &Index::name(car))?;
            let output = block.var("var_output", Index::tc(t, car))?;
            block.constrain(
                "const_input_output",
                Index::tc(t, car),
                output,
                Sense::Eq,
                alpha * total_input.clone(),
            )?;
        }

        let size = block.var("var_size", Index::scalar())?;
        block.constrain(
            "const_size",
            Index::t(t),
            total_input,
            Sense::Le,
            ctx.rated_power * size,
        )?;
    }

    Ok(false)
}
