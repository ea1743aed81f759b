//! Technology Constraint Library
//!
//! One generator per technology archetype. A generator receives a technology
//! block that already holds the common sets, parameters and variables (see
//! [`crate::technology`]) and adds the archetype-specific part:
//!
//! | Archetype | Generator            | Adds                                             |
//! |-----------|----------------------|--------------------------------------------------|
//! | RES       | [`res::constraints`]   | capacity-factor output with optional curtailment |
//! | CONV2     | [`conv2::constraints`] | linear conversion with fuel substitution         |
//! | STOR      | [`stor::constraints`]  | cyclic storage balance, charge/discharge caps    |
//!
//! Every generator returns whether it introduced a disjunction, i.e. whether
//! the block needs the big-M relaxation before it can be lowered.

pub mod conv2;
pub mod res;
pub mod stor;

use crate::block::Block;
use crate::expr::Quantity;
use ehub_core::{Archetype, EhubError, EhubResult, TechnologyData, Unit};

/// Everything a generator needs besides the block.
#[derive(Debug, Clone)]
pub struct TecContext<'a> {
    pub node: &'a str,
    pub technology: &'a str,
    /// Error label of the technology.
    pub entity: String,
    pub data: &'a TechnologyData,
    /// Number of time steps T.
    pub timesteps: usize,
    /// Time-step length in hours.
    pub dt: Quantity,
    /// Unit of `var_size`: dimensionless when integer-sized.
    pub size_unit: Unit,
    /// Capacity of one unit of size (MW, MWh for storage).
    pub rated_power: Quantity,
}

/// Add the constraints of `archetype` to `block`; returns the relaxation request.
pub fn dispatch(archetype: Archetype, block: &mut Block, ctx: &TecContext<'_>) -> EhubResult<bool> {
    match archetype {
        Archetype::Res => res::constraints(block, ctx),
        Archetype::Conv2 => conv2::constraints(block, ctx),
        Archetype::Stor => stor::constraints(block, ctx),
        Archetype::Conv1 | Archetype::Conv3 => Err(EhubError::UnsupportedArchetype {
            node: ctx.node.to_string(),
            technology: ctx.technology.to_string(),
            archetype: archetype.to_string(),
        }),
    }
}
