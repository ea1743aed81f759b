//! # ehub-model: Energy-Hub Model Construction
//!
//! Builds the mixed-integer linear model of an energy hub from an
//! [`ehub_core::EnergyHubData`] case: one block per network, per node and per
//! technology at a node, plus a global block with energy balances and the
//! cost objective.
//!
//! ## Block hierarchy
//!
//! | Builder | Produces | Module |
//! |---------|----------|--------|
//! | Network | arc flows, per-node inflow/outflow | [`network`] |
//! | Node | import/export, emissions, network coupling | [`node`] |
//! | Technology | size, costs, emissions, archetype constraints | [`technology`], [`tec_constraints`] |
//! | Assembler | balances, node costs, objective | [`assembler`] |
//!
//! The model stays symbolic ([`expr`], [`block`]) until [`lower::solve`]
//! hands it to a `good_lp` backend. Storage technologies that may only charge
//! or discharge in a step carry disjunctions, which [`relaxation::big_m`]
//! rewrites into linear constraints with binary indicators.
//!
//! ## Example
//!
//! ```
//! use ehub_model::test_utils::{res_case, ResCase};
//! use ehub_model::{BuildOptions, EnergyHub};
//!
//! let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
//! hub.construct_model()?;
//! hub.construct_balances()?;
//!
//! let stats = hub.stats();
//! assert_eq!(stats.technologies, 1);
//! assert!(!stats.needs_relaxation);
//! # Ok::<(), ehub_core::EhubError>(())
//! ```
//!
//! ## Features
//!
//! - `solver-clarabel` (default): pure-Rust LP backend
//! - `solver-highs`: HiGHS MILP backend
//! - `parallel`: build node blocks on the rayon thread pool

pub mod assembler;
pub mod block;
pub mod expr;
pub mod lower;
pub mod network;
pub mod node;
pub mod options;
pub mod relaxation;
pub mod tec_constraints;
pub mod technology;
pub mod test_utils;

pub use assembler::{BlockSummary, EnergyHub, ModelStats};
pub use block::{Block, BlockStats, Bounds, Disjunct, Disjunction, Domain};
pub use expr::{Index, LinearConstraint, LinearExpr, Quantity, Scope, Sense, UExpr, VarRef};
pub use lower::{solve, LoweredSolution, SolveSummary};
pub use network::{build_network_block, NetworkBlock};
pub use node::{build_node_block, NodeBlock};
pub use options::{Backend, BuildOptions, SolverOptions};
pub use technology::{build_technology_block, TechnologyBlock, TechnologyLifecycle};
