//! # ehub-core: Energy-Hub Case Data
//!
//! Provides the data surface, error type and dimensional bookkeeping shared by
//! model construction (`ehub-model`) and the command line (`ehub-cli`).
//!
//! ## Design Philosophy
//!
//! A case is a plain, serde-deserialisable document:
//! - **Topology**: time steps, carriers, nodes, technologies per node, networks
//! - **Node data**: demand/import/export series per carrier
//! - **Technology data**: performance options, economics and a fit record
//! - **Network data**: connection and distance matrices
//!
//! Every keyed collection is an [`indexmap::IndexMap`], so iterating a case is
//! deterministic and two builds of the same case produce identical models.
//!
//! ## Quick Start
//!
//! ```rust
//! use ehub_core::*;
//!
//! let mut data = EnergyHubData::new(Topology::new(2, &["electricity"], &["onshore"]));
//! data.node_data.insert(
//!     "onshore".into(),
//!     NodeData::constant(&data.topology.carriers, 2, 0.0),
//! );
//!
//! let demand = data.node_value("onshore", NodeSeries::Demand, "electricity", 1).unwrap();
//! assert_eq!(demand, 0.0);
//!
//! // Missing keys are errors, never defaults
//! assert!(data.node_value("offshore", NodeSeries::Demand, "electricity", 1).is_err());
//! ```
//!
//! ## Modules
//!
//! - [`data`] - Case data structures and fail-fast accessors
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`error`] - [`EhubError`] and [`EhubResult`]
//! - [`units`] - Dimensions of parameters and variables
//! - [`validate`] - Pre-flight checks of a case

pub mod data;
pub mod diagnostics;
pub mod error;
pub mod units;
pub mod validate;

pub use data::{
    Archetype, CarrierSeries, EnergyHubData, Economics, FitRecord, NetworkData, NodeData,
    NodeMatrix, NodeSeries, SizeBound, TechnologyData, TechnologyPerformance, Topology,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{node_entity, technology_entity, EhubError, EhubResult};
pub use units::Unit;
pub use validate::validate;
