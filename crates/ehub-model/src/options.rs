//! Build and solver options.
//!
//! Both structures deserialize from the `[model]` and `[solver]` tables of
//! `ehub.toml`; every field has a default so an empty table is valid.

use serde::{Deserialize, Serialize};

/// Options for model construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// M used by the big-M relaxation when a constraint's terms are not all bounded
    #[serde(default = "default_big_m")]
    pub big_m: f64,
    /// Let CONV1/CONV3 technologies through with the common constraints only
    #[serde(default)]
    pub allow_unimplemented_archetypes: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            big_m: default_big_m(),
            allow_unimplemented_archetypes: false,
        }
    }
}

fn default_big_m() -> f64 {
    1e6
}

/// LP/MILP backend used by [`crate::lower::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pure-Rust interior point solver; continuous only
    #[default]
    Clarabel,
    /// HiGHS MILP solver
    Highs,
}

impl Backend {
    /// Whether the backend can enforce integrality.
    pub fn supports_integers(self) -> bool {
        matches!(self, Backend::Highs)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Clarabel => write!(f, "clarabel"),
            Backend::Highs => write!(f, "highs"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clarabel" => Ok(Backend::Clarabel),
            "highs" => Ok(Backend::Highs),
            other => Err(format!("unknown solver backend '{other}' (expected clarabel or highs)")),
        }
    }
}

/// Options for lowering and solving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    #[serde(default)]
    pub backend: Backend,
    /// Solve the continuous relaxation even if the backend supports integers
    #[serde(default)]
    pub relax_integrality: bool,
}
