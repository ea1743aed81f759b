pub mod build;
pub mod solve;
pub mod validate;

use anyhow::{Context, Result};
use ehub_core::EnergyHubData;
use std::path::Path;

pub(crate) fn load_case(path: &Path) -> Result<EnergyHubData> {
    EnergyHubData::from_json_file(path)
        .with_context(|| format!("loading case {}", path.display()))
}
