//! Model Assembler
//!
//! [`EnergyHub`] owns the case data and the built blocks. Construction runs
//! in three steps:
//!
//! 1. [`EnergyHub::construct_model`] builds one network block per network and
//!    one node block per node (each with its technologies).
//! 2. [`EnergyHub::add_technologies`] may add technologies to a node later;
//!    the node's technology lifecycle takes care of the merge.
//! 3. [`EnergyHub::construct_balances`] adds the global block with the
//!    energy balance per node, node costs, the objective and total emissions.
//!
//! ```text
//! energy balance (t,c,n):
//!   Σ_tec output - Σ_tec input + import - export
//!     + netw_inflow - netw_outflow - netw_consumption = demand
//! node cost (n):
//!   Σ_tec (CAPEX + OPEX_fixed + Σ_t OPEX_variable)
//!     + Σ_t,c (import · import_price - export · export_price) · Δt
//! objective: min var_total_cost = Σ_n node cost
//! ```

use std::borrow::Cow;
use std::time::Instant;

use crate::block::{Block, BlockStats, Bounds, Domain};
use crate::expr::{Index, Quantity, Scope, Sense, UExpr};
use crate::network::{build_network_block, NetworkBlock};
use crate::node::{build_node_block, NodeBlock};
use crate::options::BuildOptions;
use crate::relaxation;
use ehub_core::{node_entity, EhubError, EhubResult, EnergyHubData, Unit};
use indexmap::IndexMap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

/// Component counts of one block, labelled by its entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub entity: String,
    #[serde(flatten)]
    pub stats: BlockStats,
}

/// Size of an assembled model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStats {
    pub nodes: usize,
    pub technologies: usize,
    pub networks: usize,
    pub needs_relaxation: bool,
    pub balances: bool,
    pub totals: BlockStats,
    pub blocks: Vec<BlockSummary>,
}

#[derive(Debug, Clone)]
pub struct EnergyHub {
    data: EnergyHubData,
    options: BuildOptions,
    networks: IndexMap<String, NetworkBlock>,
    nodes: IndexMap<String, NodeBlock>,
    global: Option<Block>,
    needs_relaxation: bool,
}

impl EnergyHub {
    pub fn new(data: EnergyHubData, options: BuildOptions) -> Self {
        Self {
            data,
            options,
            networks: IndexMap::new(),
            nodes: IndexMap::new(),
            global: None,
            needs_relaxation: false,
        }
    }

    pub fn data(&self) -> &EnergyHubData {
        &self.data
    }

    /// Mutable case data, e.g. to register technology data before
    /// [`EnergyHub::add_technologies`]. Already built blocks are not affected.
    pub fn data_mut(&mut self) -> &mut EnergyHubData {
        &mut self.data
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build all network and node blocks from the case data.
    ///
    /// Replaces anything built before. On error nothing is replaced.
    pub fn construct_model(&mut self) -> EhubResult<()> {
        let start = Instant::now();
        let topology = &self.data.topology;
        if topology.timesteps == 0 {
            return Err(EhubError::invalid("topology", "timesteps", "must be at least 1"));
        }
        if topology.timestep_length_h.is_nan() || topology.timestep_length_h <= 0.0 {
            return Err(EhubError::invalid(
                "topology",
                "timestep_length_h",
                format!("must be positive, got {}", topology.timestep_length_h),
            ));
        }

        let mut networks = IndexMap::with_capacity(topology.networks.len());
        for name in &topology.networks {
            networks.insert(name.clone(), build_network_block(&self.data, name)?);
        }
        let network_blocks: Vec<NetworkBlock> = networks.values().cloned().collect();

        #[cfg(feature = "parallel")]
        let built = topology
            .nodes
            .par_iter()
            .map(|node| build_node_block(&self.data, node, &network_blocks, &self.options))
            .collect::<EhubResult<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let built = topology
            .nodes
            .iter()
            .map(|node| build_node_block(&self.data, node, &network_blocks, &self.options))
            .collect::<EhubResult<Vec<_>>>()?;

        let mut nodes = IndexMap::with_capacity(built.len());
        let mut needs_relaxation = false;
        for (node, flag) in built {
            needs_relaxation |= flag;
            info!(
                node = %node.name,
                technologies = node.technologies.technologies().len(),
                "assembled node"
            );
            nodes.insert(node.name.clone(), node);
        }

        self.networks = networks;
        self.nodes = nodes;
        self.global = None;
        self.needs_relaxation = needs_relaxation;

        info!(
            nodes = self.nodes.len(),
            networks = self.networks.len(),
            needs_relaxation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "constructed model"
        );
        Ok(())
    }

    /// Add `technologies` to `node`; their data must already be in the case.
    ///
    /// Balances built before are discarded since they no longer cover every
    /// technology; call [`EnergyHub::construct_balances`] again.
    pub fn add_technologies(&mut self, node: &str, technologies: &[String]) -> EhubResult<()> {
        let block = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| EhubError::missing(node_entity(node), "node block"))?;
        let flag = block.add_technologies(&self.data, technologies, &self.options)?;
        self.needs_relaxation |= flag;
        self.global = None;
        info!(
            node,
            added = technologies.len(),
            installed = block.technologies.technologies().len(),
            needs_relaxation = self.needs_relaxation,
            "added technologies"
        );
        Ok(())
    }

    /// Build the global block: energy balances, costs, objective and total emissions.
    pub fn construct_balances(&mut self) -> EhubResult<()> {
        if self.nodes.is_empty() && !self.data.topology.nodes.is_empty() {
            return Err(EhubError::missing("model", "node blocks (construct_model first)"));
        }
        let timesteps = self.data.topology.timesteps;
        let carriers = &self.data.topology.carriers;
        let dt = Quantity::new(self.data.topology.timestep_length_h, Unit::H);
        let mut global = Block::new(Scope::Global);
        global.add_set("set_t", (1..=timesteps).map(|t| t.to_string()).collect());
        global.add_set("set_carriers", carriers.clone());
        global.add_set("set_nodes", self.nodes.keys().cloned().collect());
        global.add_set("set_networks", self.networks.keys().cloned().collect());

        // Energy balance
        for (name, node) in &self.nodes {
            let nb = &node.block;
            for t in 1..=timesteps {
                for car in carriers {
                    let idx = Index::tc(t, car);
                    let mut supply = UExpr::zero(Unit::MW);
                    for tec in node.technologies.active() {
                        let tb = &tec.block;
                        if tb.has_var("var_output", &idx) {
                            supply += tb.var("var_output", idx.clone())?;
                        }
                        if tb.has_var("var_input", &idx) {
                            supply -= tb.var("var_input", idx.clone())?;
                        }
                    }
                    supply += nb.var("var_import_flow", idx.clone())?;
                    supply -= nb.var("var_export_flow", idx.clone())?;
                    supply += nb.var("var_netw_inflow", idx.clone())?;
                    supply -= nb.var("var_netw_outflow", idx.clone())?;
                    supply -= nb.var("var_netw_consumption", idx.clone())?;
                    let demand = UExpr::constant(nb.param("para_demand", &idx)?);
                    global.constrain(
                        "const_energybalance",
                        idx.with(name),
                        supply,
                        Sense::Eq,
                        demand,
                    )?;
                }
            }
        }

        // Costs
        let node_cost = global.declare_var("var_node_cost", Unit::EUR, Domain::Continuous);
        for name in self.nodes.keys() {
            node_cost.insert(Index::name(name), Bounds::FREE);
        }
        global
            .declare_var("var_total_cost", Unit::EUR, Domain::Continuous)
            .insert(Index::scalar(), Bounds::FREE);

        let mut total = UExpr::zero(Unit::EUR);
        for (name, node) in &self.nodes {
            let nb = &node.block;
            let mut cost = UExpr::zero(Unit::EUR);
            for tec in node.technologies.active() {
                let tb = &tec.block;
                cost += tb.var("var_CAPEX", Index::scalar())?;
                cost += tb.var("var_OPEX_fixed", Index::scalar())?;
                for t in 1..=timesteps {
                    cost += tb.var("var_OPEX_variable", Index::t(t))?;
                }
            }
            for t in 1..=timesteps {
                for car in carriers {
                    let idx = Index::tc(t, car);
                    let import_price = nb.param("para_import_price", &idx)?;
                    let export_price = nb.param("para_export_price", &idx)?;
                    cost += import_price * dt * nb.var("var_import_flow", idx.clone())?;
                    cost -= export_price * dt * nb.var("var_export_flow", idx)?;
                }
            }
            let var = global.var("var_node_cost", Index::name(name))?;
            total += var.clone();
            global.constrain("const_node_cost", Index::name(name), var, Sense::Eq, cost)?;
        }
        let total_cost = global.var("var_total_cost", Index::scalar())?;
        global.constrain("const_cost", Index::scalar(), total_cost, Sense::Eq, total)?;

        // Emissions
        let mut pos = UExpr::zero(Unit::TONNE);
        let mut neg = UExpr::zero(Unit::TONNE);
        for node in self.nodes.values() {
            pos += node.block.var("var_car_emissions_pos", Index::scalar())?;
            neg += node.block.var("var_car_emissions_neg", Index::scalar())?;
            for tec in node.technologies.active() {
                pos += tec.block.var("var_tec_emissions_pos", Index::scalar())?;
                neg += tec.block.var("var_tec_emissions_neg", Index::scalar())?;
            }
        }
        if let Some((expected, found)) = pos.clash().or(neg.clash()) {
            return Err(EhubError::UnitMismatch {
                entity: "model".to_string(),
                constraint: "emissions".to_string(),
                expected,
                found,
            });
        }
        global.add_expression("emissions_net", Index::scalar(), pos.clone() - neg.clone());
        global.add_expression("emissions_pos", Index::scalar(), pos);
        global.add_expression("emissions_neg", Index::scalar(), neg);

        let stats = global.stats();
        info!(
            constraints = stats.constraints,
            variables = stats.variables,
            "constructed balances"
        );
        self.global = Some(global);
        Ok(())
    }

    /// Whether any technology requests the big-M relaxation.
    pub fn needs_relaxation(&self) -> bool {
        self.needs_relaxation
    }

    pub fn nodes(&self) -> &IndexMap<String, NodeBlock> {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&NodeBlock> {
        self.nodes.get(name)
    }

    pub fn networks(&self) -> &IndexMap<String, NetworkBlock> {
        &self.networks
    }

    pub fn network(&self, name: &str) -> Option<&NetworkBlock> {
        self.networks.get(name)
    }

    /// Global block; `None` until balances are constructed.
    pub fn global(&self) -> Option<&Block> {
        self.global.as_ref()
    }

    /// The minimised cost variable.
    pub fn objective(&self) -> EhubResult<UExpr> {
        self.global
            .as_ref()
            .ok_or_else(|| EhubError::missing("model", "var_total_cost (construct_balances first)"))?
            .var("var_total_cost", Index::scalar())
    }

    /// Every block of the model: networks, nodes, active technologies, global.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.networks
            .values()
            .map(|n| &n.block)
            .chain(self.nodes.values().flat_map(|node| {
                std::iter::once(&node.block)
                    .chain(node.technologies.active().map(|t| &t.block))
            }))
            .chain(self.global.iter())
    }

    /// Blocks ready for lowering: blocks with disjunctions are replaced by
    /// their big-M form, all others are borrowed.
    pub fn relaxed_blocks(&self) -> Vec<Cow<'_, Block>> {
        if self.needs_relaxation {
            info!(fallback_m = self.options.big_m, "applying big-M relaxation");
        }
        self.blocks()
            .map(|block| {
                if block.has_disjunctions() {
                    Cow::Owned(relaxation::big_m(block, self.options.big_m))
                } else {
                    Cow::Borrowed(block)
                }
            })
            .collect()
    }

    pub fn stats(&self) -> ModelStats {
        let blocks: Vec<BlockSummary> = self
            .blocks()
            .map(|b| BlockSummary {
                entity: b.entity().to_string(),
                stats: b.stats(),
            })
            .collect();
        let mut totals = BlockStats::default();
        for b in &blocks {
            totals += b.stats;
        }
        ModelStats {
            nodes: self.nodes.len(),
            technologies: self
                .nodes
                .values()
                .map(|n| n.technologies.technologies().len())
                .sum(),
            networks: self.networks.len(),
            needs_relaxation: self.needs_relaxation,
            balances: self.global.is_some(),
            totals,
            blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{res_case, ResCase};

    #[test]
    fn test_balance_covers_technology_output() {
        let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
        hub.construct_model().unwrap();
        hub.construct_balances().unwrap();

        let global = hub.global().unwrap();
        let c = global
            .constraint("const_energybalance", &Index::tc(1, "electricity").with("onshore"))
            .unwrap();
        let output = hub.node("onshore").unwrap().technologies.get("PV").unwrap().block.var_ref(
            "var_output",
            Index::tc(1, "electricity"),
        );
        assert_eq!(c.coefficient(&output), 1.0);
        assert_eq!(c.rhs, 1.0);
    }

    #[test]
    fn test_adding_technologies_discards_balances() {
        let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
        hub.construct_model().unwrap();
        hub.construct_balances().unwrap();
        assert!(hub.objective().is_ok());

        hub.add_technologies("onshore", &["PV".to_string()]).unwrap();
        assert!(hub.global().is_none());
        assert!(hub.objective().is_err());
    }

    #[test]
    fn test_zero_timesteps_rejected() {
        let mut data = res_case(ResCase::default());
        data.topology.timesteps = 0;
        let mut hub = EnergyHub::new(data, BuildOptions::default());
        assert!(matches!(
            hub.construct_model(),
            Err(EhubError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_node() {
        let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
        hub.construct_model().unwrap();
        let err = hub.add_technologies("offshore", &[]).unwrap_err();
        assert!(err.to_string().contains("offshore"));
    }

    #[test]
    fn test_stats_count_every_block() {
        let mut hub = EnergyHub::new(res_case(ResCase::default()), BuildOptions::default());
        hub.construct_model().unwrap();
        hub.construct_balances().unwrap();
        let stats = hub.stats();
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.technologies, 1);
        // node, PV, global
        assert_eq!(stats.blocks.len(), 3);
        assert!(stats.balances);
        assert_eq!(
            stats.totals.variables,
            stats.blocks.iter().map(|b| b.stats.variables).sum::<usize>()
        );
    }
}
