//! New / Active / Retired technology containers of one node.
//!
//! Each call of [`TechnologyLifecycle::add_technologies`] with an incoming set
//! `S_new` runs through the same states:
//!
//! ```text
//! 1. drop a stale New container
//! 2. New     <- fresh blocks for every technology in S_new
//! 3. Retired <- Active (moved), Active <- none
//! 4. technologies at node <- technologies at node ∪ S_new
//! 5. Active  <- for each technology at node: New if in S_new, else Retired
//! 6. drop New and Retired
//! ```
//!
//! Blocks are only ever moved between containers, never edited in place, and
//! the Active container is rebuilt as a whole each pass. All blocks of `S_new`
//! are built, and every installed technology is checked to have a block,
//! before any container is touched, so a failing pass leaves the node exactly
//! as it was.

use super::{build_technology_block, TechnologyBlock};
use crate::options::BuildOptions;
use ehub_core::{node_entity, EhubError, EhubResult, EnergyHubData};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

type Container = IndexMap<String, TechnologyBlock>;

#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyLifecycle {
    node: String,
    /// Grows monotonically across calls.
    tecs_at_node: IndexSet<String>,
    new: Option<Container>,
    active: Option<Container>,
}

impl TechnologyLifecycle {
    pub fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            tecs_at_node: IndexSet::new(),
            new: None,
            active: None,
        }
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Technologies installed at the node, in order of first addition.
    pub fn technologies(&self) -> &IndexSet<String> {
        &self.tecs_at_node
    }

    pub fn get(&self, technology: &str) -> Option<&TechnologyBlock> {
        self.active.as_ref().and_then(|active| active.get(technology))
    }

    /// Active technology blocks in installation order.
    pub fn active(&self) -> impl Iterator<Item = &TechnologyBlock> {
        self.active.iter().flat_map(|active| active.values())
    }

    /// Whether a New container survived a previous pass.
    pub fn has_pending_new(&self) -> bool {
        self.new.is_some()
    }

    /// Any active block still needs the big-M relaxation.
    pub fn needs_relaxation(&self) -> bool {
        self.active().any(|t| t.needs_relaxation)
    }

    /// Build `to_add` and merge it into the active set.
    ///
    /// Returns whether any of the freshly built blocks requests the big-M
    /// relaxation.
    pub fn add_technologies(
        &mut self,
        data: &EnergyHubData,
        to_add: &[String],
        options: &BuildOptions,
    ) -> EhubResult<bool> {
        // 1
        if self.new.take().is_some() {
            debug!(node = %self.node, "discarded stale new technology blocks");
        }

        // 2
        let incoming: IndexSet<&String> = to_add.iter().collect();
        let mut fresh = Container::with_capacity(incoming.len());
        for tec in &incoming {
            let built = build_technology_block(data, &self.node, tec, options)?;
            if let Some(existing) = self.get(tec) {
                if existing.archetype != built.archetype {
                    return Err(EhubError::TechnologyRedefinition {
                        node: self.node.clone(),
                        technology: tec.to_string(),
                        existing: existing.archetype.to_string(),
                        requested: built.archetype.to_string(),
                    });
                }
            }
            fresh.insert(tec.to_string(), built);
        }
        let needs_relaxation = fresh.values().any(|t| t.needs_relaxation);

        // 3, 4: checked against borrowed containers, committed below
        let mut tecs_at_node = self.tecs_at_node.clone();
        tecs_at_node.extend(incoming.iter().map(|tec| tec.to_string()));
        let has_block = |tec: &String| {
            fresh.contains_key(tec)
                || self.active.as_ref().is_some_and(|active| active.contains_key(tec))
        };
        if let Some(tec) = tecs_at_node.iter().find(|tec| !has_block(*tec)) {
            return Err(EhubError::missing(
                node_entity(&self.node),
                format!("tech_blocks_active[{tec}]"),
            ));
        }
        self.new = Some(fresh);
        let mut retired = self.active.take().unwrap_or_default();
        self.tecs_at_node = tecs_at_node;

        // 5
        let mut new = self.new.take().unwrap_or_default();
        let mut active = Container::with_capacity(self.tecs_at_node.len());
        for tec in &self.tecs_at_node {
            if let Some(block) = new.swap_remove(tec).or_else(|| retired.swap_remove(tec)) {
                active.insert(tec.clone(), block);
            }
        }

        // 6
        drop(retired);
        self.active = Some(active);

        debug!(
            node = %self.node,
            added = incoming.len(),
            installed = self.tecs_at_node.len(),
            needs_relaxation,
            "merged technology blocks"
        );
        Ok(needs_relaxation)
    }
}
