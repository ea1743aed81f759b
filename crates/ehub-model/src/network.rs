//! Network blocks.
//!
//! A network transports its carriers along directed arcs between connected
//! nodes. Node blocks see a network only through the contract variables
//! `var_inflow(t,c,n)` and `var_outflow(t,c,n)`:
//!
//! ```text
//! var_flow(t,c,from,to) >= 0                       for every connected pair
//! var_inflow(t,c,n)  = Σ_from var_flow(t,c,from,n)
//! var_outflow(t,c,n) = Σ_to   var_flow(t,c,n,to)
//! ```
//!
//! Transport is lossless and consumes no energy at the nodes.

use crate::block::{Block, Bounds, Domain};
use crate::expr::{Index, Scope, Sense, UExpr, VarRef};
use ehub_core::{EhubError, EhubResult, EnergyHubData, Unit};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkBlock {
    pub name: String,
    pub block: Block,
}

impl NetworkBlock {
    pub fn carriers(&self) -> &[String] {
        self.block.set("set_netw_carrier").unwrap_or(&[])
    }

    pub fn carries(&self, carrier: &str) -> bool {
        self.carriers().iter().any(|c| c == carrier)
    }

    /// Arriving flow of `carrier` at `node` in step `t`.
    pub fn inflow(&self, t: usize, carrier: &str, node: &str) -> EhubResult<UExpr> {
        self.block.var("var_inflow", Index::tc(t, carrier).with(node))
    }

    /// Leaving flow of `carrier` at `node` in step `t`.
    pub fn outflow(&self, t: usize, carrier: &str, node: &str) -> EhubResult<UExpr> {
        self.block.var("var_outflow", Index::tc(t, carrier).with(node))
    }

    pub fn flow_ref(&self, t: usize, carrier: &str, from: &str, to: &str) -> VarRef {
        self.block
            .var_ref("var_flow", Index::tc(t, carrier).with(from).with(to))
    }
}

pub fn build_network_block(data: &EnergyHubData, name: &str) -> EhubResult<NetworkBlock> {
    let netw = data.network(name)?;
    let entity = format!("network '{name}'");
    let nodes = &data.topology.nodes;
    let timesteps = data.topology.timesteps;

    for (from, row) in &netw.connection {
        for to in row.keys() {
            for end in [from, to] {
                if !nodes.contains(end) {
                    return Err(EhubError::invalid(
                        &entity,
                        format!("connection[{from}][{to}]"),
                        format!("unknown node '{end}'"),
                    ));
                }
            }
        }
    }

    let mut block = Block::new(Scope::network(name));
    block.add_set("set_netw_carrier", netw.carriers.clone());

    let mut arcs = Vec::new();
    let connection = block.declare_param("para_connection", Unit::DIMENSIONLESS);
    for from in nodes {
        for to in nodes {
            let connected = from != to && netw.is_connected(from, to);
            connection.insert(Index::of([from, to]), if connected { 1.0 } else { 0.0 });
            if connected {
                arcs.push((from.clone(), to.clone()));
            }
        }
    }
    // Distances in km; carried for cost and loss extensions.
    let distance = block.declare_param("para_distance", Unit::DIMENSIONLESS);
    for (from, to) in &arcs {
        let d = netw.distance(from, to).ok_or_else(|| {
            EhubError::missing(&entity, format!("distance[{from}][{to}]"))
        })?;
        distance.insert(Index::of([from, to]), d);
    }

    let flow = block.declare_var("var_flow", Unit::MW, Domain::Continuous);
    for t in 1..=timesteps {
        for car in &netw.carriers {
            for (from, to) in &arcs {
                flow.insert(
                    Index::tc(t, car).with(from).with(to),
                    Bounds::NON_NEGATIVE,
                );
            }
        }
    }
    for var in ["var_inflow", "var_outflow"] {
        let v = block.declare_var(var, Unit::MW, Domain::Continuous);
        for t in 1..=timesteps {
            for car in &netw.carriers {
                for node in nodes {
                    v.insert(Index::tc(t, car).with(node), Bounds::NON_NEGATIVE);
                }
            }
        }
    }

    for t in 1..=timesteps {
        for car in &netw.carriers {
            for node in nodes {
                let idx = Index::tc(t, car).with(node);

                let arriving = arcs
                    .iter()
                    .filter(|(_, to)| to == node)
                    .map(|(from, to)| block.var("var_flow", Index::tc(t, car).with(from).with(to)))
                    .collect::<EhubResult<Vec<_>>>()?;
                let inflow = block.var("var_inflow", idx.clone())?;
                block.constrain(
                    "const_inflow",
                    idx.clone(),
                    inflow,
                    Sense::Eq,
                    UExpr::sum(Unit::MW, arriving),
                )?;

                let leaving = arcs
                    .iter()
                    .filter(|(from, _)| from == node)
                    .map(|(from, to)| block.var("var_flow", Index::tc(t, car).with(from).with(to)))
                    .collect::<EhubResult<Vec<_>>>()?;
                let outflow = block.var("var_outflow", idx.clone())?;
                block.constrain(
                    "const_outflow",
                    idx,
                    outflow,
                    Sense::Eq,
                    UExpr::sum(Unit::MW, leaving),
                )?;
            }
        }
    }

    debug!(
        network = name,
        arcs = arcs.len(),
        carriers = netw.carriers.len(),
        "built network block"
    );
    Ok(NetworkBlock {
        name: name.to_string(),
        block,
    })
}
