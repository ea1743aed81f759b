//! Lowering of an assembled model to `good_lp`.
//!
//! Every scalar variable of every block becomes one `good_lp` variable with
//! its bounds. Blocks holding disjunctions are replaced by their big-M form
//! first (see [`EnergyHub::relaxed_blocks`]). The objective is the global
//! `var_total_cost`, so balances must have been constructed.
//!
//! Clarabel is an LP/conic solver: integer and binary variables are relaxed
//! to their continuous bounds, with a warning. HiGHS (feature `solver-highs`)
//! keeps integrality unless [`SolverOptions::relax_integrality`] is set.

use std::time::Instant;

use crate::assembler::EnergyHub;
use crate::expr::{Index, LinearExpr, Scope, Sense, VarRef};
use crate::options::{Backend, SolverOptions};
#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, variables, Expression, ProblemVariables, Solution, SolverModel, Variable,
};
use ehub_core::{EhubError, EhubResult};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

/// Values of a solved model.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredSolution {
    pub backend: Backend,
    /// Whether integer variables were solved as continuous.
    pub integrality_relaxed: bool,
    pub objective: f64,
    pub values: IndexMap<VarRef, f64>,
}

/// Headline results, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveSummary {
    pub backend: String,
    pub integrality_relaxed: bool,
    pub objective: f64,
    pub emissions_net: f64,
    /// `node/technology` → size
    pub sizes: IndexMap<String, f64>,
}

impl LoweredSolution {
    pub fn value(&self, var: &VarRef) -> Option<f64> {
        self.values.get(var).copied()
    }

    /// Value of `expr`; variables without a value count as zero.
    pub fn evaluate(&self, expr: &LinearExpr) -> f64 {
        expr.evaluate(|v| self.value(v).unwrap_or(0.0))
    }

    /// Installed size of `technology` at `node`.
    pub fn size(&self, node: &str, technology: &str) -> Option<f64> {
        self.value(&VarRef::new(
            Scope::technology(node, technology),
            "var_size",
            Index::scalar(),
        ))
    }

    pub fn summary(&self, hub: &EnergyHub) -> SolveSummary {
        let mut sizes = IndexMap::new();
        for (node, block) in hub.nodes() {
            for tec in block.technologies.technologies() {
                if let Some(size) = self.size(node, tec) {
                    sizes.insert(format!("{node}/{tec}"), size);
                }
            }
        }
        let emissions_net = hub
            .global()
            .and_then(|g| g.expression("emissions_net", &Index::scalar()))
            .map(|e| self.evaluate(e.expr()))
            .unwrap_or(0.0);
        SolveSummary {
            backend: self.backend.to_string(),
            integrality_relaxed: self.integrality_relaxed,
            objective: self.objective,
            emissions_net,
            sizes,
        }
    }
}

/// One normalised constraint row.
struct Row {
    expr: Expression,
    sense: Sense,
    rhs: f64,
}

fn to_expression(expr: &LinearExpr, handles: &IndexMap<VarRef, Variable>) -> EhubResult<Expression> {
    let mut out = Expression::from(expr.constant());
    for (var, coef) in expr.terms() {
        let handle = handles.get(var).ok_or_else(|| {
            EhubError::Solver(format!("expression references undeclared variable {var}"))
        })?;
        out += coef * *handle;
    }
    Ok(out)
}

fn add_rows<M: SolverModel>(mut model: M, rows: Vec<Row>) -> M {
    for row in rows {
        let Row { expr, sense, rhs } = row;
        model = match sense {
            Sense::Le => model.with(constraint!(expr <= rhs)),
            Sense::Ge => model.with(constraint!(expr >= rhs)),
            Sense::Eq => model.with(constraint!(expr == rhs)),
        };
    }
    model
}

fn run<M>(
    model: M,
    rows: Vec<Row>,
    handles: &IndexMap<VarRef, Variable>,
) -> EhubResult<IndexMap<VarRef, f64>>
where
    M: SolverModel,
    M::Error: std::fmt::Debug,
{
    let solution = add_rows(model, rows)
        .solve()
        .map_err(|e| EhubError::Solver(format!("{:?}", e)))?;
    Ok(handles
        .iter()
        .map(|(var, handle)| (var.clone(), solution.value(*handle)))
        .collect())
}

/// Lower `hub` and solve it with the configured backend.
pub fn solve(hub: &EnergyHub, options: &SolverOptions) -> EhubResult<LoweredSolution> {
    let start = Instant::now();
    let objective = hub.objective()?;
    let keep_integers = options.backend.supports_integers() && !options.relax_integrality;

    let blocks = hub.relaxed_blocks();
    let mut vars: ProblemVariables = variables!();
    let mut handles = IndexMap::new();
    let mut integers = 0usize;
    for block in &blocks {
        for (var, decl, bounds) in block.variables() {
            let mut def = variable();
            if bounds.lower.is_finite() {
                def = def.min(bounds.lower);
            }
            if bounds.upper.is_finite() {
                def = def.max(bounds.upper);
            }
            if decl.domain.is_integer() {
                integers += 1;
                if keep_integers {
                    def = def.integer();
                }
            }
            handles.insert(var, vars.add(def));
        }
    }
    if integers > 0 && !keep_integers {
        warn!(
            backend = %options.backend,
            integer_variables = integers,
            "solving the continuous relaxation; integer variables are not enforced"
        );
    }

    let mut rows = Vec::new();
    for block in &blocks {
        for (_, _, c) in block.constraints() {
            rows.push(Row {
                expr: to_expression(&c.expr, &handles)?,
                sense: c.sense,
                rhs: c.rhs,
            });
        }
    }
    let objective_expr = to_expression(objective.expr(), &handles)?;
    let problem = vars.minimise(objective_expr);

    info!(
        backend = %options.backend,
        variables = handles.len(),
        constraints = rows.len(),
        "lowered model"
    );

    let values = match options.backend {
        #[cfg(feature = "solver-clarabel")]
        Backend::Clarabel => run(problem.using(clarabel), rows, &handles)?,
        #[cfg(feature = "solver-highs")]
        Backend::Highs => run(problem.using(highs), rows, &handles)?,
        #[allow(unreachable_patterns)]
        other => {
            return Err(EhubError::Solver(format!(
                "backend '{other}' is not compiled in (enable feature solver-{other})"
            )))
        }
    };

    let solution = LoweredSolution {
        backend: options.backend,
        integrality_relaxed: integers > 0 && !keep_integers,
        objective: objective
            .expr()
            .evaluate(|v| values.get(v).copied().unwrap_or(0.0)),
        values,
    };
    info!(
        objective = solution.objective,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "solved model"
    );
    Ok(solution)
}
