//! Named containers of sets, parameters, variables and constraints.
//!
//! A [`Block`] is the unit every builder produces: one per node, one per
//! technology at a node, one per network and one global block for balances
//! and the objective. Components are stored in [`IndexMap`]s keyed by
//! component name and then by [`Index`], so two builds from the same data
//! compare equal.
//!
//! Disjunctions ("exactly one of these constraint groups holds") are stored
//! as first-class components and stay symbolic until
//! [`crate::relaxation::big_m`] rewrites them.

use crate::expr::{Index, LinearConstraint, Quantity, Scope, Sense, UExpr, VarRef};
use ehub_core::{EhubError, EhubResult, Unit};
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::AddAssign;

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Continuous,
    Integer,
    /// Integer in `[0, 1]`.
    Binary,
}

impl Domain {
    pub fn is_integer(self) -> bool {
        matches!(self, Domain::Integer | Domain::Binary)
    }
}

/// Closed interval of admissible values; infinite ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const FREE: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };
    pub const NON_NEGATIVE: Bounds = Bounds {
        lower: 0.0,
        upper: f64::INFINITY,
    };
    pub const BINARY: Bounds = Bounds {
        lower: 0.0,
        upper: 1.0,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64, tol: f64) -> bool {
        value >= self.lower - tol && value <= self.upper + tol
    }
}

/// An indexed parameter family.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub unit: Unit,
    pub values: IndexMap<Index, f64>,
}

impl Param {
    pub fn insert(&mut self, index: Index, value: f64) {
        self.values.insert(index, value);
    }
}

/// An indexed variable family; every admissible index carries its own bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub unit: Unit,
    pub domain: Domain,
    pub bounds: IndexMap<Index, Bounds>,
}

impl Var {
    pub fn insert(&mut self, index: Index, bounds: Bounds) {
        self.bounds.insert(index, bounds);
    }
}

/// One alternative of a [`Disjunction`]: a named group of constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Disjunct {
    pub label: String,
    /// Name of the constraint family inside the disjunct.
    pub family: String,
    pub constraints: IndexMap<Index, LinearConstraint>,
}

impl Disjunct {
    pub fn new(label: &str, family: &str) -> Self {
        Self {
            label: label.to_string(),
            family: family.to_string(),
            constraints: IndexMap::new(),
        }
    }
}

/// Exactly one of the disjuncts holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Disjunction {
    pub disjuncts: Vec<Disjunct>,
}

/// Component counts of one block (or of a whole model when summed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockStats {
    pub parameters: usize,
    pub variables: usize,
    pub integer_variables: usize,
    pub constraints: usize,
    pub disjunctions: usize,
}

impl AddAssign for BlockStats {
    fn add_assign(&mut self, rhs: BlockStats) {
        self.parameters += rhs.parameters;
        self.variables += rhs.variables;
        self.integer_variables += rhs.integer_variables;
        self.constraints += rhs.constraints;
        self.disjunctions += rhs.disjunctions;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    scope: Scope,
    entity: String,
    sets: IndexMap<String, Vec<String>>,
    params: IndexMap<String, Param>,
    vars: IndexMap<String, Var>,
    constraints: IndexMap<String, IndexMap<Index, LinearConstraint>>,
    disjunctions: IndexMap<String, IndexMap<Index, Disjunction>>,
    expressions: IndexMap<String, IndexMap<Index, UExpr>>,
}

impl Block {
    pub fn new(scope: Scope) -> Self {
        let entity = scope.entity();
        Self {
            scope,
            entity,
            sets: IndexMap::new(),
            params: IndexMap::new(),
            vars: IndexMap::new(),
            constraints: IndexMap::new(),
            disjunctions: IndexMap::new(),
            expressions: IndexMap::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Label of the owning entity, as used in errors.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------

    pub fn add_set(&mut self, name: &str, members: Vec<String>) {
        self.sets.insert(name.to_string(), members);
    }

    pub fn set(&self, name: &str) -> EhubResult<&[String]> {
        self.sets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EhubError::missing(self.entity.clone(), name))
    }

    pub fn sets(&self) -> &IndexMap<String, Vec<String>> {
        &self.sets
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Declare a parameter family (or fetch it if already declared).
    pub fn declare_param(&mut self, name: &str, unit: Unit) -> &mut Param {
        self.params.entry(name.to_string()).or_insert_with(|| Param {
            unit,
            values: IndexMap::new(),
        })
    }

    pub fn param(&self, name: &str, index: &Index) -> EhubResult<Quantity> {
        let param = self
            .params
            .get(name)
            .ok_or_else(|| EhubError::missing(self.entity.clone(), name))?;
        param
            .values
            .get(index)
            .map(|v| Quantity::new(*v, param.unit))
            .ok_or_else(|| EhubError::missing(self.entity.clone(), format!("{name}{index}")))
    }

    pub fn params(&self) -> &IndexMap<String, Param> {
        &self.params
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// Declare a variable family (or fetch it if already declared).
    pub fn declare_var(&mut self, name: &str, unit: Unit, domain: Domain) -> &mut Var {
        self.vars.entry(name.to_string()).or_insert_with(|| Var {
            unit,
            domain,
            bounds: IndexMap::new(),
        })
    }

    pub fn var_ref(&self, name: &str, index: Index) -> VarRef {
        VarRef::new(self.scope.clone(), name, index)
    }

    /// Expression for a declared variable; unknown names or indices are errors.
    pub fn var(&self, name: &str, index: Index) -> EhubResult<UExpr> {
        let var = self
            .vars
            .get(name)
            .ok_or_else(|| EhubError::missing(self.entity.clone(), name))?;
        if !var.bounds.contains_key(&index) {
            return Err(EhubError::missing(
                self.entity.clone(),
                format!("{name}{index}"),
            ));
        }
        Ok(UExpr::var(self.var_ref(name, index), var.unit))
    }

    pub fn has_var(&self, name: &str, index: &Index) -> bool {
        self.vars
            .get(name)
            .is_some_and(|v| v.bounds.contains_key(index))
    }

    /// Bounds of a variable declared in this block.
    pub fn var_bounds(&self, var: &VarRef) -> Option<Bounds> {
        if var.scope != self.scope {
            return None;
        }
        self.vars
            .get(&var.name)
            .and_then(|v| v.bounds.get(&var.index))
            .copied()
    }

    pub fn vars(&self) -> &IndexMap<String, Var> {
        &self.vars
    }

    /// Every scalar variable of the block with its unit, domain and bounds.
    pub fn variables(&self) -> impl Iterator<Item = (VarRef, &Var, Bounds)> + '_ {
        self.vars.iter().flat_map(move |(name, var)| {
            var.bounds
                .iter()
                .map(move |(index, b)| (self.var_ref(name, index.clone()), var, *b))
        })
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Add `lhs (sense) rhs` as member `index` of constraint family `name`.
    pub fn constrain(
        &mut self,
        name: &str,
        index: Index,
        lhs: UExpr,
        sense: Sense,
        rhs: UExpr,
    ) -> EhubResult<()> {
        let constraint = LinearConstraint::build(&self.entity, name, lhs, sense, rhs)?;
        self.insert_constraint(name, index, constraint);
        Ok(())
    }

    pub fn insert_constraint(&mut self, name: &str, index: Index, constraint: LinearConstraint) {
        self.constraints
            .entry(name.to_string())
            .or_default()
            .insert(index, constraint);
    }

    pub fn constraint(&self, name: &str, index: &Index) -> Option<&LinearConstraint> {
        self.constraints.get(name).and_then(|family| family.get(index))
    }

    pub fn constraint_family(&self, name: &str) -> Option<&IndexMap<Index, LinearConstraint>> {
        self.constraints.get(name)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (&str, &Index, &LinearConstraint)> {
        self.constraints.iter().flat_map(|(name, family)| {
            family
                .iter()
                .map(move |(index, c)| (name.as_str(), index, c))
        })
    }

    // ------------------------------------------------------------------
    // Disjunctions
    // ------------------------------------------------------------------

    pub fn add_disjunction(&mut self, name: &str, index: Index, disjunction: Disjunction) {
        self.disjunctions
            .entry(name.to_string())
            .or_default()
            .insert(index, disjunction);
    }

    pub fn disjunctions(&self) -> &IndexMap<String, IndexMap<Index, Disjunction>> {
        &self.disjunctions
    }

    pub fn has_disjunctions(&self) -> bool {
        self.disjunctions.values().any(|family| !family.is_empty())
    }

    /// Remove and return all disjunctions.
    pub fn take_disjunctions(&mut self) -> IndexMap<String, IndexMap<Index, Disjunction>> {
        std::mem::take(&mut self.disjunctions)
    }

    /// Build a constraint for use inside a disjunct, checked against this block's entity.
    pub fn disjunct_constraint(
        &self,
        name: &str,
        lhs: UExpr,
        sense: Sense,
        rhs: UExpr,
    ) -> EhubResult<LinearConstraint> {
        LinearConstraint::build(&self.entity, name, lhs, sense, rhs)
    }

    // ------------------------------------------------------------------
    // Named expressions
    // ------------------------------------------------------------------

    pub fn add_expression(&mut self, name: &str, index: Index, expr: UExpr) {
        self.expressions
            .entry(name.to_string())
            .or_default()
            .insert(index, expr);
    }

    pub fn expression(&self, name: &str, index: &Index) -> Option<&UExpr> {
        self.expressions.get(name).and_then(|family| family.get(index))
    }

    pub fn stats(&self) -> BlockStats {
        let mut stats = BlockStats {
            parameters: self.params.values().map(|p| p.values.len()).sum(),
            constraints: self.constraints.values().map(IndexMap::len).sum(),
            disjunctions: self.disjunctions.values().map(IndexMap::len).sum(),
            ..BlockStats::default()
        };
        for var in self.vars.values() {
            stats.variables += var.bounds.len();
            if var.domain.is_integer() {
                stats.integer_variables += var.bounds.len();
            }
        }
        stats
    }
}
