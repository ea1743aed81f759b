//! Symbolic building blocks: indices, variable references, linear
//! expressions and constraints.
//!
//! The model is constructed symbolically and only lowered to a solver at the
//! very end (see [`crate::lower`]). Every expression built by the technology,
//! node and network builders carries a [`Unit`]; adding two expressions of
//! different units, or constraining one side against a differently
//! dimensioned other side, surfaces as [`EhubError::UnitMismatch`] when the
//! constraint is created.
//!
//! # Example
//!
//! ```
//! use ehub_core::Unit;
//! use ehub_model::expr::{Index, Quantity, Scope, Sense, UExpr, VarRef, LinearConstraint};
//!
//! let scope = Scope::technology("onshore", "PV");
//! let size = UExpr::var(VarRef::new(scope.clone(), "var_size", Index::scalar()), Unit::MW);
//! let output = UExpr::var(VarRef::new(scope, "var_output", Index::tc(1, "electricity")), Unit::MW);
//!
//! let cf = Quantity::scalar(0.5);
//! let c = LinearConstraint::build("PV", "const_input_output", output, Sense::Eq, cf * size).unwrap();
//! assert_eq!(c.rhs, 0.0);
//! ```

use ehub_core::{node_entity, technology_entity, EhubError, EhubResult, Unit};
use indexmap::IndexMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Owner of a variable: the block it was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Model-level balances and objective.
    Global,
    Node(String),
    Technology { node: String, technology: String },
    Network(String),
}

impl Scope {
    pub fn node(node: &str) -> Self {
        Scope::Node(node.to_string())
    }

    pub fn technology(node: &str, technology: &str) -> Self {
        Scope::Technology {
            node: node.to_string(),
            technology: technology.to_string(),
        }
    }

    pub fn network(name: &str) -> Self {
        Scope::Network(name.to_string())
    }

    /// Label used as the `entity` of errors raised while building this scope.
    pub fn entity(&self) -> String {
        match self {
            Scope::Global => "model".to_string(),
            Scope::Node(node) => node_entity(node),
            Scope::Technology { node, technology } => technology_entity(node, technology),
            Scope::Network(name) => format!("network '{name}'"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "model"),
            Scope::Node(node) => write!(f, "{node}"),
            Scope::Technology { node, technology } => write!(f, "{node}/{technology}"),
            Scope::Network(name) => write!(f, "netw:{name}"),
        }
    }
}

/// One component of an index: a time step or a set member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    T(usize),
    Name(String),
}

impl From<usize> for Key {
    fn from(t: usize) -> Self {
        Key::T(t)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::T(t) => write!(f, "{t}"),
            Key::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Position of a component inside an indexed family (empty for scalars).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index(Vec<Key>);

impl Index {
    pub fn scalar() -> Self {
        Index(Vec::new())
    }

    pub fn of<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        Index(keys.into_iter().map(Into::into).collect())
    }

    /// `(t)`
    pub fn t(t: usize) -> Self {
        Index(vec![Key::T(t)])
    }

    /// `(t, carrier)`
    pub fn tc(t: usize, carrier: &str) -> Self {
        Index(vec![Key::T(t), Key::from(carrier)])
    }

    /// `(name)`
    pub fn name(name: &str) -> Self {
        Index(vec![Key::from(name)])
    }

    /// This index extended by one more key.
    pub fn with(&self, key: impl Into<Key>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        Index(keys)
    }

    /// This index followed by all keys of `other`.
    pub fn join(&self, other: &Index) -> Self {
        let mut keys = self.0.clone();
        keys.extend(other.0.iter().cloned());
        Index(keys)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, "[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "]")
    }
}

/// Fully qualified reference to one scalar decision variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarRef {
    pub scope: Scope,
    pub name: String,
    pub index: Index,
}

impl VarRef {
    pub fn new(scope: Scope, name: &str, index: Index) -> Self {
        Self {
            scope,
            name: name.to_string(),
            index,
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.scope, self.name, self.index)
    }
}

/// Affine expression `Σ coef·var + constant`.
///
/// Terms are kept in insertion order and are never pruned, so a term with a
/// zero coefficient stays visible in the constraint it was written into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<VarRef, f64>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constant(value: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant: value,
        }
    }

    pub fn term(var: VarRef, coef: f64) -> Self {
        let mut expr = Self::new();
        expr.add_term(var, coef);
        expr
    }

    pub fn add_term(&mut self, var: VarRef, coef: f64) {
        *self.terms.entry(var).or_insert(0.0) += coef;
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn coefficient(&self, var: &VarRef) -> Option<f64> {
        self.terms.get(var).copied()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&VarRef, f64)> {
        self.terms.iter().map(|(v, c)| (v, *c))
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression under an assignment of the variables.
    pub fn evaluate(&self, value: impl Fn(&VarRef) -> f64) -> f64 {
        self.constant + self.terms.iter().map(|(v, c)| c * value(v)).sum::<f64>()
    }

    fn scaled(mut self, factor: f64) -> Self {
        for coef in self.terms.values_mut() {
            *coef *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl AddAssign<LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        for (var, coef) in rhs.terms {
            self.add_term(var, coef);
        }
        self.constant += rhs.constant;
    }
}

impl SubAssign<LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: LinearExpr) {
        *self += rhs.scaled(-1.0);
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;
    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self -= rhs;
        self
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;
    fn neg(self) -> LinearExpr {
        self.scaled(-1.0)
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;
    fn mul(self, rhs: f64) -> LinearExpr {
        self.scaled(rhs)
    }
}

/// A parameter value together with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(value, Unit::DIMENSIONLESS)
    }
}

impl Mul for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.value * rhs.value, self.unit * rhs.unit)
    }
}

impl Neg for Quantity {
    type Output = Quantity;
    fn neg(self) -> Quantity {
        Quantity::new(-self.value, self.unit)
    }
}

/// A [`LinearExpr`] tagged with its unit.
///
/// Adding or subtracting expressions of different units does not panic; the
/// first clash is remembered and reported by [`LinearConstraint::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct UExpr {
    expr: LinearExpr,
    unit: Unit,
    clash: Option<(Unit, Unit)>,
}

impl UExpr {
    pub fn zero(unit: Unit) -> Self {
        Self {
            expr: LinearExpr::new(),
            unit,
            clash: None,
        }
    }

    pub fn var(var: VarRef, unit: Unit) -> Self {
        Self {
            expr: LinearExpr::term(var, 1.0),
            unit,
            clash: None,
        }
    }

    pub fn constant(q: Quantity) -> Self {
        Self {
            expr: LinearExpr::from_constant(q.value),
            unit: q.unit,
            clash: None,
        }
    }

    /// Sum of `items`, starting from zero in `unit`.
    pub fn sum(unit: Unit, items: impl IntoIterator<Item = UExpr>) -> Self {
        items.into_iter().fold(UExpr::zero(unit), |acc, item| acc + item)
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }

    pub fn into_expr(self) -> LinearExpr {
        self.expr
    }

    /// First `(expected, found)` unit pair that did not match while combining.
    pub fn clash(&self) -> Option<(Unit, Unit)> {
        self.clash
    }

    fn combine(mut self, rhs: UExpr, sign: f64) -> Self {
        if self.clash.is_none() {
            self.clash = rhs.clash;
        }
        if self.clash.is_none() && self.unit != rhs.unit {
            self.clash = Some((self.unit, rhs.unit));
        }
        self.expr += rhs.expr.scaled(sign);
        self
    }
}

impl Add for UExpr {
    type Output = UExpr;
    fn add(self, rhs: UExpr) -> UExpr {
        self.combine(rhs, 1.0)
    }
}

impl Sub for UExpr {
    type Output = UExpr;
    fn sub(self, rhs: UExpr) -> UExpr {
        self.combine(rhs, -1.0)
    }
}

impl AddAssign for UExpr {
    fn add_assign(&mut self, rhs: UExpr) {
        let unit = self.unit;
        let lhs = std::mem::replace(self, UExpr::zero(unit));
        *self = lhs + rhs;
    }
}

impl SubAssign for UExpr {
    fn sub_assign(&mut self, rhs: UExpr) {
        let unit = self.unit;
        let lhs = std::mem::replace(self, UExpr::zero(unit));
        *self = lhs - rhs;
    }
}

impl Neg for UExpr {
    type Output = UExpr;
    fn neg(mut self) -> UExpr {
        self.expr = -self.expr;
        self
    }
}

impl Mul<Quantity> for UExpr {
    type Output = UExpr;
    fn mul(mut self, rhs: Quantity) -> UExpr {
        self.expr = self.expr.scaled(rhs.value);
        self.unit = self.unit * rhs.unit;
        self
    }
}

impl Mul<UExpr> for Quantity {
    type Output = UExpr;
    fn mul(self, rhs: UExpr) -> UExpr {
        rhs * self
    }
}

/// Relation between the two sides of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Ge => write!(f, ">="),
            Sense::Eq => write!(f, "=="),
        }
    }
}

/// `expr (sense) rhs` with all variables on the left and the constant on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
    pub unit: Unit,
}

impl LinearConstraint {
    /// Normalise `lhs (sense) rhs`, checking that both sides share one unit.
    pub fn build(
        entity: &str,
        name: &str,
        lhs: UExpr,
        sense: Sense,
        rhs: UExpr,
    ) -> EhubResult<Self> {
        let mismatch = |expected: Unit, found: Unit| EhubError::UnitMismatch {
            entity: entity.to_string(),
            constraint: name.to_string(),
            expected,
            found,
        };
        if let Some((expected, found)) = lhs.clash().or(rhs.clash()) {
            return Err(mismatch(expected, found));
        }
        if lhs.unit() != rhs.unit() {
            return Err(mismatch(lhs.unit(), rhs.unit()));
        }

        let unit = lhs.unit();
        let mut expr = lhs.into_expr() - rhs.into_expr();
        let rhs = -expr.constant();
        expr.constant = 0.0;
        Ok(Self {
            expr,
            sense,
            rhs,
            unit,
        })
    }

    /// Assemble an already normalised constraint.
    pub fn from_parts(expr: LinearExpr, sense: Sense, rhs: f64, unit: Unit) -> Self {
        let rhs = rhs - expr.constant();
        let mut expr = expr;
        expr.constant = 0.0;
        Self {
            expr,
            sense,
            rhs,
            unit,
        }
    }

    pub fn coefficient(&self, var: &VarRef) -> f64 {
        self.expr.coefficient(var).unwrap_or(0.0)
    }

    pub fn references(&self, var: &VarRef) -> bool {
        self.expr.coefficient(var).is_some()
    }

    pub fn is_satisfied(&self, value: impl Fn(&VarRef) -> f64, tol: f64) -> bool {
        let lhs = self.expr.evaluate(value);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Ge => lhs >= self.rhs - tol,
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expr.is_empty() {
            write!(f, "0")?;
        }
        for (i, (var, coef)) in self.expr.terms().enumerate() {
            let sign = if coef < 0.0 { "-" } else { "+" };
            if i == 0 {
                if coef < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            write!(f, "{} {var}", coef.abs())?;
        }
        write!(f, " {} {}", self.sense, self.rhs)
    }
}
