//! Big-M relaxation of disjunctions.
//!
//! A disjunction "exactly one of the disjuncts D_1..D_k holds" becomes, with
//! one binary indicator `y_k` per disjunct:
//!
//! ```text
//! Σ_k y_k = 1
//! a·x <= b   in D_k   →   a·x - b <= M · (1 - y_k)
//! a·x >= b   in D_k   →   b - a·x <= M · (1 - y_k)
//! a·x == b   in D_k   →   both of the above
//! ```
//!
//! ## Choice of M
//!
//! M is the smallest value that makes the constraint redundant when its
//! disjunct is inactive, computed by interval arithmetic over the bounds of
//! the variables involved: `M = max(a·x) - b` for `<=` and `M = b - min(a·x)`
//! for `>=`. If any variable is unbounded in the direction that matters, or
//! is not declared in the block being relaxed, the configured fallback
//! ([`crate::options::BuildOptions::big_m`]) is used. The M of every relaxed
//! constraint is recorded as parameter `<family>_big_m_{upper,lower}` so the
//! relaxation can be audited.

use crate::block::{Block, Bounds, Domain};
use crate::expr::{Index, LinearConstraint, LinearExpr, Sense};
use ehub_core::Unit;
use tracing::debug;

/// Largest and smallest value of `expr` over the box given by `bounds`.
fn expr_range(expr: &LinearExpr, bounds: impl Fn(&crate::expr::VarRef) -> Option<Bounds>) -> (f64, f64) {
    let mut lo = expr.constant();
    let mut hi = expr.constant();
    // zero coefficients would turn infinite bounds into NaN
    for (var, coef) in expr.terms().filter(|(_, coef)| *coef != 0.0) {
        let b = bounds(var).unwrap_or(Bounds::FREE);
        if coef > 0.0 {
            lo += coef * b.lower;
            hi += coef * b.upper;
        } else {
            lo += coef * b.upper;
            hi += coef * b.lower;
        }
    }
    (lo, hi)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

/// Return a copy of `block` with every disjunction replaced by its big-M form.
pub fn big_m(block: &Block, fallback_m: f64) -> Block {
    let mut relaxed = block.clone();
    let disjunctions = relaxed.take_disjunctions();
    let mut count = 0;

    for (name, family) in &disjunctions {
        let indicator = format!("{name}_indicator");
        let xor = format!("{name}_xor");
        for (index, disjunction) in family {
            let mut one_of = LinearExpr::new();
            for disjunct in &disjunction.disjuncts {
                let y_index = indicator_index(index, &disjunct.label);
                relaxed
                    .declare_var(&indicator, Unit::DIMENSIONLESS, Domain::Binary)
                    .insert(y_index.clone(), Bounds::BINARY);
                let y = relaxed.var_ref(&indicator, y_index);
                one_of.add_term(y.clone(), 1.0);

                for (sub_index, constraint) in &disjunct.constraints {
                    let c_index = index.join(sub_index);
                    let (lo, hi) = expr_range(&constraint.expr, |v| block.var_bounds(v));
                    let upper = matches!(constraint.sense, Sense::Le | Sense::Eq);
                    let lower = matches!(constraint.sense, Sense::Ge | Sense::Eq);

                    if upper {
                        // a·x + M·y <= b + M
                        let m = finite_or(hi - constraint.rhs, fallback_m);
                        let mut expr = constraint.expr.clone();
                        expr.add_term(y.clone(), m);
                        let family = format!("{}_upper", disjunct.family);
                        relaxed.insert_constraint(
                            &family,
                            c_index.clone(),
                            LinearConstraint::from_parts(expr, Sense::Le, constraint.rhs + m, constraint.unit),
                        );
                        relaxed
                            .declare_param(&format!("{}_big_m_upper", disjunct.family), constraint.unit)
                            .insert(c_index.clone(), m);
                    }
                    if lower {
                        // a·x - M·y >= b - M
                        let m = finite_or(constraint.rhs - lo, fallback_m);
                        let mut expr = constraint.expr.clone();
                        expr.add_term(y.clone(), -m);
                        let family = format!("{}_lower", disjunct.family);
                        relaxed.insert_constraint(
                            &family,
                            c_index.clone(),
                            LinearConstraint::from_parts(expr, Sense::Ge, constraint.rhs - m, constraint.unit),
                        );
                        relaxed
                            .declare_param(&format!("{}_big_m_lower", disjunct.family), constraint.unit)
                            .insert(c_index, m);
                    }
                }
            }
            relaxed.insert_constraint(
                &xor,
                index.clone(),
                LinearConstraint::from_parts(one_of, Sense::Eq, 1.0, Unit::DIMENSIONLESS),
            );
            count += 1;
        }
    }

    debug!(entity = relaxed.entity(), disjunctions = count, "applied big-M relaxation");
    relaxed
}

/// Index of the indicator of `label` in disjunction member `index`.
pub fn indicator_index(index: &Index, label: &str) -> Index {
    index.with(label)
}
