//! Dimensional bookkeeping for model quantities.
//!
//! Every parameter and variable in the model carries a [`Unit`]. A unit is a
//! vector of integer exponents over the four base dimensions that appear in
//! an energy-hub model:
//!
//! | Base | Meaning            |
//! |------|--------------------|
//! | `MW` | power              |
//! | `h`  | time               |
//! | `EUR`| money              |
//! | `t`  | mass of emissions  |
//!
//! Module counts (integer sizing) are dimensionless. Multiplying and dividing
//! units adds and subtracts exponents, so `MW * h == MWh` and
//! `EUR / MWh * MWh == EUR`.
//!
//! # Usage
//!
//! ```
//! use ehub_core::units::Unit;
//!
//! let cost = Unit::MW * Unit::H * Unit::EUR_PER_MWH;
//! assert_eq!(cost, Unit::EUR);
//! assert_eq!(Unit::MWH.to_string(), "MWh");
//! assert_eq!(Unit::EUR_PER_MWH.to_string(), "EUR/MWh");
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Div, Mul};

/// Physical dimension of a model quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Unit {
    mw: i8,
    h: i8,
    eur: i8,
    t: i8,
}

impl Unit {
    pub const DIMENSIONLESS: Unit = Unit::new(0, 0, 0, 0);
    pub const MW: Unit = Unit::new(1, 0, 0, 0);
    pub const H: Unit = Unit::new(0, 1, 0, 0);
    pub const PER_H: Unit = Unit::new(0, -1, 0, 0);
    pub const MWH: Unit = Unit::new(1, 1, 0, 0);
    pub const EUR: Unit = Unit::new(0, 0, 1, 0);
    pub const TONNE: Unit = Unit::new(0, 0, 0, 1);
    pub const EUR_PER_MWH: Unit = Unit::new(-1, -1, 1, 0);
    pub const EUR_PER_MW: Unit = Unit::new(-1, 0, 1, 0);
    pub const TONNE_PER_MWH: Unit = Unit::new(-1, -1, 0, 1);

    /// Build a unit from its exponents of MW, h, EUR and t.
    pub const fn new(mw: i8, h: i8, eur: i8, t: i8) -> Self {
        Self { mw, h, eur, t }
    }

    #[inline]
    pub fn is_dimensionless(self) -> bool {
        self == Unit::DIMENSIONLESS
    }

    /// Multiplicative inverse (`1 / self`).
    pub fn recip(self) -> Unit {
        Unit::new(-self.mw, -self.h, -self.eur, -self.t)
    }
}

impl Mul for Unit {
    type Output = Unit;
    fn mul(self, rhs: Unit) -> Unit {
        Unit::new(
            self.mw + rhs.mw,
            self.h + rhs.h,
            self.eur + rhs.eur,
            self.t + rhs.t,
        )
    }
}

impl Div for Unit {
    type Output = Unit;
    fn div(self, rhs: Unit) -> Unit {
        self * rhs.recip()
    }
}

fn push_factor(out: &mut Vec<String>, symbol: &str, exp: i8) {
    match exp {
        0 => {}
        1 => out.push(symbol.to_string()),
        n => out.push(format!("{symbol}^{n}")),
    }
}

/// Render one side (numerator or denominator) of a unit; MW directly followed
/// by h with equal exponent collapses into MWh.
fn render_side(mw: i8, h: i8, eur: i8, t: i8) -> Vec<String> {
    let mut out = Vec::new();
    push_factor(&mut out, "EUR", eur);
    push_factor(&mut out, "t", t);
    if mw > 0 && mw == h {
        push_factor(&mut out, "MWh", mw);
    } else {
        push_factor(&mut out, "MW", mw);
        push_factor(&mut out, "h", h);
    }
    out
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "-");
        }
        let num = render_side(
            self.mw.max(0),
            self.h.max(0),
            self.eur.max(0),
            self.t.max(0),
        );
        let den = render_side(
            (-self.mw).max(0),
            (-self.h).max(0),
            (-self.eur).max(0),
            (-self.t).max(0),
        );
        let num = if num.is_empty() {
            "1".to_string()
        } else {
            num.join(" ")
        };
        if den.is_empty() {
            write!(f, "{num}")
        } else {
            write!(f, "{num}/{}", den.join(" "))
        }
    }
}
