// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The numeric kernel (§4.1): arbitrary-precision rationals and log-domain
//! doubles, chosen once per run and carried through every diagram operation.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};
use ordered_float::OrderedFloat;

/// A weight or a partial/total solution, in whichever representation the
/// run was configured with. The two variants are never mixed within a
/// single run: `RunConfig` validation (see `config.rs`) guarantees that.
#[derive(Debug, Clone)]
pub enum Number {
    /// Exact rational arithmetic, for the multiple-precision backend.
    Rational(BigRational),
    /// `log10` of the represented value, for the log-counting backend.
    /// `f64::NEG_INFINITY` represents zero.
    Log(f64),
}

impl Number {
    pub fn zero_rational() -> Self {
        Number::Rational(BigRational::zero())
    }

    pub fn one_rational() -> Self {
        Number::Rational(BigRational::one())
    }

    pub fn zero_log() -> Self {
        Number::Log(f64::NEG_INFINITY)
    }

    pub fn one_log() -> Self {
        Number::Log(0.0)
    }

    pub fn from_f64_rational(v: f64) -> Self {
        Number::Rational(BigRational::from_float(v).unwrap_or_else(BigRational::zero))
    }

    pub fn from_f64_log(v: f64) -> Self {
        Number::Log(v.log10())
    }

    pub fn is_log(&self) -> bool {
        matches!(self, Number::Log(_))
    }

    /// The value's base-10 logarithm, regardless of representation.
    pub fn log10(&self) -> f64 {
        match self {
            Number::Rational(r) => r.to_f64().unwrap_or(f64::NAN).log10(),
            Number::Log(l) => *l,
        }
    }

    /// A double-precision mirror of the value (not `log10` of it).
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Rational(r) => r.to_f64().unwrap_or(f64::NAN),
            Number::Log(l) => 10f64.powf(*l),
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => Number::Rational(a + b),
            (Number::Log(a), Number::Log(b)) => Number::Log(log_sum_exp10(*a, *b)),
            _ => panic!("mixed numeric representations within a run"),
        }
    }

    pub fn mul(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => Number::Rational(a * b),
            (Number::Log(a), Number::Log(b)) => Number::Log(a + b),
            _ => panic!("mixed numeric representations within a run"),
        }
    }

    pub fn max(&self, other: &Number) -> Number {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => {
                Number::Rational(if a >= b { a.clone() } else { b.clone() })
            }
            (Number::Log(a), Number::Log(b)) => Number::Log(a.max(*b)),
            _ => panic!("mixed numeric representations within a run"),
        }
    }

    pub fn ge(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => a >= b,
            (Number::Log(a), Number::Log(b)) => a >= b,
            _ => panic!("mixed numeric representations within a run"),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_zero(),
            Number::Log(l) => *l == f64::NEG_INFINITY,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_one(),
            Number::Log(l) => *l == 0.0,
        }
    }

    /// Numerator/denominator pair, valid only in the rational representation.
    pub fn as_rational(&self) -> Option<&BigRational> {
        match self {
            Number::Rational(r) => Some(r),
            Number::Log(_) => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => a == b,
            (Number::Log(a), Number::Log(b)) => a == b,
            _ => false,
        }
    }
}

/// A hashable, totally-ordered key used to intern terminal nodes in the
/// diagram's unique table (§4.2): structural equality for the purposes of
/// ADD reduction, not numeric closeness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumKey {
    Rational(BigInt, BigInt),
    Log(OrderedFloat<f64>),
}

impl From<&Number> for NumKey {
    fn from(n: &Number) -> Self {
        match n {
            Number::Rational(r) => NumKey::Rational(r.numer().clone(), r.denom().clone()),
            Number::Log(l) => NumKey::Log(OrderedFloat(*l)),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(r) => write!(f, "{r}"),
            Number::Log(l) => write!(f, "{l}"),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Rational(a), Number::Rational(b)) => a.partial_cmp(b),
            (Number::Log(a), Number::Log(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// `log10(10^a + 10^b)`, computed without overflowing for very negative or
/// very large exponents. `-inf` is an additive identity.
pub fn log_sum_exp10(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let hi = a.max(b);
    let lo = a.min(b);
    hi + (1.0 + 10f64.powf(lo - hi)).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_exp_matches_direct_computation() {
        let a = 1.3_f64;
        let b = 0.7_f64;
        let expected = (10f64.powf(a) + 10f64.powf(b)).log10();
        assert!((log_sum_exp10(a, b) - expected).abs() < 1e-9);
    }

    #[test]
    fn log_sum_exp_is_commutative() {
        assert_eq!(log_sum_exp10(2.0, 5.0), log_sum_exp10(5.0, 2.0));
    }

    #[test]
    fn log_sum_exp_treats_neg_infinity_as_identity() {
        assert_eq!(log_sum_exp10(f64::NEG_INFINITY, 3.0), 3.0);
        assert_eq!(log_sum_exp10(3.0, f64::NEG_INFINITY), 3.0);
    }

    #[test]
    fn rational_and_log_agree_on_product() {
        let ra = Number::Rational(BigRational::new(3.into(), 10.into()));
        let rb = Number::Rational(BigRational::new(7.into(), 10.into()));
        let product = ra.mul(&rb);
        assert!((product.to_f64() - 0.21).abs() < 1e-9);

        let la = Number::from_f64_log(0.3);
        let lb = Number::from_f64_log(0.7);
        let lproduct = la.mul(&lb);
        assert!((lproduct.to_f64() - 0.21).abs() < 1e-6);
    }

    #[test]
    fn zero_and_one_identities_hold() {
        assert!(Number::zero_rational().is_zero());
        assert!(Number::one_rational().is_one());
        assert!(Number::zero_log().is_zero());
        assert!(Number::one_log().is_one());
    }
}
