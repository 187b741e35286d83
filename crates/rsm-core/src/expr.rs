//! Symbolic expression graph.
//!
//! Models and constraints are exported as expression trees over named
//! symbols. The same tree can be evaluated numerically against a set of
//! [`Bindings`], differentiated symbolically with [`Expr::diff`], or printed
//! for inspection. Only differentiable primitives are available: there is no
//! branching and no table lookup.
//!
//! ```text
//! psi_d - (-0.0042 * i_d + exp(-8.4e-5 * i_q^2) * atan(0.14 * i_d) * 0.88)
//! ```

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Elementary differentiable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Exp,
    Atan,
    Sin,
    Cos,
    Sqrt,
}

impl Func {
    fn apply(self, v: f64) -> f64 {
        match self {
            Func::Exp => v.exp(),
            Func::Atan => v.atan(),
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Sqrt => v.sqrt(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Atan => "atan",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Sqrt => "sqrt",
        }
    }
}

/// Node of a symbolic expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Const(f64),
    /// Reference to a named symbol (state, control, parameter, ...).
    Sym(String),
    /// Negation.
    Neg(Box<Expr>),
    /// Addition.
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction.
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication.
    Mul(Box<Expr>, Box<Expr>),
    /// Division.
    Div(Box<Expr>, Box<Expr>),
    /// Integer power.
    Powi(Box<Expr>, i32),
    /// Elementary function application.
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn constant(v: f64) -> Self {
        Expr::Const(v)
    }

    pub fn zero() -> Self {
        Expr::Const(0.0)
    }

    pub fn one() -> Self {
        Expr::Const(1.0)
    }

    /// Literal value if this node is a constant.
    pub fn as_const(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        self.as_const() == Some(0.0)
    }

    fn is_one(&self) -> bool {
        self.as_const() == Some(1.0)
    }

    fn sum(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x + y),
            _ if a.is_zero() => b,
            _ if b.is_zero() => a,
            _ => Expr::Add(Box::new(a), Box::new(b)),
        }
    }

    fn difference(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x - y),
            _ if b.is_zero() => a,
            _ if a.is_zero() => Expr::negate(b),
            _ => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }

    fn product(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) => Expr::Const(x * y),
            _ if a.is_zero() || b.is_zero() => Expr::zero(),
            _ if a.is_one() => b,
            _ if b.is_one() => a,
            _ => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }

    fn quotient(a: Expr, b: Expr) -> Expr {
        match (a.as_const(), b.as_const()) {
            (Some(x), Some(y)) if y != 0.0 => Expr::Const(x / y),
            _ if a.is_zero() => Expr::zero(),
            _ if b.is_one() => a,
            _ => Expr::Div(Box::new(a), Box::new(b)),
        }
    }

    fn negate(a: Expr) -> Expr {
        match a {
            Expr::Const(v) => Expr::Const(-v),
            Expr::Neg(inner) => *inner,
            other => Expr::Neg(Box::new(other)),
        }
    }

    /// Integer power with constant folding.
    pub fn powi(self, n: i32) -> Expr {
        match (n, self.as_const()) {
            (0, _) => Expr::one(),
            (1, _) => self,
            (_, Some(v)) => Expr::Const(v.powi(n)),
            _ => Expr::Powi(Box::new(self), n),
        }
    }

    /// Apply an elementary function with constant folding.
    pub fn call(func: Func, arg: Expr) -> Expr {
        match arg.as_const() {
            Some(v) => Expr::Const(func.apply(v)),
            None => Expr::Call(func, Box::new(arg)),
        }
    }

    /// Evaluate numerically. Every symbol must be bound.
    pub fn eval(&self, env: &Bindings) -> CoreResult<f64> {
        let v = match self {
            Expr::Const(v) => *v,
            Expr::Sym(name) => env.get(name)?,
            Expr::Neg(a) => -a.eval(env)?,
            Expr::Add(a, b) => a.eval(env)? + b.eval(env)?,
            Expr::Sub(a, b) => a.eval(env)? - b.eval(env)?,
            Expr::Mul(a, b) => a.eval(env)? * b.eval(env)?,
            Expr::Div(a, b) => a.eval(env)? / b.eval(env)?,
            Expr::Powi(a, n) => a.eval(env)?.powi(*n),
            Expr::Call(f, a) => f.apply(a.eval(env)?),
        };
        Ok(v)
    }

    /// Symbolic partial derivative with respect to the named symbol.
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Const(_) => Expr::zero(),
            Expr::Sym(name) => {
                if name == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Neg(a) => Expr::negate(a.diff(var)),
            Expr::Add(a, b) => Expr::sum(a.diff(var), b.diff(var)),
            Expr::Sub(a, b) => Expr::difference(a.diff(var), b.diff(var)),
            Expr::Mul(a, b) => Expr::sum(
                Expr::product(a.diff(var), (**b).clone()),
                Expr::product((**a).clone(), b.diff(var)),
            ),
            Expr::Div(a, b) => {
                let num = Expr::difference(
                    Expr::product(a.diff(var), (**b).clone()),
                    Expr::product((**a).clone(), b.diff(var)),
                );
                Expr::quotient(num, (**b).clone().powi(2))
            }
            Expr::Powi(a, n) => {
                let outer = Expr::product(Expr::Const(*n as f64), (**a).clone().powi(n - 1));
                Expr::product(outer, a.diff(var))
            }
            Expr::Call(f, a) => {
                let inner = (**a).clone();
                let outer = match f {
                    Func::Exp => Expr::call(Func::Exp, inner),
                    Func::Atan => Expr::quotient(Expr::one(), Expr::sum(Expr::one(), inner.powi(2))),
                    Func::Sin => Expr::call(Func::Cos, inner),
                    Func::Cos => Expr::negate(Expr::call(Func::Sin, inner)),
                    Func::Sqrt => {
                        Expr::quotient(Expr::Const(0.5), Expr::call(Func::Sqrt, inner))
                    }
                };
                Expr::product(outer, a.diff(var))
            }
        }
    }

    /// Names of all symbols referenced by this expression.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Sym(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(a) | Expr::Powi(a, _) | Expr::Call(_, a) => a.collect_symbols(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Sym(_) => 1,
            Expr::Neg(a) | Expr::Powi(a, _) | Expr::Call(_, a) => 1 + a.node_count(),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                1 + a.node_count() + b.node_count()
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{v}"),
            Expr::Sym(name) => write!(f, "{name}"),
            Expr::Neg(a) => write!(f, "(-{a})"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a}*{b})"),
            Expr::Div(a, b) => write!(f, "({a}/{b})"),
            Expr::Powi(a, n) => write!(f, "{a}^{n}"),
            Expr::Call(func, a) => write!(f, "{}({a})", func.name()),
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $build:path) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $build(self, Expr::Const(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $build(Expr::Const(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, Expr::sum);
impl_binary_op!(Sub, sub, Expr::difference);
impl_binary_op!(Mul, mul, Expr::product);
impl_binary_op!(Div, div, Expr::quotient);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::negate(self)
    }
}

/// Numeric type that can flow through model equations.
///
/// Implemented for `f64` (direct evaluation) and [`Expr`] (graph
/// construction), so a closed-form relation is written once and used both
/// ways.
pub trait Scalar:
    Clone
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
{
    fn from_f64(v: f64) -> Self;
    fn exp(self) -> Self;
    fn atan(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;
    fn powi(self, n: i32) -> Self;
}

impl Scalar for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn exp(self) -> Self {
        f64::exp(self)
    }
    fn atan(self) -> Self {
        f64::atan(self)
    }
    fn sin(self) -> Self {
        f64::sin(self)
    }
    fn cos(self) -> Self {
        f64::cos(self)
    }
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
}

impl Scalar for Expr {
    fn from_f64(v: f64) -> Self {
        Expr::Const(v)
    }
    fn exp(self) -> Self {
        Expr::call(Func::Exp, self)
    }
    fn atan(self) -> Self {
        Expr::call(Func::Atan, self)
    }
    fn sin(self) -> Self {
        Expr::call(Func::Sin, self)
    }
    fn cos(self) -> Self {
        Expr::call(Func::Cos, self)
    }
    fn sqrt(self) -> Self {
        Expr::call(Func::Sqrt, self)
    }
    fn powi(self, n: i32) -> Self {
        Expr::powi(self, n)
    }
}

/// Ordered set of named symbols, the graph counterpart of a column vector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolSet {
    names: Vec<String>,
}

impl SymbolSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Symbol at position `i` as an expression node.
    pub fn get(&self, i: usize) -> Option<Expr> {
        self.names.get(i).map(|n| Expr::Sym(n.clone()))
    }

    pub fn exprs(&self) -> Vec<Expr> {
        self.names.iter().map(|n| Expr::Sym(n.clone())).collect()
    }
}

/// Numeric values assigned to symbols for evaluation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Bind every symbol of `set` to the matching entry of `values`.
    pub fn bind(&mut self, set: &SymbolSet, values: &[f64]) -> CoreResult<()> {
        if set.len() != values.len() {
            return Err(CoreError::LengthMismatch {
                what: "symbol bindings",
                expected: set.len(),
                actual: values.len(),
            });
        }
        for (name, &v) in set.names().iter().zip(values) {
            self.values.insert(name.clone(), v);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> CoreResult<f64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::UnboundSymbol {
                name: name.to_string(),
            })
    }
}

/// Evaluate a vector of expressions.
pub fn eval_all(exprs: &[Expr], env: &Bindings) -> CoreResult<Vec<f64>> {
    exprs.iter().map(|e| e.eval(env)).collect()
}

/// Symbolic Jacobian `d exprs / d vars`, row-major by expression.
pub fn jacobian(exprs: &[Expr], vars: &SymbolSet) -> Vec<Vec<Expr>> {
    exprs
        .iter()
        .map(|e| vars.names().iter().map(|v| e.diff(v)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, f64)]) -> Bindings {
        let mut b = Bindings::new();
        for (n, v) in pairs {
            b.set(*n, *v);
        }
        b
    }

    #[test]
    fn constant_folding() {
        let e = Expr::constant(2.0) * 3.0 + 1.0;
        assert_eq!(e, Expr::Const(7.0));

        let x = Expr::sym("x");
        assert_eq!(x.clone() * 1.0, x);
        assert_eq!(x.clone() * 0.0, Expr::zero());
        assert_eq!(x.clone() + 0.0, x);
        assert_eq!(-(-x.clone()), x);
    }

    #[test]
    fn eval_polynomial() {
        let x = Expr::sym("x");
        let y = Expr::sym("y");
        let e = x.clone().powi(2) + 3.0 * x * y.clone() - y / 2.0;
        let v = e.eval(&env(&[("x", 2.0), ("y", 4.0)])).unwrap();
        assert!((v - (4.0 + 24.0 - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn eval_unbound_symbol_fails() {
        let e = Expr::sym("missing") + 1.0;
        let err = e.eval(&Bindings::new()).unwrap_err();
        assert!(matches!(err, CoreError::UnboundSymbol { name } if name == "missing"));
    }

    #[test]
    fn derivative_of_product_and_atan() {
        // d/dx [x * atan(2x)] = atan(2x) + 2x / (1 + 4x^2)
        let x = Expr::sym("x");
        let e = x.clone() * Scalar::atan(x * 2.0);
        let d = e.diff("x");
        let xv = 0.7;
        let expected = (2.0 * xv).atan() + 2.0 * xv / (1.0 + 4.0 * xv * xv);
        let got = d.eval(&env(&[("x", xv)])).unwrap();
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let x = Expr::sym("x");
        let y = Expr::sym("y");
        let e = Scalar::exp(y.clone().powi(2) * -0.1) * Scalar::sin(x.clone())
            / (Scalar::cos(x) + 2.0)
            + Scalar::sqrt(y.clone() * y + 1.0);
        let point = [("x", 0.3), ("y", -1.2)];
        for var in ["x", "y"] {
            let d = e.diff(var).eval(&env(&point)).unwrap();
            let h = 1e-6;
            let mut plus = point;
            let mut minus = point;
            for (n, v) in plus.iter_mut() {
                if *n == var {
                    *v += h;
                }
            }
            for (n, v) in minus.iter_mut() {
                if *n == var {
                    *v -= h;
                }
            }
            let fd = (e.eval(&env(&plus)).unwrap() - e.eval(&env(&minus)).unwrap()) / (2.0 * h);
            assert!((d - fd).abs() < 1e-6, "d/d{var}: {d} vs {fd}");
        }
    }

    #[test]
    fn derivative_wrt_absent_symbol_is_zero() {
        let e = Expr::sym("a") * Expr::sym("b");
        assert_eq!(e.diff("c"), Expr::zero());
    }

    #[test]
    fn free_symbols_collects_all() {
        let e = Expr::sym("u_d").powi(2) + Expr::sym("u_q").powi(2);
        let syms: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(syms, vec!["u_d".to_string(), "u_q".to_string()]);
    }

    #[test]
    fn bind_checks_length() {
        let set = SymbolSet::new(["a", "b"]);
        let mut b = Bindings::new();
        assert!(b.bind(&set, &[1.0]).is_err());
        b.bind(&set, &[1.0, 2.0]).unwrap();
        assert_eq!(b.get("b").unwrap(), 2.0);
    }

    #[test]
    fn jacobian_of_linear_map() {
        let vars = SymbolSet::new(["x1", "x2"]);
        let exprs = vec![
            Expr::sym("x1") * 2.0 - Expr::sym("x2"),
            Expr::sym("x2") * 5.0,
        ];
        let jac = jacobian(&exprs, &vars);
        let b = Bindings::new();
        let vals: Vec<Vec<f64>> = jac
            .iter()
            .map(|row| eval_all(row, &b).unwrap())
            .collect();
        assert_eq!(vals, vec![vec![2.0, -1.0], vec![0.0, 5.0]]);
    }

    #[test]
    fn display_is_readable() {
        let e = Expr::sym("u_d").powi(2) + Expr::sym("u_q").powi(2);
        assert_eq!(e.to_string(), "(u_d^2 + u_q^2)");
    }
}
