//! Host operator evaluation.
//!
//! | left    | right          | ops                       |
//! |---------|----------------|---------------------------|
//! | Vector2 | Vector2        | `+ - * / < <=`            |
//! | Vector3 | Vector3        | `+ - * /`                 |
//! | Color   | Color          | `+ - * / < <=`            |
//! | vector  | number         | `* /`                     |
//! | number  | vector         | `*`                       |
//!
//! Same-kind arithmetic is component-wise.  Anything else is undefined and
//! yields `None`.

use std::ops::{Add, Div, Mul, Sub};

use crate::object::MetaOp;

use super::Variant;

/// Evaluate `a <op> b` with host semantics.
pub fn evaluate(op: MetaOp, a: &Variant, b: &Variant) -> Option<Variant> {
    match (a, b) {
        (Variant::Vector2(x), Variant::Vector2(y)) => {
            arith(op, *x, *y).map(Variant::from).or_else(|| compare(op, x, y))
        }
        (Variant::Vector3(x), Variant::Vector3(y)) => arith(op, *x, *y).map(Variant::from),
        (Variant::Color(x), Variant::Color(y)) => {
            arith(op, *x, *y).map(Variant::from).or_else(|| compare(op, x, y))
        }
        (Variant::Vector2(x), n) => scale(op, *x, n.as_f64()?).map(Variant::from),
        (Variant::Vector3(x), n) => scale(op, *x, n.as_f64()?).map(Variant::from),
        (Variant::Color(x), n) => scale(op, *x, n.as_f64()?).map(Variant::from),
        (n, Variant::Vector2(x)) if op == MetaOp::Mul => Some((*x * n.as_f64()?).into()),
        (n, Variant::Vector3(x)) if op == MetaOp::Mul => Some((*x * n.as_f64()?).into()),
        (n, Variant::Color(x)) if op == MetaOp::Mul => Some((*x * n.as_f64()?).into()),
        _ => None,
    }
}

fn arith<T>(op: MetaOp, x: T, y: T) -> Option<T>
where
    T: Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Div<Output = T>,
{
    match op {
        MetaOp::Add => Some(x + y),
        MetaOp::Sub => Some(x - y),
        MetaOp::Mul => Some(x * y),
        MetaOp::Div => Some(x / y),
        _ => None,
    }
}

fn scale<T>(op: MetaOp, x: T, s: f64) -> Option<T>
where
    T: Mul<f64, Output = T> + Div<f64, Output = T>,
{
    match op {
        MetaOp::Mul => Some(x * s),
        MetaOp::Div => Some(x / s),
        _ => None,
    }
}

fn compare<T: PartialOrd>(op: MetaOp, x: &T, y: &T) -> Option<Variant> {
    match op {
        MetaOp::Lt => Some(Variant::Bool(x < y)),
        MetaOp::Le => Some(Variant::Bool(x <= y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{Color, Vector2, Vector3};

    fn v2(x: f64, y: f64) -> Variant {
        Vector2::new(x, y).into()
    }

    #[test]
    fn same_kind_arithmetic() {
        assert_eq!(evaluate(MetaOp::Add, &v2(1.0, 2.0), &v2(3.0, 4.0)), Some(v2(4.0, 6.0)));
        assert_eq!(evaluate(MetaOp::Sub, &v2(1.0, 2.0), &v2(3.0, 4.0)), Some(v2(-2.0, -2.0)));
        assert_eq!(evaluate(MetaOp::Mul, &v2(2.0, 3.0), &v2(4.0, 5.0)), Some(v2(8.0, 15.0)));
        assert_eq!(evaluate(MetaOp::Div, &v2(8.0, 3.0), &v2(4.0, 2.0)), Some(v2(2.0, 1.5)));
        let half = Variant::from(Color::rgba(0.5, 0.5, 0.5, 1.0));
        assert_eq!(
            evaluate(MetaOp::Mul, &Color::rgba(1.0, 0.5, 0.0, 1.0).into(), &half),
            Some(Color::rgba(0.5, 0.25, 0.0, 1.0).into())
        );
        let v3 = Variant::from(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(evaluate(MetaOp::Mul, &v3, &v3), Some(Vector3::new(1.0, 4.0, 9.0).into()));
    }

    #[test]
    fn scalar_both_sides() {
        assert_eq!(evaluate(MetaOp::Mul, &v2(1.0, 2.0), &Variant::Int(2)), Some(v2(2.0, 4.0)));
        assert_eq!(evaluate(MetaOp::Mul, &Variant::Float(0.5), &v2(2.0, 4.0)), Some(v2(1.0, 2.0)));
        assert_eq!(evaluate(MetaOp::Div, &v2(2.0, 4.0), &Variant::Int(2)), Some(v2(1.0, 2.0)));
        assert_eq!(evaluate(MetaOp::Div, &Variant::Int(2), &v2(2.0, 4.0)), None);
        assert_eq!(evaluate(MetaOp::Add, &v2(1.0, 1.0), &Variant::Int(1)), None);
    }

    #[test]
    fn mixed_kinds_are_undefined() {
        let v3 = Variant::from(Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(evaluate(MetaOp::Add, &v2(1.0, 1.0), &v3), None);
        assert_eq!(evaluate(MetaOp::Mul, &v2(1.0, 1.0), &"2".into()), None);
    }

    #[test]
    fn ordering_only_where_defined() {
        assert_eq!(evaluate(MetaOp::Lt, &v2(1.0, 5.0), &v2(2.0, 0.0)), Some(Variant::Bool(true)));
        assert_eq!(evaluate(MetaOp::Le, &v2(1.0, 1.0), &v2(1.0, 1.0)), Some(Variant::Bool(true)));
        let red = Variant::from(Color::rgb(1.0, 0.0, 0.0));
        let blue = Variant::from(Color::rgb(0.0, 0.0, 1.0));
        assert_eq!(evaluate(MetaOp::Lt, &blue, &red), Some(Variant::Bool(true)));
        let v3 = Variant::from(Vector3::ZERO);
        assert_eq!(evaluate(MetaOp::Lt, &v3, &v3), None);
    }
}
