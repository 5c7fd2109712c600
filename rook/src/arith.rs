//! Arithmetic evaluation (`is/2` and the numeric comparison family).
//!
//! Numbers evaluate to themselves; recognised functors are reduced by
//! evaluating their arguments and applying the operator under the
//! promotion rules Int → Float → Decimal. Unknown evaluables are reported
//! before any argument is evaluated, so the error names the outermost
//! offending functor.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{eval_fault, instantiation_error, type_error, Ball};
use crate::term::{Decimal, Flt, NumFault, Term};

/// An evaluated number.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(Flt),
    Dec(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    Int,
    Float,
    Dec,
}

impl Number {
    pub fn to_term(self) -> Term {
        match self {
            Number::Int(i) => Term::Int(i),
            Number::Float(f) => Term::Float(f),
            Number::Dec(d) => Term::Dec(d),
        }
    }

    pub fn from_term(term: &Term) -> Option<Number> {
        match term {
            Term::Int(i) => Some(Number::Int(*i)),
            Term::Float(f) => Some(Number::Float(*f)),
            Term::Dec(d) => Some(Number::Dec(*d)),
            _ => None,
        }
    }

    fn kind(&self) -> Kind {
        match self {
            Number::Int(_) => Kind::Int,
            Number::Float(_) => Kind::Float,
            Number::Dec(_) => Kind::Dec,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => f.value,
            Number::Dec(d) => d.to_f64(),
        }
    }

    fn as_decimal(&self) -> Decimal {
        match self {
            Number::Int(i) => Decimal::from_int(*i),
            Number::Dec(d) => *d,
            Number::Float(f) => f
                .exact
                .or_else(|| Decimal::parse(&canonical_float_text(f.value)))
                .unwrap_or_else(|| Decimal::from_int(0)),
        }
    }
}

/// Shortest decimal text that round-trips the float, always with a point.
pub fn canonical_float_text(value: f64) -> String {
    let mut text = format!("{}", value);
    if !text.contains('.') && !text.contains('e') && !text.contains("inf") && !text.contains("NaN")
    {
        text.push_str(".0");
    }
    text
}

/// The (lhs, rhs) → result kind table.
fn promoted(a: Kind, b: Kind) -> Kind {
    a.max(b)
}

fn float_result(value: f64) -> Result<Number, Ball> {
    if value.is_nan() {
        return Err(eval_fault(NumFault::Undefined));
    }
    if value.is_infinite() {
        return Err(eval_fault(NumFault::FloatOverflow));
    }
    Ok(Number::Float(Flt::new(value)))
}

fn int_result(value: Option<i64>) -> Result<Number, Ball> {
    value
        .map(Number::Int)
        .ok_or_else(|| eval_fault(NumFault::IntOverflow))
}

fn dec_result(value: Result<Decimal, NumFault>) -> Result<Number, Ball> {
    value.map(Number::Dec).map_err(eval_fault)
}

fn need_int_operand(n: &Number) -> Result<i64, Ball> {
    match n {
        Number::Int(i) => Ok(*i),
        other => Err(type_error("integer", &other.to_term())),
    }
}

/// Value comparison across numeric variants, for `=:=/2` and friends.
pub fn compare_values(a: &Number, b: &Number) -> Ordering {
    match promoted(a.kind(), b.kind()) {
        Kind::Int => match (a, b) {
            (Number::Int(x), Number::Int(y)) => x.cmp(y),
            _ => unreachable!(),
        },
        Kind::Dec => a.as_decimal().compare(&b.as_decimal()),
        Kind::Float => a.as_f64().total_cmp(&b.as_f64()),
    }
}

fn binary(op: &str, a: Number, b: Number) -> Result<Number, Ball> {
    match op {
        "+" | "-" | "*" => arith_ring(op, a, b),
        "/" => divide(a, b),
        "//" => int_divide(a, b, false),
        "div" => int_divide(a, b, true),
        "mod" => modulo(a, b, true),
        "rem" => modulo(a, b, false),
        "min" => Ok(if compare_values(&a, &b) == Ordering::Greater {
            b
        } else {
            a
        }),
        "max" => Ok(if compare_values(&a, &b) == Ordering::Less {
            b
        } else {
            a
        }),
        "**" => float_result(a.as_f64().powf(b.as_f64())),
        "^" => power(a, b),
        ">>" => shift(a, b, false),
        "<<" => shift(a, b, true),
        "/\\" => int_result(Some(need_int_operand(&a)? & need_int_operand(&b)?)),
        "\\/" => int_result(Some(need_int_operand(&a)? | need_int_operand(&b)?)),
        "xor" => int_result(Some(need_int_operand(&a)? ^ need_int_operand(&b)?)),
        "atan" | "atan2" => float_result(a.as_f64().atan2(b.as_f64())),
        _ => unreachable!("binary dispatch: {}", op),
    }
}

fn arith_ring(op: &str, a: Number, b: Number) -> Result<Number, Ball> {
    match promoted(a.kind(), b.kind()) {
        Kind::Int => {
            let (x, y) = (need_int_operand(&a)?, need_int_operand(&b)?);
            int_result(match op {
                "+" => x.checked_add(y),
                "-" => x.checked_sub(y),
                _ => x.checked_mul(y),
            })
        }
        Kind::Dec => {
            let (x, y) = (a.as_decimal(), b.as_decimal());
            dec_result(match op {
                "+" => x.add(&y),
                "-" => x.sub(&y),
                _ => x.mul(&y),
            })
        }
        Kind::Float => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let value = match op {
                "+" => x + y,
                "-" => x - y,
                _ => x * y,
            };
            let mut result = float_result(value)?;
            // Track the exact companion when both sides carried one.
            if let (Number::Float(fa), Number::Float(fb)) = (&a, &b) {
                if let (Some(da), Some(db)) = (fa.exact, fb.exact) {
                    let exact = match op {
                        "+" => da.add(&db),
                        "-" => da.sub(&db),
                        _ => da.mul(&db),
                    };
                    if let (Ok(exact), Number::Float(f)) = (exact, &mut result) {
                        f.exact = Some(exact);
                    }
                }
            }
            Ok(result)
        }
    }
}

fn divide(a: Number, b: Number) -> Result<Number, Ball> {
    match promoted(a.kind(), b.kind()) {
        Kind::Int => {
            let (x, y) = (need_int_operand(&a)?, need_int_operand(&b)?);
            if y == 0 {
                return Err(eval_fault(NumFault::ZeroDivisor));
            }
            if x % y == 0 {
                int_result(x.checked_div(y))
            } else {
                float_result(x as f64 / y as f64)
            }
        }
        Kind::Dec => dec_result(a.as_decimal().div(&b.as_decimal())),
        Kind::Float => {
            if b.as_f64() == 0.0 {
                return Err(eval_fault(NumFault::ZeroDivisor));
            }
            float_result(a.as_f64() / b.as_f64())
        }
    }
}

fn int_divide(a: Number, b: Number, floored: bool) -> Result<Number, Ball> {
    if matches!(a, Number::Dec(_)) || matches!(b, Number::Dec(_)) {
        return dec_result(a.as_decimal().div_trunc(&b.as_decimal()));
    }
    let (x, y) = (need_int_operand(&a)?, need_int_operand(&b)?);
    if y == 0 {
        return Err(eval_fault(NumFault::ZeroDivisor));
    }
    let q = x.checked_div(y).ok_or_else(|| eval_fault(NumFault::IntOverflow))?;
    if floored && (x % y != 0) && ((x < 0) != (y < 0)) {
        int_result(q.checked_sub(1))
    } else {
        Ok(Number::Int(q))
    }
}

fn modulo(a: Number, b: Number, floored: bool) -> Result<Number, Ball> {
    if matches!(a, Number::Dec(_)) || matches!(b, Number::Dec(_)) {
        return dec_result(a.as_decimal().rem(&b.as_decimal()));
    }
    let (x, y) = (need_int_operand(&a)?, need_int_operand(&b)?);
    if y == 0 {
        return Err(eval_fault(NumFault::ZeroDivisor));
    }
    let r = x.checked_rem(y).ok_or_else(|| eval_fault(NumFault::IntOverflow))?;
    if floored && r != 0 && ((r < 0) != (y < 0)) {
        Ok(Number::Int(r + y))
    } else {
        Ok(Number::Int(r))
    }
}

fn power(a: Number, b: Number) -> Result<Number, Ball> {
    match (&a, &b) {
        (Number::Int(x), Number::Int(y)) => {
            if *y < 0 {
                return match x {
                    1 => Ok(Number::Int(1)),
                    -1 => Ok(Number::Int(if y % 2 == 0 { 1 } else { -1 })),
                    _ => Err(type_error("float", &Term::Int(*x))),
                };
            }
            let exp = u32::try_from(*y).map_err(|_| eval_fault(NumFault::IntOverflow))?;
            int_result(x.checked_pow(exp))
        }
        _ => float_result(a.as_f64().powf(b.as_f64())),
    }
}

fn shift(a: Number, b: Number, left: bool) -> Result<Number, Ball> {
    let x = need_int_operand(&a)?;
    let n = need_int_operand(&b)?;
    if n < 0 {
        return shift(a, Number::Int(n.checked_neg().ok_or_else(|| eval_fault(NumFault::IntOverflow))?), !left);
    }
    if left {
        if n >= 127 {
            return if x == 0 {
                Ok(Number::Int(0))
            } else {
                Err(eval_fault(NumFault::IntOverflow))
            };
        }
        let wide = (x as i128) << n;
        int_result(i64::try_from(wide).ok())
    } else {
        let n = n.min(63);
        Ok(Number::Int(x >> n))
    }
}

fn unary(op: &str, a: Number, rng: &mut StdRng) -> Result<Number, Ball> {
    match op {
        "-" => match a {
            Number::Int(i) => int_result(i.checked_neg()),
            Number::Float(f) => Ok(Number::Float(Flt {
                value: -f.value,
                exact: f.exact.and_then(|d| d.neg().ok()),
            })),
            Number::Dec(d) => dec_result(d.neg()),
        },
        "+" => Ok(a),
        "abs" => match a {
            Number::Int(i) => int_result(i.checked_abs()),
            Number::Float(f) => Ok(Number::Float(Flt {
                value: f.value.abs(),
                exact: f.exact.and_then(|d| d.abs().ok()),
            })),
            Number::Dec(d) => dec_result(d.abs()),
        },
        "sign" => Ok(match a {
            Number::Int(i) => Number::Int(i.signum()),
            Number::Float(f) => Number::Float(Flt::new(if f.value == 0.0 {
                0.0
            } else {
                f.value.signum()
            })),
            Number::Dec(d) => Number::Int(d.signum()),
        }),
        "truncate" | "floor" | "ceiling" | "round" => rounding(op, a),
        "float" => Ok(match a {
            Number::Int(i) => Number::Float(Flt::exact(i as f64, Decimal::from_int(i))),
            Number::Dec(d) => Number::Float(Flt::from_decimal(d)),
            f => f,
        }),
        "float_integer_part" => float_result(a.as_f64().trunc()),
        "float_fractional_part" => float_result(a.as_f64().fract()),
        "sqrt" => {
            if a.as_f64() < 0.0 {
                Err(eval_fault(NumFault::Undefined))
            } else {
                float_result(a.as_f64().sqrt())
            }
        }
        "sin" => float_result(a.as_f64().sin()),
        "cos" => float_result(a.as_f64().cos()),
        "atan" => float_result(a.as_f64().atan()),
        "exp" => float_result(a.as_f64().exp()),
        "log" => {
            if a.as_f64() <= 0.0 {
                Err(eval_fault(NumFault::Undefined))
            } else {
                float_result(a.as_f64().ln())
            }
        }
        "\\" => int_result(Some(!need_int_operand(&a)?)),
        "succ" => int_result(need_int_operand(&a)?.checked_add(1)),
        "random" => {
            let n = need_int_operand(&a)?;
            if n <= 0 {
                return Err(crate::error::evaluation_error("undefined"));
            }
            Ok(Number::Int(rng.gen_range(0..n)))
        }
        _ => unreachable!("unary dispatch: {}", op),
    }
}

fn rounding(op: &str, a: Number) -> Result<Number, Ball> {
    match a {
        Number::Int(i) => Ok(Number::Int(i)),
        Number::Float(f) => {
            let value = match op {
                "truncate" => f.value.trunc(),
                "floor" => f.value.floor(),
                "ceiling" => f.value.ceil(),
                _ => f.value.round(),
            };
            if value < i64::MIN as f64 || value > i64::MAX as f64 {
                Err(eval_fault(NumFault::IntOverflow))
            } else {
                Ok(Number::Int(value as i64))
            }
        }
        Number::Dec(d) => {
            let r = match op {
                "truncate" => d.truncate(),
                "floor" => d.floor(),
                "ceiling" => d.ceiling(),
                _ => d.round(),
            };
            Ok(match r.to_i64() {
                Some(i) => Number::Int(i),
                None => Number::Dec(r),
            })
        }
    }
}

const UNARY_OPS: &[&str] = &[
    "-",
    "+",
    "abs",
    "sign",
    "truncate",
    "floor",
    "ceiling",
    "round",
    "float",
    "float_integer_part",
    "float_fractional_part",
    "sqrt",
    "sin",
    "cos",
    "atan",
    "exp",
    "log",
    "\\",
    "succ",
    "random",
];

const BINARY_OPS: &[&str] = &[
    "+", "-", "*", "/", "//", "div", "mod", "rem", "min", "max", "**", "^", ">>", "<<", "/\\",
    "\\/", "xor", "atan", "atan2",
];

/// Evaluate an arithmetic term to a number.
pub fn evaluate(rng: &mut StdRng, term: &Term) -> Result<Number, Ball> {
    let t = term.deref();
    match &t {
        Term::Int(i) => Ok(Number::Int(*i)),
        Term::Float(f) => Ok(Number::Float(*f)),
        Term::Dec(d) => Ok(Number::Dec(*d)),
        Term::Var(_) => Err(instantiation_error()),
        Term::Atom(a) => match a.name() {
            "pi" => Ok(Number::Float(Flt::new(std::f64::consts::PI))),
            "e" => Ok(Number::Float(Flt::new(std::f64::consts::E))),
            "epsilon" => Ok(Number::Float(Flt::new(f64::EPSILON))),
            "max_integer" => Ok(Number::Int(i64::MAX)),
            "min_integer" => Ok(Number::Int(i64::MIN)),
            _ => Err(type_error("evaluable", &indicator(a.name(), 0))),
        },
        Term::Struct(s) => {
            let name = s.functor.name().name();
            let arity = s.functor.arity();
            // Recognise the functor before touching the arguments.
            match arity {
                1 if UNARY_OPS.contains(&name) => {
                    let a = evaluate(rng, &s.args[0])?;
                    unary(name, a, rng)
                }
                2 if BINARY_OPS.contains(&name) => {
                    let a = evaluate(rng, &s.args[0])?;
                    let b = evaluate(rng, &s.args[1])?;
                    binary(name, a, b)
                }
                _ => Err(type_error("evaluable", &indicator(name, arity))),
            }
        }
        other => Err(type_error("evaluable", other)),
    }
}

fn indicator(name: &str, arity: usize) -> Term {
    Term::compound("/", vec![Term::atom(name), Term::int(arity as i64)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn eval(t: &Term) -> Result<Number, Ball> {
        evaluate(&mut rng(), t)
    }

    fn eval_int(t: &Term) -> i64 {
        match eval(t).expect("evaluates") {
            Number::Int(i) => i,
            other => panic!("expected integer, got {:?}", other),
        }
    }

    fn formal_atom(ball: &Ball) -> String {
        let args = ball.term().match_struct("error", 2).expect("error/2");
        match args[0].deref() {
            Term::Struct(s) => format!("{}", s.functor.name()),
            Term::Atom(a) => a.name().to_string(),
            other => panic!("odd formal: {:?}", other),
        }
    }

    #[test]
    fn numbers_evaluate_to_themselves() {
        assert_eq!(eval_int(&Term::int(42)), 42);
        match eval(&Term::float(2.5)).unwrap() {
            Number::Float(f) => assert_eq!(f.value, 2.5),
            _ => panic!(),
        }
    }

    #[test]
    fn basic_operators() {
        let t = Term::compound(
            "+",
            vec![
                Term::int(10),
                Term::compound("*", vec![Term::int(20), Term::int(3)]),
            ],
        );
        assert_eq!(eval_int(&t), 70);
        assert_eq!(
            eval_int(&Term::compound("mod", vec![Term::int(-7), Term::int(3)])),
            2
        );
        assert_eq!(
            eval_int(&Term::compound("rem", vec![Term::int(-7), Term::int(3)])),
            -1
        );
        assert_eq!(
            eval_int(&Term::compound("^", vec![Term::int(2), Term::int(10)])),
            1024
        );
        assert_eq!(
            eval_int(&Term::compound("<<", vec![Term::int(1), Term::int(4)])),
            16
        );
    }

    #[test]
    fn division_rules() {
        // Exact integer division stays integral.
        assert_eq!(
            eval_int(&Term::compound("/", vec![Term::int(6), Term::int(3)])),
            2
        );
        match eval(&Term::compound("/", vec![Term::int(1), Term::int(2)])).unwrap() {
            Number::Float(f) => assert_eq!(f.value, 0.5),
            other => panic!("expected float, got {:?}", other),
        }
        let err = eval(&Term::compound("/", vec![Term::int(1), Term::int(0)])).unwrap_err();
        assert_eq!(formal_atom(&err), "evaluation_error");
    }

    #[test]
    fn int_overflow_is_reported() {
        let t = Term::compound("+", vec![Term::Int(i64::MAX), Term::int(1)]);
        let err = eval(&t).unwrap_err();
        let args = err.term().match_struct("error", 2).unwrap();
        let what = args[0].match_struct("evaluation_error", 1).unwrap();
        assert!(what[0].is_atom_named("int_overflow"));
    }

    #[test]
    fn unknown_evaluable_reported_outermost_first() {
        // foo(1/0): the unknown functor wins over the nested zero divide.
        let t = Term::compound(
            "foo",
            vec![Term::compound("/", vec![Term::int(1), Term::int(0)])],
        );
        let err = eval(&t).unwrap_err();
        let args = err.term().match_struct("error", 2).unwrap();
        let formal = args[0].match_struct("type_error", 2).unwrap();
        assert!(formal[0].is_atom_named("evaluable"));
        let pi = formal[1].match_struct("/", 2).unwrap();
        assert!(pi[0].is_atom_named("foo"));
    }

    #[test]
    fn promotion_to_decimal() {
        let d = Term::Dec(Decimal::parse("1.5").unwrap());
        match eval(&Term::compound("+", vec![d, Term::int(1)])).unwrap() {
            Number::Dec(d) => assert_eq!(d.to_string(), "2.5"),
            other => panic!("expected decimal, got {:?}", other),
        }
    }

    #[test]
    fn guarded_transcendentals() {
        let err = eval(&Term::compound("log", vec![Term::int(0)])).unwrap_err();
        let args = err.term().match_struct("error", 2).unwrap();
        let what = args[0].match_struct("evaluation_error", 1).unwrap();
        assert!(what[0].is_atom_named("undefined"));
        let err = eval(&Term::compound("sqrt", vec![Term::int(-1)])).unwrap_err();
        assert_eq!(formal_atom(&err), "evaluation_error");
    }

    #[test]
    fn random_in_range() {
        let mut r = rng();
        for _ in 0..50 {
            match evaluate(&mut r, &Term::compound("random", vec![Term::int(10)])).unwrap() {
                Number::Int(i) => assert!((0..10).contains(&i)),
                _ => panic!(),
            }
        }
    }

    #[test]
    fn floor_and_friends() {
        assert_eq!(
            eval_int(&Term::compound("floor", vec![Term::float(-1.2)])),
            -2
        );
        assert_eq!(
            eval_int(&Term::compound("ceiling", vec![Term::float(1.2)])),
            2
        );
        assert_eq!(
            eval_int(&Term::compound("truncate", vec![Term::float(-1.8)])),
            -1
        );
        assert_eq!(eval_int(&Term::compound("round", vec![Term::float(2.5)])), 3);
    }
}
