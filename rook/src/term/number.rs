//! Numeric payloads of the term model.
//!
//! Integers are machine words; overflow is an arithmetic fault, not a silent
//! promotion. Wider values live in [`Decimal`], a signed fixed-point value
//! with a 128-bit mantissa. Floats carry an optional exact decimal companion
//! so that a float read from text prints back in its source form.

use std::cmp::Ordering;
use std::fmt;

/// Maximum significant digits kept by decimal division.
const DIV_DIGITS: u32 = 34;

/// Faults surfaced by numeric primitives. The arithmetic evaluator maps
/// these onto ISO `evaluation_error/1` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumFault {
    IntOverflow,
    ZeroDivisor,
    Undefined,
    FloatOverflow,
}

/// Signed decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u32) -> Decimal {
        Decimal { mantissa, scale }.normalized()
    }

    pub fn from_int(i: i64) -> Decimal {
        Decimal {
            mantissa: i as i128,
            scale: 0,
        }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Strip trailing zero digits so equal values share one representation.
    fn normalized(mut self) -> Decimal {
        if self.mantissa == 0 {
            self.scale = 0;
            return self;
        }
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        self
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// True when the value has no fractional part.
    pub fn is_integral(&self) -> bool {
        self.scale == 0
    }

    /// Exact conversion to `i64` when representable.
    pub fn to_i64(&self) -> Option<i64> {
        if self.scale != 0 {
            return None;
        }
        i64::try_from(self.mantissa).ok()
    }

    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Parse a plain decimal literal (`-12.5`, `42`). Scientific notation is
    /// resolved by the reader before it gets here.
    pub fn parse(text: &str) -> Option<Decimal> {
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, text.strip_prefix('+').unwrap_or(text)),
        };
        let mut mantissa: i128 = 0;
        let mut scale: u32 = 0;
        let mut seen_point = false;
        let mut seen_digit = false;
        for c in digits.chars() {
            match c {
                '0'..='9' => {
                    seen_digit = true;
                    mantissa = mantissa
                        .checked_mul(10)?
                        .checked_add((c as u8 - b'0') as i128)?;
                    if seen_point {
                        scale += 1;
                    }
                }
                '.' if !seen_point => seen_point = true,
                _ => return None,
            }
        }
        if !seen_digit {
            return None;
        }
        Some(Decimal::new(sign * mantissa, scale))
    }

    fn align(a: &Decimal, b: &Decimal) -> Result<(i128, i128, u32), NumFault> {
        let scale = a.scale.max(b.scale);
        let am = rescale(a.mantissa, scale - a.scale)?;
        let bm = rescale(b.mantissa, scale - b.scale)?;
        Ok((am, bm, scale))
    }

    pub fn add(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        let (a, b, scale) = Decimal::align(self, other)?;
        let m = a.checked_add(b).ok_or(NumFault::IntOverflow)?;
        Ok(Decimal::new(m, scale))
    }

    pub fn sub(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        let (a, b, scale) = Decimal::align(self, other)?;
        let m = a.checked_sub(b).ok_or(NumFault::IntOverflow)?;
        Ok(Decimal::new(m, scale))
    }

    pub fn mul(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        let m = self
            .mantissa
            .checked_mul(other.mantissa)
            .ok_or(NumFault::IntOverflow)?;
        Ok(Decimal::new(m, self.scale + other.scale))
    }

    pub fn neg(&self) -> Result<Decimal, NumFault> {
        let m = self.mantissa.checked_neg().ok_or(NumFault::IntOverflow)?;
        Ok(Decimal {
            mantissa: m,
            scale: self.scale,
        })
    }

    pub fn abs(&self) -> Result<Decimal, NumFault> {
        if self.mantissa < 0 {
            self.neg()
        } else {
            Ok(*self)
        }
    }

    pub fn signum(&self) -> i64 {
        self.mantissa.signum() as i64
    }

    /// Division rounded half-even at `DIV_DIGITS` significant digits.
    pub fn div(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        if other.mantissa == 0 {
            return Err(NumFault::ZeroDivisor);
        }
        let negative = (self.mantissa < 0) != (other.mantissa < 0);
        let den = other.mantissa.unsigned_abs();
        let num = self.mantissa.unsigned_abs();
        let mut scale = self.scale as i64 - other.scale as i64;
        let mut q: u128 = num / den;
        let mut r: u128 = num % den;
        while r != 0 && decimal_digits(q) < DIV_DIGITS {
            match r.checked_mul(10) {
                Some(r10) => {
                    q = q * 10 + r10 / den;
                    r = r10 % den;
                    scale += 1;
                }
                None => break,
            }
        }
        if r != 0 {
            // Half-even rounding on the cut digit.
            if let Some(r2) = r.checked_mul(2) {
                match r2.cmp(&den) {
                    Ordering::Greater => q += 1,
                    Ordering::Equal if q % 2 == 1 => q += 1,
                    _ => {}
                }
            }
        }
        let mut mantissa = i128::try_from(q).map_err(|_| NumFault::IntOverflow)?;
        while scale < 0 {
            mantissa = mantissa.checked_mul(10).ok_or(NumFault::IntOverflow)?;
            scale += 1;
        }
        if negative {
            mantissa = -mantissa;
        }
        Ok(Decimal::new(mantissa, scale as u32))
    }

    /// Truncating integer division.
    pub fn div_trunc(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        if other.mantissa == 0 {
            return Err(NumFault::ZeroDivisor);
        }
        let (a, b, _) = Decimal::align(self, other)?;
        Ok(Decimal::new(a / b, 0))
    }

    /// Remainder consistent with `div_trunc`.
    pub fn rem(&self, other: &Decimal) -> Result<Decimal, NumFault> {
        let q = self.div_trunc(other)?;
        self.sub(&q.mul(other)?)
    }

    pub fn truncate(&self) -> Decimal {
        Decimal::new(self.mantissa / pow10(self.scale), 0)
    }

    pub fn floor(&self) -> Decimal {
        let p = pow10(self.scale);
        let mut q = self.mantissa / p;
        if self.mantissa % p != 0 && self.mantissa < 0 {
            q -= 1;
        }
        Decimal::new(q, 0)
    }

    pub fn ceiling(&self) -> Decimal {
        let p = pow10(self.scale);
        let mut q = self.mantissa / p;
        if self.mantissa % p != 0 && self.mantissa > 0 {
            q += 1;
        }
        Decimal::new(q, 0)
    }

    /// Round half away from zero.
    pub fn round(&self) -> Decimal {
        let p = pow10(self.scale);
        let q = self.mantissa / p;
        let r = (self.mantissa % p).unsigned_abs();
        let adjust = if r.checked_mul(2).map_or(true, |r2| r2 >= p.unsigned_abs()) && r != 0 {
            self.mantissa.signum()
        } else {
            0
        };
        Decimal::new(q + adjust, 0)
    }

    pub fn compare(&self, other: &Decimal) -> Ordering {
        match Decimal::align(self, other) {
            Ok((a, b, _)) => a.cmp(&b),
            // Alignment overflow: magnitudes are wildly apart, the decimal
            // exponent decides.
            Err(_) => {
                let sa = self.mantissa.signum();
                let sb = other.mantissa.signum();
                if sa != sb {
                    return sa.cmp(&sb);
                }
                let ea = decimal_digits(self.mantissa.unsigned_abs()) as i64 - self.scale as i64;
                let eb = decimal_digits(other.mantissa.unsigned_abs()) as i64 - other.scale as i64;
                if sa >= 0 {
                    ea.cmp(&eb)
                } else {
                    eb.cmp(&ea)
                }
            }
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Decimal) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int, frac)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

fn rescale(mantissa: i128, by: u32) -> Result<i128, NumFault> {
    let mut m = mantissa;
    for _ in 0..by {
        m = m.checked_mul(10).ok_or(NumFault::IntOverflow)?;
    }
    Ok(m)
}

fn pow10(scale: u32) -> i128 {
    10i128.pow(scale)
}

fn decimal_digits(mut v: u128) -> u32 {
    let mut n = 1;
    while v >= 10 {
        v /= 10;
        n += 1;
    }
    n
}

/// A float together with the exact decimal it was read from or computed as,
/// when one is known. The companion only affects printing; value semantics
/// are the f64.
#[derive(Debug, Clone, Copy)]
pub struct Flt {
    pub value: f64,
    pub exact: Option<Decimal>,
}

impl Flt {
    pub fn new(value: f64) -> Flt {
        Flt { value, exact: None }
    }

    pub fn exact(value: f64, exact: Decimal) -> Flt {
        Flt {
            value,
            exact: Some(exact),
        }
    }

    pub fn from_decimal(d: Decimal) -> Flt {
        Flt {
            value: d.to_f64(),
            exact: Some(d),
        }
    }
}

impl PartialEq for Flt {
    fn eq(&self, other: &Flt) -> bool {
        self.value == other.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::parse(s).unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        for s in ["0", "1", "-1", "3.14", "-0.5", "100", "0.001"] {
            assert_eq!(dec(s).to_string(), s);
        }
    }

    #[test]
    fn normalization_drops_trailing_zeros() {
        assert_eq!(Decimal::new(1500, 2), dec("15"));
        assert_eq!(Decimal::new(1500, 2).to_string(), "15");
        assert_eq!(Decimal::new(0, 5).to_string(), "0");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(dec("1.5").add(&dec("2.25")).unwrap(), dec("3.75"));
        assert_eq!(dec("1").sub(&dec("2.5")).unwrap(), dec("-1.5"));
        assert_eq!(dec("1.5").mul(&dec("2")).unwrap(), dec("3"));
        assert_eq!(dec("1").div(&dec("4")).unwrap(), dec("0.25"));
        assert_eq!(dec("10").div(&dec("4")).unwrap(), dec("2.5"));
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(dec("1").div(&dec("0")), Err(NumFault::ZeroDivisor));
        assert_eq!(dec("1").div_trunc(&dec("0")), Err(NumFault::ZeroDivisor));
    }

    #[test]
    fn non_terminating_division_rounds() {
        let third = dec("1").div(&dec("3")).unwrap();
        let text = third.to_string();
        assert!(text.starts_with("0.3333333333"), "got {}", text);
    }

    #[test]
    fn rounding_modes() {
        assert_eq!(dec("2.5").round(), dec("3"));
        assert_eq!(dec("-2.5").round(), dec("-3"));
        assert_eq!(dec("2.4").round(), dec("2"));
        assert_eq!(dec("-1.2").floor(), dec("-2"));
        assert_eq!(dec("-1.2").ceiling(), dec("-1"));
        assert_eq!(dec("-1.8").truncate(), dec("-1"));
    }

    #[test]
    fn comparison_across_scales() {
        assert_eq!(dec("1.5").compare(&dec("1.50")), Ordering::Equal);
        assert_eq!(dec("-3").compare(&dec("2")), Ordering::Less);
        assert_eq!(dec("10").compare(&dec("9.999")), Ordering::Greater);
    }

    #[test]
    fn integral_conversion() {
        assert_eq!(dec("42").to_i64(), Some(42));
        assert_eq!(dec("4.2").to_i64(), None);
        assert!(dec("4.2").floor().is_integral());
    }
}
