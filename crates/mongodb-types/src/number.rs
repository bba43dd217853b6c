//! Exact ordering of BSON numbers.
//!
//! Every numeric cursor value (int32, int64, double, decimal128) reduces to
//! a sign, its significant decimal digits and the exponent of the first
//! digit. Doubles expand to their exact binary value, so a double never
//! compares equal to a nearby decimal it only rounds to.

use bson::Decimal128;
use std::cmp::Ordering;

/// Significant digits needed to print any `f64` exactly.
const F64_EXACT_DIGITS: usize = 767;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExactNumber {
    NaN,
    Infinite {
        negative: bool,
    },
    /// `0.d1 d2 d3 ... × 10^(exponent + 1)`; `digits` carries no leading or
    /// trailing zeros and is empty for zero.
    Finite {
        negative: bool,
        digits: Vec<u8>,
        exponent: i64,
    },
}

impl ExactNumber {
    pub(crate) fn from_i64(value: i64) -> Self {
        Self::parse(&value.to_string()).unwrap_or(ExactNumber::NaN)
    }

    pub(crate) fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return ExactNumber::NaN;
        }
        if value.is_infinite() {
            return ExactNumber::Infinite {
                negative: value < 0.0,
            };
        }
        Self::parse(&format!("{value:.prec$e}", prec = F64_EXACT_DIGITS)).unwrap_or(ExactNumber::NaN)
    }

    pub(crate) fn from_decimal128(value: &Decimal128) -> Self {
        Self::parse(&value.to_string()).unwrap_or(ExactNumber::NaN)
    }

    /// Parse plain or scientific notation, plus `NaN` and `Infinity`.
    fn parse(text: &str) -> Option<Self> {
        let (negative, unsigned) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        match unsigned.to_ascii_lowercase().as_str() {
            "nan" => return Some(ExactNumber::NaN),
            "inf" | "infinity" => return Some(ExactNumber::Infinite { negative }),
            _ => {}
        }

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], unsigned[at + 1..].parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut all = Vec::with_capacity(int_part.len() + frac_part.len());
        for c in int_part.bytes().chain(frac_part.bytes()) {
            if !c.is_ascii_digit() {
                return None;
            }
            all.push(c - b'0');
        }

        let leading = all.iter().take_while(|d| **d == 0).count();
        let significant = &all[leading..];
        let trailing = significant.iter().rev().take_while(|d| **d == 0).count();
        let digits = significant[..significant.len() - trailing].to_vec();
        if digits.is_empty() {
            return Some(ExactNumber::Finite {
                negative: false,
                digits,
                exponent: 0,
            });
        }

        // Place of the last written digit, moved up to the first significant one.
        let exponent = exponent - frac_part.len() as i64 + significant.len() as i64 - 1;
        Some(ExactNumber::Finite {
            negative,
            digits,
            exponent,
        })
    }

    /// Canonical text: equal numbers give equal text whatever their width.
    pub(crate) fn canonical(&self) -> String {
        match self {
            ExactNumber::NaN => "NaN".to_string(),
            ExactNumber::Infinite { negative: true } => "-Infinity".to_string(),
            ExactNumber::Infinite { negative: false } => "Infinity".to_string(),
            ExactNumber::Finite { digits, .. } if digits.is_empty() => "0".to_string(),
            ExactNumber::Finite {
                negative,
                digits,
                exponent,
            } => {
                let sign = if *negative { "-" } else { "" };
                let digits: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
                format!("{sign}{digits}E{exponent}")
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ExactNumber::NaN => 0,
            ExactNumber::Infinite { negative: true } => 1,
            ExactNumber::Finite { .. } => 2,
            ExactNumber::Infinite { negative: false } => 3,
        }
    }

    fn signum(&self) -> i8 {
        match self {
            ExactNumber::Finite { digits, .. } if digits.is_empty() => 0,
            ExactNumber::Finite { negative: true, .. } => -1,
            _ => 1,
        }
    }
}

impl Ord for ExactNumber {
    /// NaN sorts below every other number, as on the server.
    fn cmp(&self, other: &Self) -> Ordering {
        let (
            ExactNumber::Finite {
                digits: a_digits,
                exponent: a_exp,
                ..
            },
            ExactNumber::Finite {
                digits: b_digits,
                exponent: b_exp,
                ..
            },
        ) = (self, other)
        else {
            return self.rank().cmp(&other.rank());
        };

        let sign = self.signum();
        match sign.cmp(&other.signum()) {
            Ordering::Equal if sign == 0 => Ordering::Equal,
            Ordering::Equal => {
                let magnitude = a_exp.cmp(b_exp).then_with(|| a_digits.cmp(b_digits));
                if sign < 0 {
                    magnitude.reverse()
                } else {
                    magnitude
                }
            }
            unequal => unequal,
        }
    }
}

impl PartialOrd for ExactNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare a double with an integer without rounding the integer.
pub(crate) fn compare_f64_i64(f: f64, i: i64) -> Ordering {
    // 2^63 is exact as a double; every double in [-2^63, 2^63) truncates to an i64.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Ordering::Less;
    }
    if f >= TWO_POW_63 {
        return Ordering::Greater;
    }
    if f < -TWO_POW_63 {
        return Ordering::Less;
    }
    let whole = f.trunc();
    (whole as i64).cmp(&i).then_with(|| {
        let fraction = f - whole;
        if fraction > 0.0 {
            Ordering::Greater
        } else if fraction < 0.0 {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    })
}
