//! Coercion matrix: dynamic scalar → declared field type
//!
//! Every recognized source kind converts to every target type. The only
//! reported failure is a source value outside the 14 scalar kinds. Text that
//! cannot be parsed as the target type does not fail:
//! - numeric targets fall back to zero
//! - `bool` yields no value, which leaves the field untouched
//!
//! Callers rely on that forgiving behavior, so it stays asymmetric.

use crate::error::BindError;
use crate::value::{Kind, Value};

/// A field type the matrix can produce.
pub trait Coerce: Sized {
    const KIND: Kind;

    /// `Ok(None)` means "no value": the binder leaves the field as it was.
    fn coerce(value: &Value) -> Result<Option<Self>, BindError>;

    fn into_value(self) -> Value;
}

impl Kind {
    /// Coerce into this kind, returning the result as a dynamic value.
    ///
    /// Non-scalar kinds are never valid targets and reject every input.
    pub fn coerce(self, value: &Value) -> Result<Option<Value>, BindError> {
        match self {
            Kind::Bool => coerce_into::<bool>(value),
            Kind::Int => coerce_into::<isize>(value),
            Kind::Int8 => coerce_into::<i8>(value),
            Kind::Int16 => coerce_into::<i16>(value),
            Kind::Int32 => coerce_into::<i32>(value),
            Kind::Int64 => coerce_into::<i64>(value),
            Kind::Uint => coerce_into::<usize>(value),
            Kind::Uint8 => coerce_into::<u8>(value),
            Kind::Uint16 => coerce_into::<u16>(value),
            Kind::Uint32 => coerce_into::<u32>(value),
            Kind::Uint64 => coerce_into::<u64>(value),
            Kind::Float32 => coerce_into::<f32>(value),
            Kind::Float64 => coerce_into::<f64>(value),
            Kind::String => coerce_into::<String>(value),
            Kind::Null | Kind::List | Kind::Map => {
                Err(BindError::UnsupportedValueKind { kind: value.kind() })
            }
        }
    }
}

fn coerce_into<T: Coerce>(value: &Value) -> Result<Option<Value>, BindError> {
    Ok(T::coerce(value)?.map(Coerce::into_value))
}

fn scalar(value: &Value) -> Result<&Value, BindError> {
    if value.kind().is_scalar() {
        Ok(value)
    } else {
        Err(BindError::UnsupportedValueKind { kind: value.kind() })
    }
}

// ─────────────────────────────────────────────────────────────
// Literal parsers
// ─────────────────────────────────────────────────────────────

/// Strict boolean literal: `1 t T TRUE true True` / `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Decimal float parsed at `bits` (32 or 64) precision.
///
/// Literals that overflow the width are failures, not infinities.
pub fn parse_float(s: &str, bits: u32) -> Option<f64> {
    let parsed = if bits == 32 {
        f64::from(s.parse::<f32>().ok()?)
    } else {
        s.parse::<f64>().ok()?
    };
    if parsed.is_infinite() && !names_infinity(s) {
        return None;
    }
    Some(parsed)
}

fn names_infinity(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity")
}

/// Base-10 signed integer that must fit in `bits`.
pub fn parse_int(s: &str, bits: u32) -> Option<i64> {
    let v = s.parse::<i64>().ok()?;
    if bits >= 64 {
        return Some(v);
    }
    let max = (1i64 << (bits - 1)) - 1;
    let min = -max - 1;
    (min..=max).contains(&v).then_some(v)
}

/// Base-10 unsigned integer that must fit in `bits`. No sign is accepted.
pub fn parse_uint(s: &str, bits: u32) -> Option<u64> {
    if s.starts_with('+') {
        return None;
    }
    let v = s.parse::<u64>().ok()?;
    if bits >= 64 {
        return Some(v);
    }
    (v >> bits == 0).then_some(v)
}

// ─────────────────────────────────────────────────────────────
// Per-target conversions (input already known to be scalar)
// ─────────────────────────────────────────────────────────────

fn to_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Int(n) => Some(*n != 0),
        Value::Int8(n) => Some(*n != 0),
        Value::Int16(n) => Some(*n != 0),
        Value::Int32(n) => Some(*n != 0),
        Value::Int64(n) => Some(*n != 0),
        Value::Uint(n) => Some(*n != 0),
        Value::Uint8(n) => Some(*n != 0),
        Value::Uint16(n) => Some(*n != 0),
        Value::Uint32(n) => Some(*n != 0),
        Value::Uint64(n) => Some(*n != 0),
        Value::Float32(f) => Some(*f != 0.0),
        Value::Float64(f) => Some(*f != 0.0),
        Value::Str(s) => {
            if s == "yes" || s == "on" {
                Some(true)
            } else if let Some(b) = parse_bool(s) {
                Some(b)
            } else {
                parse_float(s, 64).map(|f| f != 0.0)
            }
        }
        Value::Null | Value::List(_) | Value::Map(_) => None,
    }
}

fn to_f64(v: &Value, bits: u32) -> f64 {
    match v {
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Int(n) => *n as f64,
        Value::Int8(n) => f64::from(*n),
        Value::Int16(n) => f64::from(*n),
        Value::Int32(n) => f64::from(*n),
        Value::Int64(n) => *n as f64,
        Value::Uint(n) => *n as f64,
        Value::Uint8(n) => f64::from(*n),
        Value::Uint16(n) => f64::from(*n),
        Value::Uint32(n) => f64::from(*n),
        Value::Uint64(n) => *n as f64,
        Value::Float32(f) => f64::from(*f),
        Value::Float64(f) => *f,
        Value::Str(s) => parse_float(s, bits).unwrap_or(0.0),
        Value::Null | Value::List(_) | Value::Map(_) => 0.0,
    }
}

fn to_i64(v: &Value, bits: u32) -> i64 {
    match v {
        Value::Bool(b) => i64::from(*b),
        Value::Int(n) => *n as i64,
        Value::Int8(n) => i64::from(*n),
        Value::Int16(n) => i64::from(*n),
        Value::Int32(n) => i64::from(*n),
        Value::Int64(n) => *n,
        Value::Uint(n) => *n as i64,
        Value::Uint8(n) => i64::from(*n),
        Value::Uint16(n) => i64::from(*n),
        Value::Uint32(n) => i64::from(*n),
        Value::Uint64(n) => *n as i64,
        Value::Float32(f) => *f as i64,
        Value::Float64(f) => *f as i64,
        Value::Str(s) => parse_int(s, bits).unwrap_or(0),
        Value::Null | Value::List(_) | Value::Map(_) => 0,
    }
}

fn to_u64(v: &Value, bits: u32) -> u64 {
    match v {
        Value::Bool(b) => u64::from(*b),
        Value::Int(n) => *n as u64,
        Value::Int8(n) => *n as u64,
        Value::Int16(n) => *n as u64,
        Value::Int32(n) => *n as u64,
        Value::Int64(n) => *n as u64,
        Value::Uint(n) => *n as u64,
        Value::Uint8(n) => u64::from(*n),
        Value::Uint16(n) => u64::from(*n),
        Value::Uint32(n) => u64::from(*n),
        Value::Uint64(n) => *n,
        Value::Float32(f) => *f as u64,
        Value::Float64(f) => *f as u64,
        Value::Str(s) => parse_uint(s, bits).unwrap_or(0),
        Value::Null | Value::List(_) | Value::Map(_) => 0,
    }
}

// ─────────────────────────────────────────────────────────────
// Coerce impls
// ─────────────────────────────────────────────────────────────

impl Coerce for bool {
    const KIND: Kind = Kind::Bool;

    fn coerce(value: &Value) -> Result<Option<Self>, BindError> {
        Ok(to_bool(scalar(value)?))
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Coerce for String {
    const KIND: Kind = Kind::String;

    fn coerce(value: &Value) -> Result<Option<Self>, BindError> {
        Ok(Some(scalar(value)?.to_string()))
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl Coerce for f32 {
    const KIND: Kind = Kind::Float32;

    fn coerce(value: &Value) -> Result<Option<Self>, BindError> {
        Ok(Some(to_f64(scalar(value)?, 32) as f32))
    }

    fn into_value(self) -> Value {
        Value::Float32(self)
    }
}

impl Coerce for f64 {
    const KIND: Kind = Kind::Float64;

    fn coerce(value: &Value) -> Result<Option<Self>, BindError> {
        Ok(Some(to_f64(scalar(value)?, 64)))
    }

    fn into_value(self) -> Value {
        Value::Float64(self)
    }
}

macro_rules! impl_coerce_int {
    ($convert:ident: $($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Coerce for $ty {
                const KIND: Kind = Kind::$kind;

                fn coerce(value: &Value) -> Result<Option<Self>, BindError> {
                    Ok(Some($convert(scalar(value)?, <$ty>::BITS) as $ty))
                }

                fn into_value(self) -> Value {
                    Value::$kind(self)
                }
            }
        )*
    };
}

impl_coerce_int!(to_i64: isize => Int, i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);
impl_coerce_int!(to_u64: usize => Uint, u8 => Uint8, u16 => Uint16, u32 => Uint32, u64 => Uint64);
