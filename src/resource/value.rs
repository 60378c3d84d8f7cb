use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// The unit a `Size` value is expressed in. `Bytes` is the default; `Words`
/// appears in a handful of legacy resources (e.g. memory on some platforms)
/// and is kept distinct because `1 word` is not `1 byte` for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeUnit {
    Bytes,
    Words,
}

/// A size quantity, held un-normalized as `(num, shift)` so `encode` can
/// round-trip the original magnitude suffix (`kb`, `mb`, ...) instead of
/// always re-deriving the "nicest" unit. Comparison always normalizes to bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeValue {
    pub num: u64,
    /// bit shift applied to `num`: 0 = bytes/words, 10 = kilo, 20 = mega,
    /// 30 = giga, 40 = tera, 50 = peta.
    pub shift: u8,
    pub unit: SizeUnit,
}

const VALID_SHIFTS: [u8; 6] = [0, 10, 20, 30, 40, 50];

impl SizeValue {
    pub fn new(num: u64, shift: u8, unit: SizeUnit) -> Self {
        debug_assert!(VALID_SHIFTS.contains(&shift), "invalid size shift {shift}");
        SizeValue { num, shift, unit }
    }

    pub fn zero() -> Self {
        SizeValue { num: 0, shift: 10, unit: SizeUnit::Bytes }
    }

    /// Normalizes to a byte count. `Words` are treated as 8-byte words, which
    /// matches the word width PBS's resource monitor reports on 64-bit hosts.
    pub fn to_bytes(&self) -> u128 {
        let base = (self.num as u128) << self.shift;
        match self.unit {
            SizeUnit::Bytes => base,
            SizeUnit::Words => base * 8,
        }
    }

    fn suffix(shift: u8) -> &'static str {
        match shift {
            0 => "b",
            10 => "kb",
            20 => "mb",
            30 => "gb",
            40 => "tb",
            50 => "pb",
            _ => "b",
        }
    }
}

impl fmt::Display for SizeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit_suffix = match self.unit {
            SizeUnit::Bytes => "",
            SizeUnit::Words => "w",
        };
        write!(f, "{}{}{}", self.num, Self::suffix(self.shift), unit_suffix)
    }
}

/// Result of comparing two resource values. Kept distinct from `Ordering`
/// because a resource comparison can legitimately fail to produce an order
/// (different string-array sets, incompatible types) without that being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Lt,
    Eq,
    Gt,
    Incompatible,
}

impl From<Ordering> for CompareResult {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Less => CompareResult::Lt,
            Ordering::Equal => CompareResult::Eq,
            Ordering::Greater => CompareResult::Gt,
        }
    }
}

/// A typed resource value: long, size, string, float, or boolean.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Long(i64),
    Size(SizeValue),
    Str(String),
    StrArray(Vec<String>),
    Bool(bool),
    Float(f64),
    /// `infinity` may be set on any numeric-like type; compares greater than
    /// any finite value of the same kind.
    Infinity,
    /// The resource entry exists but no value has been set (unset `available`).
    Unset,
}

impl ResourceValue {
    pub fn is_set(&self) -> bool {
        !matches!(self, ResourceValue::Unset)
    }

    /// Parses a string into a value according to the expected kind, as the
    /// process-wide resource definition would dictate. `kind` selects which
    /// variant to attempt.
    pub fn parse(name: &str, kind: super::def::ResourceKind, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("infinity") || raw == "-1" {
            return Ok(ResourceValue::Infinity);
        }
        match kind {
            super::def::ResourceKind::Long => raw
                .parse::<i64>()
                .map(ResourceValue::Long)
                .map_err(|_| Error::BadResourceValue { name: name.to_string(), value: raw.to_string() }),
            super::def::ResourceKind::Size => parse_size(raw)
                .map(ResourceValue::Size)
                .ok_or_else(|| Error::BadResourceValue { name: name.to_string(), value: raw.to_string() }),
            super::def::ResourceKind::Str => Ok(ResourceValue::Str(raw.to_string())),
            super::def::ResourceKind::StrArray => Ok(ResourceValue::StrArray(
                raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            )),
            super::def::ResourceKind::Bool => parse_bool(raw)
                .map(ResourceValue::Bool)
                .ok_or_else(|| Error::BadResourceValue { name: name.to_string(), value: raw.to_string() }),
            super::def::ResourceKind::Float => raw
                .parse::<f64>()
                .map(ResourceValue::Float)
                .map_err(|_| Error::BadResourceValue { name: name.to_string(), value: raw.to_string() }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ResourceValue::Long(v) => v.to_string(),
            ResourceValue::Size(s) => s.to_string(),
            ResourceValue::Str(s) => s.clone(),
            ResourceValue::StrArray(items) => items.join(","),
            ResourceValue::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
            ResourceValue::Float(f) => f.to_string(),
            ResourceValue::Infinity => "infinity".to_string(),
            ResourceValue::Unset => String::new(),
        }
    }

    /// Compares two values, respecting units and `infinity`. Returns
    /// `Incompatible` rather than panicking when the kinds cannot be compared
    /// (e.g. a string against a float).
    pub fn compare(&self, other: &ResourceValue) -> CompareResult {
        use ResourceValue::*;
        match (self, other) {
            (Infinity, Infinity) => CompareResult::Eq,
            (Infinity, _) => CompareResult::Gt,
            (_, Infinity) => CompareResult::Lt,
            (Unset, Unset) => CompareResult::Eq,
            (Unset, _) | (_, Unset) => CompareResult::Incompatible,
            (Long(a), Long(b)) => (*a).cmp(b).into(),
            (Size(a), Size(b)) => a.to_bytes().cmp(&b.to_bytes()).into(),
            (Float(a), Float(b)) => a.partial_cmp(b).map(Into::into).unwrap_or(CompareResult::Incompatible),
            (Bool(a), Bool(b)) => a.cmp(b).into(),
            (Str(a), Str(b)) => a.cmp(b).into(),
            (StrArray(a), StrArray(b)) => {
                let sa: std::collections::HashSet<&String> = a.iter().collect();
                let sb: std::collections::HashSet<&String> = b.iter().collect();
                if sa == sb { CompareResult::Eq } else { CompareResult::Incompatible }
            }
            // Long and Size are frequently interchangeable for consumable
            // counting resources (e.g. `ncpus` parsed as Long); allow it.
            (Long(a), Size(b)) => (*a as i128).cmp(&(b.to_bytes() as i128)).into(),
            (Size(a), Long(b)) => (a.to_bytes() as i128).cmp(&(*b as i128)).into(),
            _ => CompareResult::Incompatible,
        }
    }

    /// Unordered set-equality for string arrays; subset test helper.
    pub fn is_subset_of(&self, other: &ResourceValue) -> bool {
        match (self, other) {
            (ResourceValue::StrArray(a), ResourceValue::StrArray(b)) => {
                let sb: std::collections::HashSet<&String> = b.iter().collect();
                a.iter().all(|v| sb.contains(v))
            }
            _ => false,
        }
    }

    /// Consumable arithmetic: `a + b`. Fails with `TypeMismatch` when units
    /// differ in a way that cannot be coerced (e.g. adding a string).
    pub fn add(&self, other: &ResourceValue) -> Result<ResourceValue> {
        use ResourceValue::*;
        match (self, other) {
            (Infinity, _) | (_, Infinity) => Ok(Infinity),
            (Long(a), Long(b)) => Ok(Long(a + b)),
            (Float(a), Float(b)) => Ok(Float(a + b)),
            (Size(a), Size(b)) if a.unit == b.unit => {
                let bytes = a.to_bytes() + b.to_bytes();
                Ok(Size(bytes_to_size(bytes, a.unit)))
            }
            _ => Err(Error::TypeMismatch(format!("cannot add {:?} and {:?}", self, other))),
        }
    }

    /// Consumable arithmetic: `a - b`, saturating at zero for unsigned-like
    /// resources rather than going negative (matches "assigned" bookkeeping,
    /// which can never be negative even transiently).
    pub fn subtract(&self, other: &ResourceValue) -> Result<ResourceValue> {
        use ResourceValue::*;
        match (self, other) {
            (Infinity, _) => Ok(Infinity),
            (Long(a), Long(b)) => Ok(Long((a - b).max(0))),
            (Float(a), Float(b)) => Ok(Float((a - b).max(0.0))),
            (Size(a), Size(b)) if a.unit == b.unit => {
                let ab = a.to_bytes();
                let bb = b.to_bytes();
                let bytes = ab.saturating_sub(bb);
                Ok(Size(bytes_to_size(bytes, a.unit)))
            }
            _ => Err(Error::TypeMismatch(format!("cannot subtract {:?} and {:?}", self, other))),
        }
    }
}

fn bytes_to_size(bytes: u128, unit: SizeUnit) -> SizeValue {
    let raw = match unit {
        SizeUnit::Bytes => bytes,
        SizeUnit::Words => bytes / 8,
    };
    if raw == 0 {
        return SizeValue::new(0, 10, unit);
    }
    for &shift in VALID_SHIFTS.iter().rev() {
        let denom = 1u128 << shift;
        if raw % denom == 0 && raw / denom <= u64::MAX as u128 {
            return SizeValue::new((raw / denom) as u64, shift, unit);
        }
    }
    SizeValue::new(raw as u64, 0, unit)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "TRUE" | "1" | "y" | "Y" => Some(true),
        "false" | "False" | "FALSE" | "0" | "n" | "N" => Some(false),
        _ => None,
    }
}

/// Parses `\d+(\.\d+)?(kb|mb|gb|tb|pb)(b|w)?`. A bare number with no suffix
/// is treated as a byte count at shift 0 (matches PBS's own `size` decode).
fn parse_size(raw: &str) -> Option<SizeValue> {
    let lower = raw.to_ascii_lowercase();
    let (unit, body) = if let Some(stripped) = lower.strip_suffix('w') {
        (SizeUnit::Words, stripped)
    } else if let Some(stripped) = lower.strip_suffix('b') {
        (SizeUnit::Bytes, stripped)
    } else {
        (SizeUnit::Bytes, lower.as_str())
    };

    let (shift, num_part) = if let Some(s) = body.strip_suffix("kb").or_else(|| body.strip_suffix('k')) {
        (10, s)
    } else if let Some(s) = body.strip_suffix("mb").or_else(|| body.strip_suffix('m')) {
        (20, s)
    } else if let Some(s) = body.strip_suffix("gb").or_else(|| body.strip_suffix('g')) {
        (30, s)
    } else if let Some(s) = body.strip_suffix("tb").or_else(|| body.strip_suffix('t')) {
        (40, s)
    } else if let Some(s) = body.strip_suffix("pb").or_else(|| body.strip_suffix('p')) {
        (50, s)
    } else {
        (0, body)
    };

    if num_part.is_empty() {
        return None;
    }

    if let Ok(whole) = num_part.parse::<u64>() {
        return Some(SizeValue::new(whole, shift, unit));
    }

    // Fractional sizes (e.g. "1.5gb") are normalized down to the next shift
    // so the stored `num` stays an integer, exactly how PBS stores "size".
    if let Ok(frac) = num_part.parse::<f64>() {
        if shift == 0 {
            return Some(SizeValue::new(frac.round() as u64, 0, unit));
        }
        let scaled = frac * 1024.0;
        return Some(SizeValue::new(scaled.round() as u64, shift - 10, unit));
    }

    None
}
