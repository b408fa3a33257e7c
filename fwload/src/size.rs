use crate::Error;
use serde::Deserialize;
use std::convert::TryFrom;
use std::fmt;

/// Parses a number optionally suffixed with `K`, `M` or `G`.
///
/// The number follows C `strtoull` base detection: `0x` for hex, a leading
/// `0` for octal, decimal otherwise. A suffix multiplies by 1024 once per
/// step, so `G` applies all three shifts. Returns the value and the unparsed
/// remainder.
pub fn parse_memsize(input: &str) -> Result<(u64, &str), Error> {
    let invalid = || Error::InvalidSize(input.to_string());

    let (radix, digits) = if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        (16, hex)
    } else if input.len() > 1 && input.starts_with('0') {
        (8, &input[1..])
    } else {
        (10, input)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or_else(|| digits.len());
    let (number, rest) = digits.split_at(end);
    let mut value = match (number.is_empty(), radix) {
        // "0" followed by a non octal digit
        (true, 8) => 0,
        (true, _) => return Err(invalid()),
        _ => u64::from_str_radix(number, radix).map_err(|_| invalid())?,
    };

    let shifts = match rest.chars().next() {
        Some('G') | Some('g') => 3,
        Some('M') | Some('m') => 2,
        Some('K') | Some('k') => 1,
        _ => return Ok((value, rest)),
    };
    for _ in 0..shifts {
        value = value.checked_mul(1024).ok_or_else(invalid)?;
    }

    Ok((value, &rest[1..]))
}

/// A byte count that may be written as `0x1000`, `128K`, `4M`...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(try_from = "RawSize")]
pub struct MemSize(pub u64);

impl MemSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl std::str::FromStr for MemSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match parse_memsize(s.trim())? {
            (value, "") => Ok(MemSize(value)),
            _ => Err(Error::InvalidSize(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Int(u64),
    Str(String),
}

impl TryFrom<RawSize> for MemSize {
    type Error = Error;

    fn try_from(raw: RawSize) -> Result<Self, Error> {
        match raw {
            RawSize::Int(value) => Ok(MemSize(value)),
            RawSize::Str(s) => s.parse(),
        }
    }
}

impl From<MemSize> for u64 {
    fn from(size: MemSize) -> u64 {
        size.0
    }
}
