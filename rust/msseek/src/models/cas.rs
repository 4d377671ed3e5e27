//! CAS registry numbers.
//!
//! Library records frequently lack a registry number; those are kept as
//! [`CasNumber::Unknown`] and rendered as `---`.

use crate::errors::{
    MsSeekError,
    Result,
};
use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};
use std::sync::OnceLock;

const UNKNOWN_CAS: &str = "---";

fn cas_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,7})-(\d{1,2})-(\d)\s*$").expect("CAS pattern is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CasNumber {
    /// Canonical `NNNNNNN-NN-N` form, without leading zeros in the first block.
    Registry(String),
    #[default]
    Unknown,
}

/// Computes the expected check digit for the digits preceding it.
///
/// The rightmost digit is weighted 1, the next 2 and so on.
fn check_digit(body: u64) -> u64 {
    let mut total = 0;
    let mut rest = body;
    let mut weight = 1;
    while rest > 0 {
        total += (rest % 10) * weight;
        rest /= 10;
        weight += 1;
    }
    total % 10
}

impl CasNumber {
    /// Parses a hyphenated CAS string.
    ///
    /// `---` and any all-zero number (e.g. `0-00-0`) are the unknown sentinel.
    ///
    /// # Example
    ///
    /// ```
    /// use msseek::CasNumber;
    ///
    /// let cas = CasNumber::parse("51-28-5").unwrap();
    /// assert_eq!(cas.to_string(), "51-28-5");
    /// assert_eq!(CasNumber::parse("0-0-0").unwrap(), CasNumber::Unknown);
    /// assert!(CasNumber::parse("51-28-4").is_err());
    /// ```
    pub fn parse(cas: &str) -> Result<Self> {
        let trimmed = cas.trim();
        if trimmed.is_empty() || trimmed == UNKNOWN_CAS {
            return Ok(Self::Unknown);
        }
        let caps = cas_pattern()
            .captures(trimmed)
            .ok_or_else(|| MsSeekError::ParseError {
                msg: format!("'{}' is not a CAS registry number", cas),
            })?;
        let block_1: u64 = caps[1].parse()?;
        let block_2: u64 = caps[2].parse()?;
        let check: u64 = caps[3].parse()?;

        let value = (block_1 * 100 + block_2) * 10 + check;
        if value == 0 {
            return Ok(Self::Unknown);
        }
        Self::validate(value).map_err(|expected| MsSeekError::ParseError {
            msg: format!(
                "invalid CAS number '{}': check digit {} should be {}",
                cas, check, expected
            ),
        })
    }

    /// Converts the integer form (digits without hyphens) to a CAS number.
    ///
    /// Values with a wrong check digit are treated as unknown.
    pub fn from_int(value: u64) -> Self {
        if value == 0 {
            return Self::Unknown;
        }
        Self::validate(value).unwrap_or(Self::Unknown)
    }

    fn validate(value: u64) -> std::result::Result<Self, u64> {
        let check = value % 10;
        let body = value / 10;
        let expected = check_digit(body);
        if expected != check {
            return Err(expected);
        }
        let block_2 = body % 100;
        let block_1 = body / 100;
        Ok(Self::Registry(format!("{}-{:02}-{}", block_1, block_2, check)))
    }

    pub fn to_int(&self) -> Option<u64> {
        match self {
            Self::Registry(s) => s
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok(),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Registry(_))
    }
}

impl std::fmt::Display for CasNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(s) => write!(f, "{}", s),
            Self::Unknown => write!(f, "{}", UNKNOWN_CAS),
        }
    }
}

impl TryFrom<String> for CasNumber {
    type Error = MsSeekError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CasNumber> for String {
    fn from(value: CasNumber) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_numbers() {
        for cas in ["51-28-5", "122-39-4", "71-43-2", "7732-18-5", "5522-43-0"] {
            let parsed = CasNumber::parse(cas).unwrap();
            assert_eq!(parsed.to_string(), cas);
            assert!(parsed.is_known());
        }
    }

    #[test]
    fn test_sentinels() {
        for cas in ["---", "0-00-0", "0-0-0", "", "  "] {
            assert_eq!(CasNumber::parse(cas).unwrap(), CasNumber::Unknown);
        }
        assert_eq!(CasNumber::Unknown.to_string(), "---");
        assert_eq!(CasNumber::from_int(0), CasNumber::Unknown);
    }

    #[test]
    fn test_int_conversion() {
        let cas = CasNumber::from_int(51285);
        assert_eq!(cas.to_string(), "51-28-5");
        assert_eq!(cas.to_int(), Some(51285));
        assert_eq!(CasNumber::from_int(1223_94).to_string(), "122-39-4");
        // Bad check digit
        assert_eq!(CasNumber::from_int(51284), CasNumber::Unknown);
    }

    #[test]
    fn test_second_block_is_padded() {
        let cas = CasNumber::parse("50-0-0").unwrap();
        assert_eq!(cas.to_string(), "50-00-0");
        assert_eq!(cas.to_int(), Some(50000));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(CasNumber::parse("not a cas").is_err());
        assert!(CasNumber::parse("51-28-4").is_err());
        assert!(serde_json::from_str::<CasNumber>(r#""51-28-4""#).is_err());
        let ok: CasNumber = serde_json::from_str(r#""51-28-5""#).unwrap();
        assert_eq!(serde_json::to_string(&ok).unwrap(), r#""51-28-5""#);
    }
}
