//! Runlevel values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable carrying the active runlevel.
pub const RUNLEVEL_ENV: &str = "RUNLEVEL";

/// Runlevel that halts the system.
pub const HALT: Runlevel = Runlevel(0);

/// Runlevel that reboots the system.
pub const REBOOT: Runlevel = Runlevel(6);

/// A runlevel in the range 0-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Runlevel(u8);

impl Runlevel {
    /// Create a runlevel, rejecting values above 9.
    pub fn new(level: u8) -> Result<Self> {
        if level > 9 {
            return Err(Error::Config(format!(
                "runlevel must be between 0 and 9, got: {}",
                level
            )));
        }
        Ok(Self(level))
    }

    /// Runlevel encoded by an ASCII digit, if it is one.
    pub fn from_digit(c: char) -> Option<Self> {
        c.to_digit(10).map(|d| Self(d as u8))
    }

    /// Read the runlevel from the `RUNLEVEL` environment variable.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(RUNLEVEL_ENV).map_err(|_| {
            Error::Config(format!("{} environment variable is not set", RUNLEVEL_ENV))
        })?;
        value.parse()
    }

    /// Numeric value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl FromStr for Runlevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_digit(c).ok_or_else(|| {
                Error::Config(format!("runlevel must be between 0 and 9, got: {}", s))
            }),
            _ => Err(Error::Config(format!(
                "runlevel must be a single digit (0-9), got: {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<u8> for Runlevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        Self::new(level)
    }
}

impl From<Runlevel> for u8 {
    fn from(level: Runlevel) -> u8 {
        level.0
    }
}

impl fmt::Display for Runlevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_digit() {
        assert_eq!("0".parse::<Runlevel>().unwrap(), HALT);
        assert_eq!("6".parse::<Runlevel>().unwrap(), REBOOT);
        assert_eq!("9".parse::<Runlevel>().unwrap().get(), 9);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        for bad in ["", "10", "a", " 3", "3 ", "-1", "٣"] {
            assert!(
                matches!(bad.parse::<Runlevel>(), Err(Error::Config(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_new_bounds() {
        assert!(Runlevel::new(9).is_ok());
        assert!(Runlevel::new(10).is_err());
    }

    #[test]
    fn test_from_digit() {
        assert_eq!(Runlevel::from_digit('3'), Some(Runlevel(3)));
        assert_eq!(Runlevel::from_digit('x'), None);
    }
}
