//! Service entries and the service filename convention.
//!
//! A service script is named `(<digit><letters>)+-<name>`. Each digit is a
//! runlevel and the letters after it are the ordering key the script uses in
//! that runlevel, so `3a1b-network` runs early in runlevel 3 and a little
//! later in runlevel 1.

use crate::error::ParseError;
use crate::runlevel::Runlevel;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Separator between the runlevel groups and the service name.
pub const SEPARATOR: char = '-';

/// A service script discovered for one runlevel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEntry {
    /// Directory entry name
    pub filename: String,
    /// Name after the separator, used for logging
    pub name: String,
    /// Ordering key for the requested runlevel
    pub ordering: String,
    /// Runlevel this entry was resolved against
    pub runlevel: Runlevel,
    /// Full path to the script
    pub path: PathBuf,
}

/// Result of matching a filename against a runlevel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Well formed and has a group for the requested runlevel
    Matched(ServiceEntry),
    /// Well formed but not part of the requested runlevel
    NotMatched,
    /// Does not follow the naming convention
    Invalid(ParseError),
}

impl ServiceEntry {
    /// Parse `filename` for `runlevel`, resolving its path under `services_dir`.
    ///
    /// Malformed names are rejected whichever runlevel is asked for. When a
    /// name carries several groups for the same runlevel the first one wins.
    pub fn parse(filename: &str, runlevel: Runlevel, services_dir: &Path) -> ParseOutcome {
        match scan(filename, runlevel) {
            Err(e) => ParseOutcome::Invalid(e),
            Ok((None, _)) => ParseOutcome::NotMatched,
            Ok((Some(ordering), name)) => ParseOutcome::Matched(ServiceEntry {
                filename: filename.to_string(),
                name: name.to_string(),
                ordering: ordering.to_string(),
                runlevel,
                path: services_dir.join(filename),
            }),
        }
    }
}

/// Walk the runlevel groups, returning the ordering key for `target` (if any)
/// and the service name.
fn scan(filename: &str, target: Runlevel) -> Result<(Option<&str>, &str), ParseError> {
    let bytes = filename.as_bytes();
    let mut pos = 0;
    let mut ordering = None;

    if filename.starts_with(SEPARATOR) {
        return Err(ParseError::NoRunlevels);
    }

    while pos < bytes.len() && bytes[pos] != SEPARATOR as u8 {
        // Only ASCII is consumed, so `pos` stays on a char boundary.
        let Some(level) = Runlevel::from_digit(bytes[pos] as char) else {
            let found = filename[pos..].chars().next().unwrap_or_default();
            return Err(ParseError::ExpectedDigit {
                position: pos,
                found,
            });
        };
        pos += 1;

        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == start {
            return Err(ParseError::MissingOrdering {
                position: start - 1,
                runlevel: level.get(),
            });
        }

        if level == target && ordering.is_none() {
            ordering = Some(&filename[start..pos]);
        }
    }

    if pos == bytes.len() {
        return Err(ParseError::MissingSeparator);
    }

    let name = &filename[pos + 1..];
    if name.is_empty() {
        return Err(ParseError::EmptyName);
    }

    Ok((ordering, name))
}
