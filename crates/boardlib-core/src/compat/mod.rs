//! Board identifiers and library compatibility.
//!
//! A fully qualified board name (FQBN) has the shape
//! `vendor:architecture:board[:key=value,...]`. Listings use it to decide
//! whether a library's declared architectures cover the board.

use crate::error::{BoardlibError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parsed fully qualified board name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fqbn {
    pub vendor: String,
    pub architecture: String,
    pub board: String,
    /// Board options in declaration order; a repeated key keeps its first
    /// position and takes the last value.
    options: Vec<(String, String)>,
}

impl Fqbn {
    /// Parse an FQBN. Wrong-shaped input is rejected as a whole.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |message: String| BoardlibError::InvalidFqbn {
            fqbn: input.to_string(),
            message,
        };

        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(invalid(format!("not an FQBN: {}", input)));
        }
        if parts[2].is_empty() {
            return Err(invalid("empty board identifier".to_string()));
        }

        let mut fqbn = Self {
            vendor: parts[0].to_string(),
            architecture: parts[1].to_string(),
            board: parts[2].to_string(),
            options: Vec::new(),
        };

        if let Some(config) = parts.get(3) {
            for pair in config.split(',') {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| invalid(format!("invalid config option: {}", pair)))?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(invalid(format!("invalid config option: {}", pair)));
                }
                fqbn.set_option(key, value.trim());
            }
        }

        Ok(fqbn)
    }

    pub fn set_option(&mut self, key: &str, value: &str) {
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.options.push((key.to_string(), value.to_string())),
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// `vendor:architecture:board`.
    pub fn without_config(&self) -> String {
        format!("{}:{}:{}", self.vendor, self.architecture, self.board)
    }

    /// `vendor:architecture`, the platform this board belongs to.
    pub fn platform_id(&self) -> String {
        format!("{}:{}", self.vendor, self.architecture)
    }
}

impl fmt::Display for Fqbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.without_config())?;
        let mut sep = ':';
        for (key, value) in &self.options {
            write!(f, "{}{}={}", sep, key, value)?;
            sep = ',';
        }
        Ok(())
    }
}

impl FromStr for Fqbn {
    type Err = BoardlibError;

    fn from_str(s: &str) -> Result<Self> {
        Fqbn::parse(s)
    }
}

impl Serialize for Fqbn {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fqbn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Fqbn::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Whether declared architectures cover `architecture`. `*` covers all.
pub fn supports_architecture(architectures: &[String], architecture: &str) -> bool {
    architectures
        .iter()
        .any(|a| a.trim() == "*" || a.trim().eq_ignore_ascii_case(architecture))
}

/// Whether a library with the given architectures can be used on `board`.
pub fn is_compatible(architectures: &[String], board: &Fqbn) -> bool {
    supports_architecture(architectures, &board.architecture)
}
