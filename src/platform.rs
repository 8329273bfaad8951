//! Platform identification.
//!
//! The link resolver and the ping probe pick their command lines from the
//! platform identifier, so OS checks stay out of the business logic.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The operating system the harness is running on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    /// Any other identifier, kept verbatim for diagnostics.
    Other(String),
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an identifier as reported by `std::env::consts::OS`.
    ///
    /// `darwin` is accepted as an alias for macOS.
    pub fn from_os(os: &str) -> Self {
        match os.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" => Platform::MacOs,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Other(os.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Other(os) => os,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_os(s))
    }
}
