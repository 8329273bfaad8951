//! Error types for the diagnostic harness.
//!
//! Environmental failures (DNS, connect, timeouts, platform quirks) are
//! turned into data by the probes and the link resolver. Only the
//! conditions that indicate a caller bug or an unexpected fault surface as
//! a [`DiagnosticError`].

use std::error::Error;
use std::fmt;

/// Exit codes for the application.
pub mod exit_codes {
    /// Every check passed.
    pub const SUCCESS: i32 = 0;
    /// At least one check failed or errored.
    pub const CHECKS_FAILED: i32 = 1;
    /// Configuration error (invalid arguments, unreadable config file).
    pub const CONFIG_ERROR: i32 = 3;
    /// Unknown/unexpected error.
    pub const UNKNOWN_ERROR: i32 = 99;
}

/// Categories of errors that can occur while running diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// DNS lookup failure.
    Resolution,
    /// TCP/HTTP transport failure.
    Connection,
    /// A bounded wait was exceeded.
    Timeout,
    /// The caller supplied a configuration that can never work.
    InvalidConfiguration,
    /// No link query exists for the current platform.
    PlatformUnsupported,
    /// An external command could not be run.
    Command,
    /// Unknown or unexpected errors.
    Unknown,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidConfiguration => exit_codes::CONFIG_ERROR,
            ErrorKind::Unknown => exit_codes::UNKNOWN_ERROR,
            _ => exit_codes::CHECKS_FAILED,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Resolution => "DNS resolution error",
            ErrorKind::Connection => "Connection error",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::InvalidConfiguration => "Invalid configuration",
            ErrorKind::PlatformUnsupported => "Unsupported platform",
            ErrorKind::Command => "Command error",
            ErrorKind::Unknown => "Unknown error",
        }
    }
}

/// A user-friendly error type for diagnostic operations.
#[derive(Debug)]
pub struct DiagnosticError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl DiagnosticError {
    /// Create a new DiagnosticError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: None,
            source: None,
        }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Create a DNS resolution error.
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message).with_suggestion(
            "Check your DNS settings or try using a different DNS server.",
        )
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message).with_suggestion(
            "The target may be slow or unreachable. Try a longer timeout.",
        )
    }

    /// Create an invalid configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfiguration, message)
    }

    /// Create an unsupported platform error.
    pub fn platform(os: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::PlatformUnsupported,
            format!("no link query for platform '{}'", os.into()),
        )
    }

    /// Create a command error.
    pub fn command(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Command, message)
    }

    /// Create an error for a fault that should not happen.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for DiagnosticError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Classify an error into an ErrorKind based on its message.
///
/// Transport libraries wrap the interesting cause several layers deep, so
/// the whole source chain is inspected.
pub fn classify_error(error: &dyn Error) -> ErrorKind {
    let mut error_str = error.to_string().to_lowercase();
    let mut source = error.source();
    while let Some(inner) = source {
        error_str.push(' ');
        error_str.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("deadline")
    {
        return ErrorKind::Timeout;
    }

    if error_str.contains("dns")
        || error_str.contains("resolve")
        || error_str.contains("no such host")
        || error_str.contains("name or service not known")
        || error_str.contains("no record")
    {
        return ErrorKind::Resolution;
    }

    if error_str.contains("connection refused")
        || error_str.contains("connection reset")
        || error_str.contains("network unreachable")
        || error_str.contains("host unreachable")
        || error_str.contains("no route")
        || error_str.contains("broken pipe")
        || error_str.contains("error sending request")
        || error_str.contains("connect")
    {
        return ErrorKind::Connection;
    }

    ErrorKind::Unknown
}

/// Format an error for user display.
pub fn format_error_for_display(error: &DiagnosticError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
