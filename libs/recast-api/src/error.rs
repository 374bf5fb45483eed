use std::fmt;

/// Error kind for plugin errors.
///
/// The host uses the kind to pick a policy: `Config` fails the configuration
/// attempt, `Encoding` and `TypeMismatch` fail the record being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid option at configure time.
    Config,
    Io,
    /// Byte sequence that cannot be decoded (e.g. empty decimal bytes).
    Encoding,
    /// Value or schema at the target field is not what the transform converts.
    TypeMismatch,
    /// Invalid lifecycle state or other logical error.
    Logic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Encoding => f.write_str("encoding"),
            ErrorKind::TypeMismatch => f.write_str("type mismatch"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Plugin error returned by all transform trait methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PluginError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Encoding, message: msg.into() }
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::TypeMismatch, message: msg.into() }
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PluginError {}

// ---------------------------------------------------------------------------
// From impls: standard error types → PluginError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::io::Error> for PluginError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        Self::encoding(e.to_string())
    }
}

impl From<bigdecimal::ParseBigDecimalError> for PluginError {
    fn from(e: bigdecimal::ParseBigDecimalError) -> Self {
        Self::encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_keeps_kind() {
        let err = PluginError::type_mismatch("expected bytes").with_context("field 'fld1'");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.message(), "field 'fld1': expected bytes");
    }

    #[test]
    fn test_display_includes_kind() {
        let err = PluginError::encoding("empty byte sequence");
        assert_eq!(err.to_string(), "encoding: empty byte sequence");
    }
}
