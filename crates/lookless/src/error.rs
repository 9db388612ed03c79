#![forbid(unsafe_code)]

//! Unified error model and graceful degradation.
//!
//! Every failure a lookless application can see maps to a
//! [`DegradationAction`] telling the host how to keep the UI alive: render
//! the control without visuals, drop the offending request, retry on the
//! next frame, fall back to default configuration, or shut down.

use std::fmt;

use lookless_core::{ConfigError, TemplateError};

/// Top-level error type for lookless applications.
#[derive(Debug)]
pub enum Error {
    /// Template instantiation or tree structure failure.
    Template(TemplateError),
    /// Configuration could not be loaded or failed validation.
    Config(ConfigError),
    /// Raw I/O error (convenience variant for `?` on io::Result).
    Io(std::io::Error),
}

/// Standard result type for lookless APIs.
pub type Result<T> = std::result::Result<T, Error>;

// ── Graceful Degradation ────────────────────────────────────────────────

/// What the host should do when an error occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationAction {
    /// Show the control with no template output until its template changes.
    RenderEmpty,
    /// Ignore the request that failed; the tree is unchanged.
    DropRequest,
    /// Leave remaining layout work queued and continue next frame.
    RetryNextFrame,
    /// Continue with `TreeConfig::default()`.
    UseDefaults,
    /// The error is unrecoverable; shut down gracefully.
    Shutdown,
}

impl Error {
    /// Determine the graceful degradation action for this error.
    pub fn degradation(&self) -> DegradationAction {
        match self {
            Self::Template(TemplateError::DuplicateName { .. })
            | Self::Template(TemplateError::InvalidName { .. }) => DegradationAction::RenderEmpty,
            Self::Template(TemplateError::LayoutBudgetExhausted { .. }) => {
                DegradationAction::RetryNextFrame
            }
            Self::Template(
                TemplateError::StaleWidget { .. }
                | TemplateError::ManagedVisualChildren { .. }
                | TemplateError::AlreadyParented { .. }
                | TemplateError::Cycle { .. }
                | TemplateError::PropertyType { .. },
            ) => DegradationAction::DropRequest,

            Self::Config(_) => DegradationAction::UseDefaults,

            Self::Io(_) => DegradationAction::Shutdown,
        }
    }

    /// Error type label for logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Template(_) => "template",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error is recoverable (does not require shutdown).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.degradation(), DegradationAction::Shutdown)
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "config: {err}"),
            Self::Io(err) => write!(f, "I/O: {err}"),
        }
    }
}

impl fmt::Display for DegradationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderEmpty => write!(f, "render_empty"),
            Self::DropRequest => write!(f, "drop_request"),
            Self::RetryNextFrame => write!(f, "retry_next_frame"),
            Self::UseDefaults => write!(f, "use_defaults"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Template(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────────

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn authoring_defects_render_empty() {
        let err = Error::from(TemplateError::DuplicateName {
            name: "PART_Thumb".into(),
        });
        assert_eq!(err.degradation(), DegradationAction::RenderEmpty);
        assert_eq!(err.error_type(), "template");
        assert!(err.is_recoverable());
        assert!(format!("{err}").contains("PART_Thumb"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn layout_budget_retries_next_frame() {
        let err = Error::from(TemplateError::LayoutBudgetExhausted { passes: 3 });
        assert_eq!(err.degradation(), DegradationAction::RetryNextFrame);
        assert_eq!(err.degradation().to_string(), "retry_next_frame");
    }

    #[test]
    fn structural_misuse_drops_the_request() {
        let err = Error::from(TemplateError::PropertyType { property: "Width" });
        assert_eq!(err.degradation(), DegradationAction::DropRequest);
    }

    #[test]
    fn config_falls_back_to_defaults() {
        let err = Error::from(ConfigError::Validation(vec![
            "max_layout_passes must be > 0".into(),
        ]));
        assert_eq!(err.degradation(), DegradationAction::UseDefaults);
        assert_eq!(err.error_type(), "config");
        assert!(format!("{err}").starts_with("config: "));
    }

    #[test]
    fn raw_io_is_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert_eq!(err.degradation(), DegradationAction::Shutdown);
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "I/O: gone");
    }
}
