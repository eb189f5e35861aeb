use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SiphonError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("no such operation: {0}")]
    Noop(String),
    #[error("undefined type: {0}")]
    UndefinedType(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SiphonError>;

impl SiphonError {
    /// Stable tag for the error kind, used in transport error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TypeMismatch(_) => "type_mismatch",
            Self::Index(_) => "index",
            Self::Noop(_) => "noop",
            Self::UndefinedType(_) => "undefined_type",
            Self::Schema(_) => "schema",
            Self::Internal(_) => "internal",
            Self::Parse { .. } => "parse",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
            Self::Lock(_) => "lock",
        }
    }

    /// Whether the failure was caused by malformed request input rather than
    /// by the request disagreeing with the stored data.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Json(_))
    }

    pub(crate) fn from_pest<R: pest::RuleType>(e: pest::error::Error<R>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (Some(l), Some(c)),
            pest::error::LineColLocation::Span((l, c), _) => (Some(l), Some(c)),
        };
        Self::Parse { message: e.variant.message().into_owned(), line, col }
    }
}

// Helper conversions
impl From<serde_json::Error> for SiphonError {
    fn from(e: serde_json::Error) -> Self { Self::Json(e.to_string()) }
}
impl From<config::ConfigError> for SiphonError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for SiphonError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
