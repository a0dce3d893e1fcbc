use std::fmt;

/// Classification of everything that can go wrong while deriving a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required source fact is absent (no debit date, no exchange rate, ...).
    MissingFact,
    /// Source facts contradict each other (several currencies in one aggregate, ...).
    AmbiguousFact,
    /// The derived records do not balance.
    UnbalancedResult,
    /// No generator exists for the charge type tag.
    UnsupportedType,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingFact => "missing fact",
            ErrorKind::AmbiguousFact => "ambiguous fact",
            ErrorKind::UnbalancedResult => "unbalanced result",
            ErrorKind::UnsupportedType => "unsupported type",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    MissingFact(String),
    #[error("{0}")]
    AmbiguousFact(String),
    #[error("{0}")]
    UnbalancedResult(String),
    #[error("unsupported charge type: {0}")]
    UnsupportedType(String),
}

impl LedgerError {
    pub fn missing(message: impl Into<String>) -> Self {
        LedgerError::MissingFact(message.into())
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        LedgerError::AmbiguousFact(message.into())
    }

    pub fn unbalanced(message: impl Into<String>) -> Self {
        LedgerError::UnbalancedResult(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::MissingFact(_) => ErrorKind::MissingFact,
            LedgerError::AmbiguousFact(_) => ErrorKind::AmbiguousFact,
            LedgerError::UnbalancedResult(_) => ErrorKind::UnbalancedResult,
            LedgerError::UnsupportedType(_) => ErrorKind::UnsupportedType,
        }
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
