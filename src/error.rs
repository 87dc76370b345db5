use crate::expense::ExpenseStatus;

pub type Result<T> = std::result::Result<T, ApprovalError>;

#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    #[error("expense {0} not found")]
    ExpenseNotFound(String),
    #[error("rule {0} not found")]
    RuleNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("{actor} is not authorized to decide on expense {expense_id}")]
    NotAnApprover { actor: String, expense_id: String },
    #[error("admin role required")]
    AdminOnly,
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("invalid user: {0}")]
    InvalidUser(String),
    #[error("expense {expense_id} is already {status}")]
    TerminalState {
        expense_id: String,
        status: ExpenseStatus,
    },
    #[error("expense {0} was modified concurrently, decision was not applied")]
    LostUpdate(String),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
    #[error("identifier failure: {0}")]
    Identifier(String),
}

/// Coarse classification used by callers to map errors onto a transport
/// (HTTP status codes, CLI exit codes) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Validation,
    Conflict,
    Internal,
}

impl ApprovalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExpenseNotFound(_) | Self::RuleNotFound(_) | Self::UserNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::NotAnApprover { .. } | Self::AdminOnly => ErrorKind::Unauthorized,
            Self::InvalidSubmission(_) | Self::InvalidRule(_) | Self::InvalidUser(_) => {
                ErrorKind::Validation
            }
            Self::TerminalState { .. } | Self::LostUpdate(_) => ErrorKind::Conflict,
            Self::Storage(_) | Self::Codec(_) | Self::Identifier(_) => ErrorKind::Internal,
        }
    }
}

impl From<minicbor::decode::Error> for ApprovalError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ApprovalError {
    fn from(err: minicbor::encode::Error<E>) -> Self {
        Self::Codec(err.to_string())
    }
}
