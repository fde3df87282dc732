use crate::domain::course::CourseId;
use crate::domain::student::{Balance, StudentId};
use thiserror::Error;

/// Coarse classification of service failures, for callers that only need to
/// decide how to present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InvariantViolation,
    PersistenceFailure,
}

/// Errors raised by entity methods and value object constructors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Balance, requested: u64 },
    #[error("Balance overflow")]
    BalanceOverflow,
    #[error("Invalid registration code: {0:?}")]
    InvalidRegistrationCode(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// A write was rejected because a record changed since it was read, or
    /// because it would duplicate an existing row or id.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Batch references missing record: {0}")]
    MissingRecord(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Backend(err.into_string())
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Student {0} not found")]
    StudentNotFound(StudentId),
    #[error("Invalid transfer amount: {0}")]
    InvalidAmount(i64),
    #[error("Cannot transfer from student {0} to itself")]
    SameStudent(StudentId),
    #[error("Insufficient funds for student {student}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        student: StudentId,
        balance: Balance,
        requested: u64,
    },
    #[error("Balance of student {0} would overflow")]
    BalanceOverflow(StudentId),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::StudentNotFound(_) => ErrorKind::NotFound,
            TransferError::InvalidAmount(_) | TransferError::SameStudent(_) => {
                ErrorKind::InvalidInput
            }
            TransferError::InsufficientFunds { .. } | TransferError::BalanceOverflow(_) => {
                ErrorKind::InvariantViolation
            }
            TransferError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("Student {0} not found")]
    StudentNotFound(StudentId),
    #[error("Courses not found: {0:?}")]
    CourseNotFound(Vec<CourseId>),
    #[error("No courses selected")]
    EmptyCourseSelection,
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),
}

impl EnrollmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnrollmentError::StudentNotFound(_) | EnrollmentError::CourseNotFound(_) => {
                ErrorKind::NotFound
            }
            EnrollmentError::EmptyCourseSelection => ErrorKind::InvalidInput,
            EnrollmentError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
}

pub type Result<T> = std::result::Result<T, RegistrarError>;
