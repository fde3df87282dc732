use crate::error::DomainError;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type StudentId = u32;

/// Length of a generated registration code.
pub const REGISTRATION_CODE_LEN: usize = 7;

/// A student's account balance.
///
/// Backed by an unsigned integer, so a negative balance cannot be represented.
/// Arithmetic goes through the checked helpers below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub u64);

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(amount: u64) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.value()).map(Self)
    }

    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        self.0.checked_sub(amount.value()).map(Self)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive amount moved between balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value > 0 {
            Ok(Self(value as u64))
        } else {
            Err(DomainError::NonPositiveAmount(value))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A fixed-length alphanumeric code assigned once when a student is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistrationCode(String);

impl RegistrationCode {
    pub fn generate() -> Self {
        let code = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REGISTRATION_CODE_LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RegistrationCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == REGISTRATION_CODE_LEN && value.chars().all(|c| c.is_ascii_alphanumeric())
        {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidRegistrationCode(value))
        }
    }
}

impl From<RegistrationCode> for String {
    fn from(code: RegistrationCode) -> Self {
        code.0
    }
}

impl fmt::Display for RegistrationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A student record.
///
/// `version` is owned by the store: it is bumped on every committed write and
/// used to reject writes based on a stale read.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub balance: Balance,
    pub registration_code: RegistrationCode,
    #[serde(default)]
    pub version: u64,
}

impl Student {
    /// Creates a student with a freshly generated registration code.
    pub fn new(id: StudentId, name: impl Into<String>, balance: Balance) -> Self {
        Self::with_code(id, name, balance, RegistrationCode::generate())
    }

    pub fn with_code(
        id: StudentId,
        name: impl Into<String>,
        balance: Balance,
        registration_code: RegistrationCode,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
            registration_code,
            version: 0,
        }
    }

    /// Adds funds to the balance.
    pub fn deposit(&mut self, amount: Amount) -> Result<(), DomainError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(DomainError::BalanceOverflow)?;
        Ok(())
    }

    /// Removes funds if the balance covers them; otherwise leaves it untouched.
    pub fn withdraw(&mut self, amount: Amount) -> Result<(), DomainError> {
        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                Ok(())
            }
            None => Err(DomainError::InsufficientFunds {
                balance: self.balance,
                requested: amount.value(),
            }),
        }
    }
}
