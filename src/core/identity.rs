//! Entity identity: name-derived risk ids and pattern-constrained control and use-case codes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix of every name-derived risk id
pub const RISK_ID_PREFIX: &str = "RISK-";

/// Highest sequence number a control prefix can hold
pub const MAX_CONTROL_SEQ: u8 = 99;

/// Identifier of a risk
///
/// Risk ids read from a keyed sheet are taken as written; ids minted by
/// this crate always come from [`generate_risk_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RiskId(String);

impl RiskId {
    /// Derive the id for a risk name
    pub fn from_name(name: &str) -> Result<Self, IdError> {
        generate_risk_id(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RiskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(RiskId(trimmed.to_string()))
    }
}

/// Derive a stable risk id from a human-readable name
///
/// The name is trimmed, stripped of everything but ASCII letters, digits and
/// whitespace, whitespace runs become single hyphens, and the result is
/// uppercased and prefixed with `RISK-`.
pub fn generate_risk_id(name: &str) -> Result<RiskId, IdError> {
    let cleaned: String = name
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase();

    if slug.is_empty() {
        return Err(IdError::EmptyName(name.to_string()));
    }

    Ok(RiskId(format!("{}{}", RISK_ID_PREFIX, slug)))
}

/// Control id families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlPrefix {
    /// Accuracy & judgment
    Acc,
    /// Security & data privacy
    Sec,
    /// Audit & traceability (logging)
    Log,
    /// Governance & compliance
    Gov,
    /// Testing
    Test,
}

impl ControlPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlPrefix::Acc => "ACC",
            ControlPrefix::Sec => "SEC",
            ControlPrefix::Log => "LOG",
            ControlPrefix::Gov => "GOV",
            ControlPrefix::Test => "TEST",
        }
    }

    pub fn all() -> &'static [ControlPrefix] {
        &[
            ControlPrefix::Acc,
            ControlPrefix::Sec,
            ControlPrefix::Log,
            ControlPrefix::Gov,
            ControlPrefix::Test,
        ]
    }
}

impl fmt::Display for ControlPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlPrefix {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACC" => Ok(ControlPrefix::Acc),
            "SEC" => Ok(ControlPrefix::Sec),
            "LOG" => Ok(ControlPrefix::Log),
            "GOV" => Ok(ControlPrefix::Gov),
            "TEST" => Ok(ControlPrefix::Test),
            _ => Err(IdError::UnknownControlPrefix(s.to_string())),
        }
    }
}

/// Control (mitigation) id of the form `PREFIX-NN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId {
    prefix: ControlPrefix,
    seq: u8,
}

impl ControlId {
    pub fn new(prefix: ControlPrefix, seq: u8) -> Result<Self, IdError> {
        if seq > MAX_CONTROL_SEQ {
            return Err(IdError::Exhausted(prefix));
        }
        Ok(Self { prefix, seq })
    }

    pub fn prefix(&self) -> ControlPrefix {
        self.prefix
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.prefix, self.seq)
    }
}

impl FromStr for ControlId {
    type Err = IdError;

    /// Strict parse: uppercase prefix, a hyphen and exactly two digits
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidControlId(s.to_string());
        let (prefix, digits) = s.split_once('-').ok_or_else(invalid)?;

        if prefix != prefix.to_uppercase() {
            return Err(invalid());
        }
        let prefix: ControlPrefix = prefix.parse().map_err(|_| invalid())?;

        if digits.len() != 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let seq: u8 = digits.parse().map_err(|_| invalid())?;

        Ok(Self { prefix, seq })
    }
}

/// True when `id` matches `(ACC|SEC|LOG|GOV|TEST)-NN`
pub fn is_valid_control_id(id: &str) -> bool {
    id.parse::<ControlId>().is_ok()
}

/// Next free control id under `prefix`: highest existing number plus one
pub fn generate_control_id<'a, I>(prefix: ControlPrefix, existing: I) -> Result<ControlId, IdError>
where
    I: IntoIterator<Item = &'a ControlId>,
{
    let max = existing
        .into_iter()
        .filter(|id| id.prefix == prefix)
        .map(|id| id.seq)
        .max()
        .unwrap_or(0);

    if max >= MAX_CONTROL_SEQ {
        return Err(IdError::Exhausted(prefix));
    }
    ControlId::new(prefix, max + 1)
}

/// Use-case id of the form `UC-###`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UseCaseId(u16);

impl UseCaseId {
    pub const PREFIX: &'static str = "UC-";

    pub fn new(number: u16) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for UseCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", Self::PREFIX, self.0)
    }
}

impl FromStr for UseCaseId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidUseCaseId(s.to_string());
        let digits = s.strip_prefix(Self::PREFIX).ok_or_else(invalid)?;
        if digits.len() < 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let id = digits.parse().map(UseCaseId).map_err(|_| invalid())?;
        // Only the form Display writes back is accepted
        if id.to_string() != s {
            return Err(invalid());
        }
        Ok(id)
    }
}

/// Next use-case id: highest existing number plus one
pub fn generate_use_case_id<'a, I>(existing: I) -> Result<UseCaseId, IdError>
where
    I: IntoIterator<Item = &'a UseCaseId>,
{
    let max = existing.into_iter().map(|id| id.0).max().unwrap_or(0);
    max.checked_add(1)
        .map(UseCaseId)
        .ok_or(IdError::UseCasesExhausted)
}

/// Errors that can occur when parsing or generating ids
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("id must not be empty")]
    Empty,

    #[error("risk name '{0}' must contain at least one alphanumeric character")]
    EmptyName(String),

    #[error("control id '{0}' must match pattern: ACC-01, SEC-02, LOG-03, GOV-04, TEST-99")]
    InvalidControlId(String),

    #[error("invalid control category '{0}', must be one of: ACC, SEC, LOG, GOV, TEST")]
    UnknownControlPrefix(String),

    #[error("no more available ids for control category {0}")]
    Exhausted(ControlPrefix),

    #[error("use case id '{0}' must match pattern UC-###")]
    InvalidUseCaseId(String),

    #[error("no more available use case ids")]
    UseCasesExhausted,
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(RiskId);
string_serde!(ControlId);
string_serde!(UseCaseId);
