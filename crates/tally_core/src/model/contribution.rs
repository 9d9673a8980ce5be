//! Contribution domain model.
//!
//! # Responsibility
//! - Define the single ledger record (`Contribution`) and its wire shape.
//! - Normalize and validate raw presentation input before it becomes a record.
//!
//! # Invariants
//! - `id` is stable and never reused for another contribution.
//! - `name` is trimmed and non-empty.
//! - `amount` is finite and non-negative.
//! - `date` is a real calendar day in `YYYY-MM-DD` form, so string order
//!   equals chronological order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid iso date regex"));

/// Stable identifier of one contribution.
pub type ContributionId = Uuid;

/// Validation failures for contribution input and persisted records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionValidationError {
    /// Name is empty after trimming.
    EmptyName,
    /// Stored name carries surrounding whitespace.
    UntrimmedName(String),
    /// Amount text is not a finite number.
    InvalidAmount(String),
    /// Amount parsed but is below zero.
    NegativeAmount,
    /// Date is not a real `YYYY-MM-DD` calendar day.
    InvalidDate(String),
    /// Nil UUID cannot identify a record.
    NilId,
}

impl Display for ContributionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::UntrimmedName(value) => {
                write!(f, "name `{value}` has surrounding whitespace")
            }
            Self::InvalidAmount(value) => write!(f, "amount `{value}` is not a valid number"),
            Self::NegativeAmount => write!(f, "amount must not be negative"),
            Self::InvalidDate(value) => {
                write!(f, "date `{value}` is not a valid YYYY-MM-DD calendar day")
            }
            Self::NilId => write!(f, "contribution id must not be nil"),
        }
    }
}

impl Error for ContributionValidationError {}

/// One named monetary contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub name: String,
    /// Full-precision amount; rounding happens only in derived totals.
    pub amount: f64,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
}

/// Validated field values shared by create and update paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ContributionFields {
    pub name: String,
    pub amount: f64,
    pub date: String,
}

impl ContributionFields {
    /// Parses raw presentation input into validated fields.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is blank.
    /// - `InvalidAmount` / `NegativeAmount` when `amount` is not a
    ///   non-negative finite number.
    /// - `InvalidDate` when `date` is not a real calendar day.
    pub fn parse(name: &str, amount: &str, date: &str) -> Result<Self, ContributionValidationError> {
        Ok(Self {
            name: normalize_name(name)?,
            amount: parse_amount(amount)?,
            date: normalize_date(date)?,
        })
    }
}

impl Contribution {
    /// Creates a contribution with a freshly generated id.
    pub fn new(fields: ContributionFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            amount: fields.amount,
            date: fields.date,
        }
    }

    /// Replaces every field except `id`.
    pub fn apply(&mut self, fields: ContributionFields) {
        self.name = fields.name;
        self.amount = fields.amount;
        self.date = fields.date;
    }

    /// Checks record invariants.
    ///
    /// Used on read paths, where records arrive without going through
    /// `ContributionFields::parse`.
    pub fn validate(&self) -> Result<(), ContributionValidationError> {
        if self.id.is_nil() {
            return Err(ContributionValidationError::NilId);
        }
        if normalize_name(&self.name)? != self.name {
            return Err(ContributionValidationError::UntrimmedName(self.name.clone()));
        }
        check_amount(self.amount, || self.amount.to_string())?;
        // Padded dates would break lexicographic ordering.
        if normalize_date(&self.date)? != self.date {
            return Err(ContributionValidationError::InvalidDate(self.date.clone()));
        }
        Ok(())
    }
}

/// Trims and checks a contributor name.
pub fn normalize_name(raw: &str) -> Result<String, ContributionValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ContributionValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Parses amount text as a non-negative finite decimal.
pub fn parse_amount(raw: &str) -> Result<f64, ContributionValidationError> {
    let trimmed = raw.trim();
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| ContributionValidationError::InvalidAmount(trimmed.to_string()))?;
    check_amount(value, || trimmed.to_string())?;
    // Folds `-0` into `0`.
    Ok(value + 0.0)
}

/// Checks a calendar date in `YYYY-MM-DD` form and returns it trimmed.
pub fn normalize_date(raw: &str) -> Result<String, ContributionValidationError> {
    let trimmed = raw.trim();
    let invalid = || ContributionValidationError::InvalidDate(trimmed.to_string());
    let captures = ISO_DATE_RE.captures(trimmed).ok_or_else(invalid)?;

    let year: u32 = captures[1].parse().map_err(|_| invalid())?;
    let month: u32 = captures[2].parse().map_err(|_| invalid())?;
    let day: u32 = captures[3].parse().map_err(|_| invalid())?;

    if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

fn check_amount(
    value: f64,
    display: impl FnOnce() -> String,
) -> Result<(), ContributionValidationError> {
    if !value.is_finite() {
        return Err(ContributionValidationError::InvalidAmount(display()));
    }
    if value < 0.0 {
        return Err(ContributionValidationError::NegativeAmount);
    }
    Ok(())
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
