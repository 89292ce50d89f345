//! Local input checks. Everything here runs before any remote call.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{ValidationError, MIN_PASSWORD_LEN};
use crate::stats;

/// Parses a user-typed number, accepting a decimal comma.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

pub fn project_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

pub fn budget(raw: &str) -> Result<Decimal, ValidationError> {
    let value = parse_decimal(raw).ok_or_else(|| ValidationError::InvalidBudget(raw.trim().into()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::NegativeBudget);
    }
    if !stats::is_money(value) {
        return Err(ValidationError::BudgetOutOfRange);
    }
    Ok(value)
}

pub fn amount(raw: &str) -> Result<Decimal, ValidationError> {
    let value = parse_decimal(raw).ok_or_else(|| ValidationError::InvalidAmount(raw.trim().into()))?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    if !stats::is_money(value) {
        return Err(ValidationError::AmountOutOfRange);
    }
    Ok(value)
}

pub fn description(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok(text.to_string())
}

/// Trimmed text, or `None` when nothing but whitespace was entered.
pub fn optional_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub fn email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidEmail(email.into()));
    }
    Ok(email.to_string())
}

pub fn password(raw: &str) -> Result<(), ValidationError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

pub fn new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    self::password(password)
}
