//! Field validation shared by the services.
//!
//! Rules append messages keyed by field name; a request is rejected when any
//! field collected at least one message.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use ts_rs::TS;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// The value must be present and not blank.
    pub fn required(&mut self, field: &str, value: Option<&str>) -> bool {
        match value {
            Some(v) if !v.trim().is_empty() => true,
            _ => {
                self.add(field, format!("The {} field is required.", label(field)));
                false
            }
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.add(
                    field,
                    format!(
                        "The {} field must not be greater than {} characters.",
                        label(field),
                        max
                    ),
                );
            }
        }
    }

    pub fn min_len(&mut self, field: &str, value: Option<&str>, min: usize) {
        if let Some(v) = value {
            if v.chars().count() < min {
                self.add(
                    field,
                    format!("The {} field must be at least {} characters.", label(field), min),
                );
            }
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = value {
            if !is_valid_email(v) {
                self.add(
                    field,
                    format!("The {} field must be a valid email address.", label(field)),
                );
            }
        }
    }

    /// `value` must equal its `<field>_confirmation` companion.
    pub fn confirmed(&mut self, field: &str, value: Option<&str>, confirmation: Option<&str>) {
        if value.is_some() && value != confirmation {
            self.add(
                field,
                format!("The {} field confirmation does not match.", label(field)),
            );
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let first = self
            .errors
            .values()
            .flat_map(|messages| messages.iter())
            .next();
        match first {
            Some(message) => write!(f, "{}", message),
            None => write!(f, "validation failed"),
        }
    }
}

impl std::error::Error for ValidationErrors {}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}
