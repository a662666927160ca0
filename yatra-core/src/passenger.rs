use serde::{Deserialize, Serialize};
use std::fmt;
use yatra_shared::Masked;

use crate::schedule::ScheduleSelection;

/// Contact details of the lead passenger. Phone and email stay masked in logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub phone: Masked<String>,
    pub email: Masked<String>,
    #[serde(default)]
    pub pickup_point: Option<String>,
    #[serde(default)]
    pub drop_point: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerField {
    Name,
    Phone,
    Email,
}

impl fmt::Display for PassengerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassengerField::Name => write!(f, "name"),
            PassengerField::Phone => write!(f, "phone"),
            PassengerField::Email => write!(f, "email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: PassengerField,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl PassengerDetails {
    pub fn new(name: &str, phone: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            phone: Masked::from(phone),
            email: Masked::from(email),
            ..Default::default()
        }
    }

    /// Check the three required fields. Every problem is reported, not just the first.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError {
                field: PassengerField::Name,
                message: "full name is required".to_string(),
            });
        }
        if self.phone.is_blank() {
            errors.push(FieldError {
                field: PassengerField::Phone,
                message: "phone number is required".to_string(),
            });
        }
        if self.email.is_blank() {
            errors.push(FieldError {
                field: PassengerField::Email,
                message: "email address is required".to_string(),
            });
        } else if !is_plausible_email(self.email.expose()) {
            errors.push(FieldError {
                field: PassengerField::Email,
                message: "email address looks invalid".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn resolved_pickup(&self, schedule: &ScheduleSelection) -> String {
        non_blank(&self.pickup_point).unwrap_or_else(|| schedule.origin.clone())
    }

    pub fn resolved_drop(&self, schedule: &ScheduleSelection) -> String {
        non_blank(&self.drop_point).unwrap_or_else(|| schedule.destination.clone())
    }

    pub fn special_requests_or_empty(&self) -> String {
        non_blank(&self.special_requests).unwrap_or_default()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Loose check: one `@`, something before it, and a dotted domain after it.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
