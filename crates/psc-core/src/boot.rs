//! Boot request validation.
//!
//! The web layer submits loosely-typed form data; every invalid field is
//! collected and reported together, not just the first one found.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Parameters for booting a dummy session on the process manager. All four
/// fields are required; there are no partial defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootRequest {
    pub session_name: String,
    pub n_processes: u32,
    pub sleep: u32,
    pub n_sleeps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFault {
    Missing,
    NotAString,
    NotAnInteger,
}

impl FieldFault {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFault::Missing => "is missing",
            FieldFault::NotAString => "must be a string",
            FieldFault::NotAnInteger => "must be a non-negative integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub fault: FieldFault,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.fault.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("boot request rejected: {}", list_fields(.fields))]
pub struct BootValidationError {
    pub fields: Vec<FieldError>,
}

fn list_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BootRequest {
    /// Validates raw form data into a boot request, collecting a
    /// [`FieldError`] for every field that is missing or mistyped.
    pub fn from_form(form: &Map<String, Value>) -> Result<Self, BootValidationError> {
        let mut fields = Vec::new();
        let session_name = take_string(form, "session_name", &mut fields);
        let n_processes = take_integer(form, "n_processes", &mut fields);
        let sleep = take_integer(form, "sleep", &mut fields);
        let n_sleeps = take_integer(form, "n_sleeps", &mut fields);

        match (session_name, n_processes, sleep, n_sleeps) {
            (Some(session_name), Some(n_processes), Some(sleep), Some(n_sleeps)) => {
                Ok(Self {
                    session_name,
                    n_processes,
                    sleep,
                    n_sleeps,
                })
            }
            _ => Err(BootValidationError { fields }),
        }
    }
}

fn take_string(form: &Map<String, Value>, field: &'static str, errors: &mut Vec<FieldError>) -> Option<String> {
    match form.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError {
                field,
                fault: FieldFault::Missing,
            });
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            errors.push(FieldError {
                field,
                fault: FieldFault::NotAString,
            });
            None
        }
    }
}

fn take_integer(form: &Map<String, Value>, field: &'static str, errors: &mut Vec<FieldError>) -> Option<u32> {
    match form.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldError {
                field,
                fault: FieldFault::Missing,
            });
            None
        }
        Some(Value::Number(value)) => match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(value) => Some(value),
            None => {
                errors.push(FieldError {
                    field,
                    fault: FieldFault::NotAnInteger,
                });
                None
            }
        },
        Some(_) => {
            errors.push(FieldError {
                field,
                fault: FieldFault::NotAnInteger,
            });
            None
        }
    }
}
