//! Structural validation of raw telemetry bodies.

use serde::Serialize;
use serde_json::Value;

use crate::model::{BinId, Submission};

/// Wire name of the bin identifier.
pub const FIELD_BIN_ID: &str = "Bin_Id";
/// Wire name of the sensor distance.
pub const FIELD_DISTANCE: &str = "Distance";
/// Wire name of the device token.
pub const FIELD_TOKEN: &str = "Token";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{field}: {message}")]
/// A single rejected field of a submission.
pub struct FieldError {
    /// Wire name of the field.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{}", joined(.0))]
#[serde(transparent)]
/// All field errors of a rejected submission, in field order.
pub struct ValidationErrors(pub Vec<FieldError>);

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check the shape of a raw submission body.
///
/// Every field is checked, so a body with several problems reports all of
/// them. Anything that is not a JSON object fails on every field.
///
/// # Errors
///
/// Returns [`ValidationErrors`] listing one entry per failing field.
pub fn validate_submission(body: &Value) -> Result<Submission, ValidationErrors> {
    let mut errors = Vec::new();

    let bin_id = string_field(body, FIELD_BIN_ID, &mut errors);
    let distance = distance_field(body, &mut errors);
    let token = string_field(body, FIELD_TOKEN, &mut errors);

    match (bin_id, distance, token) {
        (Some(bin_id), Some(distance), Some(token)) if errors.is_empty() => Ok(Submission {
            bin_id: BinId(bin_id),
            distance,
            token,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

fn string_field(body: &Value, field: &'static str, errors: &mut Vec<FieldError>) -> Option<String> {
    if let Some(Value::String(text)) = body.get(field) {
        return Some(text.clone());
    }
    errors.push(FieldError {
        field,
        message: format!("{field} should be a string"),
    });
    None
}

fn distance_field(body: &Value, errors: &mut Vec<FieldError>) -> Option<f64> {
    // Older firmware sends the reading as a decimal string.
    let parsed = match body.get(FIELD_DISTANCE) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.parse::<f64>().ok(),
        _ => None,
    };

    let message = match parsed {
        Some(distance) if distance.is_finite() && distance >= 0.0 => return Some(distance),
        Some(distance) if distance.is_finite() => format!("{FIELD_DISTANCE} should not be negative"),
        _ => format!("{FIELD_DISTANCE} should be a valid float"),
    };
    errors.push(FieldError {
        field: FIELD_DISTANCE,
        message,
    });
    None
}
