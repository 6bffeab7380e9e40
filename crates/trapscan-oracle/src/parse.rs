//! Oracle response parsing
//!
//! Oracle CLIs wrap their JSON in prose or markdown fences often enough that
//! extraction has to be tolerant; the parse itself is strict. Anything that
//! fails to produce a valid observation is `OracleError::Malformed`, which
//! the aggregation layer treats as a dropped pass.

use serde_json::Value;

use trapscan_types::OracleError;

use crate::{Location, OracleObservation};

/// Extract JSON from a response that may be wrapped in markdown code blocks
pub fn extract_json_from_response(response: &str) -> String {
    let response = response.trim();

    if response.starts_with("```json") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').unwrap_or(7) + 1;
            if start < end {
                return response[start..end].trim().to_string();
            }
        }
    }

    if response.starts_with("```") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').unwrap_or(3) + 1;
            if start < end {
                return response[start..end].trim().to_string();
            }
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if start < end {
                return response[start..=end].to_string();
            }
        }
    }

    response.to_string()
}

/// Parse a raw oracle response into an observation.
///
/// Out-of-range fields are rejected, never clamped: a negative or fractional
/// count, a confidence outside [0, 1], or a location off the unit square all
/// make the pass malformed.
pub fn parse_observation(response: &str) -> Result<OracleObservation, OracleError> {
    let json_str = extract_json_from_response(response);
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| OracleError::Malformed(format!("invalid JSON: {e}")))?;

    let raw_count = value
        .get("count")
        .or_else(|| value.get("rawCount"))
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            OracleError::Malformed("missing or non-integer \"count\" field".to_string())
        })?;
    let raw_count = u32::try_from(raw_count)
        .map_err(|_| OracleError::Malformed(format!("count {raw_count} out of range")))?;

    let confidence = match value.get("confidence") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let c = v.as_f64().ok_or_else(|| {
                OracleError::Malformed("non-numeric \"confidence\" field".to_string())
            })?;
            if !(0.0..=1.0).contains(&c) {
                return Err(OracleError::Malformed(format!(
                    "confidence {c} outside [0, 1]"
                )));
            }
            Some(c)
        }
    };

    let locations = match value.get("locations") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut locations = Vec::with_capacity(items.len());
            for item in items {
                let x = item.get("x").and_then(Value::as_f64);
                let y = item.get("y").and_then(Value::as_f64);
                let (Some(x), Some(y)) = (x, y) else {
                    return Err(OracleError::Malformed(
                        "location entry missing x/y".to_string(),
                    ));
                };
                if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                    return Err(OracleError::Malformed(format!(
                        "location ({x}, {y}) outside unit square"
                    )));
                }
                locations.push(Location { x, y });
            }
            locations
        }
        Some(_) => {
            return Err(OracleError::Malformed(
                "\"locations\" is not an array".to_string(),
            ))
        }
    };

    Ok(OracleObservation {
        raw_count,
        locations,
        confidence,
    })
}
