//! Trip parameters

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{FieldSpec, Shape};
use crate::AgentError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Validated trip parameters, immutable for the life of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub destination: String,
    pub origin: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub budget: f64,
    pub traveler_count: u32,
    pub trip_type: String,
}

impl TripRequest {
    /// Number of hotel nights between the two dates, never negative
    pub fn nights(&self) -> i64 {
        (self.return_date - self.depart_date).num_days().max(0)
    }

    /// Parameter shape used when the model passes a trip to a capability
    pub fn shape() -> Shape {
        Shape::new()
            .field(FieldSpec::string("destination", "Destination city"))
            .field(FieldSpec::string("origin", "Departure city"))
            .field(FieldSpec::string("departDate", "Outbound date, YYYY-MM-DD"))
            .field(FieldSpec::string("returnDate", "Return date, YYYY-MM-DD"))
            .field(FieldSpec::number("budget", "Total budget in USD").positive())
            .field(FieldSpec::integer("travelerCount", "Number of travelers").at_least(1))
            .field(FieldSpec::string("tripType", "Kind of trip, e.g. leisure or business"))
    }
}

/// Request body as submitted by the form
///
/// Every field is optional here so that missing ones can be reported
/// together instead of failing on the first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripForm {
    pub destination: Option<String>,
    pub flying_from: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub budget: Option<Value>,
    pub travelers: Option<Value>,
    pub trip_type: Option<String>,
}

impl TripForm {
    /// Check presence and format of every field
    pub fn validate(self) -> Result<TripRequest, AgentError> {
        let mut missing = Vec::new();

        let destination = text(self.destination, "destination", &mut missing);
        let origin = text(self.flying_from, "flyingFrom", &mut missing);
        let from_date = text(self.from_date, "fromDate", &mut missing);
        let to_date = text(self.to_date, "toDate", &mut missing);
        let trip_type = text(self.trip_type, "tripType", &mut missing);
        if self.budget.as_ref().map_or(true, is_blank) {
            missing.push("budget");
        }
        if self.travelers.as_ref().map_or(true, is_blank) {
            missing.push("travelers");
        }

        if !missing.is_empty() {
            return Err(AgentError::InvalidRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let depart_date = parse_date(&from_date, "fromDate")?;
        let return_date = parse_date(&to_date, "toDate")?;
        if return_date < depart_date {
            return Err(AgentError::InvalidRequest(
                "toDate must not be before fromDate".to_string(),
            ));
        }

        let budget = self
            .budget
            .as_ref()
            .and_then(as_number)
            .filter(|b| b.is_finite() && *b > 0.0)
            .ok_or_else(|| {
                AgentError::InvalidRequest("budget must be a positive number".to_string())
            })?;

        let traveler_count = self
            .travelers
            .as_ref()
            .and_then(as_number)
            .filter(|t| t.fract() == 0.0 && *t >= 1.0 && *t <= u32::MAX as f64)
            .map(|t| t as u32)
            .ok_or_else(|| {
                AgentError::InvalidRequest("travelers must be a whole number of at least 1".to_string())
            })?;

        Ok(TripRequest {
            destination,
            origin,
            depart_date,
            return_date,
            budget,
            traveler_count,
            trip_type,
        })
    }
}

fn text(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            missing.push(field);
            String::new()
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// Form inputs often arrive as strings
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AgentError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        AgentError::InvalidRequest(format!("{} must be a date in YYYY-MM-DD form", field))
    })
}
