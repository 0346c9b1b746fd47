//! Capability output models and their declared shapes

use serde::{Deserialize, Serialize};

use crate::schema::{Constraint, FieldSpec, SchemaViolation, Shape};

/// Sentinel the model uses for a non-stop flight
pub const DIRECT: &str = "direct";

/// Allowed gap between the stated total and the sum of the two prices
const COST_TOLERANCE: f64 = 1.0;

/// Words allowed in a weather description
pub const DESCRIPTION_MAX_WORDS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layover {
    Direct,
    Via(String),
}

impl From<String> for Layover {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case(DIRECT) {
            Layover::Direct
        } else {
            Layover::Via(value.trim().to_string())
        }
    }
}

impl Serialize for Layover {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Layover::Direct => serializer.serialize_str(DIRECT),
            Layover::Via(place) => serializer.serialize_str(place),
        }
    }
}

impl<'de> Deserialize<'de> for Layover {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Layover::from)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightPlan {
    pub airline: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub layover: Layover,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelPlan {
    pub name: String,
    pub star_rating: u8,
    pub room_type: String,
    pub total_price: f64,
    pub location: String,
}

/// One flight, one hotel and three things to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsPlan {
    pub flight: FlightPlan,
    pub hotel: HotelPlan,
    pub flight_recommendation: String,
    pub hotel_recommendation: String,
    pub total_estimated_cost: f64,
    pub exceeds_budget: bool,
    pub conclusion: String,
    pub activities: Vec<String>,
}

impl LogisticsPlan {
    pub fn shape() -> Shape {
        let flight = Shape::new()
            .field(FieldSpec::string("airline", "Operating airline"))
            .field(FieldSpec::string("departureTime", "Local departure date and time"))
            .field(FieldSpec::string("arrivalTime", "Local arrival date and time"))
            .field(FieldSpec::place("layover", "Layover city", DIRECT))
            .field(FieldSpec::number("totalPrice", "Round-trip price for all travelers in USD").positive());

        let hotel = Shape::new()
            .field(FieldSpec::string("name", "Hotel name"))
            .field(FieldSpec::integer("starRating", "Star rating").one_of(&[4, 5]))
            .field(FieldSpec::string("roomType", "Room type booked"))
            .field(FieldSpec::number("totalPrice", "Price for the whole stay in USD").positive())
            .field(FieldSpec::string("location", "Neighbourhood or address"));

        Shape::new()
            .field(FieldSpec::object("flight", "The chosen flight", flight))
            .field(FieldSpec::object("hotel", "The chosen hotel", hotel))
            .field(FieldSpec::string("flightRecommendation", "Why this flight was chosen"))
            .field(FieldSpec::string("hotelRecommendation", "Why this hotel was chosen"))
            .field(
                FieldSpec::number("totalEstimatedCost", "Flight price plus hotel price in USD")
                    .positive(),
            )
            .field(FieldSpec::boolean(
                "exceedsBudget",
                "Whether totalEstimatedCost is greater than the budget",
            ))
            .field(FieldSpec::string(
                "conclusion",
                "Closing note stating whether the plan fits the budget",
            ))
            .field(
                FieldSpec::string_list("activities", "Activities suited to the trip type")
                    .exact_len(3),
            )
    }

    /// Cross-field checks the shape alone can't express
    pub fn check_consistency(&self, budget: f64) -> Result<(), SchemaViolation> {
        let sum = self.flight.total_price + self.hotel.total_price;
        if (self.total_estimated_cost - sum).abs() > COST_TOLERANCE {
            return Err(SchemaViolation::new(
                "totalEstimatedCost",
                Constraint::Inconsistent {
                    detail: format!(
                        "{:.2} does not equal flight plus hotel ({:.2})",
                        self.total_estimated_cost, sum
                    ),
                },
            ));
        }

        let over = self.total_estimated_cost > budget;
        if self.exceeds_budget != over {
            return Err(SchemaViolation::new(
                "exceedsBudget",
                Constraint::Inconsistent {
                    detail: format!(
                        "is {} but total {:.2} against budget {:.2}",
                        self.exceeds_budget, self.total_estimated_cost, budget
                    ),
                },
            ));
        }

        Ok(())
    }
}

/// Model-written description of current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub description: String,
    pub temperature: String,
    pub conditions: String,
}

impl WeatherSummary {
    pub fn shape() -> Shape {
        Shape::new()
            .field(
                FieldSpec::string("description", "About 30 words on the weather right now")
                    .max_words(DESCRIPTION_MAX_WORDS),
            )
            .field(FieldSpec::string("temperature", "Temperature label, e.g. 21°C"))
            .field(FieldSpec::string("conditions", "Short conditions label, e.g. Partly cloudy"))
    }
}

/// Whatever parts of the weather capability succeeded
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeatherReport {
    pub summary: Option<WeatherSummary>,
    pub image_url: Option<String>,
    pub summary_error: Option<String>,
}
