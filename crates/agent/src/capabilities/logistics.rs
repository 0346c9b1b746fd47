//! Flight and hotel planning

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use tripcast_provider::{ChatParams, Message, Provider, ResponseFormat, ToolChoice};

use super::ModelSettings;
use crate::plan::{LogisticsPlan, DIRECT};
use crate::schema::parse_json_output;
use crate::trip::TripRequest;
use crate::{AgentError, Result};

const SYSTEM_PROMPT: &str = "You are a travel logistics planner. You pick real airlines and \
real hotels and quote realistic prices in USD. You answer only with the requested JSON object.";

pub struct LogisticsPlanner {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
}

impl LogisticsPlanner {
    pub fn new(provider: Arc<dyn Provider>, settings: ModelSettings) -> Self {
        Self { provider, settings }
    }

    /// Ask the model for one structured plan; a single attempt
    #[instrument(skip(self, trip), fields(destination = %trip.destination))]
    pub async fn plan(&self, trip: &TripRequest) -> Result<LogisticsPlan> {
        let shape = LogisticsPlan::shape();
        let params = ChatParams {
            model: self.settings.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(task(trip))],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tool_choice: ToolChoice::None,
            response_format: Some(ResponseFormat::json_schema(
                "logistics_plan",
                shape.to_json_schema(),
            )),
            ..Default::default()
        };

        let response = self.provider.chat(params).await?;
        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AgentError::CapabilityFailure("model returned no plan".to_string()))?;
        debug!("Logistics output: {} bytes", content.len());

        let plan: LogisticsPlan = shape.decode(parse_json_output(&content)?)?;
        if let Err(violation) = plan.check_consistency(trip.budget) {
            warn!("Rejecting inconsistent plan: {}", violation);
            return Err(violation.into());
        }

        info!(
            "Planned {} + {} for {:.2}",
            plan.flight.airline, plan.hotel.name, plan.total_estimated_cost
        );
        Ok(plan)
    }
}

fn task(trip: &TripRequest) -> String {
    format!(
        r#"Plan a {trip_type} trip for {travelers} traveler(s) from {origin} to {destination}, departing {depart} and returning {ret} ({nights} nights). The total budget is ${budget:.0}.

Flight: choose exactly one round trip. Prefer a direct flight; otherwise choose the shortest layover, then the cheapest fare. Use "{direct}" as the layover when the flight is non-stop, otherwise the layover city name. totalPrice covers all travelers.

Hotel: choose exactly one hotel rated 4 or 5 stars. totalPrice covers every night for all travelers.

totalEstimatedCost is the flight totalPrice plus the hotel totalPrice. Set exceedsBudget to true only if totalEstimatedCost is greater than ${budget:.0}, and say in the conclusion whether the plan is within budget.

Suggest exactly 3 activities that suit a {trip_type} trip to {destination}."#,
        trip_type = trip.trip_type,
        travelers = trip.traveler_count,
        origin = trip.origin,
        destination = trip.destination,
        depart = trip.depart_date,
        ret = trip.return_date,
        nights = trip.nights(),
        budget = trip.budget,
        direct = DIRECT,
    )
}
