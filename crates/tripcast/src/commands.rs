//! Tripcast command implementations

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use tripcast_agent::{DispatchLoop, OpenMeteoClient, ResponseEnvelope, TripForm};
use tripcast_config::{self, Config};
use tripcast_gateway::OriginPolicy;
use tripcast_provider::{OpenAiImageGenerator, OpenAiProvider};

use crate::PlanArgs;

/// Build the dispatch loop and its collaborators from configuration
fn build_planner(config: &Config) -> Result<DispatchLoop> {
    let api_key = config.api_key().context(
        "No API key configured. Set OPENAI_API_KEY or model.api_key in ~/.tripcast/config.json",
    )?;

    let provider = OpenAiProvider::new(
        api_key,
        config.model.api_base.clone(),
        Some(config.model.model.clone()),
    );
    let images = OpenAiImageGenerator::new(
        config.image_api_key().unwrap_or_default(),
        config.image_api_base(),
        config.image.model.clone(),
        config.image.size.clone(),
    );
    let weather =
        OpenMeteoClient::new(&config.weather).context("Failed to create weather client")?;

    Ok(DispatchLoop::with_config(
        Arc::new(provider),
        Arc::new(images),
        Arc::new(weather),
        config,
    ))
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("Initializing tripcast...");

    let config = tripcast_config::init().await?;

    println!("\nConfig: {}", tripcast_config::config_path().display());
    println!("\nNext steps:");
    if !config.has_api_key() {
        println!("  1. Add your OpenAI API key to ~/.tripcast/config.json");
        println!("     or export OPENAI_API_KEY");
    }
    println!(
        "  - Start the server: tripcast serve (allowed origins: {})",
        config.origin_allow_list().join(", ")
    );
    println!("  - Or try one trip: tripcast plan -d Paris -f NYC --depart 2025-06-01 --return 2025-06-08 -b 3000 -t 2");

    Ok(())
}

/// Start the HTTP server
pub async fn serve_command() -> Result<()> {
    let config = Config::load().await.context("Failed to load config")?;
    let planner = build_planner(&config)?;
    let origins = OriginPolicy::new(config.origin_allow_list());

    info!("Model: {}", config.model.model);
    tripcast_gateway::serve(&config.bind_address(), Arc::new(planner), origins)
        .await
        .with_context(|| format!("Server on {} stopped", config.bind_address()))?;

    Ok(())
}

/// Plan one trip and print the outward payload
pub async fn plan_command(args: PlanArgs) -> Result<()> {
    let form: TripForm = serde_json::from_value(json!({
        "destination": args.destination,
        "flyingFrom": args.from,
        "fromDate": args.depart,
        "toDate": args.return_date,
        "budget": args.budget,
        "travelers": args.travelers,
        "tripType": args.trip_type,
    }))?;
    let trip = form.validate()?;

    let config = Config::load().await.context("Failed to load config")?;
    let planner = build_planner(&config)?;

    let response = planner.answer(trip).await;
    let envelope = ResponseEnvelope::from(response);
    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(())
}

/// Show configuration status without secrets
pub async fn status_command() -> Result<()> {
    let config_path = tripcast_config::config_path();

    println!("Tripcast Status");
    println!("---------------");
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    println!("Model:     {}", config.model.model);
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Image:     {} ({})", config.image.model, config.image.size);
    println!("Weather:   {}", config.weather.forecast_url);
    println!("Rounds:    {} max", config.model.max_dispatch_rounds);
    println!("Listen:    {}", config.bind_address());
    println!("Origins:   {}", config.origin_allow_list().join(", "));

    Ok(())
}
