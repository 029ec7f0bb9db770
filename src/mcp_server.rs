// src/mcp_server.rs

use anyhow::Result;
use chrono::NaiveDate;
use rmcp::{
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use rust_itinerary::{PlanOutcome, PlannerConfig, TravelPlan, TravelPreferences, TripPlanner};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Itinerary planning MCP server
#[derive(Clone)]
pub struct ItineraryServer {
    config: Arc<PlannerConfig>,
}

impl ItineraryServer {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "rust-itinerary-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info"))
                    .add_directive("rust_itinerary=debug".parse()?)
                    .add_directive("reqwest=info".parse()?),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/rust-itinerary-mcp.log.*");
        Ok(())
    }
}

/// Trip planning parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct PlanTripParams {
    #[schemars(description = "Destination shown to the traveller (province, region or city), e.g. 山东")]
    pub destination: Option<String>,
    #[schemars(description = "City to plan in, e.g. 烟台市; used for local attraction lookups")]
    pub city: Option<String>,
    #[schemars(description = "Free-text interests, e.g. '历史 美食' or 'history and food'")]
    pub interests: Option<String>,
    #[schemars(description = "Budget in yuan, e.g. '3000'")]
    pub budget: Option<String>,
    #[schemars(description = "Number of days to plan (default: 1, at most 30)")]
    pub duration_days: Option<u32>,
    #[schemars(description = "Number of travellers (default: 2)")]
    pub group_size: Option<u32>,
    #[schemars(description = "Travel style, e.g. 休闲 (relaxed) or 紧凑 (packed)")]
    pub travel_style: Option<String>,
    #[schemars(description = "Start date in YYYY-MM-DD format (default: today)")]
    pub start_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanTripResult {
    /// "remote" or "fallback"
    pub source: &'static str,
    pub notice: Option<String>,
    pub plan: TravelPlan,
}

#[derive(Debug, Serialize)]
pub struct CityEntry {
    pub city: String,
    pub categories: Vec<String>,
    pub attractions: usize,
}

#[tool(tool_box)]
impl ItineraryServer {
    /// Plan a multi-day trip
    #[tool(description = "Plan a multi-day travel itinerary. Asks an AI provider first and falls back to bundled local attraction data when it is unavailable. Specify city or destination.")]
    async fn plan_trip(&self, #[tool(aggr)] params: PlanTripParams) -> String {
        plan_trip_json(&self.config, params).await
    }

    /// List cities covered by the local attraction table
    #[tool(description = "List the cities and attraction categories available for offline itinerary planning.")]
    async fn list_cities(&self) -> String {
        city_list_json(&self.config)
    }
}

async fn plan_trip_json(config: &PlannerConfig, params: PlanTripParams) -> String {
    info!(
        destination = params.destination.as_deref(),
        city = params.city.as_deref(),
        interests = params.interests.as_deref(),
        duration_days = params.duration_days.unwrap_or(1),
        group_size = params.group_size.unwrap_or(2),
        "Trip planning request received"
    );

    let prefs = match build_preferences(params) {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Invalid trip parameters: {}", e);
            return error_json(e);
        }
    };

    let planner = match TripPlanner::new(config.clone()) {
        Ok(planner) => planner,
        Err(e) => {
            error!("Error creating planner: {}", e);
            return error_json(format!("Error creating planner: {}", e));
        }
    };

    let outcome = planner.plan(&prefs).await;
    let source = outcome.source();
    let notice = outcome.notice();

    match outcome {
        PlanOutcome::Remote(plan) | PlanOutcome::Fallback { plan, .. } => {
            info!(
                source = source,
                days = plan.days.len(),
                total_cost = plan.total_cost,
                "Trip planning completed"
            );
            let result = PlanTripResult { source, notice, plan };
            serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| error_json(format!("Failed to serialize plan: {}", e)))
        }
        PlanOutcome::Failed(e) => {
            error!("Trip planning failed: {}", e);
            error_json(format!("Trip planning failed: {}", e))
        }
    }
}

fn city_list_json(config: &PlannerConfig) -> String {
    debug!("City list request received");
    match config.attractions.load() {
        Ok(table) => {
            let cities: Vec<CityEntry> = table
                .cities()
                .map(|city| CityEntry {
                    city: city.city.clone(),
                    categories: city.categories.iter().map(|c| c.category.clone()).collect(),
                    attractions: city.all_attractions().count(),
                })
                .collect();
            serde_json::to_string_pretty(&cities)
                .unwrap_or_else(|e| error_json(format!("Failed to serialize cities: {}", e)))
        }
        Err(e) => {
            error!("Error loading attraction table: {}", e);
            error_json(format!("Error loading attraction table: {}", e))
        }
    }
}

fn error_json(message: impl Into<String>) -> String {
    serde_json::json!({ "error": message.into() }).to_string()
}

fn build_preferences(params: PlanTripParams) -> Result<TravelPreferences, String> {
    let start_date = params
        .start_date
        .as_deref()
        .map(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| format!("Invalid start date: {}", e))?;

    let prefs = TravelPreferences {
        destination: params.destination.unwrap_or_default(),
        city: params.city.unwrap_or_default(),
        interests: params.interests.unwrap_or_default(),
        budget: params.budget,
        duration_days: params.duration_days,
        group_size: params.group_size,
        travel_style: params.travel_style,
        start_date,
    };

    if prefs.place().is_empty() {
        return Err("Must specify either city or destination".to_string());
    }
    Ok(prefs)
}

#[tool(tool_box)]
impl ServerHandler for ItineraryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A travel itinerary planning server. plan_trip returns JSON with the plan, whether it came from the AI provider or local fallback data, and a notice when the fallback was used. list_cities shows which cities the fallback covers.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging before anything else
    if let Err(e) = ItineraryServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting MCP Itinerary Server");

    let config = PlannerConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("ITINERARY_API_KEY not set, every plan will use local attraction data");
    }

    let server = ItineraryServer::new(config);
    let transport = stdio();

    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_itinerary::AttractionSource;

    fn params(city: Option<&str>, start_date: Option<&str>) -> PlanTripParams {
        PlanTripParams {
            destination: None,
            city: city.map(str::to_string),
            interests: Some("海鲜美食".to_string()),
            budget: None,
            duration_days: Some(2),
            group_size: None,
            travel_style: None,
            start_date: start_date.map(str::to_string),
        }
    }

    #[test]
    fn test_build_preferences() {
        let prefs = build_preferences(params(Some("烟台市"), Some("2025-05-01"))).unwrap();
        assert_eq!(prefs.place(), "烟台市");
        assert_eq!(prefs.start_date, NaiveDate::from_ymd_opt(2025, 5, 1));
        assert_eq!(prefs.duration(), 2);
    }

    #[test]
    fn test_build_preferences_rejects_bad_input() {
        assert!(build_preferences(params(None, None)).is_err());
        assert!(build_preferences(params(Some("烟台市"), Some("05/01/2025"))).is_err());
    }

    #[tokio::test]
    async fn test_plan_trip_without_key_falls_back() {
        let response = plan_trip_json(&PlannerConfig::default(), params(Some("烟台市"), Some("2025-05-01"))).await;
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["source"], "fallback");
        assert!(value["notice"].is_string());
        assert_eq!(value["plan"]["days"].as_array().unwrap().len(), 2);
        assert_eq!(value["plan"]["totalCost"], 320.0);
    }

    #[test]
    fn test_table_error_is_valid_json() {
        let config = PlannerConfig::default()
            .with_attractions(AttractionSource::File(PathBuf::from(r#"/no/such "dir"\a.json"#)));
        let response = city_list_json(&config);
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        let message = value["error"].as_str().unwrap();
        assert!(message.contains(r#"/no/such "dir"\a.json"#));
    }

    #[tokio::test]
    async fn test_failed_plan_is_valid_json() {
        let config = PlannerConfig::default()
            .with_attractions(AttractionSource::File(PathBuf::from(r#"/no/such "dir"/a.json"#)));
        let response = plan_trip_json(&config, params(Some("烟台市"), None)).await;
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert!(value["error"].as_str().unwrap().starts_with("Trip planning failed"));
    }

    #[test]
    fn test_list_cities() {
        let response = city_list_json(&PlannerConfig::default());
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert!(value
            .as_array()
            .unwrap()
            .iter()
            .any(|city| city["city"] == "烟台市"));
    }
}
