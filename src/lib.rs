//! # Rust Itinerary Library
//!
//! Turns a traveller's preferences into a multi-day itinerary. A chat-completion
//! provider is asked for a JSON plan first; when that call fails the plan is
//! assembled locally from a bundled per-city attraction table.

pub mod attractions;
pub mod client;
pub mod config;
pub mod fallback;
pub mod fence;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use thiserror::Error;
use tracing::{info, instrument, warn};

// Re-export main types for convenience
pub use attractions::{AttractionRecord, AttractionSource, AttractionTable, InterestCategory};
pub use client::{ItineraryClient, ItineraryResponseParser};
pub use config::{ChatProvider, PlannerConfig};
pub use fallback::generate_fallback_plan;

/// Group size used when the traveller leaves it blank
pub const DEFAULT_GROUP_SIZE: &str = "2";

/// Longest trip that will be planned; longer requests are clamped
pub const MAX_DAYS: u32 = 30;

/// Error types for the itinerary library
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Chat completion request failed with status: {status}")]
    RequestFailed { status: reqwest::StatusCode },

    #[error("Chat completion returned no content")]
    EmptyResponse,

    #[error("No API key configured for provider: {0}")]
    MissingApiKey(String),

    #[error("Completion is not a valid travel plan: {0}")]
    MalformedCompletion(String),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Attraction table error: {0}")]
    AttractionTableError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What the traveller asked for. Every field is optional in practice; blanks
/// fall back to defaults instead of being rejected.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TravelPreferences {
    pub destination: String,
    pub city: String,
    /// Free text, matched against interest keywords by substring
    pub interests: String,
    /// Budget as entered, e.g. "3000"
    pub budget: Option<String>,
    /// Form fields arrive as strings such as "2"; unparseable values count as unset
    #[serde(alias = "duration")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub duration_days: Option<u32>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub group_size: Option<u32>,
    pub travel_style: Option<String>,
    pub start_date: Option<NaiveDate>,
}

impl TravelPreferences {
    /// City used for attraction lookups: the city, else the destination
    pub fn place(&self) -> &str {
        if self.city.trim().is_empty() {
            self.destination.trim()
        } else {
            self.city.trim()
        }
    }

    /// Destination shown to the traveller: the destination, else the city
    pub fn destination_label(&self) -> &str {
        if self.destination.trim().is_empty() {
            self.city.trim()
        } else {
            self.destination.trim()
        }
    }

    /// Number of days to plan, between one and `MAX_DAYS`
    pub fn duration(&self) -> u32 {
        self.duration_days.unwrap_or(1).clamp(1, MAX_DAYS)
    }

    pub fn group_size_label(&self) -> String {
        match self.group_size {
            Some(size) if size > 0 => size.to_string(),
            _ => DEFAULT_GROUP_SIZE.to_string(),
        }
    }

    pub fn resolved_start_date(&self) -> NaiveDate {
        self.start_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// A single scheduled stop within a day
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// Time range such as "09:00-12:00"
    #[serde(default)]
    pub time: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub transportation: String,
}

/// One day of the itinerary; activities are in chronological order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// Complete multi-day itinerary returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelPlan {
    pub days: Vec<DayPlan>,
    pub total_cost: f64,
    pub recommended_group_size: String,
    pub start_date: String,
}

impl TravelPlan {
    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|day| day.activities.len()).sum()
    }

    /// Sum of every activity cost in the plan
    pub fn computed_total(&self) -> f64 {
        self.days
            .iter()
            .flat_map(|day| day.activities.iter())
            .map(|activity| activity.cost)
            .sum()
    }
}

/// Which path produced the plan
#[derive(Debug)]
pub enum PlanOutcome {
    /// The provider answered; the plan came from its completion (possibly degraded)
    Remote(TravelPlan),
    /// The provider call failed and the plan was built from local data
    Fallback { plan: TravelPlan, reason: PlannerError },
    /// Neither path produced a plan
    Failed(PlannerError),
}

impl PlanOutcome {
    pub fn plan(&self) -> Option<&TravelPlan> {
        match self {
            PlanOutcome::Remote(plan) | PlanOutcome::Fallback { plan, .. } => Some(plan),
            PlanOutcome::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<TravelPlan, PlannerError> {
        match self {
            PlanOutcome::Remote(plan) | PlanOutcome::Fallback { plan, .. } => Ok(plan),
            PlanOutcome::Failed(e) => Err(e),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, PlanOutcome::Remote(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback { .. })
    }

    pub fn source(&self) -> &'static str {
        match self {
            PlanOutcome::Remote(_) => "remote",
            PlanOutcome::Fallback { .. } => "fallback",
            PlanOutcome::Failed(_) => "failed",
        }
    }

    /// Message for the traveller: a soft warning on fallback, an error on failure
    pub fn notice(&self) -> Option<String> {
        match self {
            PlanOutcome::Remote(_) => None,
            PlanOutcome::Fallback { .. } => {
                Some("AI行程服务暂时不可用，已根据本地景点数据为您生成推荐行程".to_string())
            }
            PlanOutcome::Failed(e) => Some(format!("行程生成失败: {}", e)),
        }
    }
}

/// Runs one planning request: remote first, local table on failure
pub struct TripPlanner {
    client: ItineraryClient,
    attractions: AttractionSource,
}

impl TripPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let attractions = config.attractions.clone();
        let client = ItineraryClient::new(config)?;
        Ok(Self { client, attractions })
    }

    #[instrument(level = "info", skip(self, prefs), fields(place = %prefs.place(), days = prefs.duration()))]
    pub async fn plan(&self, prefs: &TravelPreferences) -> PlanOutcome {
        let start_date = prefs.resolved_start_date();

        match self.client.request_itinerary(prefs, start_date).await {
            Ok(raw) => {
                let plan = ItineraryResponseParser::new().normalize(&raw, prefs, start_date);
                info!(days = plan.days.len(), total_cost = plan.total_cost, "Remote itinerary ready");
                PlanOutcome::Remote(plan)
            }
            Err(reason) => {
                warn!(error = %reason, "Remote itinerary failed, using local attraction data");
                match self.plan_offline(prefs, start_date) {
                    Ok(plan) => PlanOutcome::Fallback { plan, reason },
                    Err(e) => PlanOutcome::Failed(e),
                }
            }
        }
    }

    /// Build a plan from the attraction table without contacting the provider
    pub fn plan_offline(
        &self,
        prefs: &TravelPreferences,
        start_date: NaiveDate,
    ) -> Result<TravelPlan, PlannerError> {
        let table = self.attractions.load()?;
        Ok(generate_fallback_plan(prefs, &table, start_date))
    }
}

/// Main public API function
pub async fn plan_trip(config: PlannerConfig, prefs: &TravelPreferences) -> PlanOutcome {
    match TripPlanner::new(config) {
        Ok(planner) => planner.plan(prefs).await,
        Err(e) => PlanOutcome::Failed(e),
    }
}

pub(crate) fn date_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_prefers_city() {
        let prefs = TravelPreferences {
            destination: "山东".to_string(),
            city: "烟台市".to_string(),
            ..Default::default()
        };
        assert_eq!(prefs.place(), "烟台市");
        assert_eq!(prefs.destination_label(), "山东");

        let prefs = TravelPreferences {
            destination: "杭州市".to_string(),
            ..Default::default()
        };
        assert_eq!(prefs.place(), "杭州市");
        assert_eq!(prefs.destination_label(), "杭州市");
    }

    #[test]
    fn test_preference_defaults() {
        let prefs = TravelPreferences::default();
        assert_eq!(prefs.duration(), 1);
        assert_eq!(prefs.group_size_label(), "2");

        let prefs = TravelPreferences {
            duration_days: Some(0),
            group_size: Some(0),
            ..Default::default()
        };
        assert_eq!(prefs.duration(), 1);
        assert_eq!(prefs.group_size_label(), "2");

        let prefs = TravelPreferences {
            duration_days: Some(3),
            group_size: Some(5),
            ..Default::default()
        };
        assert_eq!(prefs.duration(), 3);
        assert_eq!(prefs.group_size_label(), "5");
    }

    #[test]
    fn test_duration_is_clamped() {
        let prefs = TravelPreferences {
            duration_days: Some(50_000_000),
            ..Default::default()
        };
        assert_eq!(prefs.duration(), MAX_DAYS);

        let prefs = TravelPreferences {
            duration_days: Some(MAX_DAYS),
            ..Default::default()
        };
        assert_eq!(prefs.duration(), MAX_DAYS);
    }

    #[test]
    fn test_preferences_from_string_form_fields() {
        let prefs: TravelPreferences = serde_json::from_str(
            r#"{"city": "烟台市", "interests": "海鲜美食", "duration": "2", "groupSize": "2"}"#,
        )
        .unwrap();
        assert_eq!(prefs.duration_days, Some(2));
        assert_eq!(prefs.duration(), 2);
        assert_eq!(prefs.group_size, Some(2));
        assert_eq!(prefs.group_size_label(), "2");

        let prefs: TravelPreferences = serde_json::from_str(
            r#"{"city": "烟台市", "durationDays": "abc", "groupSize": "", "budget": "3000"}"#,
        )
        .unwrap();
        assert_eq!(prefs.duration(), 1);
        assert_eq!(prefs.group_size_label(), "2");
        assert_eq!(prefs.budget.as_deref(), Some("3000"));
    }

    #[test]
    fn test_preferences_from_form_json() {
        let prefs: TravelPreferences = serde_json::from_str(
            r#"{"city": "烟台市", "interests": "海鲜美食", "durationDays": 2, "startDate": "2025-05-01"}"#,
        )
        .unwrap();
        assert_eq!(prefs.city, "烟台市");
        assert_eq!(prefs.duration(), 2);
        assert_eq!(prefs.start_date, NaiveDate::from_ymd_opt(2025, 5, 1));
        assert!(prefs.budget.is_none());
    }

    #[test]
    fn test_activity_cost_accepts_numeric_string() {
        let activity: Activity = serde_json::from_str(
            r#"{"name": "蓬莱阁", "cost": "120", "time": "09:00-12:00"}"#,
        )
        .unwrap();
        assert_eq!(activity.cost, 120.0);
        assert!(activity.description.is_empty());
    }

    #[test]
    fn test_plan_totals() {
        let activity = |cost: f64| Activity {
            name: "x".to_string(),
            description: String::new(),
            location: String::new(),
            time: String::new(),
            cost,
            transportation: String::new(),
        };
        let plan = TravelPlan {
            days: vec![
                DayPlan { date: "2025-05-01".to_string(), activities: vec![activity(10.0), activity(20.5)] },
                DayPlan { date: "2025-05-02".to_string(), activities: vec![activity(30.0)] },
            ],
            total_cost: 0.0,
            recommended_group_size: "2".to_string(),
            start_date: "2025-05-01".to_string(),
        };
        assert_eq!(plan.activity_count(), 3);
        assert_eq!(plan.computed_total(), 60.5);
    }

    #[test]
    fn test_outcome_accessors() {
        let plan = TravelPlan {
            days: vec![],
            total_cost: 0.0,
            recommended_group_size: "2".to_string(),
            start_date: "2025-05-01".to_string(),
        };

        let remote = PlanOutcome::Remote(plan.clone());
        assert!(remote.is_remote());
        assert_eq!(remote.source(), "remote");
        assert!(remote.notice().is_none());

        let fallback = PlanOutcome::Fallback { plan, reason: PlannerError::EmptyResponse };
        assert!(fallback.is_fallback());
        assert!(fallback.plan().is_some());
        assert!(fallback.notice().is_some());

        let failed = PlanOutcome::Failed(PlannerError::AttractionTableError("missing".to_string()));
        assert_eq!(failed.source(), "failed");
        assert!(failed.plan().is_none());
        assert!(failed.into_result().is_err());
    }
}
