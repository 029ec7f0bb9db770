//! HTTP client and response parser for chat-completion itineraries

use crate::config::PlannerConfig;
use crate::fence::extract_payload;
use crate::{date_label, Activity, DayPlan, PlannerError, TravelPlan, TravelPreferences};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::{debug, error, info, instrument, warn};

const SYSTEM_PROMPT: &str = "你是一名专业的旅行规划师，只用JSON格式回答。";
const DEGRADED_DESCRIPTION_CHARS: usize = 100;

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completion endpoint
pub struct ItineraryClient {
    http_client: Client,
    config: PlannerConfig,
}

impl ItineraryClient {
    /// Create a new itinerary client
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        debug!(provider = config.provider.name(), "Creating new itinerary client");
        let mut builder = Client::builder().user_agent(concat!("rust-itinerary/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self { http_client, config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Ask the provider for an itinerary and return the raw completion text
    #[instrument(level = "info", skip(self, prefs), fields(place = %prefs.place()))]
    pub async fn request_itinerary(
        &self,
        prefs: &TravelPreferences,
        start_date: NaiveDate,
    ) -> Result<String, PlannerError> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(prefs, start_date)),
        ];
        self.complete(&messages).await
    }

    /// Send one chat-completion request; returns the first choice's content
    #[instrument(level = "debug", skip(self, messages), fields(model = %self.config.model))]
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, PlannerError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| PlannerError::MissingApiKey(self.config.provider.name().to_string()))?;

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        info!(url = %self.config.base_url, "Making chat completion request");
        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&self.config.base_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Chat completion request completed"
        );

        if !status.is_success() {
            error!(status = %status, "Chat completion request failed");
            return Err(PlannerError::RequestFailed { status });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(PlannerError::EmptyResponse)?;

        debug!(content_length = content.len(), "Received completion content");
        Ok(content)
    }
}

/// Build the user prompt, including an example of the expected JSON
pub fn build_prompt(prefs: &TravelPreferences, start_date: NaiveDate) -> String {
    let or_unset = |value: Option<&str>| -> String {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("未指定")
            .to_string()
    };
    let start = date_label(start_date);

    format!(
        r#"请为我制定一份旅行计划：
- 目的地：{destination}
- 城市：{city}
- 兴趣爱好：{interests}
- 预算：{budget}元
- 行程天数：{days}天
- 出行人数：{group}人
- 旅行风格：{style}
- 出发日期：{start}

请按天安排活动，每个活动包含名称、描述、地点、时间段、预计花费和交通方式。
只返回如下格式的JSON，不要添加其他说明：
{{
  "days": [
    {{
      "date": "{start}",
      "activities": [
        {{
          "name": "活动名称",
          "description": "活动描述",
          "location": "具体地点",
          "time": "09:00-12:00",
          "cost": 100,
          "transportation": "交通方式"
        }}
      ]
    }}
  ],
  "totalCost": 100,
  "recommendedGroupSize": "{group}",
  "startDate": "{start}"
}}"#,
        destination = prefs.destination_label(),
        city = or_unset(Some(prefs.place())),
        interests = or_unset(Some(prefs.interests.as_str())),
        budget = or_unset(prefs.budget.as_deref()),
        days = prefs.duration(),
        group = prefs.group_size_label(),
        style = or_unset(prefs.travel_style.as_deref()),
        start = start,
    )
}

/// Completion payload as models actually send it: most fields optional
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanPayload {
    days: Vec<DayPlan>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    total_cost: Option<f64>,
    #[serde(default)]
    recommended_group_size: Option<Value>,
    #[serde(default)]
    start_date: Option<String>,
}

/// Turns raw completion text into a `TravelPlan`
#[derive(Debug, Default, Clone, Copy)]
pub struct ItineraryResponseParser;

impl ItineraryResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the completion strictly
    pub fn try_parse(
        &self,
        raw: &str,
        prefs: &TravelPreferences,
        start_date: NaiveDate,
    ) -> Result<TravelPlan, PlannerError> {
        let extracted = extract_payload(raw);
        let payload: PlanPayload = serde_json::from_str(extracted.body)
            .map_err(|e| PlannerError::MalformedCompletion(e.to_string()))?;

        if payload.days.is_empty() {
            return Err(PlannerError::MalformedCompletion("plan has no days".to_string()));
        }
        if let Some(bad) = payload
            .days
            .iter()
            .flat_map(|day| day.activities.iter())
            .find(|activity| !activity.cost.is_finite() || activity.cost < 0.0)
        {
            return Err(PlannerError::MalformedCompletion(format!(
                "invalid cost {} for {}",
                bad.cost, bad.name
            )));
        }

        let computed: f64 = payload
            .days
            .iter()
            .flat_map(|day| day.activities.iter())
            .map(|activity| activity.cost)
            .sum();

        let recommended_group_size = match payload.recommended_group_size {
            Some(Value::String(size)) if !size.trim().is_empty() => size,
            Some(Value::Number(size)) => size.to_string(),
            _ => prefs.group_size_label(),
        };

        Ok(TravelPlan {
            days: payload.days,
            total_cost: payload.total_cost.unwrap_or(computed),
            recommended_group_size,
            start_date: payload
                .start_date
                .filter(|date| !date.trim().is_empty())
                .unwrap_or_else(|| date_label(start_date)),
        })
    }

    /// Parse the completion, degrading to a one-activity plan instead of failing
    pub fn normalize(&self, raw: &str, prefs: &TravelPreferences, start_date: NaiveDate) -> TravelPlan {
        match self.try_parse(raw, prefs, start_date) {
            Ok(plan) => {
                debug!(days = plan.days.len(), "Parsed completion into travel plan");
                plan
            }
            Err(e) => {
                warn!(error = %e, raw_length = raw.len(), "Completion not parseable, returning degraded plan");
                degraded_plan(raw, prefs, start_date)
            }
        }
    }
}

fn degraded_plan(raw: &str, prefs: &TravelPreferences, start_date: NaiveDate) -> TravelPlan {
    let date = date_label(start_date);
    TravelPlan {
        days: vec![DayPlan {
            date: date.clone(),
            activities: vec![Activity {
                name: "AI推荐行程".to_string(),
                description: raw.chars().take(DEGRADED_DESCRIPTION_CHARS).collect(),
                location: prefs.destination_label().to_string(),
                time: "09:00-18:00".to_string(),
                cost: 0.0,
                transportation: "自行安排".to_string(),
            }],
        }],
        total_cost: 0.0,
        recommended_group_size: prefs.group_size_label(),
        start_date: date,
    }
}
