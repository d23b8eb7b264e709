//! Generation engine client.
//!
//! The pipeline hands the engine one serialized telemetry context and the
//! strict report output schema; the engine must answer with JSON that
//! parses into [`Report`] and passes its structural validation. Anything
//! else is a distinct malformed-output error, never a partial report.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use domain::models::Report;

use crate::config::GenerationConfig;

/// Fixed low-variance generation settings. Report generation wants
/// repeatable structure, not creativity.
const TEMPERATURE: f64 = 0.1;
const TOP_P: f64 = 0.8;
const TOP_K: i32 = 10;

const PROMPT_PREAMBLE: &str = "You are a productivity analyst for a time-tracking platform. \
Using only the telemetry data below, produce a productivity report as a single JSON document \
conforming exactly to the provided response schema. Every daily report must contain exactly 24 \
hourly slots (hours 0 through 23, in order). Flag anomalous time-use patterns as discrepancies \
with severity low, medium, high, or critical.";

/// Generation engine errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generation engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation engine returned no candidates")]
    EmptyResponse,

    #[error("malformed generation output: {0}")]
    MalformedOutput(String),
}

/// Contract of the narrative-generation engine.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Generates a report from the serialized telemetry context,
    /// constrained to the given output schema.
    async fn generate(&self, context: &Value, output_schema: &Value)
        -> Result<Report, GenerationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig<'a>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    temperature: f64,
    top_p: f64,
    top_k: i32,
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

/// Gemini REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerationEngine for GeminiClient {
    async fn generate(
        &self,
        context: &Value,
        output_schema: &Value,
    ) -> Result<Report, GenerationError> {
        let prompt = format!("{}\n\nTelemetry data:\n{}", PROMPT_PREAMBLE, context);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: TOP_K,
                response_mime_type: "application/json",
                response_schema: output_schema,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GeminiResponse = response.json().await?;
        let text = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(GenerationError::EmptyResponse)?;

        parse_and_validate(&text)
    }
}

/// Parses engine output into a [`Report`] and checks its shape.
pub(crate) fn parse_and_validate(text: &str) -> Result<Report, GenerationError> {
    let report: Report = serde_json::from_str(text)
        .map_err(|err| GenerationError::MalformedOutput(err.to_string()))?;
    report
        .validate()
        .map_err(|err| GenerationError::MalformedOutput(err.to_string()))?;
    Ok(report)
}

/// The strict output schema the engine is constrained to.
///
/// Subset of the OpenAPI schema dialect the generateContent API accepts.
pub fn report_output_schema() -> Value {
    let hourly_breakdown = json!({
        "type": "object",
        "properties": {
            "hour": {"type": "integer"},
            "startTime": {"type": "string"},
            "endTime": {"type": "string"},
            "activeMinutes": {"type": "number"},
            "afkMinutes": {"type": "number"},
            "appUsage": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "appName": {"type": "string"},
                        "durationMinutes": {"type": "number"}
                    },
                    "required": ["appName", "durationMinutes"]
                }
            },
            "totalMinutes": {"type": "integer"}
        },
        "required": ["hour", "startTime", "endTime", "activeMinutes", "afkMinutes", "totalMinutes"]
    });

    let discrepancy = json!({
        "type": "object",
        "properties": {
            "type": {"type": "string"},
            "severity": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
            "startTime": {"type": "string"},
            "endTime": {"type": "string"},
            "durationMinutes": {"type": "number"},
            "description": {"type": "string"}
        },
        "required": ["type", "severity", "startTime", "endTime", "durationMinutes", "description"]
    });

    let daily_report = json!({
        "type": "object",
        "properties": {
            "date": {"type": "string"},
            "hourlyBreakdown": {"type": "array", "items": hourly_breakdown},
            "totalActiveMinutes": {"type": "number"},
            "totalActiveHours": {"type": "number"},
            "totalAfkMinutes": {"type": "number"},
            "totalAfkHours": {"type": "number"},
            "notableDiscrepancies": {"type": "array", "items": discrepancy},
            "summary": {"type": "string"}
        },
        "required": [
            "date", "hourlyBreakdown", "totalActiveMinutes", "totalActiveHours",
            "totalAfkMinutes", "totalAfkHours", "notableDiscrepancies", "summary"
        ]
    });

    let overall_report = json!({
        "type": "object",
        "properties": {
            "periodStart": {"type": "string"},
            "periodEnd": {"type": "string"},
            "totalActiveHours": {"type": "number"},
            "totalActiveMinutes": {"type": "number"},
            "totalAfkHours": {"type": "number"},
            "totalAfkMinutes": {"type": "number"},
            "averageDailyActiveHours": {"type": "number"},
            "averageDailyActiveMinutes": {"type": "number"},
            "totalDiscrepancies": {"type": "integer"},
            "criticalDiscrepancies": {"type": "integer"},
            "summary": {"type": "string"},
            "conclusion": {"type": "string"}
        },
        "required": [
            "periodStart", "periodEnd", "totalActiveHours", "totalActiveMinutes",
            "totalAfkHours", "totalAfkMinutes", "averageDailyActiveHours",
            "averageDailyActiveMinutes", "totalDiscrepancies", "criticalDiscrepancies",
            "summary", "conclusion"
        ]
    });

    json!({
        "type": "object",
        "properties": {
            "organizations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "organizationName": {"type": "string"},
                        "users": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "userName": {"type": "string"},
                                    "overallReport": overall_report,
                                    "dailyReports": {"type": "array", "items": daily_report}
                                },
                                "required": ["userName", "overallReport", "dailyReports"]
                            }
                        }
                    },
                    "required": ["organizationName", "users"]
                }
            },
            "generatedAt": {"type": "string"},
            "periodAnalyzed": {
                "type": "object",
                "properties": {
                    "startDate": {"type": "string"},
                    "endDate": {"type": "string"}
                },
                "required": ["startDate", "endDate"]
            }
        },
        "required": ["organizations", "generatedAt", "periodAnalyzed"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_validate_rejects_non_json() {
        let err = parse_and_validate("the user was very productive").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_and_validate_rejects_wrong_shape() {
        // Parses as JSON but is not a report
        let err = parse_and_validate(r#"{"hello": "world"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_and_validate_rejects_structural_violations() {
        // A report with an empty organizations list parses but fails shape
        // validation.
        let text = r#"{
            "organizations": [],
            "generatedAt": "2025-11-20T00:00:00Z",
            "periodAnalyzed": {"startDate": "2025-11-19", "endDate": "2025-11-19"}
        }"#;
        let err = parse_and_validate(text).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedOutput(_)));
        assert!(err.to_string().contains("no organizations"));
    }

    #[test]
    fn test_output_schema_names_top_level_fields() {
        let schema = report_output_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["organizations", "generatedAt", "periodAnalyzed"]);
        assert_eq!(
            schema["properties"]["organizations"]["items"]["properties"]["users"]["items"]
                ["required"],
            json!(["userName", "overallReport", "dailyReports"])
        );
    }

    #[test]
    fn test_severity_enum_in_schema_matches_model() {
        let schema = report_output_schema();
        let severities = &schema["properties"]["organizations"]["items"]["properties"]["users"]
            ["items"]["properties"]["dailyReports"]["items"]["properties"]
            ["notableDiscrepancies"]["items"]["properties"]["severity"]["enum"];
        assert_eq!(severities, &json!(["low", "medium", "high", "critical"]));
    }
}
