//! Invocation entry: event in, status code and JSON body out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use agri_common::{AgriError, AgriResult, DateRange};
use pipeline::{SceneOutcome, ScenePipeline};
use storage::HistoryStore;

/// Start of the search window when the event omits one.
pub const DEFAULT_START_DATE: &str = "2024-07-01";
/// End of the search window when the event omits one.
pub const DEFAULT_END_DATE: &str = "2024-07-31";

/// Input accepted by the processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Direct scene selection; not supported
    #[serde(default)]
    pub scene_id: Option<String>,
    /// Deployment check that skips all processing
    #[serde(default)]
    pub test_mode: bool,
}

impl InvocationEvent {
    pub fn for_range(start: &str, end: &str) -> Self {
        Self {
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
            ..Self::default()
        }
    }

    /// Search window, with defaults for missing bounds.
    pub fn date_range(&self) -> AgriResult<DateRange> {
        let start = self.start_date.as_deref().unwrap_or(DEFAULT_START_DATE);
        let end = self.end_date.as_deref().unwrap_or(DEFAULT_END_DATE);
        DateRange::parse(start, end)
            .map_err(|e| AgriError::Config(format!("invalid date range {}..{}: {}", start, end, e)))
    }
}

/// Where results are stored, echoed back by test mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub s3_bucket: String,
    pub aws_region: String,
}

/// Status code plus JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl InvocationResponse {
    pub fn success(outcome: &SceneOutcome) -> Self {
        let record = &outcome.record;
        let indices: Vec<String> = outcome
            .processed_indices
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        Self {
            status_code: 200,
            body: json!({
                "message": "Processing completed successfully",
                "result": {
                    "scene_id": record.scene_id,
                    "scene_date": record.scene_date.to_string(),
                    "processed_indices": indices,
                    "outputs": outcome.outputs,
                    "processing_summary": record.summary,
                },
                "timestamp": Utc::now().to_rfc3339(),
                "warnings": outcome.warnings,
            }),
        }
    }

    pub fn error(err: &AgriError) -> Self {
        Self {
            status_code: err.http_status_code(),
            body: json!({
                "error": err.to_string(),
                "stage": err.stage(),
                "timestamp": Utc::now().to_rfc3339(),
            }),
        }
    }

    pub fn test_passed(deployment: &DeploymentInfo) -> Self {
        Self {
            status_code: 200,
            body: json!({
                "message": "CI/CD test passed - Lambda deployed successfully",
                "test_passed": true,
                "timestamp": Utc::now().to_rfc3339(),
                "version": env!("CARGO_PKG_VERSION"),
                "environment": deployment,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Runs one invocation at a time against a configured pipeline.
pub struct Processor {
    pipeline: ScenePipeline,
    deployment: DeploymentInfo,
    ceiling: Duration,
}

impl Processor {
    pub fn new(pipeline: ScenePipeline, deployment: DeploymentInfo, ceiling: Duration) -> Self {
        Self {
            pipeline,
            deployment,
            ceiling,
        }
    }

    pub fn deployment(&self) -> &DeploymentInfo {
        &self.deployment
    }

    pub fn history(&self) -> &HistoryStore {
        self.pipeline.history()
    }

    /// Run the pipeline for an event.
    ///
    /// The wall-clock ceiling bounds search through summarization only;
    /// persistence runs outside it, so a written record always gets its log
    /// update attempt. Dropping the analysis future on timeout drops its
    /// scratch space too.
    #[instrument(skip(self, event), fields(start = ?event.start_date, end = ?event.end_date))]
    pub async fn run(&self, event: &InvocationEvent) -> AgriResult<SceneOutcome> {
        if let Some(scene_id) = &event.scene_id {
            return Err(AgriError::Unsupported(format!(
                "direct scene processing is not implemented (scene_id {})",
                scene_id
            )));
        }

        let range = event.date_range()?;
        let analyzed = tokio::time::timeout(self.ceiling, self.pipeline.analyze(&range))
            .await
            .map_err(|_| AgriError::InvocationTimeout(self.ceiling.as_secs()))??;
        self.pipeline.persist(analyzed).await
    }

    /// Handle an event, mapping every outcome to a response.
    pub async fn handle(&self, event: InvocationEvent) -> InvocationResponse {
        if event.test_mode {
            info!("Test mode invocation");
            return InvocationResponse::test_passed(&self.deployment);
        }

        match self.run(&event).await {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    warn!(
                        scene_id = %outcome.record.scene_id,
                        warning = %warning,
                        "Completed with warning"
                    );
                }
                info!(
                    scene_id = %outcome.record.scene_id,
                    health = %outcome.record.summary.vegetation_health,
                    outputs = outcome.outputs.len(),
                    "Invocation succeeded"
                );
                InvocationResponse::success(&outcome)
            }
            Err(e) => {
                error!(stage = e.stage(), error = %e, "Invocation failed");
                InvocationResponse::error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults() {
        let event: InvocationEvent = serde_json::from_str("{}").unwrap();
        assert!(!event.test_mode);
        let range = event.date_range().unwrap();
        assert_eq!(range.to_stac_interval(), "2024-07-01/2024-07-31");
    }

    #[test]
    fn test_event_partial_dates() {
        let event: InvocationEvent =
            serde_json::from_str(r#"{"start_date": "2024-07-10"}"#).unwrap();
        assert_eq!(
            event.date_range().unwrap().to_stac_interval(),
            "2024-07-10/2024-07-31"
        );
    }

    #[test]
    fn test_event_bad_date_is_config_error() {
        let event = InvocationEvent::for_range("2024-13-01", "2024-07-31");
        let err = event.date_range().unwrap_err();
        assert!(matches!(err, AgriError::Config(_)));
    }

    #[test]
    fn test_error_body() {
        let err = AgriError::NoScenesFound {
            start: "2024-07-01".into(),
            end: "2024-07-31".into(),
        };
        let response = InvocationResponse::error(&err);
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body["stage"], "search");
        assert!(response.body["error"]
            .as_str()
            .unwrap()
            .contains("2024-07-01"));
        assert!(response.body["timestamp"].is_string());
    }

    #[test]
    fn test_test_mode_body() {
        let deployment = DeploymentInfo {
            s3_bucket: "uae-agri-monitoring".into(),
            aws_region: "us-east-1".into(),
        };
        let response = InvocationResponse::test_passed(&deployment);
        assert!(response.is_success());
        assert_eq!(response.body["test_passed"], true);
        assert_eq!(response.body["environment"]["s3_bucket"], "uae-agri-monitoring");

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["statusCode"], 200);
    }
}
