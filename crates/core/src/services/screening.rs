//! Image screening: AI-generation and internet-similarity checks on uploads.
//!
//! The scoring itself is done by an external service behind [`ImageScreener`].
//! [`ScreeningPolicy`] turns scores into a verdict, and [`ScreeningGate`]
//! decides what happens when the service cannot answer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use civiccare_common::{AppError, AppResult, ScreeningConfig, ScreeningFailureMode, ScreeningReason};
use serde_json::Value;
use tracing::{debug, warn};

use crate::services::upload::UploadedImage;

/// Models requested from the screening service.
const HIVE_MODELS: &str = "image,ai_generated,image_similarity";

/// Scores reported for one image, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreeningScores {
    /// Likelihood the image is AI-generated.
    pub ai_generated: f64,
    /// Similarity to images already on the internet.
    pub image_similarity: f64,
}

/// External image analysis service.
#[async_trait]
pub trait ImageScreener: Send + Sync {
    /// Score one image.
    async fn analyze(&self, image: &UploadedImage) -> AppResult<ScreeningScores>;
}

/// Hive synchronous task API client.
pub struct HiveScreener {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HiveScreener {
    /// Create a client for the configured endpoint.
    pub fn new(config: &ScreeningConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::Config("screening.api_key is required when screening is enabled".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageScreener for HiveScreener {
    async fn analyze(&self, image: &UploadedImage) -> AppResult<ScreeningScores> {
        let media = reqwest::multipart::Part::bytes(image.data.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| AppError::ExternalService(format!("Invalid content type: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("media", media)
            .text("models", HIVE_MODELS);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Token {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Screening request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::ExternalService(format!("Screening service error: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid screening response: {e}")))?;

        parse_hive_response(&body)
    }
}

/// Extract scores from a Hive task response.
///
/// The first output of the first task must be present; a missing score
/// inside it counts as zero.
pub fn parse_hive_response(body: &Value) -> AppResult<ScreeningScores> {
    let output = body
        .pointer("/status/0/response/output/0")
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            AppError::ExternalService("Unexpected screening response shape".to_string())
        })?;

    let score = |model: &str| {
        output
            .get(model)
            .and_then(|m| m.get("score"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };

    Ok(ScreeningScores {
        ai_generated: score("ai_generated"),
        image_similarity: score("image_similarity"),
    })
}

/// Screener used when screening is switched off. Every image scores zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpScreener;

#[async_trait]
impl ImageScreener for NoOpScreener {
    async fn analyze(&self, _image: &UploadedImage) -> AppResult<ScreeningScores> {
        Ok(ScreeningScores::default())
    }
}

/// Thresholds and failure handling for the screening gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreeningPolicy {
    pub ai_generated_threshold: f64,
    pub similarity_threshold: f64,
    pub on_error: ScreeningFailureMode,
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self::from(&ScreeningConfig::default())
    }
}

impl From<&ScreeningConfig> for ScreeningPolicy {
    fn from(config: &ScreeningConfig) -> Self {
        Self {
            ai_generated_threshold: config.ai_generated_threshold,
            similarity_threshold: config.similarity_threshold,
            on_error: config.on_error,
        }
    }
}

impl ScreeningPolicy {
    /// Verdict for a set of scores. The AI check wins when both trip.
    #[must_use]
    pub fn judge(&self, scores: ScreeningScores) -> Option<ScreeningReason> {
        if scores.ai_generated > self.ai_generated_threshold {
            Some(ScreeningReason::AiGenerated)
        } else if scores.image_similarity > self.similarity_threshold {
            Some(ScreeningReason::Plagiarized)
        } else {
            None
        }
    }
}

/// Applies a [`ScreeningPolicy`] to the scores of an [`ImageScreener`].
#[derive(Clone)]
pub struct ScreeningGate {
    screener: Arc<dyn ImageScreener>,
    policy: ScreeningPolicy,
}

impl ScreeningGate {
    /// Create a gate over any screener.
    #[must_use]
    pub fn new(screener: Arc<dyn ImageScreener>, policy: ScreeningPolicy) -> Self {
        Self { screener, policy }
    }

    /// Build the gate described by the configuration.
    pub fn from_config(config: &ScreeningConfig) -> AppResult<Self> {
        let screener: Arc<dyn ImageScreener> = if config.enabled {
            Arc::new(HiveScreener::new(config)?)
        } else {
            Arc::new(NoOpScreener)
        };
        Ok(Self::new(screener, ScreeningPolicy::from(config)))
    }

    /// A gate that accepts everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoOpScreener), ScreeningPolicy::default())
    }

    /// Screen one image.
    pub async fn check(&self, image: &UploadedImage) -> AppResult<()> {
        match self.screener.analyze(image).await {
            Ok(scores) => {
                debug!(
                    image = %image.file_name,
                    ai_generated = scores.ai_generated,
                    image_similarity = scores.image_similarity,
                    "Image screened"
                );
                match self.policy.judge(scores) {
                    Some(reason) => Err(AppError::ScreeningRejected(reason)),
                    None => Ok(()),
                }
            }
            Err(e) => match self.policy.on_error {
                ScreeningFailureMode::FailOpen => {
                    warn!(
                        image = %image.file_name,
                        error = %e,
                        "Screening unavailable, accepting image unverified (fail_open)"
                    );
                    Ok(())
                }
                ScreeningFailureMode::FailClosed => {
                    warn!(
                        image = %image.file_name,
                        error = %e,
                        "Screening unavailable, rejecting upload (fail_closed)"
                    );
                    Err(AppError::ExternalService(
                        "Image screening is unavailable, please try again later".to_string(),
                    ))
                }
            },
        }
    }

    /// Screen images one at a time in submission order, stopping at the first veto.
    pub async fn check_all(&self, images: &[UploadedImage]) -> AppResult<()> {
        for image in images {
            self.check(image).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Screener answering from a fixed script and recording what it saw.
    struct ScriptedScreener {
        answers: Mutex<Vec<AppResult<ScreeningScores>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedScreener {
        fn new(answers: Vec<AppResult<ScreeningScores>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageScreener for ScriptedScreener {
        async fn analyze(&self, image: &UploadedImage) -> AppResult<ScreeningScores> {
            self.seen.lock().await.push(image.file_name.clone());
            self.answers
                .lock()
                .await
                .pop()
                .unwrap_or_else(|| Ok(ScreeningScores::default()))
        }
    }

    fn scores(ai_generated: f64, image_similarity: f64) -> ScreeningScores {
        ScreeningScores {
            ai_generated,
            image_similarity,
        }
    }

    fn image(name: &str) -> UploadedImage {
        UploadedImage::new(name, "image/png", vec![1, 2, 3])
    }

    #[test]
    fn test_thresholds_are_strict() {
        let policy = ScreeningPolicy::default();
        assert_eq!(policy.judge(scores(0.75, 0.7)), None);
        assert_eq!(
            policy.judge(scores(0.7501, 0.0)),
            Some(ScreeningReason::AiGenerated)
        );
        assert_eq!(
            policy.judge(scores(0.0, 0.7001)),
            Some(ScreeningReason::Plagiarized)
        );
    }

    #[test]
    fn test_ai_generated_checked_first() {
        let policy = ScreeningPolicy::default();
        assert_eq!(
            policy.judge(scores(0.9, 0.9)),
            Some(ScreeningReason::AiGenerated)
        );
    }

    #[test]
    fn test_parse_hive_response() {
        let body = json!({
            "status": [{
                "response": {
                    "output": [{
                        "ai_generated": { "score": 0.12 },
                        "image_similarity": { "score": 0.81 }
                    }]
                }
            }]
        });
        assert_eq!(parse_hive_response(&body).unwrap(), scores(0.12, 0.81));
    }

    #[test]
    fn test_parse_hive_response_missing_scores_count_as_zero() {
        let body = json!({ "status": [{ "response": { "output": [{}] } }] });
        assert_eq!(parse_hive_response(&body).unwrap(), scores(0.0, 0.0));
    }

    #[test]
    fn test_parse_hive_response_unexpected_shape() {
        let body = json!({ "message": "Invalid token" });
        assert!(matches!(
            parse_hive_response(&body),
            Err(AppError::ExternalService(_))
        ));
    }

    #[test]
    fn test_hive_screener_requires_key() {
        let config = ScreeningConfig::default();
        assert!(matches!(HiveScreener::new(&config), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_gate_rejects_with_reason() {
        let gate = ScreeningGate::new(
            Arc::new(ScriptedScreener::new(vec![Ok(scores(0.1, 0.95))])),
            ScreeningPolicy::default(),
        );
        assert!(matches!(
            gate.check(&image("copy.png")).await,
            Err(AppError::ScreeningRejected(ScreeningReason::Plagiarized))
        ));
    }

    #[tokio::test]
    async fn test_gate_fail_open_accepts_on_error() {
        let gate = ScreeningGate::new(
            Arc::new(ScriptedScreener::new(vec![Err(AppError::ExternalService(
                "timeout".to_string(),
            ))])),
            ScreeningPolicy::default(),
        );
        assert!(gate.check(&image("a.png")).await.is_ok());
    }

    #[tokio::test]
    async fn test_gate_fail_closed_rejects_on_error() {
        let gate = ScreeningGate::new(
            Arc::new(ScriptedScreener::new(vec![Err(AppError::ExternalService(
                "timeout".to_string(),
            ))])),
            ScreeningPolicy {
                on_error: ScreeningFailureMode::FailClosed,
                ..ScreeningPolicy::default()
            },
        );
        assert!(matches!(
            gate.check(&image("a.png")).await,
            Err(AppError::ExternalService(_))
        ));
    }

    #[tokio::test]
    async fn test_check_all_stops_at_first_veto() {
        let screener = Arc::new(ScriptedScreener::new(vec![
            Ok(scores(0.0, 0.0)),
            Ok(scores(0.99, 0.0)),
            Ok(scores(0.0, 0.0)),
        ]));
        let gate = ScreeningGate::new(screener.clone(), ScreeningPolicy::default());

        let result = gate
            .check_all(&[image("1.png"), image("2.png"), image("3.png")])
            .await;

        assert!(matches!(
            result,
            Err(AppError::ScreeningRejected(ScreeningReason::AiGenerated))
        ));
        assert_eq!(*screener.seen.lock().await, vec!["1.png", "2.png"]);
    }

    #[tokio::test]
    async fn test_disabled_gate_accepts() {
        assert!(ScreeningGate::disabled().check(&image("a.png")).await.is_ok());
    }
}
