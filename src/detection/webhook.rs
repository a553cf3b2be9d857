use super::result::Assessment;
use crate::config::WebhookConfig;
use crate::error::DetectionError;
use crate::location::GeoPoint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Everything sent to the analyzer for one capture
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// JPEG on disk, owned by the caller for the duration of the request
    pub image_path: PathBuf,
    pub taken_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
}

/// Result of a connectivity check against the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub reachable: bool,
    pub status: Option<u16>,
    pub message: String,
}

/// Remote injury classification service
#[async_trait]
pub trait InjuryAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Assessment, DetectionError>;

    async fn probe(&self) -> ProbeReport;
}

/// Response body. Fields tolerate string encodings and fall back to
/// their defaults when present with an unusable type.
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default, deserialize_with = "lenient_bool")]
    has_injury: bool,
    #[serde(default, deserialize_with = "lenient_f64")]
    confidence: f64,
    #[serde(default = "default_injury_type", deserialize_with = "lenient_string")]
    injury_type: String,
}

fn default_injury_type() -> String {
    "Unknown".to_string()
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => default_injury_type(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// Parse a webhook response body into an assessment
pub fn parse_response(body: &str) -> Result<Assessment, DetectionError> {
    if body.trim().is_empty() {
        return Err(DetectionError::EmptyBody);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| DetectionError::MalformedResponse {
            details: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(DetectionError::MalformedResponse {
            details: "expected a JSON object".to_string(),
        });
    }

    let response: WebhookResponse =
        serde_json::from_value(value).map_err(|e| DetectionError::MalformedResponse {
            details: e.to_string(),
        })?;

    Ok(Assessment::new(
        response.has_injury,
        response.confidence,
        response.injury_type,
    ))
}

/// Multipart webhook client
pub struct WebhookClient {
    client: Client,
    endpoint: Url,
    source_tag: String,
}

impl WebhookClient {
    pub fn new(config: &WebhookConfig) -> Result<Self, DetectionError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| DetectionError::Endpoint {
            endpoint: config.endpoint.clone(),
            details: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        info!("Webhook client targeting {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            source_tag: config.source_tag.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn build_form(&self, request: &AnalysisRequest) -> Result<Form, DetectionError> {
        let image = tokio::fs::read(&request.image_path)
            .await
            .map_err(DetectionError::TempFile)?;
        let file_name = request
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| {
                format!("injury_detection_{}.jpg", request.taken_at.timestamp_millis())
            });

        debug!("Uploading {} ({} bytes)", file_name, image.len());

        let part = Part::bytes(image)
            .file_name(file_name)
            .mime_str("image/jpeg")?;

        // The client writes the multipart content type with its boundary
        let mut form = Form::new()
            .part("image", part)
            .text("timestamp", request.taken_at.timestamp_millis().to_string())
            .text("source", self.source_tag.clone());

        if let Some(location) = request.location {
            form = form
                .text("lat", location.latitude.to_string())
                .text("lng", location.longitude.to_string());
        }

        Ok(form)
    }
}

#[async_trait]
impl InjuryAnalyzer for WebhookClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Assessment, DetectionError> {
        let form = self.build_form(request).await?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Webhook response: {} - {}", status.as_u16(), body);

        if !status.is_success() {
            warn!("Webhook call unsuccessful: HTTP {}", status.as_u16());
            return Err(DetectionError::Status {
                status: status.as_u16(),
            });
        }

        parse_response(&body)
    }

    async fn probe(&self) -> ProbeReport {
        match self.client.get(self.endpoint.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                let reachable = status.is_success();
                let message = if reachable {
                    format!("Webhook is accessible (HTTP {})", status.as_u16())
                } else {
                    format!("Webhook returned error (HTTP {})", status.as_u16())
                };
                debug!("Webhook connectivity test result: {}", message);
                ProbeReport {
                    reachable,
                    status: Some(status.as_u16()),
                    message,
                }
            }
            Err(e) => {
                warn!("Webhook connectivity test failed: {}", e);
                ProbeReport {
                    reachable: false,
                    status: None,
                    message: format!("Network error: {}", e),
                }
            }
        }
    }
}
