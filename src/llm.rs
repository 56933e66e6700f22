use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::time::Duration;
use tracing::{debug, info};

/// Best-effort material guesser. Its output is untrusted text that is
/// expected, but not guaranteed, to be JSON.
#[async_trait]
pub trait MaterialExtractor: Send + Sync {
    async fn extract(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Turns an image into a textual description.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    async fn describe_image(&self, image: &[u8], mime: &str) -> Result<String>;
}

const CAPTION_PROMPT: &str = "Describe the items in this photo that could be recycled. \
Name every object and the material it is made of, and say how many of each you can see \
(e.g. \"2 plastic bottles, 1 old laptop\"). Answer in one short English paragraph.";

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    vision_model: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            vision_model: config.vision_model().to_string(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            EngineError::Config("No LLM API key configured (set OPENAI_API_KEY)".to_string())
        })
    }

    async fn call_llm(&self, body: serde_json::Value) -> Result<String> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EngineError::Config(
                "LLM API rejected the configured credentials".to_string(),
            ));
        }
        if !status.is_success() {
            let err_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Llm(format!(
                "LLM request failed ({}): {}",
                status, err_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| EngineError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl MaterialExtractor for LlmClient {
    async fn extract(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        debug!("Calling extractor model {}", self.model);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text}
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });
        self.call_llm(body).await
    }
}

#[async_trait]
impl ImageCaptioner for LlmClient {
    async fn describe_image(&self, image: &[u8], mime: &str) -> Result<String> {
        info!("Captioning {} byte image with {}", image.len(), self.vision_model);
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(image));
        let body = serde_json::json!({
            "model": self.vision_model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": CAPTION_PROMPT},
                        {"type": "image_url", "image_url": {"url": data_url}}
                    ]
                }
            ],
            "temperature": self.temperature,
            "max_tokens": 300
        });
        self.call_llm(body).await
    }
}

/// Guess an image MIME type from its leading bytes. Defaults to JPEG.
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = LlmClient::new(&EngineConfig::default()).unwrap();
        let err = client.extract("prompt", "text").await.unwrap_err();
        assert!(err.is_config());

        let err = client.describe_image(&[0xff, 0xd8], "image/jpeg").await.unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let config = EngineConfig {
            api_key: Some("   ".to_string()),
            ..EngineConfig::default()
        };
        let client = LlmClient::new(&config).unwrap();
        assert!(client.api_key().is_err());
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0d]), "image/png");
        assert_eq!(sniff_image_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(&[0xff, 0xd8, 0xff]), "image/jpeg");
    }
}
