//! Image generation client

use crate::*;
use reqwest::Client;
use serde_json::json;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Generates a single square image per prompt via `/images/generations`
pub struct OpenAiImageGenerator {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    size: String,
}

impl OpenAiImageGenerator {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        model: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: model.into(),
            size: size.into(),
        }
    }

    fn build_request(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": &self.model,
            "prompt": prompt,
            "n": 1,
            "size": &self.size,
        })
    }

    fn parse_response(json: &serde_json::Value) -> Result<String> {
        json["data"]
            .get(0)
            .and_then(|image| image["url"].as_str())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::InvalidResponse)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }
        debug!("Requesting {} image for prompt {:?}", self.size, prompt);

        let response = self
            .client
            .post(format!("{}/images/generations", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let json: serde_json::Value = response.json().await?;
        if !status.is_success() {
            return Err(ProviderError::Api(api_error_message(&json)));
        }

        Self::parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OpenAiImageGenerator {
        OpenAiImageGenerator::new("sk-test", None, "dall-e-3", "1024x1024")
    }

    #[test]
    fn test_build_request_single_square_image() {
        let request = generator().build_request("Partly cloudy");
        assert_eq!(request["prompt"], "Partly cloudy");
        assert_eq!(request["n"], 1);
        assert_eq!(request["size"], "1024x1024");
        assert_eq!(request["model"], "dall-e-3");
    }

    #[test]
    fn test_parse_response_url() {
        let json = json!({"data": [{"url": "https://img.example/1.png"}]});
        assert_eq!(
            OpenAiImageGenerator::parse_response(&json).unwrap(),
            "https://img.example/1.png"
        );
    }

    #[test]
    fn test_parse_response_missing_url() {
        assert!(matches!(
            OpenAiImageGenerator::parse_response(&json!({"data": []})),
            Err(ProviderError::InvalidResponse)
        ));
        assert!(matches!(
            OpenAiImageGenerator::parse_response(&json!({"data": [{"url": ""}]})),
            Err(ProviderError::InvalidResponse)
        ));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let generator = OpenAiImageGenerator::new("", None, "dall-e-3", "1024x1024");
        assert!(matches!(
            generator.generate("Sunny").await,
            Err(ProviderError::NoApiKey)
        ));
    }
}
