//! Abstract translation — HTTP translation service behind a trait.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::TranslateError;

/// Timeout for a single translation request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Translates text into the configured target language.
///
/// Infallible by contract: implementations return the original text
/// unchanged when translation fails or is a no-op for the source
/// language. Callers invoke this once per paper per run.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> String;
}

/// Pass-through translator used when no API key is configured.
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// DeepL-backed translator.
pub struct DeepLTranslator {
    api_url: String,
    api_key: SecretString,
    target_language: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

impl DeepLTranslator {
    pub fn new(api_url: String, api_key: SecretString, target_language: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_url,
            api_key,
            target_language,
            client,
        }
    }

    async fn request_translation(&self, text: &str) -> Result<String, TranslateError> {
        let body = serde_json::json!({
            "text": [text],
            "source_lang": "EN",
            "target_lang": self.target_language.to_uppercase(),
        });

        let resp = self
            .client
            .post(&self.api_url)
            .header(
                "Authorization",
                format!("DeepL-Auth-Key {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TranslateError::Status(resp.status()));
        }

        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| TranslateError::InvalidResponse(e.to_string()))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| TranslateError::InvalidResponse("empty translations array".into()))
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        // Source language is English; an English target is a no-op.
        if self.target_language.eq_ignore_ascii_case("en") {
            return text.to_string();
        }

        match self.request_translation(text).await {
            Ok(translated) => {
                tracing::info!(
                    target = %self.target_language,
                    from_chars = text.chars().count(),
                    to_chars = translated.chars().count(),
                    "Translated text"
                );
                translated
            }
            Err(e) => {
                tracing::warn!(
                    target = %self.target_language,
                    error = %e,
                    "Translation failed, keeping original text"
                );
                text.to_string()
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(target: &str) -> DeepLTranslator {
        // Nothing listens on port 9; any real request fails fast.
        DeepLTranslator::new(
            "http://127.0.0.1:9/v2/translate".into(),
            SecretString::from("test-key"),
            target.into(),
        )
    }

    #[tokio::test]
    async fn noop_translator_returns_input() {
        assert_eq!(NoopTranslator.translate("hello").await, "hello");
    }

    #[tokio::test]
    async fn blank_text_is_unchanged() {
        let t = translator("ja");
        assert_eq!(t.translate("").await, "");
        assert_eq!(t.translate("   ").await, "   ");
    }

    #[tokio::test]
    async fn english_target_skips_translation() {
        // Would fail with a network error if it actually called out.
        let t = translator("en");
        assert_eq!(t.translate("unchanged text").await, "unchanged text");
        let t = translator("EN");
        assert_eq!(t.translate("unchanged text").await, "unchanged text");
    }

    #[tokio::test]
    async fn transport_failure_returns_original() {
        let t = translator("ja");
        assert_eq!(t.translate("original abstract").await, "original abstract");
    }
}
