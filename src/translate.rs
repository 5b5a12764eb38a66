//! Description translation through the public Google Translate endpoint.
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::TranslateError;

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Target language for translated descriptions.
pub const TARGET_LANG: &str = "zh-CN";

static LEADING_MENTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(@\S+\s*)+").expect("valid regex"));

#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

pub struct GoogleTranslate {
    client: reqwest::Client,
    target: String,
}

impl GoogleTranslate {
    pub fn new(target: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            target: target.to_string(),
        }
    }
}

impl Default for GoogleTranslate {
    fn default() -> Self {
        Self::new(TARGET_LANG)
    }
}

#[async_trait]
impl Translate for GoogleTranslate {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let body = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let value: Value = serde_json::from_str(&body).map_err(|_| TranslateError::Malformed)?;
        parse_response(&value)
    }
}

/// Concatenates the translated segments of a `translate_a/single` response.
fn parse_response(value: &Value) -> Result<String, TranslateError> {
    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or(TranslateError::Malformed)?;
    let text: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        Err(TranslateError::Malformed)
    } else {
        Ok(text)
    }
}

/// Drops the `@user` mentions tweets start with.
pub fn strip_leading_mentions(text: &str) -> String {
    LEADING_MENTIONS.replace(text.trim_start(), "").trim().to_string()
}
