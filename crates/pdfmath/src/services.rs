//! HTTP translation backends.
//!
//! Every backend uses a blocking reqwest client; the orchestrator provides
//! concurrency, retries and caching around them.

use std::time::Duration;

use regex::Regex;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::trace;

use crate::error::{Error, TranslateError};
use crate::translator::{LanguagePair, Translator};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest text the Google web endpoint accepts.
const GOOGLE_MAX_CHARS: usize = 5000;

const SYSTEM_PROMPT: &str =
    "You are a professional translation engine specialized in academic and technical content.";

fn http_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Turn a non-success status into a classified error.
fn check_status(response: Response) -> Result<Response, TranslateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(TranslateError::from_status(status.as_u16(), &body))
}

fn identity(service: &str, pair: &LanguagePair) -> String {
    format!("{service} {} {}", pair.lang_out, pair.lang_in)
}

/// Chat messages asking a model to translate `text` and keep formula
/// markers verbatim.
fn prompt(pair: &LanguagePair, text: &str) -> Vec<ChatMessage> {
    let lang_in = if pair.is_auto() { "en" } else { pair.lang_in.as_str() };
    let user = format!(
        "Please translate the following text from {lang_in} to {lang_out}. Follow these requirements:\n\
         1. Keep all mathematical formulas (e.g. $v*$, $$equation$$) unchanged\n\
         2. Preserve markdown formatting including lists, headings, and emphasis\n\
         3. Maintain the original structure and layout, including all line breaks\n\
         4. If any part cannot be confidently translated, keep it in the original language\n\
         5. If the source text is empty or contains only whitespace, return the original text\n\
         6. IMPORTANT: Each line in the output must correspond to the same line in the input\n\n\
         Source Text: {text}\n\nTranslated Text:",
        lang_out = pair.lang_out,
    );
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: user,
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

// --- Google ---

/// The Google Translate mobile web page, scraped.
pub struct GoogleTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    endpoint: String,
    result: Regex,
    control: Regex,
}

impl GoogleTranslator {
    pub fn new(service: &str, pair: &LanguagePair) -> Result<Self, Error> {
        Self::with_endpoint(service, pair, "http://translate.google.com/m")
    }

    pub fn with_endpoint(service: &str, pair: &LanguagePair, endpoint: &str) -> Result<Self, Error> {
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Config(format!("invalid pattern: {e}")))
        };
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.mapped(&[("zh", "zh-CN")]),
            endpoint: endpoint.to_string(),
            result: regex(r#"(?s)class="(?:t0|result-container)">(.*?)<"#)?,
            control: regex(r"\p{C}")?,
        })
    }

    /// Pull the translation out of the result page.
    fn extract(&self, page: &str) -> Result<String, TranslateError> {
        let captured = self
            .result
            .captures(page)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| TranslateError::Permanent("no translation in response page".into()))?;
        let text = unescape_html(captured.as_str());
        Ok(self.control.replace_all(&text, "").into_owned())
    }
}

impl Translator for GoogleTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let text: String = text.chars().take(GOOGLE_MAX_CHARS).collect();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("tl", self.pair.lang_out.as_str()),
                ("sl", self.pair.lang_in.as_str()),
                ("q", text.as_str()),
            ])
            .header(
                reqwest::header::USER_AGENT,
                "Mozilla/4.0 (compatible;MSIE 6.0;Windows NT 5.1;SV1;.NET CLR 1.1.4322;.NET CLR 2.0.50727;.NET CLR 3.0.04506.30)",
            )
            .send()?;
        let page = check_status(response)?.text()?;
        self.extract(&page)
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

/// Decode the character references the result page uses.
fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.bytes().take(12).position(|b| b == b';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// --- DeepL ---

pub struct DeepLTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    server_url: String,
    auth_key: String,
}

#[derive(Serialize)]
struct DeepLRequest<'a> {
    text: [&'a str; 1],
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
}

#[derive(Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl DeepLTranslator {
    pub fn new(
        service: &str,
        pair: &LanguagePair,
        server_url: &str,
        auth_key: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.mapped(&[("zh", "zh-Hans")]),
            server_url: server_url.trim_end_matches('/').to_string(),
            auth_key: auth_key.to_string(),
        })
    }
}

impl Translator for DeepLTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = DeepLRequest {
            text: [text],
            target_lang: &self.pair.lang_out,
            source_lang: (!self.pair.is_auto()).then_some(self.pair.lang_in.as_str()),
        };
        let response = self
            .client
            .post(format!("{}/v2/translate", self.server_url))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("DeepL-Auth-Key {}", self.auth_key),
            )
            .json(&request)
            .send()?;
        let body: DeepLResponse = check_status(response)?.json()?;
        body.translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| TranslateError::Permanent("DeepL returned no translations".into()))
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

// --- DeepLX ---

pub struct DeepLXTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    endpoint: String,
}

#[derive(Deserialize)]
struct DeepLXResponse {
    data: String,
}

impl DeepLXTranslator {
    pub fn new(service: &str, pair: &LanguagePair, endpoint: &str) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.mapped(&[("zh", "zh-Hans")]),
            endpoint: endpoint.to_string(),
        })
    }
}

impl Translator for DeepLXTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "source_lang": self.pair.lang_in,
                "target_lang": self.pair.lang_out,
                "text": text,
            }))
            .send()?;
        let body: DeepLXResponse = check_status(response)?.json()?;
        Ok(body.data)
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

// --- Ollama ---

pub struct OllamaTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    host: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

impl OllamaTranslator {
    pub fn new(service: &str, pair: &LanguagePair, host: &str, model: &str) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.clone(),
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

impl Translator for OllamaTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: prompt(&self.pair, text),
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };
        trace!(model = %self.model, "ollama chat request");
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&request)
            .send()?;
        let body: OllamaChatResponse = check_status(response)?.json()?;
        Ok(body.message.content.trim().to_string())
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

// --- OpenAI-compatible chat completions ---

/// Any chat-completions API: OpenAI, Zhipu, SiliconFlow.
pub struct OpenAiTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl OpenAiTranslator {
    pub fn new(
        service: &str,
        pair: &LanguagePair,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }
}

impl Translator for OpenAiTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = CompletionRequest {
            model: &self.model,
            messages: prompt(&self.pair, text),
            temperature: 0.0,
        };
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let body: CompletionResponse = check_status(builder.send()?)?.json()?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| TranslateError::Permanent("completion returned no choices".into()))
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

// --- Azure ---

pub struct AzureTranslator {
    client: Client,
    service: String,
    pair: LanguagePair,
    endpoint: String,
    api_key: String,
    region: String,
}

#[derive(Deserialize)]
struct AzureResult {
    translations: Vec<AzureTranslation>,
}

#[derive(Deserialize)]
struct AzureTranslation {
    text: String,
}

impl AzureTranslator {
    pub fn new(
        service: &str,
        pair: &LanguagePair,
        endpoint: &str,
        api_key: &str,
        region: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            client: http_client()?,
            service: service.to_string(),
            pair: pair.mapped(&[("zh", "zh-Hans")]),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            region: region.to_string(),
        })
    }
}

impl Translator for AzureTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let mut query = vec![("api-version", "3.0"), ("to", self.pair.lang_out.as_str())];
        if !self.pair.is_auto() {
            query.push(("from", self.pair.lang_in.as_str()));
        }
        let response = self
            .client
            .post(format!("{}/translate", self.endpoint))
            .query(&query)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Ocp-Apim-Subscription-Region", &self.region)
            .json(&json!([{ "Text": text }]))
            .send()?;
        let body: Vec<AzureResult> = check_status(response)?.json()?;
        body.into_iter()
            .next()
            .and_then(|r| r.translations.into_iter().next())
            .map(|t| t.text)
            .ok_or_else(|| TranslateError::Permanent("Azure returned no translations".into()))
    }

    fn identity(&self) -> String {
        identity(&self.service, &self.pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_entities() {
        assert_eq!(unescape_html("a &amp; b"), "a & b");
        assert_eq!(unescape_html("&lt;x&gt; &#39;q&#39; &#x4E2D;"), "<x> 'q' 中");
        assert_eq!(unescape_html("R&D; & more"), "R&D; & more");
        assert_eq!(unescape_html("tail &"), "tail &");
    }

    #[test]
    fn google_page_extraction() {
        let google = GoogleTranslator::new("google", &LanguagePair::new("en", "zh")).unwrap();
        let page = r#"<div class="result-container">值 &amp; $v0$</div>"#;
        assert_eq!(google.extract(page).unwrap(), "值 & $v0$");
        assert!(google.extract("<html></html>").is_err());
    }

    #[test]
    fn google_strips_control_characters() {
        let google = GoogleTranslator::new("google", &LanguagePair::default()).unwrap();
        let page = "<div class=\"t0\">a\u{200b}b\u{7}c</div>";
        assert_eq!(google.extract(page).unwrap(), "abc");
    }

    #[test]
    fn google_identity_uses_mapped_codes() {
        let google = GoogleTranslator::new("google", &LanguagePair::new("en", "zh")).unwrap();
        assert_eq!(google.identity(), "google zh-CN en");
    }

    #[test]
    fn prompt_keeps_markers_instruction() {
        let messages = prompt(&LanguagePair::new("auto", "zh"), "see $v0$");
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("from en to zh"));
        assert!(messages[1].content.contains("Source Text: see $v0$"));
        assert!(messages[1].content.contains("$v*$"));
    }

    #[test]
    fn deepl_request_omits_auto_source() {
        let request = DeepLRequest {
            text: ["hi"],
            target_lang: "zh-Hans",
            source_lang: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({ "text": ["hi"], "target_lang": "zh-Hans" }));
    }
}
