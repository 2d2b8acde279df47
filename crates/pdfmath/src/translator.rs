//! Translator capability and service selection.
//!
//! A [`Translator`] turns one paragraph into the target language and names
//! itself with an identity string that keys the translation cache.
//! [`TranslatorKind`] is the configuration-time choice of backend, parsed
//! from a service descriptor such as `"google"` or `"openai:gpt-4o"`.

use crate::error::{Error, TranslateError};
use crate::services::{
    AzureTranslator, DeepLTranslator, DeepLXTranslator, GoogleTranslator, OllamaTranslator,
    OpenAiTranslator,
};

/// Translates paragraph text that may contain `$v<N>$` placeholders.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> Result<String, TranslateError>;

    /// Stable description of the service and language pair, used in cache
    /// keys: `"{service} {lang_out} {lang_in}"`.
    fn identity(&self) -> String;
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        (**self).translate(text)
    }

    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// Source and target language, as codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub lang_in: String,
    pub lang_out: String,
}

impl LanguagePair {
    /// Build a pair from codes or English language names.
    pub fn new(lang_in: &str, lang_out: &str) -> Self {
        Self {
            lang_in: normalize_language(lang_in),
            lang_out: normalize_language(lang_out),
        }
    }

    /// Apply a backend's code overrides (`zh` -> `zh-CN`, ...).
    pub fn mapped(&self, map: &[(&str, &str)]) -> Self {
        let apply = |code: &str| {
            map.iter()
                .find(|(from, _)| from.eq_ignore_ascii_case(code))
                .map_or_else(|| code.to_string(), |(_, to)| (*to).to_string())
        };
        Self {
            lang_in: apply(&self.lang_in),
            lang_out: apply(&self.lang_out),
        }
    }

    /// Whether the source language is left to the service to detect.
    pub fn is_auto(&self) -> bool {
        self.lang_in.eq_ignore_ascii_case("auto")
    }
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self::new("en", "zh")
    }
}

/// Map an English language name to its code; codes pass through.
pub fn normalize_language(name: &str) -> String {
    let trimmed = name.trim();
    let code = match trimmed.to_ascii_lowercase().as_str() {
        "chinese" | "simplified chinese" => "zh",
        "english" => "en",
        "french" => "fr",
        "german" => "de",
        "japanese" => "ja",
        "korean" => "ko",
        "russian" => "ru",
        "spanish" => "es",
        "" => "auto",
        _ => return trimmed.to_string(),
    };
    code.to_string()
}

/// Backend selected from a service descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatorKind {
    Google,
    DeepL,
    DeepLX,
    Ollama { model: Option<String> },
    OpenAi { model: Option<String> },
    Zhipu { model: Option<String> },
    Silicon { model: Option<String> },
    Azure,
}

impl TranslatorKind {
    /// Parse `"name"` or `"name:model"`.
    pub fn from_service(service: &str) -> Result<Self, TranslateError> {
        let (name, model) = match service.split_once(':') {
            Some((name, model)) => (name, Some(model.trim()).filter(|m| !m.is_empty())),
            None => (service, None),
        };
        let model = model.map(str::to_string);
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "google" => Self::Google,
            "deepl" => Self::DeepL,
            "deeplx" => Self::DeepLX,
            "ollama" => Self::Ollama { model },
            "openai" => Self::OpenAi { model },
            "zhipu" => Self::Zhipu { model },
            "silicon" => Self::Silicon { model },
            "azure" => Self::Azure,
            other => {
                return Err(TranslateError::Permanent(format!(
                    "unsupported translation service: {other}"
                )));
            }
        })
    }

    /// Build the backend, reading credentials from the process environment.
    pub fn build(&self, service: &str, pair: &LanguagePair) -> Result<Box<dyn Translator>, Error> {
        self.build_with(service, pair, &|key| std::env::var(key).ok())
    }

    /// Build the backend with an explicit variable lookup.
    pub fn build_with(
        &self,
        service: &str,
        pair: &LanguagePair,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Box<dyn Translator>, Error> {
        let var = |key: &str, default: &str| env(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            env(key).ok_or_else(|| Error::Config(format!("{key} must be set for {service}")))
        };
        let model_or = |model: &Option<String>, key: &str, default: &str| {
            model.clone().unwrap_or_else(|| var(key, default))
        };

        Ok(match self {
            Self::Google => Box::new(GoogleTranslator::new(service, pair)?),
            Self::DeepL => Box::new(DeepLTranslator::new(
                service,
                pair,
                &var("DEEPL_SERVER_URL", "https://api.deepl.com"),
                &required("DEEPL_AUTH_KEY")?,
            )?),
            Self::DeepLX => Box::new(DeepLXTranslator::new(
                service,
                pair,
                &var("DEEPLX_ENDPOINT", "https://api.deepl.com/translate"),
            )?),
            Self::Ollama { model } => Box::new(OllamaTranslator::new(
                service,
                pair,
                &var("OLLAMA_HOST", "http://127.0.0.1:11434"),
                &model_or(model, "OLLAMA_MODEL", "gemma2"),
            )?),
            Self::OpenAi { model } => Box::new(OpenAiTranslator::new(
                service,
                pair,
                &var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                env("OPENAI_API_KEY"),
                &model_or(model, "OPENAI_MODEL", "gpt-4o-mini"),
            )?),
            Self::Zhipu { model } => Box::new(OpenAiTranslator::new(
                service,
                pair,
                "https://open.bigmodel.cn/api/paas/v4",
                Some(required("ZHIPU_API_KEY")?),
                &model_or(model, "ZHIPU_MODEL", "glm-4-flash"),
            )?),
            Self::Silicon { model } => Box::new(OpenAiTranslator::new(
                service,
                pair,
                "https://api.siliconflow.cn/v1",
                Some(required("SILICON_API_KEY")?),
                &model_or(model, "SILICON_MODEL", "Qwen/Qwen2.5-7B-Instruct"),
            )?),
            Self::Azure => Box::new(AzureTranslator::new(
                service,
                pair,
                &var("AZURE_ENDPOINT", "https://api.translator.azure.cn"),
                &required("AZURE_API_KEY")?,
                &var("AZURE_REGION", "chinaeast2"),
            )?),
        })
    }
}

/// Text the orchestrator returns unchanged instead of translating: empty,
/// whitespace, or a lone `$v0$` formula.
pub fn is_trivial(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed == "$v0$"
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn language_names_normalize() {
        assert_eq!(normalize_language("Chinese"), "zh");
        assert_eq!(normalize_language("english"), "en");
        assert_eq!(normalize_language(" German "), "de");
        assert_eq!(normalize_language("pt-BR"), "pt-BR");
        assert_eq!(normalize_language(""), "auto");
    }

    #[test]
    fn backend_maps_apply_to_both_sides() {
        let pair = LanguagePair::new("Chinese", "English").mapped(&[("zh", "zh-Hans")]);
        assert_eq!(pair.lang_in, "zh-Hans");
        assert_eq!(pair.lang_out, "en");
    }

    #[test]
    fn service_descriptors() {
        assert_eq!(TranslatorKind::from_service("google").unwrap(), TranslatorKind::Google);
        assert_eq!(
            TranslatorKind::from_service("openai:gpt-4o").unwrap(),
            TranslatorKind::OpenAi { model: Some("gpt-4o".into()) }
        );
        assert_eq!(
            TranslatorKind::from_service("ollama:").unwrap(),
            TranslatorKind::Ollama { model: None }
        );
        assert_eq!(
            TranslatorKind::from_service("Silicon:Qwen/Qwen2.5-7B-Instruct").unwrap(),
            TranslatorKind::Silicon { model: Some("Qwen/Qwen2.5-7B-Instruct".into()) }
        );
        let err = TranslatorKind::from_service("tencent").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let env: HashMap<&str, &str> = HashMap::new();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());
        let result = TranslatorKind::DeepL.build_with("deepl", &LanguagePair::default(), &lookup);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("DEEPL_AUTH_KEY")));
    }

    #[test]
    fn identity_includes_service_and_languages() {
        let env: HashMap<&str, &str> = HashMap::from([("OLLAMA_MODEL", "qwen2")]);
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());
        let translator = TranslatorKind::from_service("ollama")
            .unwrap()
            .build_with("ollama", &LanguagePair::new("en", "zh"), &lookup)
            .unwrap();
        assert_eq!(translator.identity(), "ollama zh en");
    }

    #[test]
    fn trivial_text() {
        assert!(is_trivial(""));
        assert!(is_trivial("  \n"));
        assert!(is_trivial(" $v0$ "));
        assert!(!is_trivial("$v1$"));
        assert!(!is_trivial("x"));
    }
}
