use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::llm_client::{LlmSettings, ProviderKind};

const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Application configuration loaded from environment variables.
/// Built once at startup and shared read-only through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmSettings,
    pub prompts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub save_reports: bool,
    /// Deadline for a whole evaluation request.
    pub evaluation_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("LLM_PROVIDER") {
            Some(raw) => ProviderKind::from_str(&raw).map_err(|e| anyhow!(e))?,
            None => ProviderKind::OpenRouter,
        };

        let api_key = var("LLM_API_KEY")
            .or_else(|| var(provider.api_key_env()))
            .with_context(|| {
                format!(
                    "Required environment variable 'LLM_API_KEY' or '{}' is not set",
                    provider.api_key_env()
                )
            })?;

        let llm = LlmSettings {
            provider,
            model: var("EVALUATION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            base_url: var("LLM_BASE_URL")
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            timeout: Duration::from_secs(parse_or(var("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 120)?),
            max_tokens: parse_or(var("LLM_MAX_TOKENS"), "LLM_MAX_TOKENS", provider.default_max_tokens())?,
        };

        Ok(Config {
            llm,
            prompts_dir: var("PROMPTS_DIR").unwrap_or_else(|| "prompts".to_string()).into(),
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|| "output".to_string()).into(),
            save_reports: parse_or(var("SAVE_REPORTS"), "SAVE_REPORTS", true)?,
            evaluation_timeout: Duration::from_secs(parse_or(
                var("EVALUATION_TIMEOUT_SECS"),
                "EVALUATION_TIMEOUT_SECS",
                300,
            )?),
            port: parse_or(var("PORT"), "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
