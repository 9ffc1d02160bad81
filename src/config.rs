//! Runtime settings loaded from the environment

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ColloquyError, ColloquyResult};

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Parameter bag for the service.
///
/// Values come from environment variables (matched case-insensitively) with
/// an optional `.env` file underneath them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub max_conversation_history: usize,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    /// Upper bound on model rounds per question. `None` keeps looping for as
    /// long as the model asks for tools.
    pub max_tool_rounds: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            max_conversation_history: 10,
            default_temperature: 0.7,
            default_max_tokens: 1000,
            max_tool_rounds: None,
        }
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn check_dotenv<T>(result: Result<T, dotenvy::Error>) -> ColloquyResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ColloquyError::Configuration(format!("Failed to load .env: {}", e))),
    }
}

impl Settings {
    /// Load from the process environment, reading `./.env` first if present.
    pub fn from_env() -> ColloquyResult<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_vars(std::env::vars())
    }

    /// Load from a specific dotenv file. Process variables take precedence
    /// over the file's entries.
    pub fn from_env_file(path: impl AsRef<Path>) -> ColloquyResult<Self> {
        let iter = dotenvy::from_path_iter(path.as_ref()).map_err(|e| {
            ColloquyError::Configuration(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut vars = Vec::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| ColloquyError::Configuration(format!("Bad .env entry: {}", e)))?;
            vars.push((key, value));
        }
        vars.extend(std::env::vars());
        Self::from_vars(vars)
    }

    /// Build settings from key/value pairs. Later pairs win.
    pub fn from_vars<I, K, V>(vars: I) -> ColloquyResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect();

        let mut settings = Settings::default();

        if let Some(key) = vars.get("openai_api_key") {
            settings.openai_api_key = Some(key.clone());
        }
        if let Some(model) = vars.get("openai_model") {
            settings.openai_model = model.clone();
        }
        if let Some(url) = vars.get("openai_base_url") {
            settings.openai_base_url = url.clone();
        }
        if let Some(host) = vars.get("api_host") {
            settings.api_host = host.clone();
        }
        if let Some(port) = parse_var(&vars, "api_port")? {
            settings.api_port = port;
        }
        if let Some(max) = parse_var(&vars, "max_conversation_history")? {
            settings.max_conversation_history = max;
        }
        if let Some(temp) = parse_var(&vars, "default_temperature")? {
            settings.default_temperature = temp;
        }
        if let Some(max_tokens) = parse_var(&vars, "default_max_tokens")? {
            settings.default_max_tokens = max_tokens;
        }
        if let Some(rounds) = parse_var(&vars, "max_tool_rounds")? {
            settings.max_tool_rounds = Some(rounds);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ColloquyResult<()> {
        if self.max_conversation_history == 0 {
            return Err(ColloquyError::Configuration(
                "max_conversation_history must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ColloquyError::Configuration(format!(
                "default_temperature must be between 0.0 and 2.0, got {}",
                self.default_temperature
            )));
        }
        if self.default_max_tokens == 0 {
            return Err(ColloquyError::Configuration(
                "default_max_tokens must be positive".to_string(),
            ));
        }
        if self.max_tool_rounds == Some(0) {
            return Err(ColloquyError::Configuration(
                "max_tool_rounds must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a non-empty model credential is present
    pub fn openai_configured(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> ColloquyResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ColloquyError::Configuration(format!("Invalid value for {}: '{}' ({})", key, raw, e))
        }),
        None => Ok(None),
    }
}
