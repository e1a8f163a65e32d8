use serde::Deserialize;

/// Top-level application settings.
///
/// Loaded from `config/default.toml` (optional), an environment-specific
/// overlay, and `INTERVUE__*` environment variables, in that order. Every
/// field has a working local-dev default, so the API boots with no config
/// files present and partial overrides (a lone env var) never fail
/// deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub mongo: MongoSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub interview: InterviewSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    #[serde(default = "default_mongo_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "intervue".to_string()
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: default_mongo_uri(),
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HS256 secret shared with the identity provider that issues the
    /// frontend's access tokens.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `aud` claim.
    #[serde(default = "default_audience")]
    pub audience: String,
}

fn default_jwt_secret() -> String {
    "dev-secret-change-me".to_string()
}

fn default_audience() -> String {
    "authenticated".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            audience: default_audience(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Hard bound on any single LLM call. On expiry the call is treated as
    /// "capability unavailable" and callers fall through to their
    /// deterministic fallbacks.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewSettings {
    /// Questions generated up-front for a technical session.
    #[serde(default = "default_question_count")]
    pub question_count: usize,
    /// Generation retries before falling back to a canned question.
    #[serde(default = "default_generation_retries")]
    pub generation_retries: usize,
    /// Regeneration attempts when a question duplicates an earlier one.
    #[serde(default = "default_dedup_retries")]
    pub dedup_retries: usize,
}

fn default_question_count() -> usize {
    4
}

fn default_generation_retries() -> usize {
    2
}

fn default_dedup_retries() -> usize {
    3
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            generation_retries: default_generation_retries(),
            dedup_retries: default_dedup_retries(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_env = std::env::var("INTERVUE_ENV").unwrap_or_else(|_| "development".to_string());

        config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_env}")).required(false))
            .add_source(config::Environment::with_prefix("INTERVUE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.interview.question_count, 4);
        assert_eq!(settings.llm.timeout_secs, 30);
    }

    #[test]
    fn empty_document_deserializes_via_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.mongo.database, "intervue");
        assert_eq!(settings.auth.audience, "authenticated");
    }

    #[test]
    fn partial_section_keeps_field_defaults() {
        // A lone override (e.g. just the API key) must not reject the rest
        // of the section.
        let settings: Settings =
            serde_json::from_str(r#"{"llm": {"api_key": "sk-test"}}"#).unwrap();
        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(settings.llm.timeout_secs, 30);
    }
}
