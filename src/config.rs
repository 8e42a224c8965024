//! Configuration types — environment-driven with typed defaults.

use chrono::NaiveDate;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Digest agent configuration.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// Research topics to search for.
    pub research_topics: Vec<String>,
    /// arXiv category filter (e.g. "cs.LG").
    pub arxiv_categories: Vec<String>,
    /// Maximum results to request per topic.
    pub max_results_per_topic: usize,
    /// How many days to look back from the end date.
    pub days_back: u32,
    /// Minimum relevance score for the threshold-derived flag.
    pub relevance_threshold: f32,
    /// Cap on papers included in a single digest.
    pub max_papers_per_digest: usize,
    /// ISO 639-1 target language for abstract translation.
    pub target_language: String,
    /// Inclusive end date override for the search window (defaults to today).
    pub end_date: Option<NaiveDate>,
    /// Path to the local seen-papers database.
    pub db_path: String,
    /// Days to retain seen-paper entries before pruning.
    pub seen_retention_days: u32,
    /// LLM model identifier.
    pub llm_model: String,
    /// LLM API key.
    pub llm_api_key: SecretString,
    /// Teams incoming-webhook URL. `None` disables the channel.
    pub teams_webhook_url: Option<String>,
    /// Email delivery settings. `None` disables the channel.
    pub email: Option<EmailConfig>,
    /// Translation API key. `None` disables translation (abstracts pass
    /// through unchanged).
    pub translate_api_key: Option<SecretString>,
    /// Translation API endpoint.
    pub translate_api_url: String,
}

/// Email notifier configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub recipient: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `DIGEST_SMTP_HOST` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("DIGEST_SMTP_HOST").ok()?;

        let smtp_port: u16 = std::env::var("DIGEST_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("DIGEST_SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("DIGEST_SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("DIGEST_EMAIL_FROM").unwrap_or_else(|_| username.clone());
        let recipient = std::env::var("DIGEST_EMAIL_RECIPIENT").unwrap_or_default();

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            recipient,
        })
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            research_topics: vec!["electricity market".into(), "energy market".into()],
            arxiv_categories: vec![
                "econ.EM".into(),
                "econ.GN".into(),
                "cs.CE".into(),
                "cs.LG".into(),
                "cs.GT".into(),
                "math.OC".into(),
                "stat.AP".into(),
                "eess.SY".into(),
            ],
            max_results_per_topic: 20,
            days_back: 3,
            relevance_threshold: 0.7,
            max_papers_per_digest: 10,
            target_language: "ja".into(),
            end_date: None,
            db_path: "./data/paper-digest.db".into(),
            seen_retention_days: 30,
            llm_model: "claude-3-5-haiku-latest".into(),
            llm_api_key: SecretString::from(""),
            teams_webhook_url: None,
            email: None,
            translate_api_key: None,
            translate_api_url: "https://api-free.deepl.com/v2/translate".into(),
        }
    }
}

impl DigestConfig {
    /// Build config from environment variables, using defaults as base.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".into()))?;
        config.llm_api_key = SecretString::from(api_key);

        if let Ok(topics) = std::env::var("DIGEST_RESEARCH_TOPICS") {
            config.research_topics = split_csv(&topics);
        }
        if let Ok(categories) = std::env::var("DIGEST_ARXIV_CATEGORIES") {
            config.arxiv_categories = split_csv(&categories);
        }
        if let Ok(model) = std::env::var("DIGEST_LLM_MODEL") {
            config.llm_model = model;
        }
        if let Ok(max_results) = std::env::var("DIGEST_MAX_RESULTS_PER_TOPIC") {
            config.max_results_per_topic =
                parse_value("DIGEST_MAX_RESULTS_PER_TOPIC", &max_results)?;
        }
        if let Ok(days_back) = std::env::var("DIGEST_DAYS_BACK") {
            config.days_back = parse_value("DIGEST_DAYS_BACK", &days_back)?;
        }
        if let Ok(threshold) = std::env::var("DIGEST_RELEVANCE_THRESHOLD") {
            config.relevance_threshold =
                parse_value("DIGEST_RELEVANCE_THRESHOLD", &threshold)?;
        }
        if let Ok(max_papers) = std::env::var("DIGEST_MAX_PAPERS") {
            config.max_papers_per_digest = parse_value("DIGEST_MAX_PAPERS", &max_papers)?;
        }
        if let Ok(lang) = std::env::var("DIGEST_TARGET_LANGUAGE") {
            config.target_language = lang;
        }
        if let Ok(end_date) = std::env::var("DIGEST_END_DATE") {
            config.end_date = Some(NaiveDate::parse_from_str(&end_date, "%Y-%m-%d").map_err(
                |e| ConfigError::InvalidValue {
                    key: "DIGEST_END_DATE".into(),
                    message: format!("expected YYYY-MM-DD: {e}"),
                },
            )?);
        }
        if let Ok(db_path) = std::env::var("DIGEST_DB_PATH") {
            config.db_path = db_path;
        }
        if let Ok(url) = std::env::var("DIGEST_TEAMS_WEBHOOK_URL") {
            config.teams_webhook_url = Some(url);
        }
        if let Ok(key) = std::env::var("DEEPL_API_KEY") {
            config.translate_api_key = Some(SecretString::from(key));
        }
        if let Ok(url) = std::env::var("DEEPL_API_URL") {
            config.translate_api_url = url;
        }
        config.email = EmailConfig::from_env();

        Ok(config)
    }
}

/// Split a comma-separated env value into trimmed, non-empty parts.
fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("{e}"),
    })
}
