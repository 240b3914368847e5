use std::env;

/// Runtime settings, read once from the environment (with `.env` support) and
/// optionally overridden by CLI flags. Defaults are usable for local runs
/// against a file database with stdout delivery.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Steady-state recency window, hours.
    pub lookback_hours: i64,
    /// Cap on items created for a source with no history.
    pub bootstrap_count: usize,
    /// Window the digest query covers, counting back from now.
    pub digest_window_hours: i64,
    pub max_digest_items: usize,
    /// Ceiling on the social post field, characters.
    pub social_post_max_chars: usize,
    /// Budget on text handed to the analyzer, characters.
    pub analysis_char_budget: usize,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub sendgrid_api_key: Option<String>,
    pub sender_email: Option<String>,
    pub recipient_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env_or("DATABASE_URL", "sqlite:newsbrief.db"),
            lookback_hours: env_parse("LOOKBACK_HOURS", 48),
            bootstrap_count: env_parse("BOOTSTRAP_COUNT", 2),
            digest_window_hours: env_parse("DIGEST_WINDOW_HOURS", 24),
            max_digest_items: env_parse("MAX_DIGEST_ITEMS", 10),
            social_post_max_chars: env_parse("SOCIAL_POST_MAX_CHARS", 260),
            analysis_char_budget: env_parse("ANALYSIS_CHAR_BUDGET", 8000),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 30),
            user_agent: env_or("USER_AGENT", "newsbrief/0.1"),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").ok(),
            sender_email: env::var("SENDER_EMAIL").ok(),
            recipient_email: env::var("RECIPIENT_EMAIL").ok(),
        }
    }

    /// Email delivery is only attempted when every piece of it is configured.
    pub fn email_configured(&self) -> bool {
        self.sendgrid_api_key.is_some()
            && self.sender_email.is_some()
            && self.recipient_email.is_some()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_garbage() {
        env::set_var("NEWSBRIEF_TEST_PARSE", "not-a-number");
        let v: i64 = env_parse("NEWSBRIEF_TEST_PARSE", 7);
        assert_eq!(v, 7);
        env::remove_var("NEWSBRIEF_TEST_PARSE");
    }

    #[test]
    fn email_requires_all_three_settings() {
        let mut config = Config::from_env();
        config.sendgrid_api_key = Some("sg-key".into());
        config.sender_email = Some("bot@example.com".into());
        config.recipient_email = None;
        assert!(!config.email_configured());

        config.recipient_email = Some("me@example.com".into());
        assert!(config.email_configured());
    }
}
