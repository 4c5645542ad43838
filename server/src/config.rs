use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::FixedOffset;

use crate::{auth::AuthConfig, insights::GeneratorSettings};

const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;
const DEFAULT_GENAI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GENAI_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub cors_allowed_origins: Vec<String>,
    pub generator: GeneratorSettings,
    /// Offset used to decide where "today" starts on the dashboard.
    pub dashboard_offset: FixedOffset,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = var("AUTH_SECRET_BASE64").context("AUTH_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(secret.trim())
            .context("invalid AUTH_SECRET_BASE64")?;
        if secret_bytes.len() < 32 {
            return Err(anyhow!(
                "AUTH_SECRET_BASE64 must decode to at least 32 bytes"
            ));
        }

        let session_ttl_minutes = match var("SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .context("SESSION_TTL_MINUTES must be an integer")?,
            None => DEFAULT_SESSION_TTL_MINUTES,
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let generator = GeneratorSettings {
            endpoint: var("GENAI_ENDPOINT").unwrap_or_else(|| DEFAULT_GENAI_ENDPOINT.into()),
            api_key: var("GENAI_API_KEY"),
            model: var("GENAI_MODEL").unwrap_or_else(|| DEFAULT_GENAI_MODEL.into()),
        };

        let offset_minutes = match var("DASHBOARD_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .context("DASHBOARD_UTC_OFFSET_MINUTES must be an integer")?,
            None => 0,
        };
        let dashboard_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("DASHBOARD_UTC_OFFSET_MINUTES out of range"))?;

        Ok(Self {
            auth: AuthConfig::new(secret_bytes, session_ttl_minutes),
            cors_allowed_origins,
            generator,
            dashboard_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

    #[test]
    fn applies_defaults() {
        let config = load(&[("AUTH_SECRET_BASE64", SECRET)]).unwrap();
        assert_eq!(config.auth.session_ttl_minutes, 60);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.generator.model, DEFAULT_GENAI_MODEL);
        assert_eq!(config.generator.api_key, None);
        assert_eq!(config.dashboard_offset.local_minus_utc(), 0);
    }

    #[test]
    fn parses_overrides() {
        let config = load(&[
            ("AUTH_SECRET_BASE64", SECRET),
            ("SESSION_TTL_MINUTES", "15"),
            ("CORS_ALLOWED_ORIGINS", "https://a.test, ,https://b.test"),
            ("DASHBOARD_UTC_OFFSET_MINUTES", "-300"),
            ("GENAI_API_KEY", "k"),
        ])
        .unwrap();
        assert_eq!(config.auth.session_ttl_minutes, 15);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.test", "https://b.test"]
        );
        assert_eq!(config.dashboard_offset.local_minus_utc(), -300 * 60);
        assert_eq!(config.generator.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn rejects_missing_or_short_secret() {
        assert!(load(&[]).is_err());
        let short = load(&[("AUTH_SECRET_BASE64", "c2hvcnQ=")]).unwrap_err();
        assert!(short.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        for raw in ["2147483647", "-2147483648", "1440"] {
            let err = load(&[
                ("AUTH_SECRET_BASE64", SECRET),
                ("DASHBOARD_UTC_OFFSET_MINUTES", raw),
            ])
            .unwrap_err();
            assert!(err.to_string().contains("out of range"), "{raw}: {err}");
        }
    }
}
