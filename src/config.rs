//! Run configuration, read from `TG_ROSTER_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default inter-identity politeness delay.
pub const DEFAULT_DELAY_SECS: u64 = 5;

/// Default flood-wait retry budget per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default report location.
pub const DEFAULT_REPORT_PATH: &str = "tg_roster_report.csv";

/// Default MTProto gateway endpoint (a locally running bot-api-style server).
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8081";

/// Tool configuration. Missing keys, malformed values, and missing input
/// files are all fatal before any identity is processed.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub api_id: i64,
    pub api_hash: SecretString,
    /// The operator account's own phone number.
    pub phone: String,
    /// Target group identifier, e.g. `@mygroup`.
    pub group: String,
    /// Invite link substituted into direct-message templates.
    pub invite_link: String,
    pub input_path: PathBuf,
    pub messages_path: PathBuf,
    pub report_path: PathBuf,
    pub api_base: String,
    /// Base delay between identities; a small random jitter is added on top.
    pub delay: Duration,
    /// Flood-wait retries allowed per call before the identity is abandoned.
    pub max_retries: u32,
}

impl RosterConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process
    /// environment. Split out so tests stay off global env state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str, hint: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingRequired {
                    key: key.into(),
                    hint: hint.into(),
                })
        };

        let api_id_raw = required("TG_ROSTER_API_ID", "Numeric application id from my.telegram.org.")?;
        let api_id: i64 = api_id_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "TG_ROSTER_API_ID".into(),
            message: format!("expected an integer, got '{api_id_raw}'"),
        })?;

        let api_hash = SecretString::from(required(
            "TG_ROSTER_API_HASH",
            "Application hash from my.telegram.org.",
        )?);
        let phone = required("TG_ROSTER_PHONE", "Operator account phone, e.g. +1234567890.")?;
        let group = required("TG_ROSTER_GROUP", "Target group username, e.g. @mygroup.")?;
        let invite_link = required(
            "TG_ROSTER_INVITE_LINK",
            "Group invite link substituted into direct messages.",
        )?;

        let input_path = PathBuf::from(required(
            "TG_ROSTER_INPUT",
            "Path to the roster CSV with a 'phone' column.",
        )?);
        if !input_path.exists() {
            return Err(ConfigError::MissingFile {
                key: "TG_ROSTER_INPUT".into(),
                path: input_path.display().to_string(),
            });
        }

        let messages_path = PathBuf::from(required(
            "TG_ROSTER_MESSAGES",
            "Path to the invite-message JSON array.",
        )?);
        if !messages_path.exists() {
            return Err(ConfigError::MissingFile {
                key: "TG_ROSTER_MESSAGES".into(),
                path: messages_path.display().to_string(),
            });
        }

        let report_path = lookup("TG_ROSTER_REPORT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));
        let api_base =
            lookup("TG_ROSTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let delay_secs = parse_optional(&lookup, "TG_ROSTER_DELAY_SECS", DEFAULT_DELAY_SECS)?;
        let max_retries = parse_optional(&lookup, "TG_ROSTER_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        Ok(Self {
            api_id,
            api_hash,
            phone,
            group,
            invite_link,
            input_path,
            messages_path,
            report_path,
            api_base,
            delay: Duration::from_secs(delay_secs),
            max_retries,
        })
    }
}

/// Parse an optional integer-valued key; present-but-malformed is fatal.
fn parse_optional<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("expected an integer, got '{raw}'"),
        }),
    }
}

// ── Invite messages ─────────────────────────────────────────────────

/// Invite templates for the direct-message fallback. Each template may
/// contain the `{invite_link}` placeholder; templates without it are sent
/// verbatim.
#[derive(Debug, Clone)]
pub struct InviteMessages {
    templates: Vec<String>,
}

impl InviteMessages {
    /// Load templates from a JSON array of strings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let templates: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::Messages(format!(
                "{} is not a JSON array of strings: {e}",
                path.display()
            ))
        })?;
        Self::from_templates(templates)
    }

    pub fn from_templates(templates: Vec<String>) -> Result<Self, ConfigError> {
        if templates.is_empty() {
            return Err(ConfigError::Messages("invite message set is empty".into()));
        }
        Ok(Self { templates })
    }

    /// Choose one template uniformly at random and substitute the invite link.
    pub fn pick<R: Rng>(&self, rng: &mut R, invite_link: &str) -> String {
        let template = &self.templates[rng.gen_range(0..self.templates.len())];
        template.trim().replace("{invite_link}", invite_link)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
