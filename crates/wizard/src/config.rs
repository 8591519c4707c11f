use std::path::PathBuf;
use std::time::Duration;

use gatherly_core::wizard::CompletedStepPolicy;

/// Configuration error naming the offending variable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Wizard runtime configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Directory holding draft files (default: `.gatherly/drafts`).
    pub draft_dir: PathBuf,
    /// Storage key of the draft slot (default: `event-creation-draft`).
    pub draft_key: String,
    /// Quiet period before an autosave write (default: `1000` ms).
    pub autosave_debounce: Duration,
    /// Base URL of the events API (default: `http://localhost:3000/api/v1`).
    pub events_api_url: String,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Analytics webhook; forwarding is off when unset.
    pub analytics_webhook_url: Option<String>,
    pub completed_step_policy: CompletedStepPolicy,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            draft_dir: PathBuf::from(".gatherly/drafts"),
            draft_key: "event-creation-draft".to_string(),
            autosave_debounce: Duration::from_millis(1000),
            events_api_url: "http://localhost:3000/api/v1".to_string(),
            request_timeout_secs: 30,
            analytics_webhook_url: None,
            completed_step_policy: CompletedStepPolicy::Sticky,
        }
    }
}

impl WizardConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                        |
    /// |-------------------------|--------------------------------|
    /// | `DRAFT_DIR`             | `.gatherly/drafts`             |
    /// | `DRAFT_KEY`             | `event-creation-draft`         |
    /// | `AUTOSAVE_DEBOUNCE_MS`  | `1000`                         |
    /// | `EVENTS_API_URL`        | `http://localhost:3000/api/v1` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                           |
    /// | `ANALYTICS_WEBHOOK_URL` | unset                          |
    /// | `COMPLETED_STEP_POLICY` | `sticky`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let draft_dir = get("DRAFT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.draft_dir);

        let draft_key = match get("DRAFT_KEY") {
            Some(key) if is_valid_key(&key) => key,
            Some(key) => {
                return Err(ConfigError::Invalid {
                    var: "DRAFT_KEY",
                    expected: "non-empty and limited to [A-Za-z0-9_-]",
                    value: key,
                })
            }
            None => defaults.draft_key,
        };

        let autosave_debounce = match get("AUTOSAVE_DEBOUNCE_MS") {
            Some(v) => Duration::from_millis(v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "AUTOSAVE_DEBOUNCE_MS",
                expected: "a valid u64",
                value: v.clone(),
            })?),
            None => defaults.autosave_debounce,
        };

        let events_api_url = get("EVENTS_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.events_api_url);

        let request_timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                expected: "a valid u64",
                value: v.clone(),
            })?,
            None => defaults.request_timeout_secs,
        };

        let analytics_webhook_url = get("ANALYTICS_WEBHOOK_URL");

        let completed_step_policy = match get("COMPLETED_STEP_POLICY") {
            Some(v) => CompletedStepPolicy::from_str_value(v.trim()).map_err(|_| {
                ConfigError::Invalid {
                    var: "COMPLETED_STEP_POLICY",
                    expected: "one of: sticky, revalidate",
                    value: v.clone(),
                }
            })?,
            None => defaults.completed_step_policy,
        };

        Ok(Self {
            draft_dir,
            draft_key,
            autosave_debounce,
            events_api_url,
            request_timeout_secs,
            analytics_webhook_url,
            completed_step_policy,
        })
    }
}

impl WizardConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Draft keys become file names, so they are restricted to `[A-Za-z0-9_-]`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
