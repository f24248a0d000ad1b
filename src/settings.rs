use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Runtime settings, loaded from the environment with a `.env` overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub backend: BackendSettings,
    pub runs: RunSettings,
    pub sequencer: SequencerSettings,
    pub paths: PathSettings,
    pub admins: AdminSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    /// Minimum gap between remote configuration checks.
    pub config_check_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Hard per-attempt deadline for one run.
    pub max_run_time: Duration,
    /// Retries after a terminal-but-retryable status.
    pub max_retries: u32,
    /// Gap between status polls.
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerSettings {
    /// Pause between dequeues of the same user's messages.
    pub pacing: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    pub sessions: PathBuf,
    pub ignore_list: PathBuf,
    pub moderators: PathBuf,
    pub delivery: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    /// Ordered administrator identities; escalations notify each in turn.
    pub numbers: Vec<String>,
}

impl Settings {
    /// Load settings from the process environment, reading `.env` first
    /// when present. Missing keys fall back to defaults; only the backend
    /// credentials are required.
    pub fn from_env() -> anyhow::Result<Self> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded .env from working directory");
        }

        let data_dir = PathBuf::from(var_or("DESKBOT_DATA_DIR", "./data"));

        Ok(Self {
            backend: BackendSettings {
                api_key: env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY is not set"))?,
                assistant_id: env::var("OPENAI_ASSISTANT_ID")
                    .map_err(|_| anyhow::anyhow!("OPENAI_ASSISTANT_ID is not set"))?,
                base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                config_check_interval: Duration::from_secs(var_parsed(
                    "DESKBOT_CONFIG_CHECK_SECS",
                    300,
                )),
            },
            runs: RunSettings {
                max_run_time: Duration::from_millis(var_parsed("DESKBOT_MAX_RUN_MS", 30_000)),
                max_retries: var_parsed("DESKBOT_MAX_RETRIES", 3),
                poll_interval: Duration::from_millis(var_parsed("DESKBOT_POLL_MS", 1_000)),
            },
            sequencer: SequencerSettings {
                pacing: Duration::from_millis(var_parsed("DESKBOT_PACING_MS", 1_000)),
            },
            paths: PathSettings {
                sessions: data_dir.join("user_sessions.json"),
                ignore_list: data_dir.join("ignore_list.json"),
                moderators: data_dir.join("moderators.json"),
                delivery: data_dir.join("delivery_data.json"),
            },
            admins: AdminSettings {
                numbers: parse_admin_numbers(&var_or("ADMIN_NUMBERS", "")),
            },
        })
    }
}

fn parse_admin_numbers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn var_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
