// src/config.rs
// All environment access happens here, once, at startup. Components receive
// the resulting values as parameters and never read the environment
// themselves.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

const DEFAULT_ARK_BASE_URL: &str = "https://ark-ap-southeast.byteintl.net/api/v3";
const DEFAULT_ARK_MODEL: &str = "ep-20250831170629-d8d45";
const DEFAULT_DEADLINE_SECS: u64 = 600;
const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

/// Completion endpoint credentials. Present iff an API key was configured;
/// the enrichment stage treats absence as a hard error.
#[derive(Debug, Clone)]
pub struct ArkConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

/// Supabase REST endpoint. Mandatory: the crawler is pointless without a
/// place to persist.
#[derive(Debug, Clone)]
pub struct PersistConfig {
    pub base_url: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub persist: PersistConfig,
    pub ark: Option<ArkConfig>,
    /// Upper bound for one pipeline (ingest through persist).
    pub pipeline_deadline: Duration,
    pub sources_path: Option<PathBuf>,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env_nonempty("SUPABASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| anyhow!("SUPABASE_URL is not set"))?;
        let key = env_nonempty("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|| env_nonempty("SUPABASE_ANON_KEY"))
            .or_else(|| env_nonempty("NEXT_PUBLIC_SUPABASE_ANON_KEY"))
            .ok_or_else(|| anyhow!("missing SUPABASE service or anon key"))?;
        let persist = PersistConfig { base_url, key };

        let ark = env_nonempty("ARK_API_KEY").map(|api_key| ArkConfig {
            base_url: env_nonempty("ARK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ARK_BASE_URL.to_string()),
            model: env_nonempty("ARK_MODEL").unwrap_or_else(|| DEFAULT_ARK_MODEL.to_string()),
            api_key,
        });

        let pipeline_deadline = env_nonempty("CRAWLER_DEADLINE_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_DEADLINE_SECS));

        let sources_path = Some(PathBuf::from(
            env_nonempty("CRAWLER_SOURCES_PATH")
                .unwrap_or_else(|| DEFAULT_SOURCES_PATH.to_string()),
        ));

        Ok(Self {
            persist,
            ark,
            pipeline_deadline,
            sources_path,
        })
    }
}
