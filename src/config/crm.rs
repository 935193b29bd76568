// src/config/crm.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "CRM_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/crm.toml";

fn default_scrape_timeout() -> u64 {
    120
}
fn default_calendar_timeout() -> u64 {
    10
}
fn default_calendar_id() -> String {
    "primary".to_string()
}
fn default_calendar_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}
fn default_session_ttl() -> i64 {
    24
}

/// Runtime configuration. Every field has a default so an empty file (or no
/// file at all) yields a working local setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrmConfig {
    /// Email granted blanket write/delete override on every lead.
    #[serde(default)]
    pub admin_email: Option<String>,
    /// JSON snapshot file backing the store; `None` keeps everything in memory.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub webhook_url: Option<String>,
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_scrape_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Calendar API base, e.g. `https://www.googleapis.com/calendar/v3`.
    #[serde(default = "default_calendar_base")]
    pub base_url: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// OAuth access token. Without it calendar notifications are disabled.
    pub access_token: Option<String>,
    #[serde(default = "default_calendar_timeout")]
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: default_calendar_base(),
            calendar_id: default_calendar_id(),
            access_token: None,
            timeout_secs: default_calendar_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
    pub bootstrap_hr_email: Option<String>,
    pub bootstrap_hr_name: Option<String>,
    /// Prefer `CRM_BOOTSTRAP_HR_PASSWORD` over putting this in the file.
    pub bootstrap_hr_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
            bootstrap_hr_email: None,
            bootstrap_hr_name: None,
            bootstrap_hr_password: None,
        }
    }
}

impl CrmConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading CRM config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Resolution order:
    /// 1) $CRM_CONFIG_PATH (must exist)
    /// 2) config/crm.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_str("CRM_ADMIN_EMAIL") {
            self.admin_email = Some(v);
        }
        if let Some(v) = env_str("CRM_SNAPSHOT_PATH") {
            self.snapshot_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_str("CRM_SCRAPE_WEBHOOK_URL") {
            self.scrape.webhook_url = Some(v);
        }
        if let Some(v) = env_parse("CRM_SCRAPE_TIMEOUT_SECS")? {
            self.scrape.timeout_secs = v;
        }
        if let Some(v) = env_str("CRM_CALENDAR_URL") {
            self.calendar.base_url = v;
        }
        if let Some(v) = env_str("CRM_CALENDAR_TOKEN") {
            self.calendar.access_token = Some(v);
        }
        if let Some(v) = env_str("CRM_CALENDAR_ID") {
            self.calendar.calendar_id = v;
        }
        if let Some(v) = env_parse("CRM_CALENDAR_TIMEOUT_SECS")? {
            self.calendar.timeout_secs = v;
        }
        if let Some(v) = env_parse("CRM_SESSION_TTL_HOURS")? {
            self.auth.session_ttl_hours = v;
        }
        if let Some(v) = env_str("CRM_BOOTSTRAP_HR_EMAIL") {
            self.auth.bootstrap_hr_email = Some(v);
        }
        if let Some(v) = env_str("CRM_BOOTSTRAP_HR_NAME") {
            self.auth.bootstrap_hr_name = Some(v);
        }
        if let Some(v) = env_str("CRM_BOOTSTRAP_HR_PASSWORD") {
            self.auth.bootstrap_hr_password = Some(v);
        }

        // A zero timeout would make every upstream call fail instantly.
        self.scrape.timeout_secs = self.scrape.timeout_secs.max(1);
        self.calendar.timeout_secs = self.calendar.timeout_secs.max(1);
        self.auth.session_ttl_hours = self.auth.session_ttl_hours.max(1);
        Ok(())
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_str(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{name} has an invalid value: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    const OVERRIDES: &[&str] = &[
        "CRM_ADMIN_EMAIL",
        "CRM_SNAPSHOT_PATH",
        "CRM_SCRAPE_WEBHOOK_URL",
        "CRM_SCRAPE_TIMEOUT_SECS",
        "CRM_CALENDAR_URL",
        "CRM_CALENDAR_TOKEN",
        "CRM_CALENDAR_ID",
        "CRM_CALENDAR_TIMEOUT_SECS",
        "CRM_SESSION_TTL_HOURS",
        "CRM_BOOTSTRAP_HR_EMAIL",
        "CRM_BOOTSTRAP_HR_NAME",
        "CRM_BOOTSTRAP_HR_PASSWORD",
    ];

    fn clear_env() {
        env::remove_var(ENV_CONFIG_PATH);
        for k in OVERRIDES {
            env::remove_var(k);
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: CrmConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.scrape.timeout_secs, 120);
        assert_eq!(cfg.calendar.calendar_id, "primary");
        assert_eq!(cfg.auth.session_ttl_hours, 24);
        assert!(cfg.admin_email.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn env_path_then_overrides() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("crm.toml");
        fs::write(
            &p,
            r#"
admin_email = "file@example.com"

[scrape]
webhook_url = "http://localhost:5678/webhook/lead-gen"
timeout_secs = 90
"#,
        )
        .unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("CRM_ADMIN_EMAIL", "env@example.com");
        env::set_var("CRM_CALENDAR_TIMEOUT_SECS", "0");

        let cfg = CrmConfig::load_default().unwrap();
        assert_eq!(cfg.admin_email.as_deref(), Some("env@example.com"));
        assert_eq!(cfg.scrape.timeout_secs, 90);
        assert_eq!(
            cfg.scrape.webhook_url.as_deref(),
            Some("http://localhost:5678/webhook/lead-gen")
        );
        assert_eq!(cfg.calendar.timeout_secs, 1);
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/crm.toml");
        assert!(CrmConfig::load_default().is_err());
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn bad_numeric_override_is_an_error() {
        clear_env();
        env::set_var("CRM_SCRAPE_TIMEOUT_SECS", "soon");
        let mut cfg = CrmConfig::default();
        assert!(cfg.apply_env_overrides().is_err());
        clear_env();
    }
}
