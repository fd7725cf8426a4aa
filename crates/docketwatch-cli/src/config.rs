//! `docketwatch.toml` loading and `DOCKETWATCH_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use docketwatch_host::{Cadence, OrchestratorConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "docketwatch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub schedule: ScheduleConfig,
    pub sweep: SweepConfig,
    pub server: ServerConfig,
    pub patent: RegistryConfig,
    pub trademark: RegistryConfig,
    pub crm: ServiceConfig,
    pub storage: ServiceConfig,
    pub notify: NotifyConfig,
    pub forms: ServiceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_minutes: u64,
    /// Local `HH:MM` times; when non-empty these replace the interval.
    pub daily_at: Vec<String>,
    /// Start the scheduler with `serve`.
    pub autostart: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            daily_at: Vec::new(),
            autostart: false,
        }
    }
}

impl ScheduleConfig {
    pub fn cadence(&self) -> anyhow::Result<Cadence> {
        if self.daily_at.is_empty() {
            return Ok(Cadence::every_minutes(self.interval_minutes));
        }
        Cadence::daily_at(&self.daily_at)
            .with_context(|| format!("invalid schedule.daily_at {:?}", self.daily_at))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub inter_matter_delay_ms: u64,
    pub form_timeout_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            inter_matter_delay_ms: 2_000,
            form_timeout_secs: 120,
        }
    }
}

impl SweepConfig {
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            inter_matter_delay: Duration::from_millis(self.inter_matter_delay_ms),
        }
    }

    pub fn form_timeout(&self) -> Duration {
        Duration::from_secs(self.form_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Required `X-Api-Key` value. Unset means no check.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            api_key: None,
        }
    }
}

/// A filing registry API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// A downstream collaborator. Left unset, its pipeline step is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: 30,
            from: "docketwatch@localhost".into(),
            to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl Config {
    /// Built-in registry endpoints for the empty `base_url`s.
    fn fill_registry_defaults(&mut self) {
        if self.patent.base_url.trim().is_empty() {
            self.patent.base_url = "https://api.uspto.gov".into();
        }
        if self.trademark.base_url.trim().is_empty() {
            self.trademark.base_url = "https://tsdrapi.uspto.gov".into();
        }
    }
}

/// Load `path` (or `docketwatch.toml`), then apply process environment
/// overrides. A missing file yields defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    let mut config = read_file(path)?.unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.fill_registry_defaults();
    Ok(config)
}

fn read_file(path: &Path) -> anyhow::Result<Option<Config>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    toml::from_str(&contents)
        .map(Some)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Apply `DOCKETWATCH_*` overrides read through `lookup`. Blank values are ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(dir) = get("DOCKETWATCH_DATA_DIR") {
        config.data.dir = PathBuf::from(dir);
    }
    if let Some(listen) = get("DOCKETWATCH_LISTEN") {
        config.server.listen = listen;
    }
    if let Some(key) = get("DOCKETWATCH_API_KEY") {
        config.server.api_key = Some(key);
    }
    if let Some(key) = get("DOCKETWATCH_PATENT_API_KEY") {
        config.patent.api_key = Some(key);
    }
    if let Some(key) = get("DOCKETWATCH_TRADEMARK_API_KEY") {
        config.trademark.api_key = Some(key);
    }
    if let Some(token) = get("DOCKETWATCH_CRM_TOKEN") {
        config.crm.token = Some(token);
    }
    if let Some(token) = get("DOCKETWATCH_STORAGE_TOKEN") {
        config.storage.token = Some(token);
    }
    if let Some(token) = get("DOCKETWATCH_NOTIFY_TOKEN") {
        config.notify.token = Some(token);
    }
    if let Some(token) = get("DOCKETWATCH_FORMS_TOKEN") {
        config.forms.token = Some(token);
    }
    if let Some(raw) = get("DOCKETWATCH_SCHEDULE_MINUTES") {
        match raw.parse::<u64>() {
            Ok(minutes) => config.schedule.interval_minutes = minutes,
            Err(err) => tracing::warn!(
                error = %err,
                value = %raw,
                "invalid DOCKETWATCH_SCHEDULE_MINUTES, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use tracing::{Dispatch, Level};
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = read_file(&tmp.path().join("nope.toml")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docketwatch.toml");
        std::fs::write(
            &path,
            r#"
[data]
dir = "/var/lib/docketwatch"

[schedule]
daily_at = ["08:00", "17:30"]
autostart = true

[crm]
base_url = "https://crm.example.com/api"
"#,
        )
        .unwrap();

        let config = read_file(&path).unwrap().unwrap();
        assert_eq!(config.data.dir, PathBuf::from("/var/lib/docketwatch"));
        assert!(config.schedule.autostart);
        assert_eq!(config.schedule.interval_minutes, 60);
        assert_eq!(config.crm.base_url.as_deref(), Some("https://crm.example.com/api"));
        assert_eq!(config.crm.timeout_secs, 30);
        assert_eq!(config.sweep, SweepConfig::default());
        assert!(matches!(config.schedule.cadence().unwrap(), Cadence::DailyAt(t) if t.len() == 2));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docketwatch.toml");
        std::fs::write(&path, "[schedule\ninterval_minutes = ").unwrap();
        let err = read_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("DOCKETWATCH_DATA_DIR", "/srv/dw"),
            ("DOCKETWATCH_API_KEY", "s3cret"),
            ("DOCKETWATCH_PATENT_API_KEY", "pk"),
            ("DOCKETWATCH_CRM_TOKEN", "  "),
            ("DOCKETWATCH_SCHEDULE_MINUTES", "15"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.data.dir, PathBuf::from("/srv/dw"));
        assert_eq!(config.server.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.patent.api_key.as_deref(), Some("pk"));
        assert_eq!(config.crm.token, None);
        assert_eq!(config.schedule.interval_minutes, 15);
    }

    #[test]
    fn invalid_env_number_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| {
            (k == "DOCKETWATCH_SCHEDULE_MINUTES").then(|| "often".to_string())
        });
        assert_eq!(config.schedule.interval_minutes, 60);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn invalid_env_number_logged_as_fields() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();

        tracing::dispatcher::with_default(&Dispatch::new(subscriber), || {
            let mut config = Config::default();
            apply_env_overrides(&mut config, |k| {
                (k == "DOCKETWATCH_SCHEDULE_MINUTES").then(|| "often".to_string())
            });
        });

        let out = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("invalid DOCKETWATCH_SCHEDULE_MINUTES, ignoring"));
        assert!(out.contains("error=invalid digit found in string"));
        assert!(out.contains("value=often"));
    }

    #[test]
    fn registry_defaults_filled() {
        let mut config = Config::default();
        config.trademark.base_url = "https://tsdr.test".into();
        config.fill_registry_defaults();
        assert_eq!(config.patent.base_url, "https://api.uspto.gov");
        assert_eq!(config.trademark.base_url, "https://tsdr.test");
    }

    #[test]
    fn bad_daily_time_rejected() {
        let schedule = ScheduleConfig {
            daily_at: vec!["8am".into()],
            ..ScheduleConfig::default()
        };
        assert!(schedule.cadence().is_err());
    }
}
