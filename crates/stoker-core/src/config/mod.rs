mod logging;

pub use logging::LoggingConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::codec::JobCodec;
use crate::error::{Result, StokerError};
use crate::job::{JobContext, Priority};

/// Callback invoked with every error a worker reports for a single job.
#[derive(Clone)]
pub struct ErrorHook(Arc<dyn Fn(&StokerError, Option<&JobContext>) + Send + Sync>);

impl ErrorHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&StokerError, Option<&JobContext>) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, error: &StokerError, ctx: Option<&JobContext>) {
        (self.0)(error, ctx)
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHook(..)")
    }
}

/// What a worker does with a job whose payload cannot be dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterPolicy {
    /// Keep it on the broker, out of the ready queue.
    #[default]
    Bury,
    /// Drop it.
    Delete,
}

/// Root configuration for Stoker.
///
/// Built once at startup and shared by dispatchers and workers. The codec and
/// error hook are not part of the TOML surface and are set in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StokerConfig {
    /// Queue used when neither the call nor the job class names one.
    #[serde(default = "default_primary_queue")]
    pub primary_queue: String,

    /// Tubes a worker watches when it is not told otherwise.
    #[serde(default)]
    pub default_queues: Vec<String>,

    /// Priority used when neither the call nor the job class sets one.
    #[serde(default = "default_priority")]
    pub default_priority: u32,

    /// Time-to-run in seconds used when neither the call nor the job class sets one.
    #[serde(default = "default_respond_timeout")]
    pub default_respond_timeout: u32,

    /// Named priorities.
    #[serde(default = "default_priority_labels")]
    pub priority_labels: HashMap<String, u32>,

    /// Prefix applied to every tube name on the broker.
    #[serde(default)]
    pub tube_namespace: Option<String>,

    /// Separator between namespace and tube name.
    #[serde(default = "default_namespace_separator")]
    pub namespace_separator: String,

    /// How long a reservation blocks before giving up. `None` blocks forever.
    #[serde(default)]
    pub reserve_timeout_secs: Option<u64>,

    /// Times a failing job is released back before it gets buried.
    #[serde(default)]
    pub max_job_retries: u32,

    /// Minimum delay in seconds before a released job runs again.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u32,

    /// Handling of jobs that cannot be parsed or resolved.
    #[serde(default)]
    pub dead_letter: DeadLetterPolicy,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Payload serializer/parser pair.
    #[serde(skip)]
    pub codec: JobCodec,

    /// Error reporting callback.
    #[serde(skip)]
    pub on_error: Option<ErrorHook>,
}

impl Default for StokerConfig {
    fn default() -> Self {
        Self {
            primary_queue: default_primary_queue(),
            default_queues: Vec::new(),
            default_priority: default_priority(),
            default_respond_timeout: default_respond_timeout(),
            priority_labels: default_priority_labels(),
            tube_namespace: None,
            namespace_separator: default_namespace_separator(),
            reserve_timeout_secs: None,
            max_job_retries: 0,
            retry_delay_secs: default_retry_delay(),
            dead_letter: DeadLetterPolicy::default(),
            logging: LoggingConfig::default(),
            codec: JobCodec::default(),
            on_error: None,
        }
    }
}

impl StokerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StokerError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content)?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| StokerError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the TOML schema cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.primary_queue.trim().is_empty() {
            return Err(StokerError::Config("primary_queue must not be empty".into()));
        }
        if self.namespace_separator.is_empty() {
            return Err(StokerError::Config(
                "namespace_separator must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Replace the payload codec.
    pub fn with_codec(mut self, codec: JobCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Install an error reporting callback.
    pub fn with_on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    /// Set the tubes workers watch by default.
    pub fn with_default_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_queues = queues.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve a priority against the label table.
    pub fn priority_value(&self, priority: &Priority) -> Result<u32> {
        priority.resolve(&self.priority_labels)
    }

    /// Broker-side tube name for a logical queue name.
    pub fn expand_tube_name(&self, name: &str) -> String {
        match self.tube_namespace.as_deref() {
            Some(ns) if !ns.is_empty() => {
                let prefix = format!("{}{}", ns, self.namespace_separator);
                if name.starts_with(&prefix) {
                    name.to_string()
                } else {
                    format!("{}{}", prefix, name)
                }
            }
            _ => name.to_string(),
        }
    }

    /// Delay before a failed job runs again, growing with the retry count.
    pub fn retry_delay_for(&self, retries: u32) -> u32 {
        self.retry_delay_secs
            .saturating_add(retries.saturating_pow(3))
    }

    /// Reservation timeout as a duration.
    pub fn reserve_timeout(&self) -> Option<std::time::Duration> {
        self.reserve_timeout_secs.map(std::time::Duration::from_secs)
    }
}

fn default_primary_queue() -> String {
    "stoker-jobs".to_string()
}

fn default_priority() -> u32 {
    65536
}

fn default_respond_timeout() -> u32 {
    300
}

fn default_priority_labels() -> HashMap<String, u32> {
    HashMap::from([
        ("high".to_string(), 0),
        ("medium".to_string(), 100),
        ("low".to_string(), 200),
    ])
}

fn default_namespace_separator() -> String {
    ".".to_string()
}

fn default_retry_delay() -> u32 {
    5
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| StokerError::Config(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => result = result.replace(&cap[0], &value),
            Err(_) => tracing::warn!(var = var_name, "Config references unset environment variable"),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StokerConfig::default();
        assert_eq!(config.primary_queue, "stoker-jobs");
        assert_eq!(config.default_priority, 65536);
        assert_eq!(config.default_respond_timeout, 300);
        assert_eq!(config.priority_labels.get("high"), Some(&0));
        assert!(config.default_queues.is_empty());
        assert_eq!(config.codec.name(), "json");
        assert_eq!(config.dead_letter, DeadLetterPolicy::Bury);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = StokerConfig::parse_toml("").unwrap();
        assert_eq!(config.primary_queue, "stoker-jobs");
        assert_eq!(config.namespace_separator, ".");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            primary_queue = "app-jobs"
            default_queues = ["mailer", "reports"]
            default_priority = 1000
            default_respond_timeout = 120
            tube_namespace = "myapp.jobs"
            reserve_timeout_secs = 5
            max_job_retries = 3
            retry_delay_secs = 10
            dead_letter = "delete"

            [priority_labels]
            urgent = 1
            later = 5000

            [logging]
            level = "debug"
        "#;

        let config = StokerConfig::parse_toml(toml).unwrap();
        assert_eq!(config.primary_queue, "app-jobs");
        assert_eq!(config.default_queues, vec!["mailer", "reports"]);
        assert_eq!(config.default_priority, 1000);
        assert_eq!(config.default_respond_timeout, 120);
        assert_eq!(config.priority_labels.get("urgent"), Some(&1));
        assert_eq!(config.priority_labels.get("high"), None);
        assert_eq!(config.reserve_timeout_secs, Some(5));
        assert_eq!(config.max_job_retries, 3);
        assert_eq!(config.dead_letter, DeadLetterPolicy::Delete);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_reject_empty_primary_queue() {
        let err = StokerConfig::parse_toml(r#"primary_queue = " ""#).unwrap_err();
        assert!(matches!(err, StokerError::Config(_)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("STOKER_TEST_PRIMARY_QUEUE", "from-env");

        let toml = r#"
            primary_queue = "${STOKER_TEST_PRIMARY_QUEUE}"
        "#;

        let config = StokerConfig::parse_toml(toml).unwrap();
        assert_eq!(config.primary_queue, "from-env");

        std::env::remove_var("STOKER_TEST_PRIMARY_QUEUE");
    }

    #[test]
    fn test_expand_tube_name() {
        let mut config = StokerConfig::default();
        assert_eq!(config.expand_tube_name("test-plain"), "test-plain");

        config.tube_namespace = Some("stoker.worker.queue".into());
        assert_eq!(
            config.expand_tube_name("test-plain"),
            "stoker.worker.queue.test-plain"
        );
        assert_eq!(
            config.expand_tube_name("stoker.worker.queue.test-plain"),
            "stoker.worker.queue.test-plain"
        );
    }

    #[test]
    fn test_retry_delay_grows() {
        let config = StokerConfig::default();
        assert_eq!(config.retry_delay_for(0), 5);
        assert_eq!(config.retry_delay_for(1), 6);
        assert_eq!(config.retry_delay_for(3), 32);
        assert_eq!(config.retry_delay_for(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_priority_value() {
        let config = StokerConfig::default();
        assert_eq!(config.priority_value(&Priority::from("medium")).unwrap(), 100);
        assert!(config.priority_value(&Priority::from("nope")).is_err());
    }

    #[test]
    fn test_error_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let config = StokerConfig::default().with_on_error(ErrorHook::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let hook = config.on_error.clone().unwrap();
        hook.call(&StokerError::job("boom"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
