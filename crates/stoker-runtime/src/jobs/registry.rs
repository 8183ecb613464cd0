use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use stoker_core::job::{JobContext, JobFuture, JobInfo, StokerJob};
use stoker_core::{Result, StokerError};

/// Type alias for a boxed standard entry point.
pub type BoxedPerformHandler =
    Arc<dyn for<'a> Fn(&'a JobContext, Vec<Value>) -> JobFuture<'a> + Send + Sync>;

/// Type alias for a boxed class-level method dispatcher.
pub type BoxedCallHandler =
    Arc<dyn for<'a> Fn(&'a JobContext, &'a str, Vec<Value>) -> JobFuture<'a> + Send + Sync>;

/// Entry in the job registry.
pub struct JobEntry {
    /// Job metadata.
    pub info: JobInfo,
    /// Runs `perform` with positional args decoded into the job's `Args`.
    pub perform: BoxedPerformHandler,
    /// Runs a class-level method reached through an async proxy.
    pub call: BoxedCallHandler,
}

/// Registry of all Stoker job classes, keyed by wire class name.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Arc<JobEntry>>,
}

impl JobRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Register a job type. Registering the same name twice keeps the last one.
    pub fn register<J: StokerJob>(&mut self) {
        let info = J::info();
        let name = info.name.to_string();

        let perform: BoxedPerformHandler = Arc::new(perform_handler::<J>);
        let call: BoxedCallHandler = Arc::new(call_handler::<J>);

        self.jobs
            .insert(name, Arc::new(JobEntry { info, perform, call }));
    }

    /// Get a job entry by name.
    pub fn get(&self, name: &str) -> Option<Arc<JobEntry>> {
        self.jobs.get(name).cloned()
    }

    /// Get job info by name.
    pub fn info(&self, name: &str) -> Option<&JobInfo> {
        self.jobs.get(name).map(|e| &e.info)
    }

    /// Check if a job exists.
    pub fn exists(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Get all job names.
    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(|s| s.as_str())
    }

    /// Get the number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn perform_handler<J: StokerJob>(ctx: &JobContext, args: Vec<Value>) -> JobFuture<'_> {
    Box::pin(async move {
        let args: J::Args = decode_args(&ctx.class, args)?;
        J::perform(ctx, args).await
    })
}

fn call_handler<'a, J: StokerJob>(
    ctx: &'a JobContext,
    method: &'a str,
    args: Vec<Value>,
) -> JobFuture<'a> {
    J::call(ctx, method, args)
}

/// Decode positional wire args into a job's argument type.
///
/// The list is tried as a sequence first. Single-value and unit argument types
/// are also accepted from a one-element or empty list.
pub fn decode_args<T: DeserializeOwned>(class: &str, args: Vec<Value>) -> Result<T> {
    let fallback = match args.len() {
        0 => Some(Value::Null),
        1 => args.first().cloned(),
        _ => None,
    };

    match serde_json::from_value(Value::Array(args)) {
        Ok(parsed) => Ok(parsed),
        Err(seq_err) => fallback
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or_else(|| {
                StokerError::Deserialization(format!("bad arguments for {}: {}", class, seq_err))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    static LAST_SUM: AtomicI64 = AtomicI64::new(0);

    struct AddJob;

    impl StokerJob for AddJob {
        type Args = (i64, i64);

        fn info() -> JobInfo {
            JobInfo::new("AddJob").with_priority(100)
        }

        fn perform(_ctx: &JobContext, (x, y): Self::Args) -> JobFuture<'_> {
            Box::pin(async move {
                LAST_SUM.store(x + y, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn ctx() -> JobContext {
        JobContext::new(1, "AddJob", "stoker-jobs", 100, 300, 1)
    }

    #[test]
    fn test_empty_registry() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register() {
        let mut registry = JobRegistry::new();
        registry.register::<AddJob>();
        assert!(registry.exists("AddJob"));
        assert_eq!(registry.info("AddJob").map(|i| i.name), Some("AddJob"));
        assert_eq!(registry.job_names().collect::<Vec<_>>(), vec!["AddJob"]);
    }

    #[tokio::test]
    async fn test_perform_decodes_positional_args() {
        let mut registry = JobRegistry::new();
        registry.register::<AddJob>();
        let entry = registry.get("AddJob").unwrap();
        let ctx = ctx();

        (entry.perform)(&ctx, vec![Value::from(3), Value::from(4)])
            .await
            .unwrap();
        assert_eq!(LAST_SUM.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_perform_rejects_bad_args() {
        let mut registry = JobRegistry::new();
        registry.register::<AddJob>();
        let entry = registry.get("AddJob").unwrap();
        let ctx = ctx();

        let err = (entry.perform)(&ctx, vec![Value::from("three")])
            .await
            .unwrap_err();
        assert!(matches!(err, StokerError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_default_call_is_unknown_method() {
        let mut registry = JobRegistry::new();
        registry.register::<AddJob>();
        let entry = registry.get("AddJob").unwrap();
        let ctx = ctx();

        let err = (entry.call)(&ctx, "foo", vec![]).await.unwrap_err();
        assert!(
            matches!(err, StokerError::UnknownJobMethod { ref method, .. } if method == "foo")
        );
    }

    #[test]
    fn test_decode_args_shapes() {
        let pair: (i64, String) =
            decode_args("T", vec![Value::from(1), Value::from("a")]).unwrap();
        assert_eq!(pair, (1, "a".to_string()));

        let single: String = decode_args("T", vec![Value::from("only")]).unwrap();
        assert_eq!(single, "only");

        assert!(decode_args::<()>("T", vec![]).is_ok());

        let list: Vec<u32> = decode_args("T", vec![]).unwrap();
        assert!(list.is_empty());
    }
}
