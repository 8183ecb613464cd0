use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use stoker_core::job::{EnqueueOptions, JobInfo, StokerJob};
use stoker_core::{resolve, Broker, JobId, JobPayload, Result, StokerConfig, StokerError};

use super::registry::JobRegistry;

/// Puts jobs on the broker.
#[derive(Clone)]
pub struct JobDispatcher {
    config: Arc<StokerConfig>,
    broker: Arc<dyn Broker>,
    registry: Arc<JobRegistry>,
}

impl JobDispatcher {
    /// Create a new job dispatcher.
    pub fn new(
        config: Arc<StokerConfig>,
        broker: Arc<dyn Broker>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            config,
            broker,
            registry,
        }
    }

    /// Configuration this dispatcher resolves against.
    pub fn config(&self) -> &StokerConfig {
        &self.config
    }

    /// Enqueue a job for its standard entry point.
    pub async fn enqueue<J: StokerJob>(
        &self,
        args: J::Args,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let info = J::info();
        let payload = JobPayload::new(info.name, direct_args(info.name, args)?);
        self.put_payload(&info, payload, &options).await
    }

    /// Enqueue job by class name (dynamic).
    pub async fn enqueue_by_name(
        &self,
        class: &str,
        args: impl Serialize,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let entry = self
            .registry
            .get(class)
            .ok_or_else(|| StokerError::UnknownJobClass(class.to_string()))?;

        let payload = JobPayload::new(entry.info.name, direct_args(entry.info.name, args)?);
        self.put_payload(&entry.info, payload, &options).await
    }

    /// Enqueue a call to a class-level method of `J`.
    ///
    /// The method name is not checked here; a worker reports unknown methods
    /// when it runs the job.
    pub async fn enqueue_async<J: StokerJob>(
        &self,
        method: &str,
        args: impl Serialize,
        options: EnqueueOptions,
    ) -> Result<JobId> {
        let info = J::info();
        self.put_method_call(&info, method, args, &options).await
    }

    /// Build a proxy that turns method calls on `J` into enqueued jobs.
    pub fn async_proxy<J: StokerJob>(&self, options: EnqueueOptions) -> AsyncProxy {
        AsyncProxy {
            dispatcher: self.clone(),
            info: J::info(),
            options,
        }
    }

    async fn put_method_call(
        &self,
        info: &JobInfo,
        method: &str,
        args: impl Serialize,
        options: &EnqueueOptions,
    ) -> Result<JobId> {
        let payload = JobPayload::method_call(info.name, method, wire_args(args)?);
        self.put_payload(info, payload, options).await
    }

    async fn put_payload(
        &self,
        info: &JobInfo,
        payload: JobPayload,
        options: &EnqueueOptions,
    ) -> Result<JobId> {
        let descriptor = resolve(&self.config, info, options)?;
        let tube = self.config.expand_tube_name(&descriptor.queue);
        let body = self.config.codec.serialize(&payload)?;

        let id = self
            .broker
            .put(
                &tube,
                body,
                descriptor.priority,
                descriptor.delay,
                descriptor.ttr,
            )
            .await?;

        tracing::debug!(
            job_id = %id,
            job_class = %info.name,
            tube = %tube,
            priority = descriptor.priority,
            delay = descriptor.delay,
            ttr = descriptor.ttr,
            "Job enqueued"
        );
        if self.config.logging.log_payloads {
            tracing::debug!(job_id = %id, args = ?payload.args, "Job payload");
        }

        Ok(id)
    }
}

/// Enqueues class-level method calls on one job class with fixed options.
///
/// # Example
///
/// ```ignore
/// let proxy = dispatcher.async_proxy::<ReportJob>(EnqueueOptions::new().ttr(100).queue("reports"));
/// proxy.invoke("rebuild", (2024, "q3")).await?;
/// ```
#[derive(Clone)]
pub struct AsyncProxy {
    dispatcher: JobDispatcher,
    info: JobInfo,
    options: EnqueueOptions,
}

impl AsyncProxy {
    /// Class the proxy enqueues for.
    pub fn class(&self) -> &'static str {
        self.info.name
    }

    /// Options applied to every invocation.
    pub fn options(&self) -> &EnqueueOptions {
        &self.options
    }

    /// Enqueue `method(args...)`.
    pub async fn invoke(&self, method: &str, args: impl Serialize) -> Result<JobId> {
        self.dispatcher
            .put_method_call(&self.info, method, args, &self.options)
            .await
    }
}

/// Turn call arguments into the positional list carried on the wire.
///
/// Sequences are used as-is, unit becomes an empty list and any other value a
/// one-element list.
fn wire_args(args: impl Serialize) -> Result<Vec<Value>> {
    match serde_json::to_value(args)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

/// Arguments for a standard entry point call.
///
/// A leading null marks an async proxy call on the wire, so a direct job
/// cannot start with one.
fn direct_args(class: &str, args: impl Serialize) -> Result<Vec<Value>> {
    let args = wire_args(args)?;
    if matches!(args.first(), Some(Value::Null)) {
        return Err(StokerError::InvalidArgument(format!(
            "first argument of {} is null, which workers read as an async call",
            class
        )));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stoker_core::job::{JobContext, JobFuture};
    use stoker_core::testing::RecordingBroker;
    use stoker_core::{assert_err_variant, assert_job_enqueued, assert_job_not_enqueued, JobCodec};

    struct TestJob;

    impl StokerJob for TestJob {
        type Args = (i64, i64);

        fn info() -> JobInfo {
            JobInfo::new("TestJob").with_priority(100)
        }

        fn perform(_ctx: &JobContext, _args: Self::Args) -> JobFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    struct TestPlainJob;

    impl StokerJob for TestPlainJob {
        type Args = (i64, i64);

        fn info() -> JobInfo {
            JobInfo::new("TestPlainJob").with_queue("test-plain")
        }

        fn perform(_ctx: &JobContext, _args: Self::Args) -> JobFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    struct TestLambdaQueueJob;

    impl StokerJob for TestLambdaQueueJob {
        type Args = ();

        fn info() -> JobInfo {
            JobInfo::new("TestLambdaQueueJob")
        }

        fn perform(_ctx: &JobContext, _args: Self::Args) -> JobFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    struct OptionalJob;

    impl StokerJob for OptionalJob {
        type Args = (Option<i64>, i64);

        fn info() -> JobInfo {
            JobInfo::new("OptionalJob")
        }

        fn perform(_ctx: &JobContext, _args: Self::Args) -> JobFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    fn dispatcher_with(config: StokerConfig) -> (JobDispatcher, Arc<RecordingBroker>) {
        let broker = Arc::new(RecordingBroker::new());
        let mut registry = JobRegistry::new();
        registry.register::<TestJob>();
        registry.register::<TestPlainJob>();
        registry.register::<OptionalJob>();
        let dispatcher = JobDispatcher::new(Arc::new(config), broker.clone(), Arc::new(registry));
        (dispatcher, broker)
    }

    fn dispatcher() -> (JobDispatcher, Arc<RecordingBroker>) {
        dispatcher_with(StokerConfig::default())
    }

    fn payload(broker: &RecordingBroker) -> JobPayload {
        broker.puts()[0].payload(&JobCodec::json()).unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_plain_job() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue::<TestPlainJob>((7, 9), EnqueueOptions::new())
            .await
            .unwrap();

        assert_job_enqueued!(broker, "test-plain", |put| put.priority == 65536
            && put.ttr == 300
            && put.delay == 0);
        let payload = payload(&broker);
        assert_eq!(payload.class, "TestPlainJob");
        assert_eq!(payload.args, vec![json!(7), json!(9)]);
    }

    #[tokio::test]
    async fn test_enqueue_uses_class_priority() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue::<TestJob>((3, 4), EnqueueOptions::new().ttr(100))
            .await
            .unwrap();

        assert_job_enqueued!(broker, "stoker-jobs", |put| put.priority == 100
            && put.ttr == 100);
    }

    #[tokio::test]
    async fn test_enqueue_call_priority_wins() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue::<TestJob>((3, 4), EnqueueOptions::new().priority(2000))
            .await
            .unwrap();
        dispatcher
            .enqueue::<TestJob>((3, 4), EnqueueOptions::new().priority("high"))
            .await
            .unwrap();

        let priorities: Vec<u32> = broker.puts().iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![2000, 0]);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_label_puts_nothing() {
        let (dispatcher, broker) = dispatcher();
        let result = dispatcher
            .enqueue::<TestJob>((3, 4), EnqueueOptions::new().priority("urgent"))
            .await;

        assert_err_variant!(result, StokerError::UnknownPriorityLabel(_));
        assert!(broker.puts().is_empty());
    }

    #[tokio::test]
    async fn test_call_queue_beats_class_queue() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue::<TestPlainJob>((1, 2), EnqueueOptions::new().queue("test.bar").priority(5000))
            .await
            .unwrap();

        assert_job_enqueued!(broker, "test.bar", |put| put.priority == 5000);
        assert_job_not_enqueued!(broker, "test-plain");
    }

    #[tokio::test]
    async fn test_computed_queue() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue::<TestLambdaQueueJob>(
                (),
                EnqueueOptions::new().queue_with(|info| format!("lambda-{}", info.name)),
            )
            .await
            .unwrap();

        assert_job_enqueued!(broker, "lambda-TestLambdaQueueJob");
        assert!(payload(&broker).args.is_empty());
    }

    #[tokio::test]
    async fn test_namespace_applied_to_tube() {
        let mut config = StokerConfig::default();
        config.tube_namespace = Some("app".into());
        let (dispatcher, broker) = dispatcher_with(config);

        dispatcher
            .enqueue::<TestPlainJob>((1, 2), EnqueueOptions::new())
            .await
            .unwrap();
        assert_job_enqueued!(broker, "app.test-plain");
    }

    #[tokio::test]
    async fn test_enqueue_by_name() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue_by_name("TestJob", json!([5, 6]), EnqueueOptions::new())
            .await
            .unwrap();
        assert_eq!(payload(&broker).args, vec![json!(5), json!(6)]);

        let result = dispatcher
            .enqueue_by_name("MissingJob", (), EnqueueOptions::new())
            .await;
        assert_err_variant!(result, StokerError::UnknownJobClass(_));
    }

    #[tokio::test]
    async fn test_leading_null_rejected_for_direct_jobs() {
        let (dispatcher, broker) = dispatcher();

        let result = dispatcher
            .enqueue::<OptionalJob>((None, 5), EnqueueOptions::new())
            .await;
        assert_err_variant!(result, StokerError::InvalidArgument(_));

        let result = dispatcher
            .enqueue_by_name("OptionalJob", json!([null, 5]), EnqueueOptions::new())
            .await;
        assert_err_variant!(result, StokerError::InvalidArgument(_));
        assert!(broker.puts().is_empty());

        dispatcher
            .enqueue::<OptionalJob>((Some(1), 5), EnqueueOptions::new())
            .await
            .unwrap();
        assert_eq!(payload(&broker).args, vec![json!(1), json!(5)]);
    }

    #[tokio::test]
    async fn test_async_proxy() {
        let (dispatcher, broker) = dispatcher();
        let proxy =
            dispatcher.async_proxy::<TestJob>(EnqueueOptions::new().ttr(100).queue("bar.baz.foo"));
        assert_eq!(proxy.class(), "TestJob");

        proxy.invoke("foo", (10, 5)).await.unwrap();

        assert_job_enqueued!(broker, "bar.baz.foo", |put| put.ttr == 100
            && put.priority == 100);
        let payload = payload(&broker);
        assert_eq!(payload.class, "TestJob");
        assert_eq!(payload.args, vec![json!(null), json!("foo"), json!(10), json!(5)]);
    }

    #[tokio::test]
    async fn test_enqueue_async_single_arg() {
        let (dispatcher, broker) = dispatcher();
        dispatcher
            .enqueue_async::<TestJob>("notify", "ops@example.com", EnqueueOptions::new())
            .await
            .unwrap();

        assert_eq!(
            payload(&broker).args,
            vec![json!(null), json!("notify"), json!("ops@example.com")]
        );
    }

    #[tokio::test]
    async fn test_enqueue_not_connected() {
        let broker = Arc::new(RecordingBroker::disconnected());
        let dispatcher = JobDispatcher::new(
            Arc::new(StokerConfig::default()),
            broker.clone(),
            Arc::new(JobRegistry::new()),
        );

        let result = dispatcher
            .enqueue::<TestJob>((1, 2), EnqueueOptions::new())
            .await;
        assert_err_variant!(result, StokerError::ConnectionNotEstablished);
    }

    #[tokio::test]
    async fn test_enqueue_with_binary_codec() {
        let config = StokerConfig::default().with_codec(JobCodec::binary());
        let (dispatcher, broker) = dispatcher_with(config);
        dispatcher
            .enqueue::<TestJob>((3, 4), EnqueueOptions::new())
            .await
            .unwrap();

        let put = &broker.puts()[0];
        assert!(put.payload(&JobCodec::json()).is_err());
        let payload = put.payload(&JobCodec::binary()).unwrap();
        assert_eq!(payload.args, vec![json!(3), json!(4)]);
    }

    #[test]
    fn test_wire_args() {
        assert_eq!(wire_args((1, "a")).unwrap(), vec![json!(1), json!("a")]);
        assert_eq!(wire_args(()).unwrap(), Vec::<Value>::new());
        assert_eq!(wire_args("x").unwrap(), vec![json!("x")]);
        assert_eq!(
            wire_args(json!({"k": 1})).unwrap(),
            vec![json!({"k": 1})]
        );
    }
}
