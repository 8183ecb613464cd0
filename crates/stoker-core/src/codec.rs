//! Job payloads and the pluggable serializer/parser pair.
//!
//! A payload is always `{class, args}`. How it looks on the wire is decided by
//! the [`JobCodec`] held in the configuration; workers and dispatchers never
//! look at raw bytes themselves.

use std::fmt;
use std::sync::Arc;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Result, StokerError};

/// Logical wire body of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Job class name.
    pub class: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

/// What a parsed payload asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Invocation<'a> {
    /// Run the class's standard entry point with the full argument list.
    Perform(&'a [Value]),
    /// Call a class-level method, enqueued through an async proxy.
    Method { name: &'a str, args: &'a [Value] },
}

impl JobPayload {
    /// Payload for a direct enqueue.
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            args,
        }
    }

    /// Payload for an async proxy call: `[null, method, ...args]`.
    pub fn method_call(class: impl Into<String>, method: &str, args: Vec<Value>) -> Self {
        let mut wire_args = Vec::with_capacity(args.len() + 2);
        wire_args.push(Value::Null);
        wire_args.push(Value::String(method.to_string()));
        wire_args.extend(args);
        Self::new(class, wire_args)
    }

    /// Work out how this payload should be invoked.
    ///
    /// A leading null marks an async proxy call; the method name must follow it.
    pub fn invocation(&self) -> Result<Invocation<'_>> {
        match self.args.first() {
            Some(Value::Null) => match self.args.get(1) {
                Some(Value::String(name)) => Ok(Invocation::Method {
                    name,
                    args: &self.args[2..],
                }),
                _ => Err(StokerError::Deserialization(format!(
                    "async payload for {} has no method name",
                    self.class
                ))),
            },
            _ => Ok(Invocation::Perform(&self.args)),
        }
    }
}

/// Serializer half of a codec.
pub type SerializeFn = Arc<dyn Fn(&JobPayload) -> Result<Vec<u8>> + Send + Sync>;

/// Parser half of a codec.
pub type ParseFn = Arc<dyn Fn(&[u8]) -> Result<JobPayload> + Send + Sync>;

/// A serializer/parser pair. Both halves must agree on the format.
#[derive(Clone)]
pub struct JobCodec {
    name: &'static str,
    serializer: SerializeFn,
    parser: ParseFn,
}

impl JobCodec {
    /// Build a codec from two functions.
    pub fn new<S, P>(name: &'static str, serializer: S, parser: P) -> Self
    where
        S: Fn(&JobPayload) -> Result<Vec<u8>> + Send + Sync + 'static,
        P: Fn(&[u8]) -> Result<JobPayload> + Send + Sync + 'static,
    {
        Self {
            name,
            serializer: Arc::new(serializer),
            parser: Arc::new(parser),
        }
    }

    /// JSON with `"class"` and `"args"` string keys. The default.
    pub fn json() -> Self {
        Self::new(
            "json",
            |payload| Ok(serde_json::to_vec(payload)?),
            |body| {
                serde_json::from_slice(body).map_err(|e| StokerError::Deserialization(e.to_string()))
            },
        )
    }

    /// Compact bincode encoding. Fields are positional, there are no keys at all.
    pub fn binary() -> Self {
        Self::new(
            "bincode",
            |payload| {
                let wire = WirePayload::from(payload);
                Ok(bincode::encode_to_vec(&wire, bincode::config::standard())?)
            },
            |body| {
                let (wire, _): (WirePayload, usize) =
                    bincode::decode_from_slice(body, bincode::config::standard())?;
                Ok(wire.into())
            },
        )
    }

    /// Codec name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Serialize a payload.
    pub fn serialize(&self, payload: &JobPayload) -> Result<Vec<u8>> {
        (self.serializer)(payload)
    }

    /// Parse a payload.
    pub fn parse(&self, body: &[u8]) -> Result<JobPayload> {
        (self.parser)(body)
    }
}

impl Default for JobCodec {
    fn default() -> Self {
        Self::json()
    }
}

impl fmt::Debug for JobCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCodec").field("name", &self.name).finish()
    }
}

#[derive(Encode, Decode)]
struct WirePayload {
    class: String,
    args: Vec<WireValue>,
}

#[derive(Encode, Decode)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<WireValue>),
    Map(Vec<(String, WireValue)>),
}

impl From<&JobPayload> for WirePayload {
    fn from(payload: &JobPayload) -> Self {
        Self {
            class: payload.class.clone(),
            args: payload.args.iter().map(WireValue::from).collect(),
        }
    }
}

impl From<WirePayload> for JobPayload {
    fn from(wire: WirePayload) -> Self {
        Self {
            class: wire.class,
            args: wire.args.into_iter().map(Value::from).collect(),
        }
    }
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Number(i.into()),
            WireValue::UInt(u) => Value::Number(u.into()),
            WireValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            WireValue::Str(s) => Value::String(s),
            WireValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            WireValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JobPayload {
        JobPayload::new(
            "TestPlainJob",
            vec![
                json!(7),
                json!(-9),
                json!(u64::MAX),
                json!(1.5),
                json!("text"),
                json!(null),
                json!(true),
                json!([1, [2, 3]]),
                json!({"to": "someone@example.com", "retries": 2}),
            ],
        )
    }

    #[test]
    fn test_json_round_trip() {
        let codec = JobCodec::json();
        let payload = sample();
        let body = codec.serialize(&payload).unwrap();
        assert_eq!(codec.parse(&body).unwrap(), payload);
    }

    #[test]
    fn test_binary_round_trip() {
        let codec = JobCodec::binary();
        let payload = sample();
        let body = codec.serialize(&payload).unwrap();
        assert_eq!(codec.parse(&body).unwrap(), payload);
    }

    #[test]
    fn test_json_uses_string_keys() {
        let body = JobCodec::json()
            .serialize(&JobPayload::new("TestPlainJob", vec![json!(7), json!(9)]))
            .unwrap();
        let raw: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(raw["class"], "TestPlainJob");
        assert_eq!(raw["args"], json!([7, 9]));
    }

    #[test]
    fn test_binary_is_not_json() {
        let body = JobCodec::binary()
            .serialize(&JobPayload::new("TestPlainJob", vec![json!(7)]))
            .unwrap();
        assert!(serde_json::from_slice::<Value>(&body).is_err());
    }

    #[test]
    fn test_parse_garbage_is_deserialization_error() {
        let err = JobCodec::json().parse(b"not json").unwrap_err();
        assert!(matches!(err, StokerError::Deserialization(_)));

        let err = JobCodec::binary().parse(&[0xff, 0xff]).unwrap_err();
        assert!(matches!(err, StokerError::Deserialization(_)));
    }

    #[test]
    fn test_method_call_payload() {
        let payload = JobPayload::method_call("TestAsyncJob", "foo", vec![json!(10), json!(5)]);
        assert_eq!(payload.args, vec![json!(null), json!("foo"), json!(10), json!(5)]);

        match payload.invocation().unwrap() {
            Invocation::Method { name, args } => {
                assert_eq!(name, "foo");
                assert_eq!(args, &[json!(10), json!(5)]);
            }
            other => panic!("expected method invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_perform_invocation() {
        let payload = JobPayload::new("TestJob", vec![json!(3), json!(4)]);
        assert_eq!(
            payload.invocation().unwrap(),
            Invocation::Perform(&[json!(3), json!(4)])
        );
    }

    #[test]
    fn test_empty_args_perform() {
        let payload = JobPayload::new("TestJob", vec![]);
        assert_eq!(payload.invocation().unwrap(), Invocation::Perform(&[]));
    }

    #[test]
    fn test_method_call_without_name() {
        let payload = JobPayload::new("TestAsyncJob", vec![json!(null), json!(3)]);
        assert!(matches!(
            payload.invocation(),
            Err(StokerError::Deserialization(_))
        ));
    }

    #[test]
    fn test_custom_codec() {
        let codec = JobCodec::new(
            "upper",
            |p| Ok(p.class.to_uppercase().into_bytes()),
            |b| Ok(JobPayload::new(String::from_utf8_lossy(b), vec![])),
        );
        let body = codec.serialize(&JobPayload::new("job", vec![])).unwrap();
        assert_eq!(codec.parse(&body).unwrap().class, "JOB");
        assert_eq!(codec.name(), "upper");
    }
}
