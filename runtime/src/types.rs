use crate::Error;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    convert::TryFrom,
    env,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Configuration derived from the environment the runtime host provides.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// `host:port` of the runtime API
    pub endpoint: String,
    /// Name of the function
    pub function_name: String,
    /// Memory available to the function, in MB
    pub memory: i32,
    /// Version of the function being executed
    pub version: String,
    /// Log stream the function writes to
    pub log_stream: String,
    /// Log group the function writes to
    pub log_group: String,
}

impl Config {
    /// Attempts to read configuration from process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, Error> {
            lookup(key).ok_or_else(|| format!("missing environment variable {}", key).into())
        };
        let memory = match lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE") {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|e| format!("invalid AWS_LAMBDA_FUNCTION_MEMORY_SIZE {:?}: {}", raw, e))?,
            None => 0,
        };
        Ok(Config {
            endpoint: required("AWS_LAMBDA_RUNTIME_API")?,
            function_name: required("AWS_LAMBDA_FUNCTION_NAME")?,
            memory,
            version: lookup("AWS_LAMBDA_FUNCTION_VERSION").unwrap_or_default(),
            log_stream: lookup("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
            log_group: lookup("AWS_LAMBDA_LOG_GROUP_NAME").unwrap_or_default(),
        })
    }
}

/// Error report sent to the runtime API when an invocation or the
/// initialization phase fails.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Type of the error, usually the Rust type name
    pub error_type: String,
    /// Human readable error message
    pub error_message: String,
}

impl Diagnostic {
    pub(crate) fn from_error<E: std::fmt::Display + ?Sized>(error: &E) -> Self {
        Diagnostic {
            error_type: std::any::type_name::<E>().to_owned(),
            error_message: error.to_string(),
        }
    }
}

/// The metadata of a single invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    /// The request id which identifies the invocation.
    pub request_id: String,
    /// Execution deadline, in milliseconds since the unix epoch.
    pub deadline: u64,
    /// The ARN of the function being invoked.
    pub invoked_function_arn: String,
    /// The tracing header of the invocation, if any.
    pub xray_trace_id: Option<String>,
    /// Client context sent by mobile SDK callers.
    pub client_context: Option<Value>,
    /// Identity of the caller when invoked through a mobile SDK.
    pub identity: Option<Value>,
    /// Function configuration read at startup.
    pub env_config: Config,
}

impl Context {
    pub(crate) fn with_config(self, config: &Config) -> Self {
        Context {
            env_config: config.clone(),
            ..self
        }
    }

    /// The execution deadline as a point in time.
    pub fn deadline(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.deadline)
    }
}

pub(crate) fn request_id(headers: &HeaderMap) -> Result<&str, Error> {
    let id = headers
        .get("lambda-runtime-aws-request-id")
        .and_then(|v| v.to_str().ok())
        .ok_or("missing lambda-runtime-aws-request-id header")?;
    Ok(id)
}

impl TryFrom<&HeaderMap> for Context {
    type Error = Error;

    fn try_from(headers: &HeaderMap) -> Result<Self, Self::Error> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let json = |name: &str| -> Result<Option<Value>, Error> {
            match header(name) {
                Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
                None => Ok(None),
            }
        };

        let request_id = request_id(headers)?.to_owned();
        let deadline = header("lambda-runtime-deadline-ms")
            .map(str::parse::<u64>)
            .transpose()?
            .unwrap_or_default();

        Ok(Context {
            request_id,
            deadline,
            invoked_function_arn: header("lambda-runtime-invoked-function-arn")
                .unwrap_or_default()
                .to_owned(),
            xray_trace_id: header("lambda-runtime-trace-id").map(str::to_owned),
            client_context: json("lambda-runtime-client-context")?,
            identity: json("lambda-runtime-cognito-identity")?,
            env_config: Config::default(),
        })
    }
}
