//! Task protocol between the coordinator and execution contexts
//!
//! A task is a closed, tagged enum of operations. Execution contexts only
//! interpret these variants; no code or closures cross the boundary. Results
//! travel back as JSON values so every payload shares one reply type.

use motionpool_backends::{kernels, BackendError};
use motionpool_core::{JitterOptions, MotionOperation, Path, Point, VelocityProfileOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Work submitted to the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    /// One start/end operation
    Motion {
        operation: MotionOperation,
        start: Point,
        end: Point,
    },

    /// A contiguous slice of a batch starting at global index `offset`;
    /// `batch_seed` only seeds operations without their own seed
    Chunk {
        operation: MotionOperation,
        offset: usize,
        starts: Vec<Point>,
        ends: Vec<Point>,
        batch_seed: u64,
    },

    /// Ornstein-Uhlenbeck jitter series
    Jitter { options: JitterOptions },

    /// Reparameterize an existing path
    VelocityProfile {
        path: Path,
        options: VelocityProfileOptions,
    },

    /// Diagnostic probes
    Probe { probe: Probe },
}

impl TaskPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Motion { .. } => "motion",
            Self::Chunk { .. } => "chunk",
            Self::Jitter { .. } => "jitter",
            Self::VelocityProfile { .. } => "velocity_profile",
            Self::Probe { .. } => "probe",
        }
    }

    pub fn probe(probe: Probe) -> Self {
        Self::Probe { probe }
    }
}

/// Whitelisted diagnostic operations, used for health checks and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum Probe {
    /// Return the value unchanged
    Echo { value: Value },
    /// Fail with the given message
    Fail { message: String },
    /// Block the execution context, then return `{"slept_ms": ms}`
    Sleep { ms: u64 },
    /// Sum of the values
    Sum { values: Vec<f64> },
    /// Bring down the execution context
    Crash,
}

/// Failure category reported by an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    Unsupported,
    Execution,
    Serialization,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Execution => write!(f, "execution"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Task-level error, delivered to the submitter as an ordinary rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<BackendError> for TaskFailure {
    fn from(err: BackendError) -> Self {
        let kind = match &err {
            BackendError::InvalidInput(_) => FailureKind::InvalidInput,
            BackendError::Unsupported { .. } => FailureKind::Unsupported,
            _ => FailureKind::Execution,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<serde_json::Error> for TaskFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(FailureKind::Serialization, err.to_string())
    }
}

/// Execute a payload on the current thread
///
/// Runs inside an execution context. Errors come back as [`TaskFailure`];
/// only [`Probe::Crash`] unwinds.
pub fn execute_payload(payload: &TaskPayload) -> Result<Value, TaskFailure> {
    match payload {
        TaskPayload::Motion {
            operation,
            start,
            end,
        } => {
            let path = kernels::run_operation(operation, *start, *end)?;
            Ok(serde_json::to_value(path)?)
        }
        TaskPayload::Chunk {
            operation,
            offset,
            starts,
            ends,
            batch_seed,
        } => {
            let paths = kernels::run_sequential(operation, starts, ends, *batch_seed, *offset)?;
            Ok(serde_json::to_value(paths)?)
        }
        TaskPayload::Jitter { options } => {
            let series = kernels::generate_jitter(options)?;
            Ok(serde_json::to_value(series)?)
        }
        TaskPayload::VelocityProfile { path, options } => {
            let path = kernels::apply_velocity_profile(path, options)?;
            Ok(serde_json::to_value(path)?)
        }
        TaskPayload::Probe { probe } => run_probe(probe),
    }
}

fn run_probe(probe: &Probe) -> Result<Value, TaskFailure> {
    match probe {
        Probe::Echo { value } => Ok(value.clone()),
        Probe::Fail { message } => Err(TaskFailure::new(FailureKind::Execution, message.clone())),
        Probe::Sleep { ms } => {
            std::thread::sleep(std::time::Duration::from_millis(*ms));
            Ok(serde_json::json!({ "slept_ms": ms }))
        }
        Probe::Sum { values } => Ok(serde_json::json!(values.iter().sum::<f64>())),
        Probe::Crash => panic!("execution context crash requested by probe"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motionpool_core::{CurveOptions, VelocityProfile};
    use serde_json::json;

    #[test]
    fn test_payload_wire_format() {
        let payload = TaskPayload::probe(Probe::Sleep { ms: 5 });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, json!({"type": "probe", "probe": {"probe": "sleep", "ms": 5}}));

        let parsed: TaskPayload = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.kind(), "probe");
    }

    #[test]
    fn test_probes() {
        let echo = TaskPayload::probe(Probe::Echo { value: json!({"a": 1}) });
        assert_eq!(execute_payload(&echo).unwrap(), json!({"a": 1}));

        let sum = TaskPayload::probe(Probe::Sum {
            values: vec![1.0, 2.5, 3.5],
        });
        assert_eq!(execute_payload(&sum).unwrap(), json!(7.0));

        let fail = TaskPayload::probe(Probe::Fail {
            message: "boom".into(),
        });
        let err = execute_payload(&fail).unwrap_err();
        assert_eq!(err.kind, FailureKind::Execution);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_chunk_matches_kernels() {
        let operation = MotionOperation::Curve(CurveOptions::default().with_num_points(12));
        let starts = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)];
        let ends = vec![Point::new(200.0, 40.0), Point::new(90.0, 300.0)];
        let payload = TaskPayload::Chunk {
            operation: operation.clone(),
            offset: 10,
            starts: starts.clone(),
            ends: ends.clone(),
            batch_seed: 12345,
        };

        let value = execute_payload(&payload).unwrap();
        let paths: Vec<Path> = serde_json::from_value(value).unwrap();
        let expected = kernels::run_sequential(&operation, &starts, &ends, 12345, 10).unwrap();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_velocity_profile_task() {
        let payload = TaskPayload::VelocityProfile {
            path: vec![Point::new(0.0, 0.0), Point::new(50.0, 50.0)],
            options: VelocityProfileOptions::new(VelocityProfile::Sigmoid, 8),
        };
        assert_eq!(payload.kind(), "velocity_profile");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "velocity_profile");
        assert_eq!(json["options"]["profile"], "sigmoid");

        let path: Path = serde_json::from_value(execute_payload(&payload).unwrap()).unwrap();
        assert_eq!(path.len(), 8);
        assert_eq!(path[7], Point::new(50.0, 50.0));
    }

    #[test]
    fn test_invalid_input_maps_to_failure_kind() {
        let payload = TaskPayload::Motion {
            operation: MotionOperation::Curve(CurveOptions::default().with_num_points(1)),
            start: Point::new(0.0, 0.0),
            end: Point::new(1.0, 1.0),
        };
        let err = execute_payload(&payload).unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidInput);
    }
}
