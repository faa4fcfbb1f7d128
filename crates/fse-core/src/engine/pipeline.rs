use crate::core::models::canon::Fingerprint;
use crate::core::models::graph::Graph;
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const OUTPUT_FILE: &str = "output.json";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Everything an evaluation needs, prepared by the dispatcher.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub fingerprint: Fingerprint,
    pub graph: Arc<Graph>,
    /// Private directory of this task.
    pub work_dir: PathBuf,
    /// The graph serialized as JSON inside `work_dir`.
    pub input_path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Scored(f64),
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Evaluation exited with {status}")]
    ExitStatus { status: ExitStatus },
    #[error("Malformed evaluation output '{path}': {reason}")]
    MalformedOutput { path: PathBuf, reason: String },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Evaluation panicked: {0}")]
    Panicked(String),
    #[error("Evaluation reported an error: {0}")]
    Reported(String),
}

/// The external build/evaluate/post-process step applied to each complete graph.
pub trait EvaluationPipeline: Send + Sync {
    fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, TaskError>;
}

/// Pipeline of enumeration-only runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPipeline;

impl EvaluationPipeline for NoopPipeline {
    fn evaluate(&self, _request: &EvaluationRequest) -> Result<Evaluation, TaskError> {
        Ok(Evaluation::Rejected("evaluation disabled".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ScriptOutput {
    #[serde(default)]
    fitness: Option<f64>,
    #[serde(default)]
    rejected: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external program once per graph.
///
/// The program is invoked as `command args... <input.json> <output.json>`
/// from the task directory and must write one of `{"fitness": <number>}`,
/// `{"rejected": "<reason>"}` or `{"error": "<reason>"}` to the output path.
/// Its stdout and stderr are kept next to the output.
#[derive(Debug, Clone)]
pub struct ScriptPipeline {
    command: PathBuf,
    args: Vec<String>,
}

impl ScriptPipeline {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn log_file(dir: &Path, name: &str) -> Result<File, TaskError> {
        let path = dir.join(name);
        File::create(&path).map_err(|e| TaskError::Io { path, source: e })
    }

    fn read_output(path: &Path) -> Result<Evaluation, TaskError> {
        let malformed = |reason: String| TaskError::MalformedOutput {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let output: ScriptOutput =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;
        match output {
            ScriptOutput {
                error: Some(reason),
                ..
            } => Err(TaskError::Reported(reason)),
            ScriptOutput {
                rejected: Some(reason),
                ..
            } => Ok(Evaluation::Rejected(reason)),
            ScriptOutput {
                fitness: Some(value),
                ..
            } if value.is_finite() => Ok(Evaluation::Scored(value)),
            ScriptOutput {
                fitness: Some(value),
                ..
            } => Err(malformed(format!("non-finite fitness {value}"))),
            _ => Err(malformed("no fitness, rejection or error field".to_string())),
        }
    }
}

impl EvaluationPipeline for ScriptPipeline {
    fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, TaskError> {
        let output_path = request.work_dir.join(OUTPUT_FILE);
        match std::fs::remove_file(&output_path) {
            Ok(()) => debug!(fingerprint = request.fingerprint.short(), "Removed stale output."),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TaskError::Io {
                    path: output_path,
                    source: e,
                });
            }
        }
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(&request.input_path)
            .arg(&output_path)
            .current_dir(&request.work_dir)
            .stdin(Stdio::null())
            .stdout(Self::log_file(&request.work_dir, STDOUT_FILE)?)
            .stderr(Self::log_file(&request.work_dir, STDERR_FILE)?)
            .spawn()
            .map_err(|e| TaskError::Spawn {
                command: self.command.display().to_string(),
                source: e,
            })?;
        debug!(fingerprint = request.fingerprint.short(), pid = child.id(), "Evaluation started.");

        let deadline = Instant::now() + request.timeout;
        let status = loop {
            let polled = child.try_wait().map_err(|e| TaskError::Io {
                path: request.work_dir.clone(),
                source: e,
            })?;
            if let Some(status) = polled {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TaskError::Timeout(request.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(TaskError::ExitStatus { status });
        }
        Self::read_output(&output_path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::fragspace::space::FragmentSpace;
    use crate::core::fragspace::space::tests::SAMPLE_SPACE;
    use tempfile::{TempDir, tempdir};

    fn request(timeout: Duration) -> (TempDir, EvaluationRequest) {
        let dir = tempdir().unwrap();
        let space = FragmentSpace::from_toml_str(SAMPLE_SPACE).unwrap();
        let graph = Arc::new(space.root_graphs().unwrap().remove(0));
        let input_path = dir.path().join("graph.json");
        std::fs::write(&input_path, "{}").unwrap();
        let request = EvaluationRequest {
            fingerprint: graph.fingerprint().clone(),
            graph,
            work_dir: dir.path().to_path_buf(),
            input_path,
            timeout,
        };
        (dir, request)
    }

    fn shell(script: &str) -> ScriptPipeline {
        ScriptPipeline::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "fse-eval".to_string()],
        )
    }

    #[test]
    fn fitness_is_read_from_the_output_file() {
        let (_dir, request) = request(Duration::from_secs(10));
        let pipeline = shell(r#"test -f "$1" && printf '{"fitness": -7.5}' > "$2""#);
        assert_eq!(pipeline.evaluate(&request).unwrap(), Evaluation::Scored(-7.5));
    }

    #[test]
    fn rejection_and_reported_errors_are_distinguished() {
        let (_dir, request) = request(Duration::from_secs(10));
        let rejected = shell(r#"printf '{"rejected": "too flexible"}' > "$2""#);
        assert_eq!(
            rejected.evaluate(&request).unwrap(),
            Evaluation::Rejected("too flexible".to_string())
        );
        let failed = shell(r#"printf '{"error": "no conformer"}' > "$2""#);
        assert!(matches!(
            failed.evaluate(&request),
            Err(TaskError::Reported(reason)) if reason == "no conformer"
        ));
    }

    #[test]
    fn slow_programs_are_killed_at_the_deadline() {
        let (_dir, request) = request(Duration::from_millis(200));
        let started = Instant::now();
        let result = shell("sleep 5").evaluate(&request);
        assert!(matches!(result, Err(TaskError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn failures_of_the_program_become_task_errors() {
        let (_dir, request) = request(Duration::from_secs(10));
        assert!(matches!(
            shell("echo oops >&2; exit 3").evaluate(&request),
            Err(TaskError::ExitStatus { .. })
        ));
        let stderr = std::fs::read_to_string(request.work_dir.join(STDERR_FILE)).unwrap();
        assert_eq!(stderr.trim(), "oops");

        assert!(matches!(
            shell("printf 'garbage' > \"$2\"").evaluate(&request),
            Err(TaskError::MalformedOutput { .. })
        ));
        assert!(matches!(
            ScriptPipeline::new("/definitely/not/a/program", Vec::new()).evaluate(&request),
            Err(TaskError::Spawn { .. })
        ));
    }

    #[test]
    fn output_left_by_an_earlier_attempt_is_not_reused() {
        let (_dir, request) = request(Duration::from_secs(10));
        std::fs::write(request.work_dir.join(OUTPUT_FILE), r#"{"fitness": 1.0}"#).unwrap();

        assert!(matches!(
            shell("true").evaluate(&request),
            Err(TaskError::MalformedOutput { .. })
        ));
        assert!(!request.work_dir.join(OUTPUT_FILE).exists());
    }

    #[test]
    fn noop_pipeline_rejects_everything() {
        let (_dir, request) = request(Duration::from_secs(1));
        assert_eq!(
            NoopPipeline.evaluate(&request).unwrap(),
            Evaluation::Rejected("evaluation disabled".to_string())
        );
    }
}
