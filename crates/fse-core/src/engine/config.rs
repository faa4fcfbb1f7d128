use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(600);
const TASKS_DIR_NAME: &str = "tasks";
const RING_ARCHIVE_NAME: &str = "ring_closures.json";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// How equivalent attachment points are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymmetryPolicy {
    /// One AP per equivalence class is extended per step; the others stay free
    /// and are filled independently in later layers.
    #[default]
    Independent,
    /// Every free AP of a class receives the same building block in one step.
    Enforced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_layers: usize,
    pub max_graphs_per_layer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    /// External evaluation program; `None` runs an enumeration-only exploration.
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub db_root: PathBuf,
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    pub archive_path: PathBuf,
    pub conformers_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationConfig {
    pub fragment_space_path: PathBuf,
    pub limits: LimitsConfig,
    pub dispatch: DispatchConfig,
    pub storage: StorageConfig,
    pub rings: RingConfig,
    pub symmetry: SymmetryPolicy,
    pub resume: bool,
}

#[derive(Default)]
pub struct ExplorationConfigBuilder {
    fragment_space_path: Option<PathBuf>,
    max_layers: Option<usize>,
    max_graphs_per_layer: Option<usize>,
    max_concurrent_tasks: Option<usize>,
    task_timeout: Option<Duration>,
    pipeline: Option<PipelineConfig>,
    db_root: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    ring_archive_path: Option<PathBuf>,
    conformers_path: Option<PathBuf>,
    symmetry: Option<SymmetryPolicy>,
    resume: Option<bool>,
}

impl ExplorationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragment_space_path(mut self, path: PathBuf) -> Self {
        self.fragment_space_path = Some(path);
        self
    }
    pub fn max_layers(mut self, layers: usize) -> Self {
        self.max_layers = Some(layers);
        self
    }
    pub fn max_graphs_per_layer(mut self, graphs: usize) -> Self {
        self.max_graphs_per_layer = Some(graphs);
        self
    }
    pub fn max_concurrent_tasks(mut self, tasks: usize) -> Self {
        self.max_concurrent_tasks = Some(tasks);
        self
    }
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = Some(pipeline);
        self
    }
    pub fn db_root(mut self, path: PathBuf) -> Self {
        self.db_root = Some(path);
        self
    }
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn ring_archive_path(mut self, path: PathBuf) -> Self {
        self.ring_archive_path = Some(path);
        self
    }
    pub fn conformers_path(mut self, path: PathBuf) -> Self {
        self.conformers_path = Some(path);
        self
    }
    pub fn symmetry(mut self, policy: SymmetryPolicy) -> Self {
        self.symmetry = Some(policy);
        self
    }
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn build(self) -> Result<ExplorationConfig, ConfigError> {
        let db_root = self
            .db_root
            .ok_or(ConfigError::MissingParameter("db_root"))?;
        let limits = LimitsConfig {
            max_layers: self
                .max_layers
                .ok_or(ConfigError::MissingParameter("max_layers"))?,
            max_graphs_per_layer: self
                .max_graphs_per_layer
                .ok_or(ConfigError::MissingParameter("max_graphs_per_layer"))?,
        };
        if limits.max_graphs_per_layer == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "max_graphs_per_layer",
                reason: "must be at least 1".to_string(),
            });
        }

        let max_concurrent_tasks = self.max_concurrent_tasks.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        if max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "max_concurrent_tasks",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(ExplorationConfig {
            fragment_space_path: self
                .fragment_space_path
                .ok_or(ConfigError::MissingParameter("fragment_space_path"))?,
            limits,
            dispatch: DispatchConfig {
                max_concurrent_tasks,
                task_timeout: self.task_timeout.unwrap_or(DEFAULT_TASK_TIMEOUT),
                pipeline: self.pipeline,
            },
            storage: StorageConfig {
                work_dir: self
                    .work_dir
                    .unwrap_or_else(|| db_root.join(TASKS_DIR_NAME)),
                db_root: db_root.clone(),
            },
            rings: RingConfig {
                archive_path: self
                    .ring_archive_path
                    .unwrap_or_else(|| db_root.join(RING_ARCHIVE_NAME)),
                conformers_path: self.conformers_path,
            },
            symmetry: self.symmetry.unwrap_or_default(),
            resume: self.resume.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ExplorationConfigBuilder {
        ExplorationConfigBuilder::new()
            .fragment_space_path(PathBuf::from("space.toml"))
            .db_root(PathBuf::from("/data/run"))
            .max_layers(4)
            .max_graphs_per_layer(1000)
    }

    #[test]
    fn defaults_are_derived_from_db_root() {
        let config = minimal().max_concurrent_tasks(3).build().unwrap();
        assert_eq!(config.storage.work_dir, PathBuf::from("/data/run/tasks"));
        assert_eq!(
            config.rings.archive_path,
            PathBuf::from("/data/run/ring_closures.json")
        );
        assert_eq!(config.dispatch.max_concurrent_tasks, 3);
        assert_eq!(config.dispatch.task_timeout, DEFAULT_TASK_TIMEOUT);
        assert!(config.dispatch.pipeline.is_none());
        assert_eq!(config.symmetry, SymmetryPolicy::Independent);
        assert!(config.resume);
    }

    #[test]
    fn missing_required_parameters_are_named() {
        let err = ExplorationConfigBuilder::new()
            .db_root(PathBuf::from("/tmp"))
            .max_layers(1)
            .max_graphs_per_layer(1)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("fragment_space_path"));

        let err = ExplorationConfigBuilder::new()
            .fragment_space_path(PathBuf::from("space.toml"))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("db_root"));
    }

    #[test]
    fn zero_layer_ceiling_is_rejected() {
        let err = minimal().max_graphs_per_layer(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "max_graphs_per_layer",
                ..
            }
        ));
    }
}
