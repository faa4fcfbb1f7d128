use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use fsexplorer::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_LAYERS: usize = 10;
const DEFAULT_MAX_GRAPHS_PER_LAYER: usize = 100_000;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialLimitsConfig {
    max_layers: Option<usize>,
    max_graphs_per_layer: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct PartialPipelineConfig {
    command: PathBuf,
    #[serde(default)]
    args: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDispatchConfig {
    max_concurrent_tasks: Option<usize>,
    task_timeout_secs: Option<u64>,
    pipeline: Option<PartialPipelineConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialStorageConfig {
    db_root: Option<PathBuf>,
    work_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRingConfig {
    archive_path: Option<PathBuf>,
    conformers_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialSymmetryPolicy {
    Independent,
    Enforced,
}

impl From<PartialSymmetryPolicy> for core_config::SymmetryPolicy {
    fn from(p: PartialSymmetryPolicy) -> Self {
        match p {
            PartialSymmetryPolicy::Independent => core_config::SymmetryPolicy::Independent,
            PartialSymmetryPolicy::Enforced => core_config::SymmetryPolicy::Enforced,
        }
    }
}

impl FromStr for PartialSymmetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "independent" => Ok(Self::Independent),
            "enforced" => Ok(Self::Enforced),
            other => Err(format!(
                "unknown symmetry policy '{other}', expected 'independent' or 'enforced'"
            )),
        }
    }
}

/// The run configuration as written in the TOML file; every field optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialExplorationConfig {
    fragment_space: Option<PathBuf>,
    resume: Option<bool>,
    symmetry: Option<PartialSymmetryPolicy>,
    limits: Option<PartialLimitsConfig>,
    dispatch: Option<PartialDispatchConfig>,
    storage: Option<PartialStorageConfig>,
    rings: Option<PartialRingConfig>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl PartialExplorationConfig {
    /// Reads `path`; relative paths inside it resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn merge_with_cli(
        mut self,
        args: &RunArgs,
        threads: Option<usize>,
    ) -> Result<core_config::ExplorationConfig> {
        self.apply_set_values(&args.set_values)?;

        let limits = self.limits.take().unwrap_or_default();
        let dispatch = self.dispatch.take().unwrap_or_default();
        let storage = self.storage.take().unwrap_or_default();
        let rings = self.rings.take().unwrap_or_default();

        let fragment_space = args
            .fragment_space
            .clone()
            .or(self.fragment_space.take())
            .ok_or_else(|| {
                CliError::Config(
                    "`fragment-space` is required either in the config file or via --fragment-space."
                        .to_string(),
                )
            })?;
        let db_root = args
            .db_root
            .clone()
            .or(storage.db_root)
            .ok_or_else(|| {
                CliError::Config(
                    "`storage.db-root` is required either in the config file or via --db-root."
                        .to_string(),
                )
            })?;

        let mut builder = core_config::ExplorationConfigBuilder::new()
            .fragment_space_path(self.resolve(fragment_space))
            .db_root(self.resolve(db_root))
            .max_layers(
                args.max_layers
                    .or(limits.max_layers)
                    .unwrap_or(DEFAULT_MAX_LAYERS),
            )
            .max_graphs_per_layer(
                args.max_graphs_per_layer
                    .or(limits.max_graphs_per_layer)
                    .unwrap_or(DEFAULT_MAX_GRAPHS_PER_LAYER),
            )
            .resume(!args.fresh && self.resume.unwrap_or(true));

        if let Some(tasks) = threads.or(dispatch.max_concurrent_tasks) {
            builder = builder.max_concurrent_tasks(tasks);
        }
        if let Some(secs) = dispatch.task_timeout_secs {
            builder = builder.task_timeout(Duration::from_secs(secs));
        }
        if let Some(pipeline) = dispatch.pipeline {
            builder = builder.pipeline(core_config::PipelineConfig {
                command: self.resolve_command(pipeline.command),
                args: pipeline.args,
            });
        }
        if let Some(work_dir) = storage.work_dir {
            builder = builder.work_dir(self.resolve(work_dir));
        }
        if let Some(archive) = rings.archive_path {
            builder = builder.ring_archive_path(self.resolve(archive));
        }
        if let Some(conformers) = rings.conformers_path {
            builder = builder.conformers_path(self.resolve(conformers));
        }
        if let Some(policy) = self.symmetry {
            builder = builder.symmetry(policy.into());
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// Bare program names are looked up on `PATH`, so only paths with a
    /// directory component are resolved.
    fn resolve_command(&self, command: PathBuf) -> PathBuf {
        if command.components().count() > 1 {
            self.resolve(command)
        } else {
            command
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "fragment-space" => self.fragment_space = Some(PathBuf::from(value_str)),
                "resume" => self.resume = Some(parse_value(key, value_str)?),
                "symmetry" => {
                    self.symmetry = Some(value_str.parse().map_err(CliError::Config)?);
                }
                "limits.max-layers" => {
                    self.limits
                        .get_or_insert_with(Default::default)
                        .max_layers = Some(parse_value(key, value_str)?);
                }
                "limits.max-graphs-per-layer" => {
                    self.limits
                        .get_or_insert_with(Default::default)
                        .max_graphs_per_layer = Some(parse_value(key, value_str)?);
                }
                "dispatch.max-concurrent-tasks" => {
                    self.dispatch
                        .get_or_insert_with(Default::default)
                        .max_concurrent_tasks = Some(parse_value(key, value_str)?);
                }
                "dispatch.task-timeout-secs" => {
                    self.dispatch
                        .get_or_insert_with(Default::default)
                        .task_timeout_secs = Some(parse_value(key, value_str)?);
                }
                "storage.db-root" => {
                    self.storage.get_or_insert_with(Default::default).db_root =
                        Some(PathBuf::from(value_str));
                }
                "storage.work-dir" => {
                    self.storage.get_or_insert_with(Default::default).work_dir =
                        Some(PathBuf::from(value_str));
                }
                "rings.conformers-path" => {
                    self.rings
                        .get_or_insert_with(Default::default)
                        .conformers_path = Some(PathBuf::from(value_str));
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("explore.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["fse", "run", "-c", "explore.toml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Run(args) => args,
            Commands::Inspect(_) => unreachable!(),
        }
    }

    const FULL_CONFIG: &str = r#"
fragment-space = "space.toml"
symmetry = "enforced"

[limits]
max-layers = 4
max-graphs-per-layer = 50

[dispatch]
max-concurrent-tasks = 3
task-timeout-secs = 30

[dispatch.pipeline]
command = "scripts/evaluate.sh"
args = ["--fast"]

[storage]
db-root = "db"

[rings]
conformers-path = "/data/conformers.json"
"#;

    #[test]
    fn file_values_are_resolved_against_the_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL_CONFIG);

        let config = PartialExplorationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&run_args(&[]), None)
            .unwrap();

        assert_eq!(config.fragment_space_path, dir.path().join("space.toml"));
        assert_eq!(config.storage.db_root, dir.path().join("db"));
        assert_eq!(config.storage.work_dir, dir.path().join("db").join("tasks"));
        assert_eq!(config.limits.max_layers, 4);
        assert_eq!(config.limits.max_graphs_per_layer, 50);
        assert_eq!(config.dispatch.max_concurrent_tasks, 3);
        assert_eq!(config.dispatch.task_timeout, Duration::from_secs(30));
        let pipeline = config.dispatch.pipeline.unwrap();
        assert_eq!(pipeline.command, dir.path().join("scripts/evaluate.sh"));
        assert_eq!(pipeline.args, vec!["--fast".to_string()]);
        assert_eq!(
            config.rings.conformers_path,
            Some(PathBuf::from("/data/conformers.json"))
        );
        assert_eq!(config.symmetry, core_config::SymmetryPolicy::Enforced);
        assert!(config.resume);
    }

    #[test]
    fn cli_arguments_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL_CONFIG);
        let args = run_args(&[
            "--max-layers",
            "9",
            "--max-graphs-per-layer",
            "7",
            "--db-root",
            "/tmp/elsewhere",
            "--fresh",
            "-S",
            "symmetry=independent",
        ]);

        let config = PartialExplorationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, Some(8))
            .unwrap();

        assert_eq!(config.limits.max_layers, 9);
        assert_eq!(config.limits.max_graphs_per_layer, 7);
        assert_eq!(config.storage.db_root, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.dispatch.max_concurrent_tasks, 8);
        assert_eq!(config.symmetry, core_config::SymmetryPolicy::Independent);
        assert!(!config.resume);
    }

    #[test]
    fn defaults_fill_a_minimal_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "fragment-space = \"space.toml\"\n[storage]\ndb-root = \"db\"\n");

        let config = PartialExplorationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&run_args(&[]), None)
            .unwrap();

        assert_eq!(config.limits.max_layers, DEFAULT_MAX_LAYERS);
        assert_eq!(config.limits.max_graphs_per_layer, DEFAULT_MAX_GRAPHS_PER_LAYER);
        assert!(config.dispatch.pipeline.is_none());
        assert_eq!(config.symmetry, core_config::SymmetryPolicy::Independent);
    }

    #[test]
    fn missing_db_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "fragment-space = \"space.toml\"\n");

        let result = PartialExplorationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&run_args(&[]), None);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("db-root")));
    }

    #[test]
    fn set_values_reach_nested_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        let args = run_args(&[
            "-S",
            "fragment-space=/abs/space.toml",
            "-S",
            "storage.db-root=/abs/db",
            "-S",
            "limits.max-layers=2",
            "-S",
            "dispatch.task-timeout-secs=5",
        ]);

        let config = PartialExplorationConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args, None)
            .unwrap();

        assert_eq!(config.fragment_space_path, PathBuf::from("/abs/space.toml"));
        assert_eq!(config.limits.max_layers, 2);
        assert_eq!(config.dispatch.task_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let mut config = PartialExplorationConfig::default();
        assert!(matches!(
            config.apply_set_values(&["limits.max-layers".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["limits.max-layers=many".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["nonsense.key=1".to_string()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            config.apply_set_values(&["symmetry=sideways".to_string()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn unknown_fields_fail_to_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[limits]\nmax-depth = 3\n");
        assert!(matches!(
            PartialExplorationConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn bare_program_names_are_left_for_path_lookup() {
        let config = PartialExplorationConfig {
            base_dir: Some(PathBuf::from("/configs")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_command(PathBuf::from("python3")),
            PathBuf::from("python3")
        );
        assert_eq!(
            config.resolve_command(PathBuf::from("bin/eval")),
            PathBuf::from("/configs/bin/eval")
        );
    }
}
