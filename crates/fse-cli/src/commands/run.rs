use crate::cli::RunArgs;
use crate::config::PartialExplorationConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use fsexplorer::engine::progress::ProgressReporter;
use fsexplorer::workflows::explore::{self, Collaborators, ExplorationSummary, StartPoint};
use std::path::Path;
use tracing::{info, warn};

const RESULTS_FILE_NAME: &str = "results.csv";

pub async fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    let partial_config = PartialExplorationConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, threads)?;
    let db_root = config.storage.db_root.clone();

    info!("Loading fragment space from {:?}", &config.fragment_space_path);
    let collaborators = Collaborators::from_config(&config)?;
    let mut explorer = explore::resume_or_start(config, collaborators)?;

    match explorer.start_point() {
        StartPoint::Fresh => println!("Starting a new exploration in {}", db_root.display()),
        StartPoint::Resumed { layer } => {
            println!("Resuming exploration after layer {layer} in {}", db_root.display())
        }
    }

    let stop = explorer.stop_token();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight tasks before stopping.");
            eprintln!("\nStopping after in-flight tasks finish...");
            stop.request_stop();
        }
    });

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the exploration workflow...");
    let outcome = tokio::task::block_in_place(|| explorer.run(&reporter));
    signal_task.abort();
    let summary = outcome?;

    let results_path = db_root.join(RESULTS_FILE_NAME);
    let rows = explorer.ledger().write_csv(&results_path)?;
    info!(rows, path = %results_path.display(), "Results exported.");

    print_summary(&summary, &results_path, rows);
    Ok(())
}

fn print_summary(summary: &ExplorationSummary, results_path: &Path, rows: usize) {
    println!("Layer  complete  extendable  dead  duplicates  errors");
    for layer in &summary.layers {
        println!(
            "{:>5}  {:>8}  {:>10}  {:>4}  {:>10}  {:>6}",
            layer.layer,
            layer.complete,
            layer.extendable,
            layer.dead,
            layer.duplicates,
            layer.errors
        );
    }
    println!(
        "Evaluated: {} scored, {} rejected, {} errored.",
        summary.results.scored, summary.results.rejected, summary.results.errored
    );
    if let Some((fingerprint, fitness)) = &summary.results.best {
        println!("Best graph: {} (fitness {:.4})", fingerprint.short(), fitness);
    }
    if let Some(reason) = &summary.truncation {
        println!("Warning: exploration truncated: {reason}");
    }
    if summary.stopped {
        println!("Exploration stopped on request; rerun to resume.");
    }
    println!("{} result(s) written to {}", rows, results_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;

    const SPACE: &str = r#"
forbidden-ends = ["A"]

[compatibility]
"A" = ["A"]

[[scaffolds]]
name = "root"
aps = [{ class = "A" }]

[[fragments]]
name = "x"
aps = [{ class = "A" }]

[[fragments]]
name = "y"
aps = [{ class = "A" }]
"#;

    #[tokio::test(flavor = "multi_thread")]
    async fn enumeration_only_run_exports_every_complete_graph() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("space.toml"), SPACE).unwrap();
        let config_path = dir.path().join("explore.toml");
        fs::write(
            &config_path,
            "fragment-space = \"space.toml\"\n[storage]\ndb-root = \"db\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["fse", "run", "-c", config_path.to_str().unwrap()]);
        let Commands::Run(args) = cli.command else {
            unreachable!()
        };
        run(args, Some(1)).await.unwrap();

        let csv = fs::read_to_string(dir.path().join("db").join(RESULTS_FILE_NAME)).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "fingerprint,status,fitness,reason");
        assert_eq!(lines.len(), 3);
        assert!(lines[1..].iter().all(|l| l.contains(",rejected,,")));
    }
}
