use crate::cli::InspectArgs;
use crate::error::{CliError, Result};
use fsexplorer::core::io::layer_store::{LayerStore, PersistedLayer};
use fsexplorer::core::models::outcome::TaskOutcome;
use tracing::info;

pub async fn run(args: InspectArgs) -> Result<()> {
    let store = LayerStore::open(&args.db_root)?;
    let layer = match args.layer {
        Some(layer) => layer,
        None => store.latest_layer()?.ok_or_else(|| {
            CliError::Config(format!(
                "No persisted layers found in {}",
                args.db_root.display()
            ))
        })?,
    };

    info!(layer, "Loading persisted layer.");
    let persisted = store.load(layer)?;
    println!("{}", describe(&persisted));
    Ok(())
}

fn describe(layer: &PersistedLayer) -> String {
    let complete = layer.complete_count();
    let mut scored = 0;
    let mut rejected = 0;
    let mut errored = 0;
    for outcome in layer.outcomes.values() {
        match outcome {
            TaskOutcome::Scored { .. } => scored += 1,
            TaskOutcome::Rejected { .. } => rejected += 1,
            TaskOutcome::Errored { .. } => errored += 1,
        }
    }
    format!(
        "Layer {}: {} graphs ({} complete, {} extendable); outcomes: {} scored, {} rejected, {} errored",
        layer.layer,
        layer.graphs.len(),
        complete,
        layer.graphs.len() - complete,
        scored,
        rejected,
        errored
    )
}
