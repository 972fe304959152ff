//! The offline inspector: the only sanctioned reader of the learning store.
//! Every function here depends on `orc-memory`'s `inspect` feature, which
//! the running engine/supervisor/planner never enable.

use anyhow::Result;
use orc_core::{FailureClass, StepName};
use orc_memory::store::inspect::FailureFilter;
use orc_memory::FailureStore;

use crate::cli::OutputFormat;

pub fn handle_list(
    store: &FailureStore,
    run: Option<&str>,
    step: Option<StepName>,
    class: Option<FailureClass>,
    format: OutputFormat,
) -> Result<()> {
    let filter = FailureFilter { run_id: run.map(str::to_string), step, class };
    let records = store.list(&filter)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("no failure records match");
            }
            for record in &records {
                println!(
                    "{}  run={}  step={}  {}  retry={}  hard={}  {}",
                    record.created_at.to_rfc3339(),
                    record.run_id,
                    record.step,
                    record.primary_class,
                    record.retry_index,
                    record.is_hard_failure,
                    record.raw_error,
                );
            }
        }
    }
    Ok(())
}

/// For each step with at least one recorded failure, compare the stored
/// interpretation-context hashes against what the current extraction rules
/// would produce. A step with any stale hash has drifted.
pub fn handle_drift(store: &FailureStore, only_step: Option<StepName>) -> Result<()> {
    let steps: Vec<StepName> = match only_step {
        Some(step) => vec![step],
        None => StepName::ALL.to_vec(),
    };

    let mut any_drift = false;
    for step in steps {
        let stored_hashes = store.context_hashes_for_step(step)?;
        if stored_hashes.is_empty() {
            continue;
        }
        let current_hash = orc_supervisor::signals::current_context(step).hash();
        let stale: Vec<&String> = stored_hashes.iter().filter(|hash| hash.as_str() != current_hash).collect();
        if stale.is_empty() {
            println!("{step}: up to date ({} stored hash(es))", stored_hashes.len());
        } else {
            any_drift = true;
            println!("{step}: DRIFT — {} of {} stored hash(es) predate the current interpretation context ({current_hash})", stale.len(), stored_hashes.len());
        }
    }

    if !any_drift {
        println!("no drift detected");
    }
    Ok(())
}
