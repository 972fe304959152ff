use anyhow::Result;
use orc_engine::{AdvanceOutcome, Engine, StartMode};
use orc_session::{manager, Session};

use crate::cli::{OutputFormat, StartModeArg};

fn to_start_mode(mode: StartModeArg) -> StartMode {
    match mode {
        StartModeArg::Fresh => StartMode::Fresh,
        StartModeArg::Resume => StartMode::Resume,
        StartModeArg::Auto => StartMode::Auto,
    }
}

fn print_session(session: &Session, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(session).expect("session serializes"));
        }
        OutputFormat::Text => {
            println!("session {} [{}]", session.session_id, session.status);
            println!("  project:        {}", session.project_id);
            println!("  current_step:   {}", session.current_step.map(|s| s.to_string()).unwrap_or_else(|| "-".into()));
            println!("  completed:      {}", session.completed_steps.len());
        }
    }
}

pub fn handle_start(engine: &Engine, project: &str, description: Option<&str>, mode: StartModeArg, format: OutputFormat) -> Result<()> {
    let session = engine.start(project, description.unwrap_or_default(), to_start_mode(mode))?;
    print_session(&session, format);
    Ok(())
}

pub async fn handle_advance(engine: &Engine, session_id: &str) -> Result<()> {
    let outcome = engine.advance(session_id).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Start (or resume) a project, then drive it forward one step at a time
/// until it reaches a terminal outcome or the engine reports a non-running
/// session (paused mid-run).
pub async fn handle_run(engine: &Engine, project: &str, description: Option<&str>, mode: StartModeArg) -> Result<()> {
    let session = engine.start(project, description.unwrap_or_default(), to_start_mode(mode))?;
    println!("started session {}", session.session_id);

    loop {
        let outcome = engine.advance(&session.session_id).await?;
        print_outcome(&outcome);
        match outcome {
            AdvanceOutcome::SessionCompleted | AdvanceOutcome::StepFailed { .. } | AdvanceOutcome::SessionNotRunning(_) => break,
            AdvanceOutcome::StepApproved { .. } | AdvanceOutcome::StepRetried { .. } => continue,
        }
    }
    Ok(())
}

fn print_outcome(outcome: &AdvanceOutcome) {
    match outcome {
        AdvanceOutcome::StepApproved { step } => println!("approved: {step}"),
        AdvanceOutcome::StepRetried { step, attempt } => println!("retried: {step} (attempt {attempt})"),
        AdvanceOutcome::StepFailed { step } => println!("failed: {step}"),
        AdvanceOutcome::SessionCompleted => println!("completed"),
        AdvanceOutcome::SessionNotRunning(status) => println!("not running (status: {status})"),
    }
}

pub fn handle_pause(engine: &Engine, session_id: &str, format: OutputFormat) -> Result<()> {
    let session = engine.pause(session_id)?;
    print_session(&session, format);
    Ok(())
}

pub fn handle_resume(engine: &Engine, session_id: &str, message: Option<&str>, format: OutputFormat) -> Result<()> {
    let session = engine.resume(session_id, message)?;
    print_session(&session, format);
    Ok(())
}

pub fn handle_progress(engine: &Engine, project: &str, format: OutputFormat) -> Result<()> {
    let Some(progress) = engine.progress(project)? else {
        println!("no session found for project '{project}'");
        return Ok(());
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "completed_steps": progress.completed_steps,
                    "current_step": progress.current_step,
                    "is_running": progress.is_running,
                    "is_resumable": progress.is_resumable,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("current_step: {}", progress.current_step.map(|s| s.to_string()).unwrap_or_else(|| "-".into()));
            println!("completed:    {}/11", progress.completed_steps.len());
            println!("running:      {}", progress.is_running);
            println!("resumable:    {}", progress.is_resumable);
        }
    }
    Ok(())
}

pub fn handle_clear_progress(engine: &Engine, project: &str) -> Result<()> {
    engine.clear_progress(project)?;
    println!("cleared progress for project '{project}'");
    Ok(())
}

pub fn handle_sessions(store_dir: &std::path::Path, format: OutputFormat) -> Result<()> {
    let mut sessions = manager::list_sessions(store_dir)?;
    sessions.sort_by_key(|s| s.created_at);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("no sessions found");
            }
            for session in &sessions {
                println!("{}  {}  {:<9}  {}", session.session_id, session.project_id, session.status, session.description);
            }
        }
    }
    Ok(())
}
