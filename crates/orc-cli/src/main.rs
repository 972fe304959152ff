use anyhow::Result;
use clap::Parser;

mod cli;
mod engine_factory;
mod learning_cmds;
mod session_cmds;

use cli::{Cli, Commands, LearningCommands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;
    let config = engine_factory::load_config()?;

    match cli.command {
        Commands::Start { project, description, mode } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_start(&engine, &project, description.as_deref(), mode, format)?;
        }
        Commands::Advance { session } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_advance(&engine, &session).await?;
        }
        Commands::Run { project, description, mode } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_run(&engine, &project, description.as_deref(), mode).await?;
        }
        Commands::Pause { session } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_pause(&engine, &session, format)?;
        }
        Commands::Resume { session, message } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_resume(&engine, &session, message.as_deref(), format)?;
        }
        Commands::Progress { project } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_progress(&engine, &project, format)?;
        }
        Commands::ClearProgress { project } => {
            let engine = engine_factory::build_engine(&config);
            session_cmds::handle_clear_progress(&engine, &project)?;
        }
        Commands::Sessions => {
            session_cmds::handle_sessions(&config.operational_store_dir(), format)?;
        }
        Commands::Learning { cmd } => {
            let store = orc_memory::FailureStore::new(config.learning_store_dir());
            match cmd {
                LearningCommands::List { run, step, class } => {
                    learning_cmds::handle_list(&store, run.as_deref(), step, class, format)?;
                }
                LearningCommands::Drift { step } => {
                    learning_cmds::handle_drift(&store, step)?;
                }
            }
        }
    }

    Ok(())
}
