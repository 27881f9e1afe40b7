//! Main entry point for the chain orchestrator CLI.

use std::sync::Arc;

use anyhow::{Context, Result};
use chain_orchestrator::{
    cli::{self, Commands},
    discovery::{self, CapabilityDiscovery},
    error::ChainError,
    invoker::CliInvoker,
    orchestrator::{ChainOrchestrator, ChainReport},
    prompt::PromptEvaluator,
    settings::Settings,
    telemetry,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let mut settings = Settings::load_from(args.config.as_deref())?;
    if let Some(root) = args.repo_root {
        settings.discovery.repo_root = root;
    }

    telemetry::init(&settings.logging)?;

    let registry = CapabilityDiscovery::from_config(&settings.discovery)
        .discover_registry()
        .context("capability discovery failed")?;

    let invoker = CliInvoker::from_config(&settings.invoker);
    if matches!(args.command, Commands::Run { .. } | Commands::Chain { .. })
        && !invoker.is_available().await
    {
        warn!(program = invoker.program(), "capability CLI not found; every step will fail");
    }

    let orchestrator = ChainOrchestrator::new(
        Arc::new(registry),
        PromptEvaluator::default(),
        Arc::new(invoker),
        settings.orchestrator.clone(),
    );

    // Ctrl-C stops the chain at the next step boundary.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling chain");
            signal_token.cancel();
        }
    });

    match args.command {
        Commands::Run { prompt, json } => {
            let result = orchestrator.run_automatic_with_cancel(&prompt, &cancel).await;
            print_result(result, json)
        }
        Commands::Chain { agents, prompt, json } => {
            let result = orchestrator
                .run_explicit_with_cancel(&prompt, agents.as_slice(), &cancel)
                .await;
            print_result(result, json)
        }
        Commands::List { json } => {
            if json {
                println!("{}", discovery::export_json(orchestrator.registry())?);
            } else {
                for capability in orchestrator.list_capabilities() {
                    println!(
                        "{:<28} {} [{}]",
                        capability.name,
                        capability.description,
                        capability.keywords.join(", ")
                    );
                }
            }
            Ok(())
        }
        Commands::Evaluate { prompt } => {
            let evaluation = orchestrator.evaluate_prompt(&prompt);
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
            Ok(())
        }
    }
}

fn print_result(result: Result<ChainReport, ChainError>, json: bool) -> Result<()> {
    match result {
        Ok(report) => print_report(&report, json),
        Err(ChainError::Cancelled { completed, report }) => {
            print_report(&report, json)?;
            Err(anyhow::anyhow!("chain cancelled after {completed} step(s)"))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &ChainReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("Rationale: {}\n", report.rationale);
        print!("{}", report.final_output);
    }
    Ok(())
}
