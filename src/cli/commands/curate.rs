//! Curate Command
//!
//! Classify a request, run it up the backend ladder and print the outcome.
//!
//! Usage:
//!   escalator curate --input "..." [--task bug_triage] [--model auto] [--candidates 2]
//!   escalator curate --input @request.txt --format json --no-log

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, read_input};
use crate::curator::{CurateRequest, EscalationOutcome};
use crate::router::AUTO_MODEL;
use crate::types::Result;

/// Options for the curate command
#[derive(Debug, Clone, Default)]
pub struct CurateOptions {
    /// Literal text, or `@path` to read it from a file
    pub input: String,
    pub task: Option<String>,
    pub model: Option<String>,
    pub candidates: Option<usize>,
    pub format: String,
    pub no_log: bool,
}

pub async fn run(ctx: &CommandContext, options: CurateOptions) -> Result<()> {
    let input = read_input(&options.input)?;
    let escalator = ctx.escalator(!options.no_log)?;

    let mut request = CurateRequest::new(input);
    if let Some(task) = options.task {
        request = request.with_task(task);
    }
    if let Some(model) = options.model.filter(|m| m != AUTO_MODEL) {
        request = request.with_model(model);
    }
    if let Some(n) = options.candidates {
        request = request.with_candidates(n);
    }

    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received");
            watcher.cancel();
        }
    });

    let outcome = escalator.curate_with_cancel(request, token).await?;

    if options.format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &EscalationOutcome) {
    let output = Output::new();

    output.section("Outcome");
    output.field("task", &outcome.task_family);
    output.field(
        "model",
        format!("{} ({})", outcome.backend_used, outcome.backend_model),
    );
    output.state(outcome.state, outcome.attempted_chain_position);
    output.validation(&outcome.validation);
    if let Some(location) = &outcome.run_location {
        output.field("run", location);
    }

    if let Some(warning) = &outcome.warning {
        warn!(warning = %warning, "Outcome flagged");
        output.warning(warning);
    } else {
        output.success("Accepted");
    }

    output.section("Output");
    println!("{}", outcome.output_text);
}
