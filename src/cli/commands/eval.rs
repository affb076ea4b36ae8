//! Eval Command
//!
//! Golden-set report: counts per family and classifier accuracy.

use std::path::PathBuf;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::eval::{EvalReport, evaluate};
use crate::router::Classifier;
use crate::types::Result;

pub fn run(
    ctx: &CommandContext,
    golden: Option<PathBuf>,
    limit: Option<usize>,
    format: &str,
) -> Result<()> {
    let path = golden.unwrap_or_else(|| ctx.config.paths.golden_file.clone());
    let classifier = Classifier::from_config(&ctx.config.routing)?;
    let report = evaluate(&path, &classifier, limit)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &EvalReport) {
    let output = Output::new();

    output.header(&format!("Golden set: {}", report.file.display()));
    if report.total == 0 {
        output.info("No golden tasks found.");
        return;
    }

    output.section("Tasks per family");
    for (family, count) in &report.golden_counts {
        output.field(family.as_str(), count);
    }

    if let Some(accuracy) = &report.classifier {
        output.section("Classifier");
        output.field(
            "accuracy",
            format!(
                "{:.1}% ({}/{})",
                accuracy.accuracy * 100.0,
                accuracy.correct,
                accuracy.labelled
            ),
        );
        for m in &accuracy.mismatches {
            output.warning(&format!(
                "line {}: expected {}, got {}",
                m.line, m.expected, m.predicted
            ));
        }
    }
}
