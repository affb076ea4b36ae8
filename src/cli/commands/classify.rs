//! Classify Command
//!
//! Print the task family the classifier assigns to a request.

use crate::cli::util::{CommandContext, read_input};
use crate::router::Classifier;
use crate::types::Result;

pub fn run(ctx: &CommandContext, text: &str) -> Result<()> {
    let classifier = Classifier::from_config(&ctx.config.routing)?;
    let input = read_input(text)?;
    println!("{}", classifier.classify(&input));
    Ok(())
}
