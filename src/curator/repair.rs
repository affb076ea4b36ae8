//! Repair Step
//!
//! One corrective re-prompt for an invalid candidate. The repaired output is
//! adopted only when it validates; anything else, including a failed
//! backend call, keeps the original.

use std::time::Duration;
use tracing::{debug, warn};

use super::candidate::Candidate;
use crate::ai::gateway::{Generation, InferenceGateway};
use crate::ai::prompt::repair_prompt;
use crate::ai::validation::{ValidationResult, Validator};
use crate::router::DecodingOptions;
use crate::types::{Result, TaskFamily};

/// Result of a repair attempt
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    Original,
    Repaired {
        text: String,
        validation: ValidationResult,
        elapsed: Duration,
        request_id: String,
    },
}

impl RepairOutcome {
    /// Keep the repaired output only if it validated
    pub fn decide(attempt: Result<(Generation, ValidationResult)>) -> Self {
        match attempt {
            Ok((generation, validation)) if validation.ok => RepairOutcome::Repaired {
                text: generation.text,
                validation,
                elapsed: generation.elapsed,
                request_id: generation.request_id,
            },
            Ok((_, validation)) => {
                debug!(signals = ?validation.signals, "Repair did not validate, keeping original");
                RepairOutcome::Original
            }
            Err(e) => {
                warn!(error = %e, "Repair attempt failed, keeping original");
                RepairOutcome::Original
            }
        }
    }

    /// Fold the outcome into `candidate`
    pub fn apply(self, mut candidate: Candidate) -> Candidate {
        if let RepairOutcome::Repaired {
            text,
            validation,
            elapsed,
            request_id,
        } = self
        {
            candidate.text = text;
            candidate.validation = validation;
            candidate.elapsed += elapsed;
            candidate.request_id = request_id;
            candidate.repaired = true;
        }
        candidate
    }
}

/// Ask `model` to fix its own output and re-validate it
pub async fn repair(
    gateway: &InferenceGateway,
    validator: &Validator,
    family: &TaskFamily,
    model: &str,
    bad_text: &str,
    options: &DecodingOptions,
) -> RepairOutcome {
    let prompt = repair_prompt(family, bad_text);
    let attempt = match gateway.generate(model, &prompt, options).await {
        Ok(generation) => validator
            .validate(family, &generation.text)
            .map(|validation| (generation, validation)),
        Err(e) => Err(e),
    };
    RepairOutcome::decide(attempt)
}
