//! Candidate Ranker
//!
//! Generates one candidate per prompt variant, validates each, repairs the
//! invalid ones once, and selects the winner. Variants run sequentially or,
//! when configured, concurrently; either way results keep variant order.

use futures::future::try_join_all;
use tracing::{debug, instrument};

use super::candidate::{Candidate, Ranking};
use super::repair::repair;
use crate::ai::gateway::InferenceGateway;
use crate::ai::prompt::prompt_variants;
use crate::ai::validation::Validator;
use crate::router::{DecodingOptions, ModelInfo};
use crate::types::{EscalatorError, Result, TaskFamily};

pub struct CandidateRanker<'a> {
    gateway: &'a InferenceGateway,
    validator: &'a Validator,
    parallel: bool,
}

impl<'a> CandidateRanker<'a> {
    pub fn new(gateway: &'a InferenceGateway, validator: &'a Validator, parallel: bool) -> Self {
        Self {
            gateway,
            validator,
            parallel,
        }
    }

    /// Rank `n` variants of `base_prompt` on `model`.
    ///
    /// The first transport error aborts the step.
    #[instrument(skip(self, base_prompt, options), fields(model = %model.key))]
    pub async fn rank(
        &self,
        family: &TaskFamily,
        model: &ModelInfo,
        base_prompt: &str,
        options: &DecodingOptions,
        n: usize,
    ) -> Result<Ranking> {
        let variants = prompt_variants(base_prompt, n);

        let candidates = if self.parallel {
            try_join_all(
                variants
                    .iter()
                    .enumerate()
                    .map(|(i, prompt)| self.run_variant(i, prompt, family, model, options)),
            )
            .await?
        } else {
            let mut candidates = Vec::with_capacity(variants.len());
            for (i, prompt) in variants.iter().enumerate() {
                candidates.push(self.run_variant(i, prompt, family, model, options).await?);
            }
            candidates
        };

        let ranking = Ranking::from_candidates(candidates)
            .ok_or_else(|| EscalatorError::Config("no prompt variants generated".to_string()))?;

        debug!(
            winner = ranking.winner_index(),
            ok = ranking.winner().validation.ok,
            signals = ranking.winner().validation.signals.len(),
            "Ranked candidates"
        );
        Ok(ranking)
    }

    async fn run_variant(
        &self,
        variant: usize,
        prompt: &str,
        family: &TaskFamily,
        model: &ModelInfo,
        options: &DecodingOptions,
    ) -> Result<Candidate> {
        let generation = self
            .gateway
            .generate(&model.backend_name, prompt, options)
            .await?;
        let validation = self.validator.validate(family, &generation.text)?;

        let candidate = Candidate {
            variant,
            text: generation.text,
            elapsed: generation.elapsed,
            validation,
            repaired: false,
            request_id: generation.request_id,
        };

        if candidate.validation.ok {
            return Ok(candidate);
        }

        debug!(variant, signals = ?candidate.validation.signals, "Invalid candidate, attempting repair");
        let outcome = repair(
            self.gateway,
            self.validator,
            family,
            &model.backend_name,
            &candidate.text,
            options,
        )
        .await;
        Ok(outcome.apply(candidate))
    }
}
