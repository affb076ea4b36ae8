use std::time::Duration;

use crate::ai::validation::ValidationResult;

/// One generated output for one prompt variant
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Index of the prompt variant, also the generation order
    pub variant: usize,
    pub text: String,
    pub elapsed: Duration,
    pub validation: ValidationResult,
    /// Whether `text` came from the repair step
    pub repaired: bool,
    pub request_id: String,
}

impl Candidate {
    /// Valid before invalid, then fewer signals
    fn rank_key(&self) -> (bool, usize) {
        (!self.validation.ok, self.validation.signals.len())
    }
}

/// Candidates of one escalation step with the selected winner
#[derive(Debug, Clone)]
pub struct Ranking {
    candidates: Vec<Candidate>,
    winner: usize,
}

impl Ranking {
    /// Pick the best candidate. Ties go to the earliest variant.
    /// Returns `None` for an empty list.
    pub fn from_candidates(candidates: Vec<Candidate>) -> Option<Self> {
        let winner = candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.rank_key())
            .map(|(i, _)| i)?;
        Some(Self { candidates, winner })
    }

    pub fn winner(&self) -> &Candidate {
        &self.candidates[self.winner]
    }

    pub fn winner_index(&self) -> usize {
        self.winner
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn into_winner(mut self) -> Candidate {
        self.candidates.swap_remove(self.winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::validation::Signal;
    use proptest::prelude::*;

    fn candidate(variant: usize, ok: bool, signals: Vec<Signal>) -> Candidate {
        Candidate {
            variant,
            text: format!("candidate {}", variant),
            elapsed: Duration::from_millis(10),
            validation: if ok {
                ValidationResult::valid(signals)
            } else {
                ValidationResult::invalid(signals, "bad")
            },
            repaired: false,
            request_id: format!("r{}", variant),
        }
    }

    #[test]
    fn test_valid_beats_invalid() {
        let ranking = Ranking::from_candidates(vec![
            candidate(0, false, vec![Signal::InvalidJson]),
            candidate(1, true, vec![Signal::UncertaintyMarkers, Signal::RefusalDetected]),
        ])
        .unwrap();
        assert_eq!(ranking.winner().variant, 1);
    }

    #[test]
    fn test_fewer_signals_wins() {
        let ranking = Ranking::from_candidates(vec![
            candidate(0, true, vec![Signal::UncertaintyMarkers]),
            candidate(1, true, vec![]),
        ])
        .unwrap();
        assert_eq!(ranking.winner().variant, 1);
        assert_eq!(ranking.winner_index(), 1);
    }

    #[test]
    fn test_tie_goes_to_first() {
        let ranking = Ranking::from_candidates(vec![
            candidate(0, true, vec![Signal::UncertaintyMarkers]),
            candidate(1, true, vec![Signal::RefusalDetected]),
        ])
        .unwrap();
        assert_eq!(ranking.winner_index(), 0);
        assert_eq!(ranking.into_winner().variant, 0);
    }

    #[test]
    fn test_empty() {
        assert!(Ranking::from_candidates(vec![]).is_none());
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<(bool, usize)>> {
        prop::collection::vec((any::<bool>(), 0usize..3), 1..6)
    }

    proptest! {
        #[test]
        fn prop_winner_is_earliest_minimum(specs in arb_candidates()) {
            let candidates: Vec<Candidate> = specs
                .iter()
                .enumerate()
                .map(|(i, (ok, n))| candidate(i, *ok, vec![Signal::UncertaintyMarkers; *n]))
                .collect();
            let ranking = Ranking::from_candidates(candidates).unwrap();
            let best = ranking.winner().rank_key();

            for (i, c) in ranking.candidates().iter().enumerate() {
                prop_assert!(c.rank_key() >= best);
                if i < ranking.winner_index() {
                    prop_assert!(c.rank_key() > best);
                }
            }
        }
    }
}
