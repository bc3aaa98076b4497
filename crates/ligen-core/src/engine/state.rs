use crate::core::models::population::Population;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Where the population generation controller is in its cycle for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    SeedLoaded,
    Dispatching { round: usize },
    Collecting { round: usize },
    QuotaCheck { round: usize },
    Succeeded,
    Exhausted,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SeedLoaded => f.write_str("SeedLoaded"),
            Self::Dispatching { round } => write!(f, "Dispatching(round {round})"),
            Self::Collecting { round } => write!(f, "Collecting(round {round})"),
            Self::QuotaCheck { round } => write!(f, "QuotaCheck(round {round})"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Exhausted => f.write_str("Exhausted"),
        }
    }
}

/// An expected, per-attempt chemistry failure of crossover or mutation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttemptFailure {
    #[error("no common scaffold")]
    NoCommonScaffold,
    #[error("no applicable reaction")]
    NoApplicableReaction,
    #[error("no reagent available")]
    NoReagentAvailable,
    #[error("reaction failed")]
    ReactionFailed,
    #[error("malformed product")]
    MalformedProduct,
    #[error("identical to parent")]
    IdenticalToParent,
}

/// Every reason an attempt did not become an accepted ligand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectionCause {
    Operator(AttemptFailure),
    FilterRejected,
    Duplicate,
    WorkerPanic,
}

impl fmt::Display for RejectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator(failure) => write!(f, "{failure}"),
            Self::FilterRejected => f.write_str("rejected by filters"),
            Self::Duplicate => f.write_str("duplicate structure"),
            Self::WorkerPanic => f.write_str("worker panic"),
        }
    }
}

impl From<AttemptFailure> for RejectionCause {
    fn from(failure: AttemptFailure) -> Self {
        Self::Operator(failure)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureTally {
    counts: BTreeMap<RejectionCause, usize>,
}

impl FailureTally {
    pub fn record(&mut self, cause: impl Into<RejectionCause>) {
        *self.counts.entry(cause.into()).or_insert(0) += 1;
    }

    pub fn count(&self, cause: impl Into<RejectionCause>) -> usize {
        self.counts.get(&cause.into()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RejectionCause, usize)> + '_ {
        self.counts.iter().map(|(&cause, &count)| (cause, count))
    }

    /// The most frequent cause, ties resolved towards the first in cause order.
    pub fn dominant(&self) -> Option<RejectionCause> {
        self.counts
            .iter()
            .fold(None, |best: Option<(RejectionCause, usize)>, (&cause, &count)| {
                match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((cause, count)),
                }
            })
            .map(|(cause, _)| cause)
    }
}

impl fmt::Display for FailureTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(cause, count)| format!("{cause}: {count}"))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// Likely reason a generation could not meet its quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    InsufficientSeedDiversity,
    SeedsLackReactiveGroups,
    QuotasExceedLibraryCoverage,
    QuotasTooHigh,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InsufficientSeedDiversity => {
                "insufficient seed diversity: seed pairs rarely share a common scaffold"
            }
            Self::SeedsLackReactiveGroups => {
                "seeds lack reactive functional groups for the selected reaction library"
            }
            Self::QuotasExceedLibraryCoverage => {
                "quotas too high relative to reaction and reagent library coverage"
            }
            Self::QuotasTooHigh => {
                "quotas too high: most products were duplicates or rejected by the filters"
            }
        })
    }
}

impl Diagnosis {
    /// Picks the cause class from whichever operator fell short, by its dominant failure.
    pub fn from_shortfall(
        crossover_short: bool,
        crossover: &FailureTally,
        mutation_short: bool,
        mutation: &FailureTally,
    ) -> Self {
        use AttemptFailure::*;
        let crossover_cause = crossover_short.then(|| crossover.dominant()).flatten();
        let mutation_cause = mutation_short.then(|| mutation.dominant()).flatten();
        match (crossover_cause, mutation_cause) {
            (Some(RejectionCause::Operator(NoCommonScaffold)), _) => {
                Self::InsufficientSeedDiversity
            }
            (_, Some(RejectionCause::Operator(NoApplicableReaction))) => {
                Self::SeedsLackReactiveGroups
            }
            (_, Some(RejectionCause::Operator(NoReagentAvailable | ReactionFailed))) => {
                Self::QuotasExceedLibraryCoverage
            }
            _ => Self::QuotasTooHigh,
        }
    }
}

/// Terminal failure of a generation whose retry rounds ran out before its quotas were met.
#[derive(Debug, Clone, Error)]
#[error(
    "Generation {generation} exhausted after {rounds} rounds: {accepted_crossovers}/{target_crossovers} crossovers, {accepted_mutants}/{target_mutants} mutants; likely cause: {diagnosis}"
)]
pub struct GenerationFailure {
    pub generation: u32,
    pub rounds: usize,
    pub accepted_crossovers: usize,
    pub target_crossovers: usize,
    pub accepted_mutants: usize,
    pub target_mutants: usize,
    pub crossover_failures: FailureTally,
    pub mutation_failures: FailureTally,
    pub diagnosis: Diagnosis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub rounds: usize,
    pub attempts: usize,
    pub surplus: usize,
    pub crossover_failures: FailureTally,
    pub mutation_failures: FailureTally,
}

#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// Crossovers first, then mutants, each in acceptance order.
    Succeeded {
        population: Population,
        stats: GenerationStats,
    },
    Exhausted(GenerationFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_and_dominant_cause() {
        let mut tally = FailureTally::default();
        assert_eq!(tally.dominant(), None);
        tally.record(AttemptFailure::NoCommonScaffold);
        tally.record(RejectionCause::Duplicate);
        tally.record(RejectionCause::Duplicate);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.count(RejectionCause::Duplicate), 2);
        assert_eq!(tally.count(AttemptFailure::ReactionFailed), 0);
        assert_eq!(tally.dominant(), Some(RejectionCause::Duplicate));
        assert_eq!(
            tally.to_string(),
            "no common scaffold: 1, duplicate structure: 2"
        );
    }

    #[test]
    fn diagnosis_follows_the_failing_operator() {
        let mut crossover = FailureTally::default();
        crossover.record(AttemptFailure::NoCommonScaffold);
        let mut mutation = FailureTally::default();
        mutation.record(AttemptFailure::NoApplicableReaction);

        assert_eq!(
            Diagnosis::from_shortfall(true, &crossover, true, &mutation),
            Diagnosis::InsufficientSeedDiversity
        );
        assert_eq!(
            Diagnosis::from_shortfall(false, &crossover, true, &mutation),
            Diagnosis::SeedsLackReactiveGroups
        );

        let mut reagents = FailureTally::default();
        reagents.record(AttemptFailure::NoReagentAvailable);
        assert_eq!(
            Diagnosis::from_shortfall(false, &crossover, true, &reagents),
            Diagnosis::QuotasExceedLibraryCoverage
        );

        let mut duplicates = FailureTally::default();
        duplicates.record(RejectionCause::Duplicate);
        assert_eq!(
            Diagnosis::from_shortfall(true, &duplicates, false, &mutation),
            Diagnosis::QuotasTooHigh
        );
    }

    #[test]
    fn terminal_states() {
        assert!(GenerationState::Succeeded.is_terminal());
        assert!(GenerationState::Exhausted.is_terminal());
        assert!(!GenerationState::Dispatching { round: 1 }.is_terminal());
        assert_eq!(
            GenerationState::QuotaCheck { round: 2 }.to_string(),
            "QuotaCheck(round 2)"
        );
    }
}
