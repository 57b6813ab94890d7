// Classifier backend abstraction
// The online detector only needs a scorer; training produces one (or none)

use crate::events::types::{FearLabel, HrvFeatures};

/// A trained model mapping one feature vector to a binary label
///
/// Implementations are immutable once built and must be cheap to call from
/// the ingestion loop.
pub trait FearScorer: Send + Sync {
    /// Predict the label for a single window
    fn score(&self, features: &HrvFeatures) -> FearLabel;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
