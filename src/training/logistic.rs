// Logistic regression trainer
// Fits a binary linear classifier on standardized HRV features

use crate::events::backend::FearScorer;
use crate::events::types::{FearLabel, HrvFeatures};
use crate::training::dataset::TrainingSet;

const DIM: usize = HrvFeatures::DIM;

/// Columns with a spread below this are left unscaled
const MIN_SCALE: f64 = 1e-12;

/// Optimiser settings
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Hard cap on gradient-descent iterations
    pub max_iterations: usize,

    /// Step size on standardized features
    pub learning_rate: f64,

    /// Inverse L2 regularization strength (intercept is not penalized)
    pub inverse_regularization: f64,

    /// Stop once the gradient norm drops below this
    pub tolerance: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            max_iterations: 1000,
            learning_rate: 0.5,
            inverse_regularization: 1.0,
            tolerance: 1e-4,
        }
    }
}

/// Trained logistic model, immutable once fitted
#[derive(Debug, Clone)]
pub struct LogisticModel {
    means: [f64; DIM],
    scales: [f64; DIM],
    weights: [f64; DIM],
    bias: f64,
    iterations: usize,
}

impl LogisticModel {
    /// Signed distance to the decision boundary (> 0 means fear)
    pub fn decision(&self, features: &HrvFeatures) -> f64 {
        let x = self.standardize(&features.to_array());
        self.bias + dot(&self.weights, &x)
    }

    /// Probability of the fear class
    pub fn probability(&self, features: &HrvFeatures) -> f64 {
        sigmoid(self.decision(features))
    }

    pub fn weights(&self) -> [f64; DIM] {
        self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Iterations actually run during fitting
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn standardize(&self, raw: &[f64; DIM]) -> [f64; DIM] {
        let mut x = [0.0; DIM];
        for j in 0..DIM {
            x[j] = (raw[j] - self.means[j]) / self.scales[j];
        }
        x
    }
}

impl FearScorer for LogisticModel {
    fn score(&self, features: &HrvFeatures) -> FearLabel {
        let decision = self.decision(features);
        log::trace!(
            "model decision={:.4} p(fear)={:.3}",
            decision,
            sigmoid(decision)
        );
        if decision > 0.0 {
            FearLabel::Fear
        } else {
            FearLabel::Normal
        }
    }

    fn name(&self) -> &'static str {
        "logistic"
    }
}

/// Fit a classifier on `dataset`
///
/// Returns `None` (training inconclusive) when:
/// - the BPM log contributed no examples, even if seed data exists
/// - only one class is present
/// - inputs or fitted parameters are not finite
pub fn train(dataset: &TrainingSet, config: &TrainerConfig) -> Option<LogisticModel> {
    if dataset.derived_len() == 0 {
        log::warn!("Not enough real-time data yet to train a model");
        return None;
    }

    let samples: Vec<([f64; DIM], f64)> = dataset
        .iter()
        .map(|e| (e.features.to_array(), e.label.as_u8() as f64))
        .collect();

    if samples.iter().any(|(x, _)| x.iter().any(|v| !v.is_finite())) {
        log::warn!("Training data contains non-finite features, skipping model");
        return None;
    }

    let positives = samples.iter().filter(|(_, y)| *y == 1.0).count();
    if positives == 0 || positives == samples.len() {
        log::warn!(
            "Training data has a single class ({} of {} fear), skipping model",
            positives,
            samples.len()
        );
        return None;
    }

    let (means, scales) = column_stats(&samples);
    let standardized: Vec<([f64; DIM], f64)> = samples
        .iter()
        .map(|(raw, y)| {
            let mut x = [0.0; DIM];
            for j in 0..DIM {
                x[j] = (raw[j] - means[j]) / scales[j];
            }
            (x, *y)
        })
        .collect();

    let (weights, bias, iterations) = gradient_descent(&standardized, config);

    if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
        log::warn!("Model fitting diverged, skipping model");
        return None;
    }

    if iterations >= config.max_iterations {
        log::warn!(
            "Model did not converge within {} iterations",
            config.max_iterations
        );
    }

    log::info!(
        "Model trained on {} examples ({} fear) in {} iterations",
        samples.len(),
        positives,
        iterations
    );

    Some(LogisticModel {
        means,
        scales,
        weights,
        bias,
        iterations,
    })
}

fn column_stats(samples: &[([f64; DIM], f64)]) -> ([f64; DIM], [f64; DIM]) {
    let n = samples.len() as f64;
    let mut means = [0.0; DIM];
    let mut scales = [1.0; DIM];

    for j in 0..DIM {
        means[j] = samples.iter().map(|(x, _)| x[j]).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|(x, _)| (x[j] - means[j]).powi(2))
            .sum::<f64>()
            / n;
        let std = var.sqrt();
        if std > MIN_SCALE && std.is_finite() {
            scales[j] = std;
        }
    }

    (means, scales)
}

/// Full-batch gradient descent on mean log-loss + ||w||^2 / (2 C n)
fn gradient_descent(samples: &[([f64; DIM], f64)], config: &TrainerConfig) -> ([f64; DIM], f64, usize) {
    let n = samples.len() as f64;
    let l2 = 1.0 / (config.inverse_regularization * n);
    let mut weights = [0.0; DIM];
    let mut bias = 0.0;

    for iteration in 0..config.max_iterations {
        let mut grad_w = [0.0; DIM];
        let mut grad_b = 0.0;

        for (x, y) in samples {
            let err = sigmoid(bias + dot(&weights, x)) - y;
            for j in 0..DIM {
                grad_w[j] += err * x[j];
            }
            grad_b += err;
        }

        for j in 0..DIM {
            grad_w[j] = grad_w[j] / n + l2 * weights[j];
        }
        grad_b /= n;

        let grad_norm = (dot(&grad_w, &grad_w) + grad_b * grad_b).sqrt();
        if !grad_norm.is_finite() {
            return (weights, f64::NAN, iteration);
        }
        if grad_norm < config.tolerance {
            return (weights, bias, iteration);
        }

        for j in 0..DIM {
            weights[j] -= config.learning_rate * grad_w[j];
        }
        bias -= config.learning_rate * grad_b;
    }

    (weights, bias, config.max_iterations)
}

fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::dataset::LabeledExample;

    fn example(values: [f64; DIM], label: FearLabel) -> LabeledExample {
        LabeledExample {
            features: HrvFeatures::from_array(values),
            label,
        }
    }

    /// Fear examples have high short-term variability, normal ones low
    fn separable_examples() -> Vec<LabeledExample> {
        let mut examples = Vec::new();
        for i in 0..20 {
            let jitter = i as f64 * 0.1;
            examples.push(example([5.0 + jitter, 30.0, 0.2, 7.0], FearLabel::Normal));
            examples.push(example([40.0 + jitter, 60.0, 0.8, 9.0], FearLabel::Fear));
        }
        examples
    }

    #[test]
    fn test_learns_separable_data() {
        let dataset = TrainingSet::new(Vec::new(), separable_examples());
        let model = train(&dataset, &TrainerConfig::default()).unwrap();

        let calm = HrvFeatures::from_array([6.0, 31.0, 0.25, 7.1]);
        let scared = HrvFeatures::from_array([42.0, 58.0, 0.75, 8.9]);

        assert_eq!(model.score(&calm), FearLabel::Normal);
        assert_eq!(model.score(&scared), FearLabel::Fear);
        assert!(model.probability(&scared) > 0.5);
        assert!(model.probability(&calm) < 0.5);
        assert_eq!(model.name(), "logistic");
    }

    #[test]
    fn test_seed_only_is_inconclusive() {
        let dataset = TrainingSet::new(separable_examples(), Vec::new());
        assert!(train(&dataset, &TrainerConfig::default()).is_none());
    }

    #[test]
    fn test_empty_dataset_is_inconclusive() {
        assert!(train(&TrainingSet::default(), &TrainerConfig::default()).is_none());
    }

    #[test]
    fn test_single_class_is_inconclusive() {
        let derived = vec![
            example([1.0, 2.0, 3.0, 4.0], FearLabel::Normal),
            example([2.0, 3.0, 4.0, 5.0], FearLabel::Normal),
        ];
        let dataset = TrainingSet::new(Vec::new(), derived);
        assert!(train(&dataset, &TrainerConfig::default()).is_none());
    }

    #[test]
    fn test_seed_supplies_second_class() {
        let seed = vec![example([40.0, 60.0, 0.8, 9.0], FearLabel::Fear)];
        let derived = vec![
            example([5.0, 30.0, 0.2, 7.0], FearLabel::Normal),
            example([6.0, 31.0, 0.3, 7.2], FearLabel::Normal),
        ];
        let dataset = TrainingSet::new(seed, derived);
        assert!(train(&dataset, &TrainerConfig::default()).is_some());
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let derived = vec![
            example([f64::INFINITY, 2.0, 3.0, 4.0], FearLabel::Fear),
            example([1.0, 2.0, 3.0, 4.0], FearLabel::Normal),
        ];
        let dataset = TrainingSet::new(Vec::new(), derived);
        assert!(train(&dataset, &TrainerConfig::default()).is_none());
    }

    #[test]
    fn test_constant_column_is_tolerated() {
        let derived: Vec<LabeledExample> = (0..10)
            .map(|i| {
                let label = if i % 2 == 0 { FearLabel::Fear } else { FearLabel::Normal };
                let base = if label.is_fear() { 30.0 } else { 5.0 };
                let sd1 = base + i as f64;
                example([sd1, 50.0, 0.5, 8.0], label)
            })
            .collect();
        let dataset = TrainingSet::new(Vec::new(), derived);
        let model = train(&dataset, &TrainerConfig::default()).unwrap();

        assert!(model.weights().iter().all(|w| w.is_finite()));
        assert!(model.bias().is_finite());
    }

    #[test]
    fn test_iteration_cap_respected() {
        let dataset = TrainingSet::new(Vec::new(), separable_examples());
        let config = TrainerConfig {
            max_iterations: 3,
            ..TrainerConfig::default()
        };
        let model = train(&dataset, &config).unwrap();
        assert!(model.iterations() <= 3);
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }
}
