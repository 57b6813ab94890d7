// Training module
// Builds the labeled dataset and fits the fear classifier at startup

pub mod dataset;
pub mod logistic;

pub use dataset::{DatasetError, DatasetLoader, LabeledExample, TrainingSet};
pub use logistic::{train, LogisticModel, TrainerConfig};
