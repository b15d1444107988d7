pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod error;
pub mod data;
pub mod datasets;
pub mod objective;
pub mod stopping;
pub mod callback;
pub mod engine;
pub mod solver;
pub mod bench;
pub mod config;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use network::spec::NetworkSpec;
pub use loss::cross_entropy::CrossEntropyLoss;
pub use error::{BenchError, Result};
pub use datasets::{DatasetPayload, DatasetSource, Framework, SimulatedDataset, MnistDataset};
pub use objective::{Classifier, ClassificationObjective, Evaluator, ObjectiveValue};
pub use stopping::{Decision, SufficientProgressCriterion};
pub use callback::{Callback, ProgressCallback};
pub use engine::TrainingLoop;
pub use solver::{build_solver, GraphSolver, ImperativeSolver, ModelInitFn, Skip, Solver, SolverConfig, SolverGrid};
pub use bench::run_pair;
