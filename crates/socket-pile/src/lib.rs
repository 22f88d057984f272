pub mod cli;
pub mod engine;
pub mod error;
pub mod orchestrator;

pub use engine::acceptor::Acceptor;
pub use engine::piler::{pile_targets, pile_up, PileReport};
pub use engine::waitgroup::{Completion, WaitGroup};
pub use orchestrator::{run, Phase, RunSummary};
