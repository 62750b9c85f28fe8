mod executor;
pub mod prompt;

pub use executor::{
    PersistenceStatus, PipelineExecutor, PipelineTimeouts, TurnAnswer, TurnOutput, TurnRequest,
};
