pub mod candidate;
pub mod evolution_engine;
pub mod factory;
pub mod gene_spec;
pub mod generation_store;
pub mod hall_of_fame;
pub mod operators;
pub mod optimisation;
pub mod progress;
pub mod termination;

pub use candidate::Candidate;
pub use evolution_engine::{EngineState, EvolutionEngine, StopHandle};
pub use factory::{CandidateFactory, CartesianEnumerator};
pub use gene_spec::{GeneDomain, GeneSpec};
pub use generation_store::{Generation, GenerationStore};
pub use hall_of_fame::HallOfFame;
pub use progress::{
    ChannelProgressCallback, ConsoleProgressCallback, ProgressCallback, ProgressMessage,
};
pub use termination::{
    AllOf, AnyOf, FitnessStagnation, FruitlessLimit, GenerationLimit, SearchState, Termination,
};
pub use optimisation::{
    methods::{
        base::{ValidationMethod, WalkForwardReport, WindowReport, WindowValidation},
        wfo::WalkForwardDriver,
    },
    splitters::{
        base::WindowSplitter,
        wfo::WalkForwardSplitter,
        types::{SearchWindow, SplitConfig, WindowType},
    },
};
