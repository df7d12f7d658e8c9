//! Definition navigation: collaborator traits, the context resolver and the
//! per-subscriber tracker wiring input events to presentation.

pub mod collaborators;
pub mod resolver;
pub mod tracker;

pub use collaborators::{
    DefinitionFallback, DefinitionPresenter, NavigationIntent, SourceSynthesizer, SymbolMapper,
    SymbolSource,
};
pub use resolver::{ContextResolver, ResolutionStrategy, ResolveError};
pub use tracker::DefinitionTracker;
