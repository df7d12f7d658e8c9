//! Traits for the external analysis services the resolver calls into.
//!
//! Symbol resolution, cross-workspace mapping, navigation intent and source
//! synthesis all live in the host; this layer only orchestrates them. Every
//! trait is object-safe so hosts can register implementations dynamically.

use async_trait::async_trait;

use crate::models::{
    DocumentHandle, Location, NavigationTarget, Position, ResolvedSymbol, SynthesizedSource,
};

/// Primary symbol source backed by the host's semantic analysis.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// Whether a semantic model is available for the document's language.
    fn supports_semantics(&self, document: &DocumentHandle) -> bool;

    /// Resolves the symbol under `position`, if any.
    async fn symbol_at(
        &self,
        document: &DocumentHandle,
        position: Position,
    ) -> anyhow::Result<Option<ResolvedSymbol>>;
}

/// Lighter "go to definition" service used when no semantic model exists for
/// the document's language. Its results convert directly to locations.
#[async_trait]
pub trait DefinitionFallback: Send + Sync {
    async fn definitions(
        &self,
        document: &DocumentHandle,
        position: Position,
    ) -> anyhow::Result<Vec<Location>>;
}

/// Maps a symbol across logical workspace boundaries.
///
/// Returns `None` when the symbol already lives in the current workspace;
/// the resolver then keeps the original.
#[async_trait]
pub trait SymbolMapper: Send + Sync {
    async fn map_symbol(
        &self,
        symbol: &ResolvedSymbol,
        document: &DocumentHandle,
    ) -> anyhow::Result<Option<ResolvedSymbol>>;
}

/// External navigation collaborator for targets this layer cannot reach
/// itself (e.g. cross-language).
#[async_trait]
pub trait NavigationIntent: Send + Sync {
    /// `Some(target)` when the collaborator would navigate directly to the
    /// symbol; `None` declines.
    async fn would_navigate(
        &self,
        symbol: &ResolvedSymbol,
    ) -> anyhow::Result<Option<NavigationTarget>>;
}

/// On-demand source generation for navigable symbols without source.
#[async_trait]
pub trait SourceSynthesizer: Send + Sync {
    /// Synthesizes a source file for `symbol`. `allow_decompilation` is
    /// always false on the resolver's path: no interactive prompt is
    /// possible there.
    async fn synthesize(
        &self,
        symbol: &ResolvedSymbol,
        allow_decompilation: bool,
    ) -> anyhow::Result<SynthesizedSource>;
}

/// Renders resolved locations. Always invoked on the main context.
pub trait DefinitionPresenter: Send + Sync {
    fn present(&self, locations: Vec<Location>);
}
