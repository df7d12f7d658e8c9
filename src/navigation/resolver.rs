//! Position-to-locations resolution with ordered fallback strategies.
//!
//! The layered delegation chains (navigation intent, declared source,
//! synthesized source) are modeled as an ordered list of polymorphic
//! strategies; the first one that yields locations wins and the rest are
//! never consulted. Adding a navigation path means adding a strategy, not
//! another nesting level.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::metrics;
use crate::models::{DocumentHandle, Location, Position, ResolvedSymbol, Span};
use crate::navigation::collaborators::{
    DefinitionFallback, NavigationIntent, SourceSynthesizer, SymbolMapper, SymbolSource,
};

/// Resolution aborts. Cancellation is the only abort the resolver surfaces;
/// collaborator failures degrade to empty results at the call site instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resolution was cancelled")]
    Cancelled,
}

/// One step in the ordered navigation fallback chain.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Locations this strategy can produce for `symbol`; empty means the
    /// next strategy is consulted.
    async fn locations(
        &self,
        symbol: &ResolvedSymbol,
        token: &CancellationToken,
    ) -> anyhow::Result<Vec<Location>>;
}

/// Consulted first: an external collaborator claims the navigation outright
/// and reports a single file/line/column target.
pub struct DirectNavigationStrategy {
    intent: Arc<dyn NavigationIntent>,
}

impl DirectNavigationStrategy {
    pub fn new(intent: Arc<dyn NavigationIntent>) -> Self {
        Self { intent }
    }
}

#[async_trait]
impl ResolutionStrategy for DirectNavigationStrategy {
    fn name(&self) -> &'static str {
        "direct_navigation"
    }

    async fn locations(
        &self,
        symbol: &ResolvedSymbol,
        _token: &CancellationToken,
    ) -> anyhow::Result<Vec<Location>> {
        let Some(target) = self.intent.would_navigate(symbol).await? else {
            return Ok(Vec::new());
        };
        trace!(symbol = %symbol.name, path = %target.path.display(), "navigation intent claimed symbol");
        Ok(vec![Location::new(
            symbol.name.clone(),
            target.path,
            Span::point(Position::new(target.line, target.character)),
        )])
    }
}

/// One location per source declaration, in the order the analysis
/// collaborator declared them.
pub struct DeclaredSourceStrategy;

#[async_trait]
impl ResolutionStrategy for DeclaredSourceStrategy {
    fn name(&self) -> &'static str {
        "declared_source"
    }

    async fn locations(
        &self,
        symbol: &ResolvedSymbol,
        _token: &CancellationToken,
    ) -> anyhow::Result<Vec<Location>> {
        Ok(symbol
            .declarations
            .iter()
            .map(|site| Location::new(symbol.name.clone(), site.path.clone(), site.span))
            .collect())
    }
}

/// Last resort: a navigable binary-only symbol gets exactly one source file
/// synthesized on demand, decompilation disabled.
pub struct SynthesizedSourceStrategy {
    synthesizer: Arc<dyn SourceSynthesizer>,
}

impl SynthesizedSourceStrategy {
    pub fn new(synthesizer: Arc<dyn SourceSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl ResolutionStrategy for SynthesizedSourceStrategy {
    fn name(&self) -> &'static str {
        "synthesized_source"
    }

    async fn locations(
        &self,
        symbol: &ResolvedSymbol,
        _token: &CancellationToken,
    ) -> anyhow::Result<Vec<Location>> {
        if !symbol.is_binary_only() {
            return Ok(Vec::new());
        }
        let source = self.synthesizer.synthesize(symbol, false).await?;
        Ok(vec![Location::new(
            symbol.name.clone(),
            source.path,
            source.identifier_span,
        )])
    }
}

/// Resolves a document position to zero or more navigable locations via the
/// host's analysis collaborators.
pub struct ContextResolver {
    symbols: Arc<dyn SymbolSource>,
    fallback: Arc<dyn DefinitionFallback>,
    mapper: Option<Arc<dyn SymbolMapper>>,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl ContextResolver {
    pub fn new(
        symbols: Arc<dyn SymbolSource>,
        fallback: Arc<dyn DefinitionFallback>,
        mapper: Option<Arc<dyn SymbolMapper>>,
        intent: Arc<dyn NavigationIntent>,
        synthesizer: Arc<dyn SourceSynthesizer>,
    ) -> Self {
        Self {
            symbols,
            fallback,
            mapper,
            strategies: vec![
                Box::new(DirectNavigationStrategy::new(intent)),
                Box::new(DeclaredSourceStrategy),
                Box::new(SynthesizedSourceStrategy::new(synthesizer)),
            ],
        }
    }

    /// Appends a strategy after the built-in chain.
    pub fn push_strategy(&mut self, strategy: Box<dyn ResolutionStrategy>) {
        self.strategies.push(strategy);
    }

    /// Resolves `position` to navigable locations.
    ///
    /// The token is checked before every external call; a cancelled token
    /// aborts the whole resolution with no partial result.
    pub async fn resolve(
        &self,
        document: &DocumentHandle,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Vec<Location>, ResolveError> {
        let start = Instant::now();
        metrics().record_resolution();
        ensure_live(token)?;

        if !self.symbols.supports_semantics(document) {
            debug!(document = %document.id, language = %document.language,
                   "no semantic model; delegating to definition fallback");
            let locations = match self.fallback.definitions(document, position).await {
                Ok(locations) => locations,
                Err(error) => {
                    warn!(document = %document.id, "definition fallback failed: {error:#}");
                    Vec::new()
                }
            };
            metrics().record_timing("resolve_fallback", start.elapsed());
            return Ok(locations);
        }

        let symbol = match self.symbols.symbol_at(document, position).await {
            Ok(Some(symbol)) => symbol,
            Ok(None) => {
                trace!(document = %document.id, %position, "no symbol at position");
                return Ok(Vec::new());
            }
            Err(error) => {
                warn!(document = %document.id, %position, "symbol lookup failed: {error:#}");
                return Ok(Vec::new());
            }
        };

        let symbol = self.map_across_workspaces(symbol, document, token).await?;

        for strategy in &self.strategies {
            ensure_live(token)?;
            match strategy.locations(&symbol, token).await {
                Ok(locations) if !locations.is_empty() => {
                    debug!(strategy = strategy.name(), count = locations.len(),
                           symbol = %symbol.name, "navigation strategy produced locations");
                    metrics().record_timing("resolve_semantic", start.elapsed());
                    return Ok(locations);
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(strategy = strategy.name(), symbol = %symbol.name,
                          "navigation strategy failed: {error:#}");
                }
            }
        }

        metrics().record_timing("resolve_semantic", start.elapsed());
        Ok(Vec::new())
    }

    /// Maps the symbol across workspace boundaries when a mapper is
    /// registered. A declined or failed mapping keeps the original symbol.
    async fn map_across_workspaces(
        &self,
        symbol: ResolvedSymbol,
        document: &DocumentHandle,
        token: &CancellationToken,
    ) -> Result<ResolvedSymbol, ResolveError> {
        let Some(mapper) = &self.mapper else {
            return Ok(symbol);
        };
        ensure_live(token)?;
        match mapper.map_symbol(&symbol, document).await {
            Ok(Some(mapped)) => {
                trace!(from = %symbol.name, to = %mapped.name, "symbol mapped across workspaces");
                Ok(mapped)
            }
            Ok(None) => Ok(symbol),
            Err(error) => {
                warn!(symbol = %symbol.name, "symbol mapping failed: {error:#}");
                Ok(symbol)
            }
        }
    }
}

fn ensure_live(token: &CancellationToken) -> Result<(), ResolveError> {
    if token.is_cancelled() {
        Err(ResolveError::Cancelled)
    } else {
        Ok(())
    }
}
