//! Core data types shared across the scheduling, navigation and search layers.
//!
//! Everything here is plain data: the scheduling core never inspects these
//! records beyond passing them between collaborators, so they stay `Clone`
//! and serializable for host-side caching or logging.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Zero-based line/character position within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Extent of a navigable location.
///
/// Hosts report spans either as line/column pairs or as raw byte offsets
/// depending on which collaborator produced them; both forms are preserved
/// verbatim rather than converted, since conversion needs document text the
/// scheduling layer never sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Span {
    LineColumn { start: Position, end: Position },
    Offsets { start: usize, end: usize },
}

impl Span {
    /// Collapsed span at a single line/column point.
    pub fn point(position: Position) -> Self {
        Span::LineColumn {
            start: position,
            end: position,
        }
    }
}

/// Immutable navigable location handed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub display_text: String,
    pub path: PathBuf,
    pub span: Span,
}

impl Location {
    pub fn new(display_text: impl Into<String>, path: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            display_text: display_text.into(),
            path: path.into(),
            span,
        }
    }
}

/// Identity of an open document within the host, assigned serially on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Lightweight handle describing a document to the resolution collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub id: DocumentId,
    pub path: PathBuf,
    /// Language identifier the host associates with the document, e.g.
    /// `"rust"` or `"plaintext"`. Drives the semantic-model support check.
    pub language: String,
}

impl DocumentHandle {
    pub fn new(id: DocumentId, path: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            language: language.into(),
        }
    }
}

/// One source declaration site of a resolved symbol.
///
/// Sites are kept in the order the analysis collaborator reported them; the
/// resolver never re-sorts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationSite {
    pub path: PathBuf,
    pub span: Span,
}

/// Symbol resolved by the host's semantic analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSymbol {
    pub name: String,
    /// Source declaration sites, in declaration order. Empty for symbols that
    /// only exist in binary form.
    pub declarations: Vec<DeclarationSite>,
    /// Whether the host can navigate to this symbol even without source.
    pub navigable: bool,
}

impl ResolvedSymbol {
    /// True when the symbol has no source but the host can still navigate to
    /// it (metadata-only symbols eligible for on-demand source synthesis).
    pub fn is_binary_only(&self) -> bool {
        self.declarations.is_empty() && self.navigable
    }
}

/// Direct navigation target reported by an external navigation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub path: PathBuf,
    pub line: u32,
    pub character: u32,
}

/// Source file synthesized on demand for a binary-only symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizedSource {
    pub path: PathBuf,
    /// Span of the declared identifier inside the synthesized file.
    pub identifier_span: Span,
}
