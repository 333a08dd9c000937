//! Diagnostics recorded while loading.
//!
//! Loading is best-effort: documents that cannot be fetched, references whose dimensions
//! cannot be merged and attributes naming unknown variables do not abort the load. Each such
//! skip is recorded as a [LoadDiagnostic] next to the partial graph so callers can see exactly
//! what was left out.

use crate::error::BaldError;

/// Why an ontology document contributed nothing to the index.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentProblem {
    /// No response, or a status other than 200.
    Unavailable { status: Option<u16> },
    /// A 200 response whose body did not parse as RDF.
    Unparseable(BaldError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadDiagnostic {
    /// A reference between two arrays was not created.
    SkippedReference {
        source: String,
        target: String,
        error: BaldError,
    },
    /// An ontology, alias or prefix document was not indexed.
    Document {
        uri: String,
        role: &'static str,
        problem: DocumentProblem,
    },
    /// A reference-valued attribute named variables that do not exist, so it was kept as text.
    UnresolvedReferenceTokens {
        source: String,
        attribute: String,
        tokens: Vec<String>,
    },
    /// A JSON-LD prefix context could not be read.
    PrefixContext { context: String, message: String },
    /// Coordinate values with `since` units whose origin could not be decoded.
    RawTemporalValues { variable: String, units: String },
}

impl LoadDiagnostic {
    pub fn skipped_reference(
        source: impl Into<String>,
        target: impl Into<String>,
        error: BaldError,
    ) -> Self {
        Self::SkippedReference {
            source: source.into(),
            target: target.into(),
            error,
        }
    }

    pub fn unavailable(uri: impl Into<String>, role: &'static str, status: Option<u16>) -> Self {
        Self::Document {
            uri: uri.into(),
            role,
            problem: DocumentProblem::Unavailable { status },
        }
    }

    pub fn unparseable(uri: impl Into<String>, role: &'static str, error: BaldError) -> Self {
        Self::Document {
            uri: uri.into(),
            role,
            problem: DocumentProblem::Unparseable(error),
        }
    }

    pub fn is_skipped_reference(&self) -> bool {
        matches!(self, Self::SkippedReference { .. })
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document { .. })
    }

    /// The source and target labels of a skipped reference.
    pub fn as_skipped_reference(&self) -> Option<(&str, &str, &BaldError)> {
        match self {
            Self::SkippedReference {
                source,
                target,
                error,
            } => Some((source, target, error)),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkippedReference {
                source,
                target,
                error,
            } => write!(f, "Skipped reference {source} -> {target}: {error}"),
            Self::Document {
                uri,
                role,
                problem: DocumentProblem::Unavailable { status },
            } => match status {
                Some(code) => write!(f, "{role} document {uri} unavailable (status {code})"),
                None => write!(f, "{role} document {uri} unavailable (no response)"),
            },
            Self::Document {
                uri,
                role,
                problem: DocumentProblem::Unparseable(error),
            } => write!(f, "{role} document {uri} not parsed: {error}"),
            Self::UnresolvedReferenceTokens {
                source,
                attribute,
                tokens,
            } => write!(
                f,
                "{source}: {attribute} names unknown variables: {}",
                tokens.join(" ")
            ),
            Self::PrefixContext { context, message } => {
                write!(f, "Prefix context {context} ignored: {message}")
            }
            Self::RawTemporalValues { variable, units } => {
                write!(f, "{variable}: could not decode '{units}', raw values kept")
            }
        }
    }
}
