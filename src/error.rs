use std::{fmt, io};

use http::status::StatusCode;
use oxigraph::{io::RdfParseError, model::IriParseError};
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BaldError {
    #[error("Ambiguous alias '{identifier}': {} candidate definitions ({})", .candidates.len(), .candidates.join(", "))]
    AmbiguousAlias {
        identifier: String,
        candidates: Vec<String>,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("{0} is not a HTTP URI.")]
    NotHttpUri(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Malformed ontology payload from {uri}: {message}")]
    Ontology { uri: String, message: String },
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Reshape lists must have the same count for the multiplication of elements: {0}")]
    Reshape(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl BaldError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BaldError::AmbiguousAlias { .. } => StatusCode::CONFLICT,
            BaldError::Config(_) => StatusCode::BAD_REQUEST,
            BaldError::Http(_) => StatusCode::BAD_GATEWAY,
            BaldError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BaldError::NotHttpUri(_) => StatusCode::BAD_REQUEST,
            BaldError::NotFound(_) => StatusCode::NOT_FOUND,
            BaldError::Ontology { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BaldError::PermissionDenied => StatusCode::FORBIDDEN,
            BaldError::Reshape(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BaldError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn ontology(uri: impl Into<String>, message: impl fmt::Display) -> Self {
        BaldError::Ontology {
            uri: uri.into(),
            message: message.to_string(),
        }
    }
}

impl From<toml::de::Error> for BaldError {
    fn from(src: toml::de::Error) -> BaldError {
        BaldError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for BaldError {
    fn from(src: JsonError) -> BaldError {
        BaldError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<serde_yaml::Error> for BaldError {
    fn from(src: serde_yaml::Error) -> BaldError {
        BaldError::Serialization(format!("YAML deserialization error: {src}"))
    }
}

impl From<UrlParseError> for BaldError {
    fn from(src: UrlParseError) -> BaldError {
        BaldError::Config(format!("Invalid URL: {src}"))
    }
}

impl From<IriParseError> for BaldError {
    fn from(src: IriParseError) -> BaldError {
        BaldError::Serialization(format!("Invalid IRI: {src}"))
    }
}

impl From<RdfParseError> for BaldError {
    fn from(src: RdfParseError) -> BaldError {
        BaldError::Serialization(format!("RDF parse error: {src}"))
    }
}

impl From<reqwest::Error> for BaldError {
    fn from(src: reqwest::Error) -> BaldError {
        if src.is_timeout() {
            BaldError::Http(format!("request timed out: {src}"))
        } else {
            BaldError::Http(format!("{src}"))
        }
    }
}

impl From<io::Error> for BaldError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => BaldError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => BaldError::PermissionDenied,
            _ => BaldError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for BaldError {
    fn from(x: fmt::Error) -> Self {
        BaldError::Serialization(format!("{x}"))
    }
}

impl From<std::string::FromUtf8Error> for BaldError {
    fn from(x: std::string::FromUtf8Error) -> Self {
        BaldError::Serialization(format!("Serializer produced invalid UTF-8: {x}"))
    }
}

impl From<RegexError> for BaldError {
    fn from(x: RegexError) -> Self {
        BaldError::Serialization(format!("Regex parse failed: {x}"))
    }
}
