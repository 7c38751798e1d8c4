/*!
 * Error handling for Part D formulary analysis operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Part D library result type
pub type Result<T> = std::result::Result<T, PartdError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum PartdError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// No candidate encoding could decode the file
    #[error("Unable to decode '{}' with any candidate encoding (tried: {})", .path.display(), .attempted.join(", "))]
    Decode {
        path: PathBuf,
        attempted: Vec<String>,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        context: ErrorContext,
    },

    /// Required column absent from a decoded file
    #[error("Missing required column '{column}' in '{}'", .path.display())]
    MissingColumn {
        column: String,
        path: PathBuf,
        available: Vec<String>,
    },

    /// Field-level validation errors with detailed information
    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// File not found with suggestions
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Invalid NDC with format guidance
    #[error("Invalid NDC '{ndc}': {reason}")]
    InvalidNdc {
        ndc: String,
        reason: String,
        suggestion: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub record_ndc: Option<String>,
}

/// Export format for report output and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "CSV"),
            ExportFormat::Json => write!(f, "JSON"),
        }
    }
}

impl PartdError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let name = path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_lowercase();
        let suggestion = if name.contains("formulary") {
            format!(
                "Check if the file exists at '{}'. Monthly Part D extracts name this file \
                'basic drugs formulary file  YYYYMMDD.txt' inside the CMS release archive.",
                path.display()
            )
        } else if name.contains("plan") {
            format!(
                "Check if the file exists at '{}'. Monthly Part D extracts name this file \
                'plan information  YYYYMMDD.txt' inside the CMS release archive.",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an invalid NDC error with validation details
    pub fn invalid_ndc(ndc: &str) -> Self {
        let (reason, suggestion) = if ndc.is_empty() {
            ("NDC cannot be empty".to_string(),
             "Provide an NDC of up to 11 digits".to_string())
        } else if !ndc.chars().all(|c| c.is_ascii_digit()) {
            ("NDC must contain only digits".to_string(),
             "Remove any dashes, spaces or other non-numeric characters from the NDC".to_string())
        } else {
            (format!("NDC has more than 11 significant digits ({})", ndc.len()),
             "An NDC normalizes to an 11-digit zero-padded code; check for concatenated or corrupted values".to_string())
        };

        Self::InvalidNdc {
            ndc: ndc.to_string(),
            reason,
            suggestion,
        }
    }

    /// Create a missing column error for a file
    pub fn missing_column(column: &str, path: &std::path::Path, headers: &[String]) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
            available: headers.to_vec(),
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::InvalidNdc { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::MissingColumn { available, .. } => {
                format!("{}\n\nColumns present: {}", self, available.join(", "))
            }
            Self::Decode { .. } => {
                format!("{}\n\nSuggestion: add the file's encoding to the candidate list (see PartdConfig::encodings)", self)
            }
            Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for PartdError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for PartdError {
    fn from(err: csv::Error) -> Self {
        let (line, message) = match err.position() {
            Some(pos) => (Some(pos.line() as usize), err.to_string()),
            None => (None, err.to_string()),
        };

        Self::CsvParse {
            message,
            line,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for PartdError {
    fn from(err: serde_json::Error) -> Self {
        PartdError::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}
