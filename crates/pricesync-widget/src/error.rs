//! # Widget Error Types
//!
//! Error types for the widget runtime.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Widget Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Activation     │  │   Document      │  │   Remote calculation    │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Config         │  │  NodeNotFound   │  │  RequestFailed          │ │
//! │  │  Validation     │  │  NotAnElement   │  │  HttpStatus             │ │
//! │  │  UnknownWidget  │  │  InvalidTree    │  │  InvalidResponse        │ │
//! │  │                 │  │  InvalidSelector│  │  NoRuntime              │ │
//! │  │                 │  │                 │  │  Cancelled              │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pricesync_core::{CoreError, ValidationError};
use thiserror::Error;

use crate::dom::NodeId;
use crate::page::WidgetId;

/// Result type alias for widget operations.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Widget error type covering activation, document and remote failures.
///
/// ## Design Principles
/// - Each variant includes enough context for the log line it ends up in
/// - None of them is fatal: the page logs and keeps running
/// - All errors are `Send + Sync` so they can cross the response channel
#[derive(Debug, Error)]
pub enum WidgetError {
    // =========================================================================
    // Activation Errors
    // =========================================================================
    /// Options could not be parsed or merged.
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    /// A precondition of activation is not met.
    #[error("Edit price helper error: {0}")]
    Validation(#[from] ValidationError),

    /// The widget id does not belong to this page.
    #[error("Unknown widget: {0}")]
    UnknownWidget(WidgetId),

    // =========================================================================
    // Document Errors
    // =========================================================================
    /// Node id does not exist in the document.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Operation requires an element node.
    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    /// Insertion would detach the root or create a cycle.
    #[error("Invalid tree operation: {0}")]
    InvalidTree(String),

    /// Selector syntax is not supported.
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    // =========================================================================
    // Remote Calculation Errors
    // =========================================================================
    /// Transport-level failure (connection refused, timeout, ...).
    #[error("Calculation request failed: {0}")]
    RequestFailed(String),

    /// Endpoint answered with a non-2xx status.
    #[error("Calculation endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// Response body is not a number.
    #[error("Calculation endpoint returned a non-numeric body: {0:?}")]
    InvalidResponse(String),

    /// Remote mode needs an ambient tokio runtime.
    #[error("No async runtime available for remote calculation")]
    NoRuntime,

    /// The calculation task was dropped before it finished, e.g. because
    /// its runtime shut down.
    #[error("Calculation task ended before delivering a result")]
    Cancelled,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for WidgetError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => WidgetError::HttpStatus(status.as_u16()),
            None => WidgetError::RequestFailed(err.to_string()),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl WidgetError {
    /// Returns true if the error stopped a widget from activating because of
    /// its options or its element.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            WidgetError::Validation(_) | WidgetError::Config(CoreError::Validation(_))
        )
    }

    /// Returns true if repeating the remote calculation could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WidgetError::RequestFailed(_) | WidgetError::Cancelled => true,
            WidgetError::HttpStatus(status) => *status >= 500,
            _ => false,
        }
    }
}
