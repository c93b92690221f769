//! # Error Types
//!
//! Domain-specific error types for pricesync-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pricesync-core errors (this file)                                     │
//! │  ├── CoreError        - Option parsing / merging failures              │
//! │  └── ValidationError  - Activation precondition failures               │
//! │                                                                         │
//! │  pricesync-widget errors (separate crate)                              │
//! │  └── WidgetError      - DOM lookups, remote calculation failures       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → WidgetError → logged by the page  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (option name, element, URL)
//! 3. Errors are enum variants, never String
//! 4. Nothing here is fatal to the page: callers log and carry on

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core errors raised while building a widget configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An option was present but could not be interpreted.
    ///
    /// ## When This Occurs
    /// - `data-precision="two"` on the bound element
    /// - `priceType = "gross"` in a defaults file
    #[error("Invalid option `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },

    /// A defaults document (TOML) could not be parsed.
    #[error("Failed to parse widget defaults: {0}")]
    DefaultsParse(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Precondition failures detected before the widget touches the document.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The bound element is not a text or number `<input>`.
    #[error("Main input type needs to be `text` or `number`, got <{tag} type=\"{input_type}\">")]
    UnsupportedElement { tag: String, input_type: String },

    /// Neither a fallback rate nor a rate input is available.
    #[error("No tax rate provided, use `taxRateInput` or `taxRate`")]
    MissingTaxRate,

    /// The calculation endpoint does not resolve to an http(s) URL.
    #[error("Invalid calculation URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Numeric option is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. a non-finite fallback tax rate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
