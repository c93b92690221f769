//! # pricesync-core: Pure Logic for the PriceSync Widget
//!
//! This crate is the **heart** of PriceSync. It holds the price conversion
//! math, option records and validation rules as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PriceSync Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   pricesync-widget                              │   │
//! │  │   Page ──► DOM builder ──► event binder ──► sync engine         │   │
//! │  │                                  │                  │           │   │
//! │  │                                  │        remote calculation    │   │
//! │  └──────────────────────────────────┼──────────────────────────────┘   │
//! │                                     │                                   │
//! │  ┌──────────────────────────────────▼──────────────────────────────┐   │
//! │  │               ★ pricesync-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │  config   │  │ validation│  │   │
//! │  │   │ PriceKind │  │ calculate │  │  Widget   │  │   rules   │  │   │
//! │  │   │ FieldRole │  │ to_fixed  │  │  Config   │  │   checks  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DOM • NO NETWORK • PURE FUNCTIONS                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Price kinds, field roles, resolved tax rates
//! - [`pricing`] - Conversions, tax amount, parsing and formatting
//! - [`config`] - Widget options and their layering
//! - [`error`] - Domain error types
//! - [`validation`] - Activation preconditions
//!
//! ## Example Usage
//!
//! ```rust
//! use pricesync_core::pricing::{calculate_price, display_value, tax_amount};
//! use pricesync_core::PriceKind;
//!
//! let no_tax = 100.0;
//! let with_tax = calculate_price(PriceKind::NoTax, no_tax, 0.2, false);
//!
//! assert_eq!(display_value(Some(with_tax), 2), "120.00");
//! assert_eq!(display_value(tax_amount(Some(with_tax), Some(no_tax)), 2), "20.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{ClassNames, ConfigOverrides, Labels, WidgetConfig};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
