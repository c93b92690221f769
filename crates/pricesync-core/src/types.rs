//! # Domain Types
//!
//! Core domain types shared by the pricing math and the widget runtime.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   PriceKind     │   │   FieldRole     │   │ ResolvedTaxRate │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Tax            │   │  Tax            │   │  value (f64)    │       │
//! │  │  NoTax          │   │  NoTax          │   │  origin         │       │
//! │  └─────────────────┘   │  TaxAmount      │   │   Live          │       │
//! │                        │  TaxRate        │   │   Fallback      │       │
//! │                        └─────────────────┘   │   Zero          │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Price Kind
// =============================================================================

/// Which representation of a price a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PriceKind {
    /// Tax-inclusive price.
    Tax,
    /// Tax-exclusive price.
    #[default]
    NoTax,
}

impl PriceKind {
    /// Returns the complementary kind.
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            PriceKind::Tax => PriceKind::NoTax,
            PriceKind::NoTax => PriceKind::Tax,
        }
    }

    /// Wire name used by options and the calculation endpoint.
    pub const fn as_str(self) -> &'static str {
        match self {
            PriceKind::Tax => "tax",
            PriceKind::NoTax => "notax",
        }
    }
}

impl std::fmt::Display for PriceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tax" => Ok(PriceKind::Tax),
            "notax" => Ok(PriceKind::NoTax),
            other => Err(CoreError::InvalidOption {
                name: "priceType".to_string(),
                reason: format!("unknown price type '{}', expected `tax` or `notax`", other),
            }),
        }
    }
}

// =============================================================================
// Field Role
// =============================================================================

/// The role an input plays inside one widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum FieldRole {
    /// Tax-inclusive price input.
    Tax,
    /// Tax-exclusive price input.
    #[serde(rename = "notax")]
    NoTax,
    /// Read-only derived tax amount.
    TaxAmount,
    /// Live tax-rate input (only when one is configured).
    TaxRate,
}

impl FieldRole {
    /// Every role, in the order fields are laid out.
    pub const ALL: [FieldRole; 4] = [
        FieldRole::Tax,
        FieldRole::NoTax,
        FieldRole::TaxAmount,
        FieldRole::TaxRate,
    ];

    /// Returns the price kind of a convertible field.
    pub const fn price_kind(self) -> Option<PriceKind> {
        match self {
            FieldRole::Tax => Some(PriceKind::Tax),
            FieldRole::NoTax => Some(PriceKind::NoTax),
            FieldRole::TaxAmount | FieldRole::TaxRate => None,
        }
    }

    /// Returns true for the two convertible price fields.
    #[inline]
    pub const fn is_price(self) -> bool {
        self.price_kind().is_some()
    }
}

impl From<PriceKind> for FieldRole {
    fn from(kind: PriceKind) -> Self {
        match kind {
            PriceKind::Tax => FieldRole::Tax,
            PriceKind::NoTax => FieldRole::NoTax,
        }
    }
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRole::Tax => write!(f, "tax"),
            FieldRole::NoTax => write!(f, "notax"),
            FieldRole::TaxAmount => write!(f, "taxAmount"),
            FieldRole::TaxRate => write!(f, "taxRate"),
        }
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Where a resolved tax rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxRateOrigin {
    /// Read from the live rate input.
    Live,
    /// The configured fallback rate.
    Fallback,
    /// Nothing usable was found; zero is applied.
    Zero,
}

/// A tax rate together with its origin.
///
/// The value is kept in whatever unit the widget is configured with:
/// a fraction (`0.2`) or a percentage (`20`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedTaxRate {
    pub value: f64,
    pub origin: TaxRateOrigin,
}

impl ResolvedTaxRate {
    /// Rate read from a live input.
    pub const fn live(value: f64) -> Self {
        ResolvedTaxRate {
            value,
            origin: TaxRateOrigin::Live,
        }
    }

    /// Rate taken from the configured fallback.
    pub const fn fallback(value: f64) -> Self {
        ResolvedTaxRate {
            value,
            origin: TaxRateOrigin::Fallback,
        }
    }

    /// Zero rate, used when nothing else is available.
    pub const fn zero() -> Self {
        ResolvedTaxRate {
            value: 0.0,
            origin: TaxRateOrigin::Zero,
        }
    }

    /// Returns true when the display should carry the default marker.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.origin == TaxRateOrigin::Fallback
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
