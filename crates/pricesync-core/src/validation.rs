//! # Validation Module
//!
//! Activation preconditions for a widget instance.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Activation Checks                                  │
//! │                                                                         │
//! │  Layer 1: Options (this module)                                        │
//! │  ├── precision within range                                            │
//! │  └── fallback tax rate finite                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Page (this module, fed by the widget)                        │
//! │  ├── <input type="text|number">                                        │
//! │  ├── a tax rate source exists                                          │
//! │  └── calculation URL resolves to http(s) against the page URL          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Any failure: logged, nothing in the document is touched               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pricesync_core::validation::{validate_input_element, validate_tax_rate_source};
//!
//! assert!(validate_input_element("INPUT", Some("number")).is_ok());
//! assert!(validate_input_element("select", None).is_err());
//! assert!(validate_tax_rate_source(false, Some(0.2)).is_ok());
//! ```

use url::Url;

use crate::config::WidgetConfig;
use crate::error::ValidationError;
use crate::pricing::MAX_PRECISION;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Element Validators
// =============================================================================

/// Validates that the bound element is a text or number input.
///
/// ## Rules
/// - Tag must be `input` (any case)
/// - `type` must be `text` or `number`; a missing `type` is a text input
pub fn validate_input_element(tag: &str, input_type: Option<&str>) -> ValidationResult<()> {
    let type_ok = match input_type {
        None => true,
        Some(kind) => kind.eq_ignore_ascii_case("text") || kind.eq_ignore_ascii_case("number"),
    };

    if !tag.eq_ignore_ascii_case("input") || !type_ok {
        return Err(ValidationError::UnsupportedElement {
            tag: tag.to_lowercase(),
            input_type: input_type.unwrap_or_default().to_string(),
        });
    }

    Ok(())
}

/// Validates that a tax rate can be obtained.
///
/// ## Rules
/// - A rate input exists on the page, or
/// - a finite fallback rate is configured (zero included)
pub fn validate_tax_rate_source(has_rate_input: bool, fallback: Option<f64>) -> ValidationResult<()> {
    if has_rate_input {
        return Ok(());
    }

    match fallback {
        Some(rate) if rate.is_finite() => Ok(()),
        _ => Err(ValidationError::MissingTaxRate),
    }
}

// =============================================================================
// Option Validators
// =============================================================================

/// Resolves the calculation endpoint against the page URL and validates it.
///
/// Relative endpoints such as `calc.php` need a `base`; absolute ones are
/// used as given.
///
/// ## Example
/// ```rust
/// use pricesync_core::validation::validate_calculation_url;
/// use url::Url;
///
/// let page = Url::parse("https://shop.example/products/edit.html").unwrap();
/// let url = validate_calculation_url("calc.php", Some(&page)).unwrap();
/// assert_eq!(url.as_str(), "https://shop.example/products/calc.php");
///
/// assert!(validate_calculation_url("https://shop.example/calc", None).is_ok());
/// assert!(validate_calculation_url("/calc", None).is_err());
/// assert!(validate_calculation_url("ftp://shop.example/calc", None).is_err());
/// ```
pub fn validate_calculation_url(raw: &str, base: Option<&Url>) -> ValidationResult<Url> {
    let url = Url::options()
        .base_url(base)
        .parse(raw.trim())
        .map_err(|e| ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("scheme must be http or https, got {}", url.scheme()),
        });
    }

    Ok(url)
}

/// Validates the display precision.
pub fn validate_precision(precision: u32) -> ValidationResult<()> {
    if precision > MAX_PRECISION {
        return Err(ValidationError::OutOfRange {
            field: "precision".to_string(),
            min: 0,
            max: MAX_PRECISION as i64,
        });
    }

    Ok(())
}

/// Validates every option that can be checked without the document.
pub fn validate_config(config: &WidgetConfig) -> ValidationResult<()> {
    validate_precision(config.precision)?;

    if let Some(rate) = config.tax_rate {
        if !rate.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: "taxRate".to_string(),
                reason: "must be a finite number".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
