//! # Widget Configuration
//!
//! Option records for one widget instance and the rules for layering them.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Caller options (highest priority)                                  │
//! │     page.attach(input, ConfigOverrides { tax_rate: Some(0.2), .. })    │
//! │                                                                         │
//! │  2. Element data attributes                                            │
//! │     <input data-price-type="tax" data-tax-rate="0.2">                  │
//! │                                                                         │
//! │  3. Page-wide defaults                                                 │
//! │     Page::with_defaults(ConfigOverrides::from_toml_str(..)?)           │
//! │                                                                         │
//! │  4. Built-in defaults (lowest priority)                                │
//! │     notax, precision 2, tax amount shown, English labels               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Defaults File Format
//! ```toml
//! priceType = "tax"
//! taxRate = 20
//! taxRateInPercent = true
//! precision = 2
//! mainLabel = "Prix"
//! priceTaxLabel = "TTC"
//! priceNoTaxLabel = "HT"
//! taxAmountLabel = "TVA"
//! defaultLabel = "par défaut"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::pricing::format_number;
use crate::types::PriceKind;

/// Default number of fractional digits shown in price inputs.
pub const DEFAULT_PRECISION: u32 = 2;

/// Default duration of the highlight animation (milliseconds).
pub const DEFAULT_HIGHLIGHT_MS: u64 = 500;

/// Options whose data-attribute values are always kept as text.
const TEXT_OPTIONS: &[&str] = &[
    "otherPriceInput",
    "taxRateInput",
    "urlCalculate",
    "mainLabel",
    "priceTaxLabel",
    "priceNoTaxLabel",
    "taxAmountLabel",
    "defaultLabel",
    "priceTaxClass",
    "priceNoTaxClass",
    "taxAmountClass",
    "taxRateClass",
    "taxRateDisplayClass",
    "labelClass",
    "inputClass",
    "highlightClass",
];

// =============================================================================
// Labels & Class Names
// =============================================================================

/// Text of the generated labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Replaces the text of the page's existing `<label for=...>`.
    pub main: String,
    pub price_tax: String,
    pub price_no_tax: String,
    pub tax_amount: String,
    /// Marker appended to the tax-rate display when the fallback is used.
    pub default: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            main: "Price".to_string(),
            price_tax: "All taxes included".to_string(),
            price_no_tax: "Pre-tax".to_string(),
            tax_amount: "Tax".to_string(),
            default: "default".to_string(),
        }
    }
}

/// CSS classes put on the generated markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNames {
    pub price_tax: String,
    pub price_no_tax: String,
    pub tax_amount: String,
    pub tax_rate: String,
    pub tax_rate_display: String,
    pub label: String,
    pub input: String,
    pub highlight: String,
}

impl Default for ClassNames {
    fn default() -> Self {
        ClassNames {
            price_tax: "price price_tax".to_string(),
            price_no_tax: "price price_notax".to_string(),
            tax_amount: "price price_tax-amount".to_string(),
            tax_rate: "price price_tax-rate".to_string(),
            tax_rate_display: "price__tax-rate".to_string(),
            label: "price__label".to_string(),
            input: "price__input".to_string(),
            highlight: "highlight".to_string(),
        }
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration of one widget instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Kind of price held by the bound input.
    pub price_type: PriceKind,

    /// Selector of an existing input holding the complementary price.
    /// When it matches nothing, the widget creates the input itself.
    pub other_price_input: Option<String>,

    /// Selector of an existing input holding the tax rate.
    pub tax_rate_input: Option<String>,

    /// Fallback tax rate, used without a rate input or when it is empty.
    pub tax_rate: Option<f64>,

    /// Rates are percentages (`20`) rather than fractions (`0.2`).
    pub tax_rate_in_percent: bool,

    /// Fractional digits of displayed prices.
    pub precision: u32,

    /// Endpoint computing conversions remotely; computed locally when unset.
    pub url_calculate: Option<String>,

    /// Create and maintain the read-only tax amount input.
    pub display_tax_amount: bool,

    /// Drop remote responses that were overtaken by a newer write.
    pub discard_stale_responses: bool,

    /// Duration of the highlight animation (milliseconds).
    pub highlight_ms: u64,

    pub labels: Labels,
    pub classes: ClassNames,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        WidgetConfig {
            price_type: PriceKind::NoTax,
            other_price_input: None,
            tax_rate_input: None,
            tax_rate: None,
            tax_rate_in_percent: false,
            precision: DEFAULT_PRECISION,
            url_calculate: None,
            display_tax_amount: true,
            discard_stale_responses: false,
            highlight_ms: DEFAULT_HIGHLIGHT_MS,
            labels: Labels::default(),
            classes: ClassNames::default(),
        }
    }
}

impl WidgetConfig {
    /// Builds a configuration by applying each layer, lowest priority first.
    pub fn layered<'a, I>(layers: I) -> Self
    where
        I: IntoIterator<Item = &'a ConfigOverrides>,
    {
        let mut config = WidgetConfig::default();
        for layer in layers {
            config.apply(layer);
        }
        config
    }

    /// Applies every option set in `overrides`.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut self.price_type, &overrides.price_type);
        set_opt(&mut self.other_price_input, &overrides.other_price_input);
        set_opt(&mut self.tax_rate_input, &overrides.tax_rate_input);
        set_opt(&mut self.tax_rate, &overrides.tax_rate);
        set(&mut self.tax_rate_in_percent, &overrides.tax_rate_in_percent);
        set(&mut self.precision, &overrides.precision);
        set_opt(&mut self.url_calculate, &overrides.url_calculate);
        set(&mut self.display_tax_amount, &overrides.display_tax_amount);
        set(&mut self.discard_stale_responses, &overrides.discard_stale_responses);
        set(&mut self.highlight_ms, &overrides.highlight_ms);

        set(&mut self.labels.main, &overrides.main_label);
        set(&mut self.labels.price_tax, &overrides.price_tax_label);
        set(&mut self.labels.price_no_tax, &overrides.price_no_tax_label);
        set(&mut self.labels.tax_amount, &overrides.tax_amount_label);
        set(&mut self.labels.default, &overrides.default_label);

        set(&mut self.classes.price_tax, &overrides.price_tax_class);
        set(&mut self.classes.price_no_tax, &overrides.price_no_tax_class);
        set(&mut self.classes.tax_amount, &overrides.tax_amount_class);
        set(&mut self.classes.tax_rate, &overrides.tax_rate_class);
        set(&mut self.classes.tax_rate_display, &overrides.tax_rate_display_class);
        set(&mut self.classes.label, &overrides.label_class);
        set(&mut self.classes.input, &overrides.input_class);
        set(&mut self.classes.highlight, &overrides.highlight_class);
    }

    /// Label text for a price kind.
    pub fn price_label(&self, kind: PriceKind) -> &str {
        match kind {
            PriceKind::Tax => &self.labels.price_tax,
            PriceKind::NoTax => &self.labels.price_no_tax,
        }
    }

    /// Wrapper class for a price kind.
    pub fn price_class(&self, kind: PriceKind) -> &str {
        match kind {
            PriceKind::Tax => &self.classes.price_tax,
            PriceKind::NoTax => &self.classes.price_no_tax,
        }
    }

    /// Returns true when conversions go through the remote endpoint.
    #[inline]
    pub fn is_remote(&self) -> bool {
        self.url_calculate.is_some()
    }
}

// =============================================================================
// Partial Configuration
// =============================================================================

/// A partial set of widget options, in the option vocabulary used by
/// callers, data attributes and defaults files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_type: Option<PriceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_price_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate_in_percent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_calculate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_tax_amount: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_stale_responses: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tax_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_no_tax_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_tax_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_no_tax_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate_display_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_class: Option<String>,
}

impl ConfigOverrides {
    /// Creates an empty set of overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML defaults document.
    pub fn from_toml_str(src: &str) -> CoreResult<Self> {
        toml::from_str(src).map_err(|e| CoreError::DefaultsParse(e.to_string()))
    }

    /// Reads options from an element's `data-*` attributes.
    ///
    /// ## Key & Value Mapping
    /// ```text
    /// data-price-type="tax"            → priceType = "tax"
    /// data-tax-rate="0.2"              → taxRate = 0.2        (number)
    /// data-tax-rate-in-percent="true"  → taxRateInPercent = true
    /// data-main-label="42"             → mainLabel = "42"     (text option)
    /// data-unrelated="x"               → ignored
    /// ```
    pub fn from_data_attributes<'a, I>(attrs: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = Map::new();
        for (name, raw) in attrs {
            let Some(key) = name.strip_prefix("data-") else {
                continue;
            };
            let key = kebab_to_camel(key);
            let value = if TEXT_OPTIONS.contains(&key.as_str()) {
                Value::String(raw.to_string())
            } else {
                coerce_data_value(raw)
            };
            map.insert(key, value);
        }

        serde_json::from_value(Value::Object(map)).map_err(|e| CoreError::InvalidOption {
            name: "data attribute".to_string(),
            reason: e.to_string(),
        })
    }

    /// Returns true when no option is set.
    pub fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }
}

/// Converts `tax-rate-in-percent` into `taxRateInPercent`.
fn kebab_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Interprets a data attribute value the way browsers' data helpers do:
/// booleans, null, numbers that print back identically, JSON objects and
/// arrays; everything else stays text.
fn coerce_data_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(number) = raw.parse::<f64>() {
        if number.is_finite() && format_number(number) == raw {
            // Whole numbers go in as integers so they fit `u32`/`u64` options.
            if number.fract() == 0.0 && number.abs() < 1e15 {
                return Value::from(number as i64);
            }
            if let Some(number) = serde_json::Number::from_f64(number) {
                return Value::Number(number);
            }
        }
    }

    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }

    Value::String(raw.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WidgetConfig::default();
        assert_eq!(config.price_type, PriceKind::NoTax);
        assert_eq!(config.precision, 2);
        assert!(config.display_tax_amount);
        assert!(!config.is_remote());
        assert_eq!(config.labels.main, "Price");
        assert_eq!(config.classes.tax_amount, "price price_tax-amount");
        assert_eq!(config.highlight_ms, 500);
    }

    #[test]
    fn test_layers_apply_in_order() {
        let site = ConfigOverrides {
            tax_rate: Some(0.2),
            precision: Some(3),
            main_label: Some("Prix".to_string()),
            ..Default::default()
        };
        let data = ConfigOverrides {
            tax_rate: Some(0.1),
            price_type: Some(PriceKind::Tax),
            ..Default::default()
        };
        let caller = ConfigOverrides {
            tax_rate: Some(0.055),
            ..Default::default()
        };

        let config = WidgetConfig::layered([&site, &data, &caller]);
        assert_eq!(config.tax_rate, Some(0.055));
        assert_eq!(config.price_type, PriceKind::Tax);
        assert_eq!(config.precision, 3);
        assert_eq!(config.labels.main, "Prix");
        assert_eq!(config.labels.tax_amount, "Tax");
    }

    #[test]
    fn test_from_data_attributes() {
        let attrs = [
            ("id", "price"),
            ("data-price-type", "tax"),
            ("data-tax-rate", "0.2"),
            ("data-tax-rate-in-percent", "false"),
            ("data-precision", "3"),
            ("data-main-label", "42"),
            ("data-unrelated", "whatever"),
        ];
        let overrides = ConfigOverrides::from_data_attributes(attrs).unwrap();
        assert_eq!(overrides.price_type, Some(PriceKind::Tax));
        assert_eq!(overrides.tax_rate, Some(0.2));
        assert_eq!(overrides.tax_rate_in_percent, Some(false));
        assert_eq!(overrides.precision, Some(3));
        assert_eq!(overrides.main_label.as_deref(), Some("42"));
    }

    #[test]
    fn test_from_data_attributes_rejects_bad_values() {
        let attrs = [("data-precision", "two")];
        let err = ConfigOverrides::from_data_attributes(attrs).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOption { .. }));

        let attrs = [("data-price-type", "gross")];
        assert!(ConfigOverrides::from_data_attributes(attrs).is_err());
    }

    #[test]
    fn test_data_null_leaves_option_unset() {
        let attrs = [("data-tax-rate", "null")];
        let overrides = ConfigOverrides::from_data_attributes(attrs).unwrap();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_from_toml_str() {
        let overrides = ConfigOverrides::from_toml_str(
            r#"
            priceType = "tax"
            taxRate = 20.0
            taxRateInPercent = true
            priceNoTaxLabel = "HT"
            "#,
        )
        .unwrap();
        assert_eq!(overrides.price_type, Some(PriceKind::Tax));
        assert_eq!(overrides.tax_rate, Some(20.0));
        assert_eq!(overrides.tax_rate_in_percent, Some(true));
        assert_eq!(overrides.price_no_tax_label.as_deref(), Some("HT"));

        assert!(ConfigOverrides::from_toml_str("precision = \"x\"").is_err());
    }

    #[test]
    fn test_kebab_to_camel() {
        assert_eq!(kebab_to_camel("tax-rate-in-percent"), "taxRateInPercent");
        assert_eq!(kebab_to_camel("precision"), "precision");
    }

    #[test]
    fn test_coerce_data_value() {
        assert_eq!(coerce_data_value("true"), Value::Bool(true));
        assert_eq!(coerce_data_value("2"), Value::from(2));
        assert_eq!(coerce_data_value("0.2"), serde_json::json!(0.2));
        // Does not print back identically, so it stays text.
        assert_eq!(coerce_data_value("1.50"), Value::String("1.50".into()));
        assert_eq!(coerce_data_value("tax"), Value::String("tax".into()));
    }
}
