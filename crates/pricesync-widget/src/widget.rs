//! # PriceSync Widget
//!
//! One activated price helper: its resolved options, the fields it manages
//! and the hooks it reports to.
//!
//! ## Lifecycle
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  new()       │──►│  setup()     │──►│  listeners   │──►│  on_init     │
//! │  checks only │   │  markup,     │   │  bound by    │   │  hook        │
//! │  no mutation │   │  cache, sync │   │  the page    │   │              │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//!        │ Err
//!        ▼
//!   logged by the page, document untouched
//! ```

use std::fmt;

use pricesync_core::pricing::parse_number;
use pricesync_core::validation::{
    validate_calculation_url, validate_config, validate_input_element, validate_tax_rate_source,
};
use pricesync_core::{FieldRole, PriceKind, ResolvedTaxRate, WidgetConfig};
use serde::Serialize;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::{WidgetError, WidgetResult};
use crate::events::ListenerAction;
use crate::page::WidgetId;
use crate::remote::RemoteCalculator;
use crate::state::FieldStates;
use crate::sync::SyncContext;

// =============================================================================
// Hooks
// =============================================================================

/// A field written by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldUpdate {
    pub widget: WidgetId,
    pub role: FieldRole,
    pub node: NodeId,
    /// Unrounded value; `None` when the field was cleared.
    pub value: Option<f64>,
}

pub type InitHook = Box<dyn FnMut(WidgetId)>;
pub type UpdateHook = Box<dyn FnMut(&FieldUpdate)>;

/// Callbacks invoked synchronously by the widget.
#[derive(Default)]
pub struct Hooks {
    pub on_init: Option<InitHook>,
    pub on_update: Option<UpdateHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once, after markup and listeners are in place.
    pub fn on_init(mut self, hook: impl FnMut(WidgetId) + 'static) -> Self {
        self.on_init = Some(Box::new(hook));
        self
    }

    /// Called after every price or tax amount write.
    pub fn on_update(mut self, hook: impl FnMut(&FieldUpdate) + 'static) -> Self {
        self.on_update = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_init", &self.on_init.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

// =============================================================================
// Widget
// =============================================================================

/// An activated price helper.
#[derive(Debug)]
pub struct PriceSync {
    pub(crate) id: WidgetId,
    pub(crate) config: WidgetConfig,
    pub(crate) calculator: Option<RemoteCalculator>,
    pub(crate) bound: NodeId,
    /// Companion price input found through `otherPriceInput`.
    pub(crate) external_companion: Option<NodeId>,
    pub(crate) fields: FieldStates,
    pub(crate) tax_rate_display: Option<NodeId>,
    pub(crate) hooks: Hooks,
}

impl PriceSync {
    /// Checks every activation precondition against the document without
    /// touching it.
    ///
    /// `http` is only called when the widget calculates remotely.
    pub fn new<F>(
        id: WidgetId,
        config: WidgetConfig,
        hooks: Hooks,
        doc: &Document,
        bound: NodeId,
        http: F,
    ) -> WidgetResult<Self>
    where
        F: FnOnce() -> WidgetResult<reqwest::Client>,
    {
        validate_config(&config)?;

        let tag = doc.tag_name(bound).ok_or(WidgetError::NotAnElement(bound))?;
        validate_input_element(tag, doc.attribute(bound, "type"))?;
        if !doc.is_connected(bound) {
            return Err(WidgetError::InvalidTree(format!(
                "element {} is not in the document",
                bound
            )));
        }

        let tax_rate_input = match config.tax_rate_input.as_deref() {
            Some(selector) => doc.query_selector(selector)?,
            None => None,
        };
        validate_tax_rate_source(tax_rate_input.is_some(), config.tax_rate)?;

        let external_companion = match config.other_price_input.as_deref() {
            Some(selector) => doc.query_selector(selector)?.filter(|node| *node != bound),
            None => None,
        };

        let calculator = match config.url_calculate.as_deref() {
            Some(raw) => {
                let endpoint = validate_calculation_url(raw, doc.url())?;
                Some(RemoteCalculator::new(http()?, endpoint))
            }
            None => None,
        };

        let mut fields = FieldStates::new();
        fields.insert(config.price_type.into(), bound);
        if let Some(node) = tax_rate_input {
            fields.insert(FieldRole::TaxRate, node);
        }
        if let Some(node) = external_companion {
            fields.insert(config.price_type.other().into(), node);
        }

        Ok(PriceSync {
            id,
            config,
            calculator,
            bound,
            external_companion,
            fields,
            tax_rate_display: None,
            hooks,
        })
    }

    /// Builds the markup, seeds the value cache and fills the companion.
    pub(crate) fn setup(&mut self, cx: &mut SyncContext<'_>) -> WidgetResult<()> {
        if self.external_companion.is_none() {
            self.build_markup(cx.document)?;
        }

        let roles: Vec<(FieldRole, NodeId)> =
            self.fields.iter().map(|(role, state)| (role, state.node)).collect();
        for (role, node) in roles {
            let value = parse_number(cx.document.value(node));
            if value.is_some() {
                self.fields.set_value(role, value);
            }
        }

        self.sync(cx, self.config.price_type.other())
    }

    /// Runs a listener action.
    pub(crate) fn handle(
        &mut self,
        cx: &mut SyncContext<'_>,
        action: ListenerAction,
    ) -> WidgetResult<()> {
        match action {
            ListenerAction::PriceEdited(kind) => {
                let role = FieldRole::from(kind);
                let node = self.node(role)?;
                let value = parse_number(cx.document.value(node));
                debug!(widget = %self.id, %role, ?value, "price edited");
                self.fields.set_value(role, value);
                self.sync(cx, kind.other())
            }
            ListenerAction::TaxRateEdited => {
                let node = self.node(FieldRole::TaxRate)?;
                let value = parse_number(cx.document.value(node));
                debug!(widget = %self.id, ?value, "tax rate edited");
                self.fields.set_value(FieldRole::TaxRate, value);
                self.sync(cx, PriceKind::Tax)?;
                self.refresh_tax_rate_display(cx.document)
            }
        }
    }

    pub(crate) fn notify_init(&mut self) {
        if let Some(hook) = self.hooks.on_init.as_mut() {
            hook(self.id);
        }
    }

    fn node(&self, role: FieldRole) -> WidgetResult<NodeId> {
        self.fields
            .node(role)
            .ok_or_else(|| WidgetError::InvalidTree(format!("widget {} has no {} field", self.id, role)))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// The element the widget was attached to.
    pub fn bound_element(&self) -> NodeId {
        self.bound
    }

    /// Node playing `role`, if the widget manages one.
    pub fn field(&self, role: FieldRole) -> Option<NodeId> {
        self.fields.node(role)
    }

    /// Cached, unrounded value of a field.
    pub fn value(&self, role: FieldRole) -> Option<f64> {
        self.fields.value(role)
    }

    pub fn fields(&self) -> &FieldStates {
        &self.fields
    }

    /// The `<span>` showing the tax rate, when markup was generated.
    pub fn tax_rate_display(&self) -> Option<NodeId> {
        self.tax_rate_display
    }

    pub fn is_remote(&self) -> bool {
        self.calculator.is_some()
    }

    /// Endpoint client, with the URL already resolved against the page.
    pub fn calculator(&self) -> Option<&RemoteCalculator> {
        self.calculator.as_ref()
    }

    /// Tax rate as the next conversion would use it.
    pub fn tax_rate(&self, doc: &Document) -> ResolvedTaxRate {
        self.current_tax_rate(doc)
    }
}
