//! # Sync Engine
//!
//! Recomputes one price field from its counterpart and refreshes the
//! derived fields.
//!
//! ## Flow
//! ```text
//!  sync(target)
//!     │
//!     ├─ source value absent ─────────────► clear target
//!     │
//!     ├─ local  ─► calculate_price(source kind, value, rate) ─► update target
//!     │
//!     └─ remote ─► bump target generation, spawn GET
//!                      ... later, Page::apply_remote_responses
//!                  apply_remote(outcome) ─► update target
//!
//!  update target: cache ─► display ─► highlight ─► tax amount ─► on_update
//!                  (on_update reports the price field only)
//! ```

use pricesync_core::pricing::{
    calculate_price, display_tax_rate, display_value, resolve_tax_rate, tax_amount,
};
use pricesync_core::{FieldRole, PriceKind, ResolvedTaxRate};
use tracing::{debug, error};

use crate::dom::{Document, NodeId};
use crate::error::WidgetResult;
use crate::highlight::HighlightScheduler;
use crate::remote::{CalculationRequest, RemoteDispatcher, RemoteOutcome};
use crate::widget::{FieldUpdate, PriceSync};

/// The parts of the page a widget writes to.
pub(crate) struct SyncContext<'a> {
    pub document: &'a mut Document,
    pub timers: &'a mut HighlightScheduler,
    pub remote: &'a mut RemoteDispatcher,
}

impl PriceSync {
    /// Recomputes the price field of kind `target`.
    pub(crate) fn sync(&mut self, cx: &mut SyncContext<'_>, target: PriceKind) -> WidgetResult<()> {
        let source = target.other();
        let target_role = FieldRole::from(target);
        if self.fields.node(target_role).is_none() {
            return Ok(());
        }

        let price = match self.fields.value(source.into()) {
            Some(price) if price.is_finite() => price,
            _ => return self.update_price_field(cx, target, None),
        };
        let rate = self.current_tax_rate(cx.document);

        let Some(calculator) = self.calculator.as_ref() else {
            let value = calculate_price(source, price, rate.value, self.config.tax_rate_in_percent);
            debug!(widget = %self.id, role = %target_role, value, "computed locally");
            return self.update_price_field(cx, target, Some(value));
        };

        let generation = self.fields.bump(target_role);
        let request = CalculationRequest {
            price,
            price_type: source,
            tax_rate: rate.value,
        };
        match cx
            .remote
            .dispatch(calculator, request, self.id, target_role, generation)
        {
            Ok(()) => debug!(widget = %self.id, role = %target_role, generation, "remote calculation issued"),
            Err(err) => error!(widget = %self.id, role = %target_role, error = %err, "remote calculation skipped"),
        }
        Ok(())
    }

    /// Applies a delivered remote calculation.
    pub(crate) fn apply_remote(
        &mut self,
        cx: &mut SyncContext<'_>,
        outcome: RemoteOutcome,
    ) -> WidgetResult<()> {
        let Some(kind) = outcome.target.price_kind() else {
            return Ok(());
        };

        let value = match outcome.result {
            Ok(value) => value,
            Err(err) => {
                error!(
                    widget = %self.id,
                    role = %outcome.target,
                    retryable = err.is_retryable(),
                    error = %err,
                    "remote calculation failed"
                );
                return Ok(());
            }
        };

        let current = self.fields.generation(outcome.target);
        if self.config.discard_stale_responses && outcome.generation < current {
            debug!(
                widget = %self.id,
                role = %outcome.target,
                generation = outcome.generation,
                current,
                "stale remote response dropped"
            );
            return Ok(());
        }

        self.update_price_field(cx, kind, Some(value))
    }

    fn update_price_field(
        &mut self,
        cx: &mut SyncContext<'_>,
        kind: PriceKind,
        value: Option<f64>,
    ) -> WidgetResult<()> {
        let role = FieldRole::from(kind);
        let Some(node) = self.fields.node(role) else {
            return Ok(());
        };

        self.write_field(cx, role, node, value)?;

        if self.config.display_tax_amount {
            if let Some(amount_node) = self.fields.node(FieldRole::TaxAmount) {
                let amount = tax_amount(
                    self.fields.value(FieldRole::Tax),
                    self.fields.value(FieldRole::NoTax),
                );
                self.write_field(cx, FieldRole::TaxAmount, amount_node, amount)?;
            }
        }

        self.notify_update(role, node, value);
        Ok(())
    }

    fn write_field(
        &mut self,
        cx: &mut SyncContext<'_>,
        role: FieldRole,
        node: NodeId,
        value: Option<f64>,
    ) -> WidgetResult<()> {
        self.fields.set_value(role, value);
        cx.document
            .set_value(node, &display_value(value, self.config.precision))?;
        cx.timers.highlight(
            cx.document,
            node,
            &self.config.classes.highlight,
            self.config.highlight_ms,
        )?;
        Ok(())
    }

    fn notify_update(&mut self, role: FieldRole, node: NodeId, value: Option<f64>) {
        if let Some(hook) = self.hooks.on_update.as_mut() {
            hook(&FieldUpdate {
                widget: self.id,
                role,
                node,
                value,
            });
        }
    }

    /// Tax rate from the live input or the fallback.
    pub(crate) fn current_tax_rate(&self, doc: &Document) -> ResolvedTaxRate {
        let live = self
            .fields
            .node(FieldRole::TaxRate)
            .map(|node| doc.value(node));
        resolve_tax_rate(live, self.config.tax_rate)
    }

    /// Text of the tax-rate display, e.g. `20.00% (default)`.
    pub fn tax_rate_text(&self, doc: &Document) -> String {
        display_tax_rate(
            self.current_tax_rate(doc),
            self.config.tax_rate_in_percent,
            &self.config.labels.default,
        )
    }

    /// Current tax amount, when both prices are known.
    pub fn tax_amount(&self) -> Option<f64> {
        tax_amount(
            self.fields.value(FieldRole::Tax),
            self.fields.value(FieldRole::NoTax),
        )
    }

    pub(crate) fn refresh_tax_rate_display(&self, doc: &mut Document) -> WidgetResult<()> {
        if let Some(display) = self.tax_rate_display {
            let text = self.tax_rate_text(doc);
            doc.set_text(display, &text)?;
        }
        Ok(())
    }
}
