//! # Remote Calculation
//!
//! Conversions can be delegated to an HTTP endpoint instead of being
//! computed locally.
//!
//! ## Protocol
//! ```text
//! GET <urlCalculate>?price=100&priceType=notax&taxRate=0.2
//! Cache-Control: no-cache
//!
//! 200 OK
//! 120
//! ```
//!
//! `priceType` names the kind of the price being sent (the source field),
//! and the body is the converted price as plain text.
//!
//! ## Delivery
//! ```text
//! ┌──────────────┐  spawn   ┌──────────────────────┐
//! │ sync engine  │─────────►│ tokio task           │
//! └──────────────┘          │ RemoteCalculator GET │
//!        ▲                  └──────────┬───────────┘
//!        │ apply_remote_responses      │ RemoteOutcome
//!        │                             ▼
//! ┌──────┴───────┐   mpsc (unbounded)  ┌────────┐
//! │ Page         │◄────────────────────│   tx   │
//! └──────────────┘                     └────────┘
//! ```
//! Outcomes are applied in arrival order, so the response that arrives last
//! wins unless stale responses are discarded. Every spawned task delivers
//! exactly one outcome: a task dropped before it finishes reports
//! [`WidgetError::Cancelled`].

use std::time::Duration;

use pricesync_core::pricing::{format_number, parse_number};
use pricesync_core::{FieldRole, PriceKind};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::{WidgetError, WidgetResult};
use crate::page::WidgetId;

/// Default timeout of one calculation request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Query of one conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationRequest {
    /// Price to convert.
    pub price: f64,
    /// Kind of `price`.
    pub price_type: PriceKind,
    pub tax_rate: f64,
}

/// Client for a calculation endpoint.
#[derive(Debug, Clone)]
pub struct RemoteCalculator {
    http: reqwest::Client,
    endpoint: Url,
}

impl RemoteCalculator {
    /// Creates a calculator sharing an existing HTTP client.
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// Builds the HTTP client pages share between their widgets.
    pub fn default_client() -> WidgetResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WidgetError::RequestFailed(format!("failed to create http client: {e}")))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full URL of a request, keeping any query the endpoint already has.
    pub fn request_url(&self, request: &CalculationRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("price", &format_number(request.price))
            .append_pair("priceType", request.price_type.as_str())
            .append_pair("taxRate", &format_number(request.tax_rate));
        url
    }

    /// Performs one conversion.
    pub async fn calculate(&self, request: CalculationRequest) -> WidgetResult<f64> {
        let url = self.request_url(&request);
        debug!(%url, "requesting remote calculation");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_number(&body).ok_or(WidgetError::InvalidResponse(body))
    }
}

// =============================================================================
// Outcome Delivery
// =============================================================================

/// A finished calculation on its way back to the page.
#[derive(Debug)]
pub struct RemoteOutcome {
    pub widget: WidgetId,
    /// Field the result is written to.
    pub target: FieldRole,
    /// Generation of the target field when the request was issued.
    pub generation: u64,
    pub result: WidgetResult<f64>,
}

/// Spawns calculation tasks and collects their outcomes.
#[derive(Debug)]
pub struct RemoteDispatcher {
    tx: mpsc::UnboundedSender<RemoteOutcome>,
    rx: mpsc::UnboundedReceiver<RemoteOutcome>,
    in_flight: usize,
}

impl Default for RemoteDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx, in_flight: 0 }
    }

    /// Number of requests whose outcome has not been taken yet.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Starts a calculation on the ambient tokio runtime.
    pub fn dispatch(
        &mut self,
        calculator: &RemoteCalculator,
        request: CalculationRequest,
        widget: WidgetId,
        target: FieldRole,
        generation: u64,
    ) -> WidgetResult<()> {
        let handle = Handle::try_current().map_err(|_| WidgetError::NoRuntime)?;
        let calculator = calculator.clone();
        let delivery = Delivery {
            tx: self.tx.clone(),
            widget,
            target,
            generation,
            sent: false,
        };

        self.in_flight += 1;
        handle.spawn(async move {
            let result = calculator.calculate(request).await;
            delivery.send(result);
        });
        Ok(())
    }

    /// Outcomes delivered so far, without waiting.
    pub fn drain(&mut self) -> Vec<RemoteOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            outcomes.push(outcome);
        }
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }

    /// Waits for the next outcome; `None` when nothing is in flight.
    pub async fn next(&mut self) -> Option<RemoteOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let outcome = self.rx.recv().await?;
        self.in_flight -= 1;
        Some(outcome)
    }
}

/// Sender half owned by one calculation task.
///
/// Sends on drop when the task never finished, so `in_flight` always
/// returns to zero.
struct Delivery {
    tx: mpsc::UnboundedSender<RemoteOutcome>,
    widget: WidgetId,
    target: FieldRole,
    generation: u64,
    sent: bool,
}

impl Delivery {
    fn send(mut self, result: WidgetResult<f64>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: WidgetResult<f64>) {
        if self.sent {
            return;
        }
        self.sent = true;
        // A closed channel means the page is gone.
        let _ = self.tx.send(RemoteOutcome {
            widget: self.widget,
            target: self.target,
            generation: self.generation,
            result,
        });
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.deliver(Err(WidgetError::Cancelled));
    }
}
