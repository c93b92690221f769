//! # pricesync-widget: The PriceSync Widget Runtime
//!
//! Binds the pure price logic of `pricesync-core` to a document. A widget
//! attached to a price input creates the complementary price input and a
//! read-only tax amount, then keeps all of them in sync as the user types.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Page                                       │
//! │                                                                         │
//! │   Document ◄──── builder ◄──── PriceSync::setup                         │
//! │      ▲                              │                                   │
//! │      │ set_value / classes          ▼                                   │
//! │      │                        FieldStates (value + generation)          │
//! │      │                              ▲                                   │
//! │   input() ─► ListenerRegistry ─► handle() ─► sync() ─┬─► local math     │
//! │                                                      └─► RemoteDispatcher│
//! │   advance_time() ─► HighlightScheduler                    │             │
//! │   settle() / apply_remote_responses() ◄───────────────────┘             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`page`] - Activation registry, event dispatch, clock and remote inbox
//! - [`widget`] - One activated helper, its checks and hooks
//! - [`dom`] - In-memory document
//! - [`selector`] - Selector subset used by options
//! - [`events`] - Namespaced listeners
//! - [`state`] - Per-field value cache
//! - [`highlight`] - Highlight animation on a virtual clock
//! - [`remote`] - Calculation endpoint client
//! - [`error`] - Widget error types

// =============================================================================
// Module Declarations
// =============================================================================

mod builder;
pub mod dom;
pub mod error;
pub mod events;
pub mod highlight;
pub mod page;
pub mod remote;
pub mod selector;
pub mod state;
mod sync;
pub mod widget;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use dom::{Document, NodeId};
pub use error::{WidgetError, WidgetResult};
pub use events::EventKind;
pub use highlight::PendingTimer;
pub use page::{Page, WidgetId};
pub use remote::{CalculationRequest, RemoteCalculator};
pub use state::{FieldState, FieldStates};
pub use widget::{FieldUpdate, Hooks, PriceSync};
