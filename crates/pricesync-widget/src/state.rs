//! Per-widget value cache.
//!
//! Each managed input keeps its unrounded numeric value here, next to the
//! text shown in the input, so repeated conversions do not drift with the
//! display precision. Every write bumps the field's generation.

use pricesync_core::FieldRole;

use crate::dom::NodeId;

/// Cached state of one managed input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldState {
    pub node: NodeId,
    pub value: Option<f64>,
    pub generation: u64,
}

impl FieldState {
    pub fn new(node: NodeId) -> Self {
        FieldState {
            node,
            value: None,
            generation: 0,
        }
    }
}

/// The fields of one widget, indexed by role.
#[derive(Debug, Clone, Default)]
pub struct FieldStates {
    slots: [Option<FieldState>; 4],
}

fn slot(role: FieldRole) -> usize {
    match role {
        FieldRole::Tax => 0,
        FieldRole::NoTax => 1,
        FieldRole::TaxAmount => 2,
        FieldRole::TaxRate => 3,
    }
}

impl FieldStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the node playing `role`.
    pub fn insert(&mut self, role: FieldRole, node: NodeId) {
        self.slots[slot(role)] = Some(FieldState::new(node));
    }

    pub fn get(&self, role: FieldRole) -> Option<&FieldState> {
        self.slots[slot(role)].as_ref()
    }

    pub fn node(&self, role: FieldRole) -> Option<NodeId> {
        self.get(role).map(|state| state.node)
    }

    pub fn value(&self, role: FieldRole) -> Option<f64> {
        self.get(role).and_then(|state| state.value)
    }

    pub fn generation(&self, role: FieldRole) -> u64 {
        self.get(role).map_or(0, |state| state.generation)
    }

    /// Caches a value; returns the new generation.
    pub fn set_value(&mut self, role: FieldRole, value: Option<f64>) -> u64 {
        match self.slots[slot(role)].as_mut() {
            Some(state) => {
                state.value = value;
                state.generation += 1;
                state.generation
            }
            None => 0,
        }
    }

    /// Marks the field as written without changing its value.
    pub fn bump(&mut self, role: FieldRole) -> u64 {
        match self.slots[slot(role)].as_mut() {
            Some(state) => {
                state.generation += 1;
                state.generation
            }
            None => 0,
        }
    }

    /// Role of a node, if it is managed here.
    pub fn role_of(&self, node: NodeId) -> Option<FieldRole> {
        FieldRole::ALL
            .into_iter()
            .find(|role| self.node(*role) == Some(node))
    }

    /// Managed fields, in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldRole, &FieldState)> {
        FieldRole::ALL
            .into_iter()
            .filter_map(|role| self.get(role).map(|state| (role, state)))
    }
}
