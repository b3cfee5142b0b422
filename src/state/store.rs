use crate::state::entity::{PatientId, PatientState};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map of live patient state.
///
/// Cloning is cheap and every clone shares the same map. Reads are open to
/// any holder; writes are crate-private so only the scheduler mutates state.
#[derive(Clone, Default)]
pub struct StateStore {
    states: Arc<DashMap<PatientId, PatientState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of one patient's state
    pub fn get(&self, patient_id: PatientId) -> Option<PatientState> {
        self.states.get(&patient_id).map(|s| s.clone())
    }

    /// Get a copy of every patient's state, ordered by patient id
    pub fn all(&self) -> Vec<(PatientId, PatientState)> {
        let mut states: Vec<_> = self
            .states
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        states.sort_by_key(|(id, _)| *id);
        states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Current state for `patient_id`, creating the default on first sight
    pub(crate) fn load_or_create(&self, patient_id: PatientId) -> PatientState {
        self.states.entry(patient_id).or_default().clone()
    }

    pub(crate) fn save(&self, patient_id: PatientId, state: PatientState) {
        self.states.insert(patient_id, state);
    }
}
