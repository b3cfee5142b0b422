// Per-patient live state and the concurrent store that holds it

mod entity;
mod store;

pub use entity::{PatientId, PatientState, Snapshot};
pub use store::StateStore;
