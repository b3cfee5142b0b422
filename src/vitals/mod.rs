// Vital-sign classification and simulation

mod classifier;
mod generator;

pub use classifier::{classify, Severity};
pub use generator::VitalsGenerator;
