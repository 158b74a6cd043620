pub mod types;
pub mod runner;

pub use runner::{RegenOptions, Timeline};
pub use types::{FeatureError, SketchFeature};

#[cfg(test)]
mod tests_runner;
