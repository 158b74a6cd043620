//! Parametric sketch/CAD core: a 2D geometric constraint solver and a
//! sketch-to-profile compiler, plus the feature runtime tying them into a
//! linear regeneration history.

pub mod geometry;
pub mod expr;
pub mod sketch;
pub mod scene;
pub mod features;

pub fn version() -> &'static str {
    "0.1.0"
}
