//! Linear history runner.
//!
//! Features regenerate in persisted order; each run follows the
//! prepare → solve → compile → emit pipeline, and results land in the
//! scene before the next feature reads its references. Errors are recorded
//! on the failing feature and regeneration continues.
//!
//! Runs are synchronous and serialized by the exclusive borrow on the
//! timeline; the solver itself is a pure synchronous loop.

use super::types::{validate_sketch, FeatureError, SketchFeature};
use crate::expr::{resolve_sketch_expressions, Environment};
use crate::scene::{Scene, SceneEdge};
use crate::sketch::external::project_external_refs;
use crate::sketch::profile::{compile_profile, CompiledProfile, ProfileOptions};
use crate::sketch::solver::{solve, SolveOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct RegenOptions {
    pub solve: SolveOptions,
    pub profile: ProfileOptions,
    /// Expression environment for the whole run: `name = value;` assignments
    /// evaluated into an isolated scope.
    pub expressions: String,
}

/// The persisted feature history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub features: Vec<SketchFeature>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: SketchFeature) {
        self.features.push(feature);
    }

    /// Regenerate every feature in order, rebuilding the scene. Returns the
    /// number of features that ran cleanly.
    pub fn regenerate(&mut self, scene: &mut Scene, options: &RegenOptions) -> usize {
        scene.clear();
        let env = Environment::compile(&options.expressions);
        let mut succeeded = 0;

        for feature in &mut self.features {
            feature.last_error = None;
            match run_sketch_feature(feature, scene, &env, options) {
                Ok(compiled) => {
                    attach(scene, compiled);
                    succeeded += 1;
                }
                Err(err) => {
                    warn!(feature = %feature.name, error = %err, "feature failed; continuing");
                    feature.last_error = Some(err.to_string());
                }
            }
        }

        debug!(
            total = self.features.len(),
            succeeded, "timeline regeneration finished"
        );
        succeeded
    }
}

fn run_sketch_feature(
    feature: &mut SketchFeature,
    scene: &Scene,
    env: &Environment,
    options: &RegenOptions,
) -> Result<CompiledProfile, FeatureError> {
    // Rebuild the plane from its referenced face when it resolves; keep the
    // last-known basis otherwise.
    if let Some(name) = &feature.plane_ref {
        if let Some(face) = scene.face_by_name(name) {
            feature.basis = face.basis.clone();
        } else {
            debug!(plane = %name, "plane reference unresolved; reusing last basis");
        }
    }

    validate_sketch(&feature.sketch)?;

    // Prepare: pin external endpoints, then resolve expression fields.
    project_external_refs(
        &mut feature.sketch,
        &mut feature.external_refs,
        &feature.basis,
        scene,
    );
    resolve_sketch_expressions(&mut feature.sketch, env);

    // Solve.
    let outcome = solve(&feature.sketch, &options.solve);
    feature.last_solve = Some(outcome.report());
    feature.sketch = outcome.sketch;

    // Compile.
    Ok(compile_profile(
        &feature.sketch,
        &feature.basis,
        feature.id,
        &feature.name,
        &options.profile,
    ))
}

fn attach(scene: &mut Scene, compiled: CompiledProfile) {
    if let Some(face) = compiled.face {
        scene.attach_face(face);
    }
    for edge in compiled.edges {
        scene.attach_edge(SceneEdge {
            id: edge.id,
            name: edge.name,
            solid: None,
            polyline: edge.polyline,
        });
    }
}
