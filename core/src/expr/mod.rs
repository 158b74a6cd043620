//! Expression environment for string-form coordinates and dimension values.
//!
//! A caller supplies one environment string per feature run: `name = value;`
//! assignments followed (optionally) by a final expression. String-form
//! point coordinates and constraint values are evaluated against that scope
//! before solving; a failed evaluation leaves the field unchanged.

pub mod parser;
pub mod eval;

pub use eval::{Environment, EvalError};
pub use parser::{parse_environment, parse_expression, Expr, ParseError};

use crate::sketch::types::{Scalar, Sketch};

/// Resolve every string-form field in the sketch against `env`.
///
/// Constraint `value_expression` fields take precedence over `value` when
/// both are present. Returns the number of fields that resolved.
pub fn resolve_sketch_expressions(sketch: &mut Sketch, env: &Environment) -> usize {
    let mut resolved = 0;

    let mut resolve_scalar = |scalar: &mut Scalar| {
        if let Scalar::Expr(src) = scalar {
            if let Ok(value) = env.evaluate(src) {
                *scalar = Scalar::Num(value);
                return true;
            }
        }
        false
    };

    for point in sketch.points.values_mut() {
        if resolve_scalar(&mut point.x) {
            resolved += 1;
        }
        if resolve_scalar(&mut point.y) {
            resolved += 1;
        }
    }

    for constraint in sketch.constraints.values_mut() {
        if let Some(src) = &constraint.value_expression {
            if let Ok(value) = env.evaluate(src) {
                constraint.value = Some(Scalar::Num(value));
                resolved += 1;
                continue;
            }
        }
        if let Some(value) = constraint.value.as_mut() {
            if let Scalar::Expr(src) = value {
                if let Ok(v) = env.evaluate(src) {
                    *value = Scalar::Num(v);
                    resolved += 1;
                }
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::types::{Constraint, ConstraintKind, Point, Scalar, Sketch};

    #[test]
    fn test_resolve_point_coordinates() {
        let mut sketch = Sketch::new();
        let mut p = Point::new(1, 0.0, 0.0);
        p.x = Scalar::Expr("width / 2".to_string());
        p.y = Scalar::Expr("3 + 4".to_string());
        sketch.points.insert(1, p);

        let env = Environment::compile("width = 10;");
        let resolved = resolve_sketch_expressions(&mut sketch, &env);

        assert_eq!(resolved, 2);
        assert_eq!(sketch.point_pos(1), Some([5.0, 7.0]));
    }

    #[test]
    fn test_failed_evaluation_leaves_field_unchanged() {
        let mut sketch = Sketch::new();
        let mut p = Point::new(1, 0.0, 0.0);
        p.x = Scalar::Expr("missing * 2".to_string());
        sketch.points.insert(1, p);

        let env = Environment::default();
        let resolved = resolve_sketch_expressions(&mut sketch, &env);

        assert_eq!(resolved, 0);
        assert!(sketch.points[&1].x.is_expr());
    }

    #[test]
    fn test_value_expression_precedence() {
        let mut sketch = Sketch::new();
        sketch.points.insert(1, Point::new(1, 0.0, 0.0));
        sketch.points.insert(2, Point::new(2, 5.0, 0.0));
        let mut c = Constraint::new(10, ConstraintKind::Distance, vec![1, 2]).with_value(5.0);
        c.value_expression = Some("span".to_string());
        sketch.constraints.insert(10, c);

        let env = Environment::compile("span = 40;");
        resolve_sketch_expressions(&mut sketch, &env);

        assert_eq!(sketch.constraints[&10].value_num(), Some(40.0));
    }
}
