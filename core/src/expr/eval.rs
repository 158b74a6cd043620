//! Evaluation of parsed expressions against an isolated scope.
//!
//! The scope is built from the environment's `name = value;` assignments,
//! evaluated in declaration order. Nothing from the host environment is
//! reachable: only arithmetic, the built-in functions, and declared names.

use super::parser::{parse_environment, parse_expression, BinaryOperator, Expr, UnaryOperator};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Undefined name: {0}")]
    UndefinedName(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Result is not finite")]
    NonFinite,
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A compiled expression environment: the scope produced by evaluating the
/// caller-supplied assignment prefix. Immutable for the duration of a
/// feature run.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    scope: HashMap<String, f64>,
}

impl Environment {
    /// Compile an environment string. Assignments that fail to evaluate are
    /// skipped; names they would have declared stay undefined.
    pub fn compile(source: &str) -> Self {
        let mut scope = HashMap::new();

        let assignments = match parse_environment(source) {
            Ok((assignments, _trailing)) => assignments,
            Err(err) => {
                debug!(error = %err, "expression environment failed to parse");
                return Self { scope };
            }
        };

        for assignment in assignments {
            match eval_expr(&assignment.expr, &scope) {
                Ok(value) => {
                    scope.insert(assignment.name, value);
                }
                Err(err) => {
                    debug!(name = %assignment.name, error = %err, "skipping environment assignment");
                }
            }
        }

        Self { scope }
    }

    /// Evaluate an expression string in this environment's scope.
    pub fn evaluate(&self, source: &str) -> Result<f64, EvalError> {
        let expr = parse_expression(source).map_err(|e| EvalError::Parse(e.message))?;
        eval_expr(&expr, &self.scope)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.scope.get(name).copied()
    }
}

fn eval_expr(expr: &Expr, scope: &HashMap<String, f64>) -> Result<f64, EvalError> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::Name(name) => *scope
            .get(name)
            .ok_or_else(|| EvalError::UndefinedName(name.clone()))?,
        Expr::Constant(name) => match name.as_str() {
            "PI" => std::f64::consts::PI,
            "E" => std::f64::consts::E,
            _ => return Err(EvalError::UndefinedName(name.clone())),
        },
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left, scope)?;
            let r = eval_expr(right, scope)?;
            match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Sub => l - r,
                BinaryOperator::Mul => l * r,
                BinaryOperator::Div => l / r,
                BinaryOperator::Pow => l.powf(r),
            }
        }
        Expr::UnaryOp { op, operand } => {
            let v = eval_expr(operand, scope)?;
            match op {
                UnaryOperator::Neg => -v,
            }
        }
        Expr::FnCall { name, arg } => {
            let v = eval_expr(arg, scope)?;
            match name.as_str() {
                "sin" => v.sin(),
                "cos" => v.cos(),
                "tan" => v.tan(),
                "sqrt" => v.sqrt(),
                "abs" => v.abs(),
                "ln" => v.ln(),
                "log10" => v.log10(),
                "exp" => v.exp(),
                _ => return Err(EvalError::UnknownFunction(name.clone())),
            }
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let env = Environment::default();
        assert_eq!(env.evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(env.evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(env.evaluate("2 ^ 10").unwrap(), 1024.0);
        assert_eq!(env.evaluate("-5 + 3").unwrap(), -2.0);
    }

    #[test]
    fn test_functions_and_constants() {
        let env = Environment::default();
        assert!((env.evaluate("sin(PI / 2)").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(env.evaluate("sqrt(16)").unwrap(), 4.0);
        assert!((env.evaluate("ln(E)").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_assignments_build_scope_in_order() {
        let env = Environment::compile("base = 10; height = base * 2;");
        assert_eq!(env.get("base"), Some(10.0));
        assert_eq!(env.get("height"), Some(20.0));
        assert_eq!(env.evaluate("base + height").unwrap(), 30.0);
    }

    #[test]
    fn test_undefined_name_errors() {
        let env = Environment::compile("a = 1;");
        assert!(matches!(
            env.evaluate("a + missing"),
            Err(EvalError::UndefinedName(_))
        ));
    }

    #[test]
    fn test_failed_assignment_is_skipped() {
        // `b` references an undefined name and is dropped; `c` still works.
        let env = Environment::compile("b = nope * 2; c = 3;");
        assert_eq!(env.get("b"), None);
        assert_eq!(env.get("c"), Some(3.0));
    }

    #[test]
    fn test_division_by_zero_is_non_finite() {
        let env = Environment::default();
        assert_eq!(env.evaluate("1 / 0"), Err(EvalError::NonFinite));
    }

    #[test]
    fn test_no_host_access() {
        let env = Environment::default();
        assert!(env.evaluate("std").is_err());
        assert!(env.evaluate("process(1)").is_err());
    }
}
