//! Evaluators for the objective being optimised.
//!
//! The optimiser itself is external; instrumentation only needs to evaluate
//! the objective and its gradient at the parameter vector it reports. An
//! [`Objective`] does that. Plain functions are adapted with [`value`],
//! [`separate`], [`combined`], or [`fallible`], and a parameterised [`Model`]
//! is adapted with [`ModelObjective`].

use std::{convert::Infallible, error::Error as StdError};

/// Objective value and gradient at one parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub f: f64,

    /// Gradient of `f`; empty when no gradient is available.
    pub g: Vec<f64>,
}

impl Evaluation {
    /// Returns the Euclidean norm of the gradient, or zero if it is empty.
    #[must_use]
    pub fn gradient_norm(&self) -> f64 {
        self.g.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Evaluates the objective and gradient at a parameter vector.
pub trait Objective {
    type Error: StdError + Send + Sync + 'static;

    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the objective cannot be computed.
    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error>;

    /// Returns the names of the model parameters, if the objective has any.
    ///
    /// History tables use one column per name when this returns `Some`.
    fn parameter_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Returns the named parameter values at `x`, in [`Objective::parameter_names`] order.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the values cannot be computed.
    fn parameter_values(&mut self, x: &[f64]) -> Result<Vec<f64>, Self::Error> {
        let _ = x;
        Ok(Vec::new())
    }
}

/// An objective with no gradient, built by [`value`].
#[derive(Debug, Clone)]
pub struct Value<F>(F);

/// An objective with a separate gradient function, built by [`separate`].
#[derive(Debug, Clone)]
pub struct Separate<F, G> {
    f: F,
    g: G,
}

/// An objective returning value and gradient together, built by [`combined`].
#[derive(Debug, Clone)]
pub struct Combined<F>(F);

/// A fallible objective, built by [`fallible`].
#[derive(Debug, Clone)]
pub struct Fallible<F>(F);

/// Adapts a scalar function; its gradient is reported as empty.
pub fn value<F>(f: F) -> Value<F>
where
    F: FnMut(&[f64]) -> f64,
{
    Value(f)
}

/// Adapts a scalar function and a separate gradient function.
pub fn separate<F, G>(f: F, g: G) -> Separate<F, G>
where
    F: FnMut(&[f64]) -> f64,
    G: FnMut(&[f64]) -> Vec<f64>,
{
    Separate { f, g }
}

/// Adapts a function that returns the value and gradient together.
pub fn combined<F>(fg: F) -> Combined<F>
where
    F: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    Combined(fg)
}

/// Adapts a function that can fail.
pub fn fallible<F, E>(fg: F) -> Fallible<F>
where
    F: FnMut(&[f64]) -> Result<Evaluation, E>,
    E: StdError + Send + Sync + 'static,
{
    Fallible(fg)
}

impl<F> Objective for Value<F>
where
    F: FnMut(&[f64]) -> f64,
{
    type Error = Infallible;

    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
        Ok(Evaluation {
            f: (self.0)(x),
            g: Vec::new(),
        })
    }
}

impl<F, G> Objective for Separate<F, G>
where
    F: FnMut(&[f64]) -> f64,
    G: FnMut(&[f64]) -> Vec<f64>,
{
    type Error = Infallible;

    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
        Ok(Evaluation {
            f: (self.f)(x),
            g: (self.g)(x),
        })
    }
}

impl<F> Objective for Combined<F>
where
    F: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    type Error = Infallible;

    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
        let (f, g) = (self.0)(x);
        Ok(Evaluation { f, g })
    }
}

impl<F, E> Objective for Fallible<F>
where
    F: FnMut(&[f64]) -> Result<Evaluation, E>,
    E: StdError + Send + Sync + 'static,
{
    type Error = E;

    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
        (self.0)(x)
    }
}

/// A parameterised model whose objective is being optimised.
///
/// The optimiser works on a free-state vector `x`; the model maps it onto
/// named parameters and keeps its own count of objective evaluations.
pub trait Model {
    type Error: StdError + Send + Sync + 'static;

    /// Evaluates the objective and gradient at the free state `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the objective cannot be computed.
    fn objective(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error>;

    /// Loads the free state `x` into the model's parameters.
    fn set_state(&mut self, x: &[f64]);

    /// Returns the current parameters as ordered `(name, value)` pairs.
    fn parameters(&self) -> Vec<(String, f64)>;

    /// Returns the model's objective evaluation counter.
    fn evaluation_count_mut(&mut self) -> &mut usize;
}

/// Adapts a [`Model`] into an [`Objective`] with named parameters.
///
/// Evaluations made for instrumentation are taken back off the model's own
/// evaluation counter, so the optimiser's bookkeeping is not inflated.
#[derive(Debug, Clone)]
pub struct ModelObjective<M> {
    model: M,
}

impl<M: Model> ModelObjective<M> {
    #[must_use]
    pub fn new(model: M) -> Self {
        Self { model }
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    #[must_use]
    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: Model> Objective for ModelObjective<M> {
    type Error = M::Error;

    fn evaluate(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
        let evaluation = self.model.objective(x)?;
        let count = self.model.evaluation_count_mut();
        *count = count.saturating_sub(1);
        Ok(evaluation)
    }

    fn parameter_names(&self) -> Option<Vec<String>> {
        Some(
            self.model
                .parameters()
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
        )
    }

    fn parameter_values(&mut self, x: &[f64]) -> Result<Vec<f64>, Self::Error> {
        self.model.set_state(x);
        Ok(self
            .model
            .parameters()
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    /// Quadratic bowl with parameters stored in log space.
    struct LogQuadratic {
        log_scale: f64,
        log_offset: f64,
        evaluations: usize,
    }

    impl Model for LogQuadratic {
        type Error = Infallible;

        fn objective(&mut self, x: &[f64]) -> Result<Evaluation, Self::Error> {
            self.evaluations += 1;
            Ok(Evaluation {
                f: x.iter().map(|v| v * v).sum(),
                g: x.iter().map(|v| 2.0 * v).collect(),
            })
        }

        fn set_state(&mut self, x: &[f64]) {
            self.log_scale = x[0];
            self.log_offset = x[1];
        }

        fn parameters(&self) -> Vec<(String, f64)> {
            vec![
                ("scale".into(), self.log_scale.exp()),
                ("offset".into(), self.log_offset.exp()),
            ]
        }

        fn evaluation_count_mut(&mut self) -> &mut usize {
            &mut self.evaluations
        }
    }

    #[test]
    fn gradient_norm_is_euclidean() {
        let eval = Evaluation {
            f: 0.0,
            g: vec![3.0, 4.0],
        };

        assert_relative_eq!(eval.gradient_norm(), 5.0);
    }

    #[test]
    fn value_only_has_zero_gradient_norm() {
        let mut objective = value(|x: &[f64]| x.iter().sum());
        let eval = objective.evaluate(&[1.0, 2.0]).unwrap();

        assert_relative_eq!(eval.f, 3.0);
        assert!(eval.g.is_empty());
        assert_relative_eq!(eval.gradient_norm(), 0.0);
        assert_eq!(objective.parameter_names(), None);
    }

    #[test]
    fn separate_and_combined_agree() {
        let mut a = separate(
            |x: &[f64]| x.iter().map(|v| v * v).sum(),
            |x: &[f64]| x.iter().map(|v| 2.0 * v).collect(),
        );
        let mut b = combined(|x: &[f64]| {
            (
                x.iter().map(|v| v * v).sum(),
                x.iter().map(|v| 2.0 * v).collect(),
            )
        });

        let x = [1.0, -2.0, 0.5];
        assert_eq!(a.evaluate(&x).unwrap(), b.evaluate(&x).unwrap());
    }

    #[test]
    fn fallible_passes_errors_through() {
        let mut objective = fallible(|x: &[f64]| {
            if x[0] < 0.0 {
                Err(std::fmt::Error)
            } else {
                Ok(Evaluation {
                    f: x[0].sqrt(),
                    g: vec![],
                })
            }
        });

        assert!(objective.evaluate(&[4.0]).is_ok());
        assert!(objective.evaluate(&[-1.0]).is_err());
    }

    #[test]
    fn model_objective_discounts_its_evaluations() {
        let model = LogQuadratic {
            log_scale: 0.0,
            log_offset: 0.0,
            evaluations: 7,
        };
        let mut objective = ModelObjective::new(model);

        let eval = objective.evaluate(&[1.0, 2.0]).unwrap();

        assert_relative_eq!(eval.f, 5.0);
        assert_eq!(objective.model().evaluations, 7);
    }

    #[test]
    fn model_objective_reports_named_parameters() {
        let model = LogQuadratic {
            log_scale: 0.0,
            log_offset: 0.0,
            evaluations: 0,
        };
        let mut objective = ModelObjective::new(model);

        assert_eq!(
            objective.parameter_names(),
            Some(vec!["scale".to_string(), "offset".to_string()])
        );

        let values = objective.parameter_values(&[0.0, 2.0_f64.ln()]).unwrap();
        assert_relative_eq!(values[0], 1.0);
        assert_relative_eq!(values[1], 2.0);
    }
}
