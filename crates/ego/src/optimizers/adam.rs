use crate::errors::{EgoError, Result};
use ndarray::Array1;

use serde::{Deserialize, Serialize};

/// Adam gradient ascent hyperparameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdamParams {
    /// Step size
    pub(crate) learning_rate: f64,
    /// Fixed number of iterations, no early exit
    pub(crate) n_steps: usize,
    /// Exponential decay rate of the first moment estimate
    pub(crate) beta_1: f64,
    /// Exponential decay rate of the second moment estimate
    pub(crate) beta_2: f64,
    /// Added to the second moment estimate before its square root
    pub(crate) epsilon: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        AdamParams {
            learning_rate: 0.5,
            n_steps: 50,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamParams {
    /// Sets the step size
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the number of iterations, zero returns the start point
    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Sets the moment decay rates
    pub fn betas(mut self, beta_1: f64, beta_2: f64) -> Self {
        self.beta_1 = beta_1;
        self.beta_2 = beta_2;
        self
    }

    /// Sets the stabilization constant
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Get the step size
    pub fn get_learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Get the number of iterations
    pub fn get_n_steps(&self) -> usize {
        self.n_steps
    }

    pub(crate) fn check(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(EgoError::InvalidConfigError(format!(
                "Adam learning rate should be positive, got {}",
                self.learning_rate
            )));
        }
        for beta in [self.beta_1, self.beta_2] {
            if !(0. ..1.).contains(&beta) {
                return Err(EgoError::InvalidConfigError(format!(
                    "Adam decay rates should be in [0, 1), got {}",
                    beta
                )));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.) {
            return Err(EgoError::InvalidConfigError(format!(
                "Adam epsilon should be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Running moment estimates of one Adam ascent
#[derive(Clone, Debug)]
pub(crate) struct AdamState {
    m: Array1<f64>,
    v: Array1<f64>,
    t: i32,
}

impl AdamState {
    pub fn new(dim: usize) -> Self {
        AdamState {
            m: Array1::zeros(dim),
            v: Array1::zeros(dim),
            t: 0,
        }
    }

    /// Updates the moments with `grad` and returns the ascent step
    /// `learning_rate . m_hat / sqrt(v_hat + epsilon)`
    pub fn step(&mut self, params: &AdamParams, grad: &Array1<f64>) -> Array1<f64> {
        self.t += 1;
        self.m = &self.m * params.beta_1 + grad * (1. - params.beta_1);
        self.v = &self.v * params.beta_2 + grad.mapv(|g| g * g) * (1. - params.beta_2);
        let m_hat = &self.m / (1. - params.beta_1.powi(self.t));
        let v_hat = &self.v / (1. - params.beta_2.powi(self.t));
        m_hat / v_hat.mapv(|v| (v + params.epsilon).sqrt()) * params.learning_rate
    }
}
