//! Bounded optimizers used by curve calibration.
//!
//! - `differential_evolution`: seeded stochastic search over a box
//!   (Storn and Price, 1997), `best/1/bin` with dithered mutation and a
//!   Latin-hypercube initial population.
//! - `levenberg_marquardt`: local refinement of a residual vector inside the
//!   same box (Levenberg 1944, Marquardt 1963). Active bounds are handled by
//!   freezing components whose descent direction points out of the box.
//!
//! Both solvers are deterministic for fixed inputs and options.

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::math::solve_least_squares;

/// Box constraints `lower <= x <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxConstraints {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoxConstraints {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, String> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err("Bounds require the same non-zero lower/upper dimensions.".to_string());
        }
        for i in 0..lower.len() {
            if !lower[i].is_finite() || !upper[i].is_finite() || lower[i] > upper[i] {
                return Err(format!("Invalid bound at index {i}: [{}, {}].", lower[i], upper[i]));
            }
        }
        Ok(Self { lower, upper })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, v)| v.clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dimension()
            && x
                .iter()
                .enumerate()
                .all(|(i, &v)| v >= self.lower[i] && v <= self.upper[i])
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    PopulationConverged,
    GradientTolerance,
    StepTolerance,
    ObjectiveTolerance,
    Stagnation,
    MaxIterations,
    NumericalFailure,
}

/// Shared result payload for both solvers.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub x: Vec<f64>,
    /// Objective at `x` (sum of squares for least squares problems).
    pub objective: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub reason: TerminationReason,
}

#[derive(Debug, Clone, Copy)]
pub struct DifferentialEvolutionOptions {
    pub max_generations: usize,
    /// Population size is `population_factor × dimension`.
    pub population_factor: usize,
    /// Mutation scale is drawn once per generation from `[mutation_min, mutation_max)`.
    pub mutation_min: f64,
    pub mutation_max: f64,
    pub crossover_probability: f64,
    pub seed: u64,
    /// Relative convergence tolerance on the spread of population energies.
    pub tol: f64,
    /// Absolute convergence tolerance on the spread of population energies.
    pub atol: f64,
}

impl Default for DifferentialEvolutionOptions {
    fn default() -> Self {
        Self {
            max_generations: 1000,
            population_factor: 15,
            mutation_min: 0.5,
            mutation_max: 1.0,
            crossover_probability: 0.7,
            seed: 42,
            tol: 1e-7,
            atol: 1e-7,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardtOptions {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Tolerance on the infinity norm of the projected objective gradient.
    pub gradient_tolerance: f64,
    /// Tolerance on the step length, relative to `1 + |x|`.
    pub step_tolerance: f64,
    /// Tolerance on the relative objective decrease of an accepted step.
    pub objective_tolerance: f64,
    /// Relative step for central finite differences.
    pub finite_diff_step: f64,
    pub max_stagnation: usize,
}

impl Default for LevenbergMarquardtOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.3,
            gradient_tolerance: 1e-5,
            step_tolerance: 1e-10,
            objective_tolerance: 2.2e-9,
            finite_diff_step: 1e-6,
            max_stagnation: 20,
        }
    }
}

/// Minimize `objective_fn` over `bounds` with differential evolution.
///
/// `x0`, when given, replaces the first member of the initial population
/// (clamped into the box). Non-finite objective values are treated as `+∞`.
pub fn differential_evolution<F>(
    bounds: &BoxConstraints,
    options: DifferentialEvolutionOptions,
    x0: Option<&[f64]>,
    mut objective_fn: F,
) -> Result<OptimizationResult, String>
where
    F: FnMut(&[f64]) -> f64,
{
    let dim = bounds.dimension();
    if dim == 0 {
        return Err("Differential evolution requires non-empty bounds.".to_string());
    }
    if !(options.mutation_min > 0.0 && options.mutation_max > options.mutation_min) {
        return Err("Invalid mutation range.".to_string());
    }

    let pop_size = (options.population_factor * dim).max(5);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut population = latin_hypercube(bounds, pop_size, &mut rng);

    if let Some(x0) = x0 {
        if x0.len() != dim {
            return Err(format!(
                "Initial guess has dimension {}, expected {dim}.",
                x0.len()
            ));
        }
        population[0] = bounds.clamp(x0);
    }

    let mut energies: Vec<f64> = population
        .iter()
        .map(|x| finite_or_inf(objective_fn(x)))
        .collect();
    let mut evaluations = pop_size;
    let mut best_idx = argmin(&energies);

    let mut iterations = 0usize;
    let mut converged = false;
    let mut reason = TerminationReason::MaxIterations;

    for generation in 0..options.max_generations {
        iterations = generation + 1;
        let scale = rng.gen_range(options.mutation_min..options.mutation_max);

        for i in 0..pop_size {
            let (r1, r2) = pick_two_distinct(&mut rng, pop_size, i);
            let j_rand = rng.gen_range(0..dim);

            let mut trial = population[i].clone();
            for d in 0..dim {
                if d == j_rand || rng.gen_range(0.0..1.0) < options.crossover_probability {
                    let mut v = population[best_idx][d]
                        + scale * (population[r1][d] - population[r2][d]);
                    if !(v >= bounds.lower[d] && v <= bounds.upper[d]) {
                        v = rng.gen_range(bounds.lower[d]..=bounds.upper[d]);
                    }
                    trial[d] = v;
                }
            }

            let energy = finite_or_inf(objective_fn(&trial));
            evaluations += 1;
            if energy <= energies[i] {
                population[i] = trial;
                energies[i] = energy;
                if energy < energies[best_idx] {
                    best_idx = i;
                }
            }
        }

        if population_converged(&energies, options.tol, options.atol) {
            converged = true;
            reason = TerminationReason::PopulationConverged;
            break;
        }
    }

    let objective = energies[best_idx];
    if !objective.is_finite() {
        return Err("Differential evolution found no point with a finite objective.".to_string());
    }

    Ok(OptimizationResult {
        x: population[best_idx].clone(),
        objective,
        iterations,
        evaluations,
        converged,
        reason,
    })
}

/// Minimize `Σ r_i(x)²` over `bounds` starting from `initial`.
///
/// Accepted steps always decrease the objective, so the returned point is
/// never worse than the (clamped) starting point.
pub fn levenberg_marquardt<F>(
    initial: &[f64],
    bounds: &BoxConstraints,
    options: LevenbergMarquardtOptions,
    mut residual_fn: F,
) -> Result<OptimizationResult, String>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    if initial.len() != bounds.dimension() {
        return Err("Initial vector dimension does not match bounds.".to_string());
    }

    let mut x = bounds.clamp(initial);
    let mut residuals = residual_fn(&x);
    let mut evaluations = 1usize;
    if residuals.is_empty() {
        return Err("Residual function returned an empty residual vector.".to_string());
    }

    let mut objective = sum_of_squares(&residuals);
    if !objective.is_finite() {
        return Err("Objective is not finite at the initial point.".to_string());
    }

    let n = x.len();
    let mut lambda = options.initial_lambda.max(1e-12);
    let mut iterations = 0usize;
    let mut converged = false;
    let mut reason = TerminationReason::MaxIterations;
    let mut stagnation = 0usize;

    for iter in 0..options.max_iterations {
        iterations = iter + 1;

        let jacobian = central_difference_jacobian(
            &x,
            residuals.len(),
            bounds,
            options.finite_diff_step,
            &mut residual_fn,
            &mut evaluations,
        );
        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        // Half the gradient of the sum of squares.
        let g = &jt * DVector::from_column_slice(&residuals);

        let free = free_components(&x, &g, bounds);
        let projected_norm = (0..n)
            .filter(|&i| free[i])
            .map(|i| (2.0 * g[i]).abs())
            .fold(0.0_f64, f64::max);
        if !projected_norm.is_finite() {
            reason = TerminationReason::NumericalFailure;
            break;
        }
        if projected_norm <= options.gradient_tolerance {
            converged = true;
            reason = TerminationReason::GradientTolerance;
            break;
        }

        // Damped normal equations restricted to the free components; frozen
        // components get an identity row with zero right-hand side.
        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        for i in 0..n {
            if !free[i] {
                a[(i, i)] = 1.0;
                continue;
            }
            for j in 0..n {
                if free[j] {
                    a[(i, j)] = jtj[(i, j)];
                }
            }
            a[(i, i)] += lambda * (jtj[(i, i)].abs() + 1.0);
            rhs[i] = -g[i];
        }

        let Some(delta) = solve_least_squares(&a, &rhs) else {
            lambda = (lambda * options.lambda_up).min(1e12);
            stagnation += 1;
            if stagnation >= options.max_stagnation {
                reason = TerminationReason::Stagnation;
                break;
            }
            continue;
        };

        let stepped: Vec<f64> = x.iter().zip(delta.iter()).map(|(xi, di)| xi + di).collect();
        let candidate = bounds.clamp(&stepped);
        let step_norm = norm(&candidate.iter().zip(&x).map(|(c, xi)| c - xi).collect::<Vec<_>>());
        if step_norm <= options.step_tolerance * (1.0 + norm(&x)) {
            converged = true;
            reason = TerminationReason::StepTolerance;
            break;
        }

        let candidate_residuals = residual_fn(&candidate);
        evaluations += 1;
        let candidate_obj = sum_of_squares(&candidate_residuals);

        if candidate_obj.is_finite() && candidate_obj < objective {
            let scale = objective.abs().max(candidate_obj.abs()).max(1.0);
            let rel_improvement = (objective - candidate_obj) / scale;
            x = candidate;
            residuals = candidate_residuals;
            objective = candidate_obj;
            lambda = (lambda * options.lambda_down).max(1e-12);
            stagnation = 0;

            if rel_improvement <= options.objective_tolerance {
                converged = true;
                reason = TerminationReason::ObjectiveTolerance;
                break;
            }
        } else {
            lambda = (lambda * options.lambda_up).min(1e12);
            stagnation += 1;
            if stagnation >= options.max_stagnation {
                reason = TerminationReason::Stagnation;
                break;
            }
        }
    }

    Ok(OptimizationResult {
        x,
        objective,
        iterations,
        evaluations,
        converged,
        reason,
    })
}

/// Sum of squared values.
#[inline]
pub fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|r| r * r).sum()
}

#[inline]
fn norm(values: &[f64]) -> f64 {
    sum_of_squares(values).sqrt()
}

#[inline]
fn finite_or_inf(v: f64) -> f64 {
    if v.is_finite() { v } else { f64::INFINITY }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

fn pick_two_distinct(rng: &mut StdRng, n: usize, exclude: usize) -> (usize, usize) {
    let mut a = rng.gen_range(0..n);
    while a == exclude {
        a = rng.gen_range(0..n);
    }
    let mut b = rng.gen_range(0..n);
    while b == exclude || b == a {
        b = rng.gen_range(0..n);
    }
    (a, b)
}

fn latin_hypercube(bounds: &BoxConstraints, n: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let dim = bounds.dimension();
    let mut population = vec![vec![0.0; dim]; n];
    for d in 0..dim {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(rng);
        let width = bounds.upper[d] - bounds.lower[d];
        for (member, stratum) in population.iter_mut().zip(strata) {
            let u = (stratum as f64 + rng.gen_range(0.0..1.0)) / n as f64;
            member[d] = bounds.lower[d] + u * width;
        }
    }
    population
}

fn population_converged(energies: &[f64], tol: f64, atol: f64) -> bool {
    if energies.iter().any(|e| !e.is_finite()) {
        return false;
    }
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() <= atol + tol * mean.abs()
}

/// Components that may move: not pinned at a bound with the descent
/// direction `-g` pointing out of the box.
fn free_components(x: &[f64], g: &DVector<f64>, bounds: &BoxConstraints) -> Vec<bool> {
    x.iter()
        .enumerate()
        .map(|(i, &xi)| {
            let at_lower = xi <= bounds.lower[i];
            let at_upper = xi >= bounds.upper[i];
            !((at_lower && g[i] > 0.0) || (at_upper && g[i] < 0.0))
        })
        .collect()
}

fn central_difference_jacobian<F>(
    x: &[f64],
    m: usize,
    bounds: &BoxConstraints,
    rel_step: f64,
    residual_fn: &mut F,
    evaluations: &mut usize,
) -> DMatrix<f64>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let n = x.len();
    let mut j = DMatrix::zeros(m, n);

    for c in 0..n {
        let h = rel_step * x[c].abs().max(1.0);
        let hi = (x[c] + h).min(bounds.upper[c]);
        let lo = (x[c] - h).max(bounds.lower[c]);
        let denom = hi - lo;
        if denom <= 0.0 {
            continue;
        }

        let mut xp = x.to_vec();
        xp[c] = hi;
        let rp = residual_fn(&xp);
        let mut xm = x.to_vec();
        xm[c] = lo;
        let rm = residual_fn(&xm);
        *evaluations += 2;

        if rp.len() != m || rm.len() != m {
            continue;
        }
        for r in 0..m {
            j[(r, c)] = (rp[r] - rm[r]) / denom;
        }
    }

    j
}
