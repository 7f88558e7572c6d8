//! Genetic-programming equation search
//!
//! Expressions over {+, -, *, /, square, neg}, the descriptor columns and
//! numeric constants evolve under tournament selection. A hall of fame keeps
//! the lowest-loss expression seen at every complexity; the reported
//! equations are the Pareto front of that hall.

use super::expr::{BinaryOp, Expr, UnaryOp};
use super::{fit_quality, Equation, FitBudget, FitEngine, FitProblem, FitReport};
use crate::config::SymbolicSettings;
use crate::errors::ScreenResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use tracing::{debug, info};

pub const METHOD: &str = "symbolic_search (genetic programming)";

const TOURNAMENT_SIZE: usize = 5;
const CROSSOVER_RATE: f64 = 0.5;
const SUBTREE_MUTATION_RATE: f64 = 0.3;
const LEAF_PROBABILITY: f64 = 0.25;
const UNARY_PROBABILITY: f64 = 0.2;
const CONSTANT_RANGE: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct SymbolicSearchEngine {
    population_size: usize,
    seed: u64,
}

impl SymbolicSearchEngine {
    pub fn new(population_size: usize, seed: u64) -> Self {
        Self {
            population_size: population_size.max(2),
            seed,
        }
    }

    pub fn from_settings(settings: &SymbolicSettings) -> Self {
        Self::new(settings.population_size, settings.seed)
    }
}

#[derive(Debug, Clone)]
struct Individual {
    expr: Expr,
    loss: f64,
    complexity: usize,
}

impl Individual {
    /// Lower loss wins, then smaller trees
    fn fitter_than(&self, other: &Individual) -> bool {
        match self.loss.total_cmp(&other.loss) {
            Ordering::Less => true,
            Ordering::Equal => self.complexity < other.complexity,
            Ordering::Greater => false,
        }
    }
}

/// Mean squared error; infinite when any prediction is undefined
fn loss_of(expr: &Expr, problem: &FitProblem<'_>) -> f64 {
    let mut total = 0.0;
    for (row, target) in problem.x.iter().zip(problem.y) {
        let predicted = expr.eval(row);
        if !predicted.is_finite() {
            return f64::INFINITY;
        }
        total += (predicted - target).powi(2);
    }
    let mse = total / problem.len() as f64;
    if mse.is_finite() {
        mse
    } else {
        f64::INFINITY
    }
}

struct Search<'p, 'd> {
    problem: &'p FitProblem<'d>,
    n_vars: usize,
    max_complexity: usize,
    rng: StdRng,
    /// Indexed by complexity
    hall_of_fame: Vec<Option<Individual>>,
}

impl<'p, 'd> Search<'p, 'd> {
    fn new(problem: &'p FitProblem<'d>, max_complexity: usize, seed: u64) -> Self {
        Self {
            problem,
            n_vars: problem.feature_names.len(),
            max_complexity,
            rng: StdRng::seed_from_u64(seed),
            hall_of_fame: vec![None; max_complexity + 1],
        }
    }

    fn evaluate(&mut self, expr: Expr) -> Individual {
        let complexity = expr.complexity();
        let loss = loss_of(&expr, self.problem);
        let individual = Individual {
            expr,
            loss,
            complexity,
        };
        if loss.is_finite() && complexity <= self.max_complexity {
            let slot = &mut self.hall_of_fame[complexity];
            if slot.as_ref().map_or(true, |held| loss < held.loss) {
                *slot = Some(individual.clone());
            }
        }
        individual
    }

    /// The target mean and every bare variable, then random trees
    fn seed_population(&mut self, size: usize) -> Vec<Individual> {
        let y_mean = self.problem.y.iter().sum::<f64>() / self.problem.len() as f64;
        let mut population = Vec::with_capacity(size);
        population.push(self.evaluate(Expr::Const(y_mean)));
        for j in 0..self.n_vars {
            population.push(self.evaluate(Expr::Var(j)));
        }
        while population.len() < size {
            let budget = self.rng.random_range(1..=self.max_complexity);
            let tree = self.random_tree(budget);
            population.push(self.evaluate(tree));
        }
        population
    }

    fn random_leaf(&mut self) -> Expr {
        if self.n_vars > 0 && self.rng.random_bool(0.6) {
            Expr::Var(self.rng.random_range(0..self.n_vars))
        } else {
            Expr::Const(self.rng.random_range(-CONSTANT_RANGE..CONSTANT_RANGE))
        }
    }

    /// Random tree with at most `budget` nodes
    fn random_tree(&mut self, budget: usize) -> Expr {
        if budget < 2 || self.rng.random_bool(LEAF_PROBABILITY) {
            return self.random_leaf();
        }
        if budget < 3 || self.rng.random_bool(UNARY_PROBABILITY) {
            let op = UnaryOp::ALL[self.rng.random_range(0..UnaryOp::ALL.len())];
            let child = self.random_tree(budget - 1);
            return Expr::unary(op, child);
        }
        let op = BinaryOp::ALL[self.rng.random_range(0..BinaryOp::ALL.len())];
        let left_budget = self.rng.random_range(1..budget - 1);
        let left = self.random_tree(left_budget);
        let right = self.random_tree(budget - 1 - left_budget);
        Expr::binary(op, left, right)
    }

    fn tournament<'a>(&mut self, population: &'a [Individual]) -> &'a Individual {
        let mut best = &population[self.rng.random_range(0..population.len())];
        for _ in 1..TOURNAMENT_SIZE {
            let contender = &population[self.rng.random_range(0..population.len())];
            if contender.fitter_than(best) {
                best = contender;
            }
        }
        best
    }

    /// Graft a random subtree of `donor` into `base`; oversized children are dropped
    fn crossover(&mut self, base: Expr, donor: &Expr) -> Expr {
        let at = self.rng.random_range(0..base.complexity());
        let from = self.rng.random_range(0..donor.complexity());
        let Some(graft) = donor.get(from).cloned() else {
            return base;
        };
        let mut child = base.clone();
        child.replace(at, graft);
        if child.complexity() <= self.max_complexity {
            child
        } else {
            base
        }
    }

    fn mutate_subtree(&mut self, mut expr: Expr) -> Expr {
        let size = expr.complexity();
        let at = self.rng.random_range(0..size);
        let removed = expr.get(at).map_or(1, Expr::complexity);
        let room = self.max_complexity.saturating_sub(size - removed).max(1);
        let budget = self.rng.random_range(1..=room);
        let replacement = self.random_tree(budget);
        expr.replace(at, replacement);
        expr
    }

    fn mutate_constant(&mut self, mut expr: Expr) -> Expr {
        let n_constants = expr.constants_mut().len();
        if n_constants == 0 {
            return self.mutate_subtree(expr);
        }
        let index = self.rng.random_range(0..n_constants);
        let step: f64 = self.rng.random_range(-0.5..0.5);
        let multiplicative = self.rng.random_bool(0.5);
        if let Some(c) = expr.constants_mut().into_iter().nth(index) {
            if multiplicative {
                *c *= 1.0 + step;
            } else {
                *c += step;
            }
        }
        expr
    }

    fn next_generation(&mut self, population: &[Individual], size: usize) -> Vec<Individual> {
        let mut next: Vec<Individual> = self
            .hall_of_fame
            .iter()
            .flatten()
            .take(size / 2)
            .cloned()
            .collect();

        while next.len() < size {
            let parent = self.tournament(population).expr.clone();
            let roll: f64 = self.rng.random();
            let child = if roll < CROSSOVER_RATE {
                let donor = self.tournament(population).expr.clone();
                self.crossover(parent, &donor)
            } else if roll < CROSSOVER_RATE + SUBTREE_MUTATION_RATE {
                self.mutate_subtree(parent)
            } else {
                self.mutate_constant(parent)
            };
            next.push(self.evaluate(child.simplify()));
        }
        next
    }

    /// Hall-of-fame entries that beat every simpler entry, by complexity
    fn pareto_front(&self) -> Vec<&Individual> {
        let mut front = Vec::new();
        let mut best_loss = f64::INFINITY;
        for individual in self.hall_of_fame.iter().flatten() {
            if individual.loss < best_loss {
                best_loss = individual.loss;
                front.push(individual);
            }
        }
        front
    }
}

/// Negative log-loss improvement per added node
fn pareto_score(loss: f64, complexity: usize, previous: Option<(f64, usize)>) -> f64 {
    match previous {
        Some((prev_loss, prev_complexity)) if complexity > prev_complexity => {
            let ln = |l: f64| l.max(f64::MIN_POSITIVE).ln();
            -(ln(loss) - ln(prev_loss)) / (complexity - prev_complexity) as f64
        }
        _ => 0.0,
    }
}

impl FitEngine for SymbolicSearchEngine {
    fn method(&self) -> &'static str {
        METHOD
    }

    fn fit(&self, problem: &FitProblem<'_>, budget: FitBudget) -> ScreenResult<FitReport> {
        problem.validate()?;

        let max_complexity = budget.max_complexity.max(1);
        let mut search = Search::new(problem, max_complexity, self.seed);
        let mut population = search.seed_population(self.population_size);
        for generation in 0..budget.iterations {
            population = search.next_generation(&population, self.population_size);
            debug!(
                "Generation {}: {} complexities in hall of fame",
                generation,
                search.hall_of_fame.iter().flatten().count()
            );
        }

        let mut equations = Vec::new();
        let mut previous = None;
        for individual in search.pareto_front() {
            let predicted: Vec<f64> = problem.x.iter().map(|row| individual.expr.eval(row)).collect();
            let (_, r_squared) = fit_quality(&predicted, problem.y);
            equations.push(Equation {
                equation: format!(
                    "{} = {}",
                    problem.target_name,
                    individual.expr.render(problem.feature_names)
                ),
                complexity: individual.complexity,
                loss: individual.loss,
                r_squared: Some(r_squared),
                score: Some(pareto_score(individual.loss, individual.complexity, previous)),
                feature: None,
            });
            previous = Some((individual.loss, individual.complexity));
        }

        // front losses strictly decrease, so the last entry is the best
        let best_equation = equations
            .last()
            .map(|e| e.equation.clone())
            .unwrap_or_else(|| "No fit found".to_string());
        info!(
            "Equation search kept {} Pareto-optimal equations; best: {}",
            equations.len(),
            best_equation
        );

        Ok(FitReport {
            method: METHOD.to_string(),
            equations,
            best_equation,
            feature_names: problem.feature_names.to_vec(),
            n_datapoints: problem.len(),
            note: None,
        })
    }
}
