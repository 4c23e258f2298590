//! Fixed-point expression optimizer.
//!
//! Each pass is a local rewrite applied bottom-up over the whole tree. The
//! loop tries the passes in order; the first one that changes the tree
//! restarts the loop from the first pass. One full round without a change
//! ends it.
//!
//! A pass reports "no change" by returning `None`, so unchanged subtrees are
//! never rebuilt. A structural-equality check backs that up for passes that
//! rebuild a node identical to its input.

pub mod passes;

use tagsieve_core::config::SearchConfig;
use tagsieve_core::expr::Expression;

pub trait RewriteRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite one node whose children have already been visited.
    fn rewrite(&self, expr: &Expression) -> Option<Expression>;
}

/// Apply `rule` to every node, children first.
pub fn transform_up(expr: &Expression, rule: &dyn RewriteRule) -> Option<Expression> {
    let rebuilt = match expr {
        Expression::Conjunction(xs) => transform_children(xs, rule).map(Expression::Conjunction),
        Expression::Disjunction(xs) => transform_children(xs, rule).map(Expression::Disjunction),
        Expression::Negation(inner) => transform_up(inner, rule).map(Expression::not),
        _ => None,
    };
    match rebuilt {
        Some(node) => Some(rule.rewrite(&node).unwrap_or(node)),
        None => rule.rewrite(expr),
    }
}

fn transform_children(xs: &[Expression], rule: &dyn RewriteRule) -> Option<Vec<Expression>> {
    let mut out: Option<Vec<Expression>> = None;
    for (i, x) in xs.iter().enumerate() {
        match (transform_up(x, rule), out.as_mut()) {
            (Some(new), Some(v)) => v.push(new),
            (Some(new), None) => {
                let mut v = xs[..i].to_vec();
                v.push(new);
                out = Some(v);
            }
            (None, Some(v)) => v.push(x.clone()),
            (None, None) => {}
        }
    }
    out
}

pub struct Optimizer {
    passes: Vec<Box<dyn RewriteRule>>,
    max_iterations: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(passes::default_passes())
    }
}

impl Optimizer {
    pub fn new(passes: Vec<Box<dyn RewriteRule>>) -> Self {
        Self {
            passes,
            max_iterations: 10_000,
        }
    }

    /// Default passes, capped at `config.max_optimizer_iterations`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::default().with_max_iterations(config.max_optimizer_iterations)
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn optimize(&self, expr: Expression) -> Expression {
        let mut current = expr;
        let mut rewrites = 0usize;

        'restart: loop {
            for pass in &self.passes {
                let Some(next) = transform_up(&current, pass.as_ref()) else {
                    continue;
                };
                if next == current {
                    continue;
                }
                rewrites += 1;
                tracing::trace!(pass = pass.name(), before = current.size(), after = next.size(), "rewrote");
                current = next;
                if rewrites >= self.max_iterations {
                    tracing::warn!(rewrites, "optimizer hit its iteration cap; returning current tree");
                    break 'restart;
                }
                continue 'restart;
            }
            break;
        }

        tracing::debug!(rewrites, size = current.size(), "optimized expression");
        current
    }
}

/// Optimize with the default passes.
pub fn optimize(expr: Expression) -> Expression {
    Optimizer::default().optimize(expr)
}
