//! Variable-order Markov model behind the `learn` generator.
//!
//! The model is trained on one cycle of a sequence, read cyclically, with
//! contexts of up to [`MAX_ORDER`] symbols. Generation uses the longest
//! context seen in training and falls back to shorter ones, so repeated
//! sub-phrases with different continuations produce variations.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;

/// Longest context the model conditions on.
pub const MAX_ORDER: usize = 3;

#[derive(Clone, Debug, Default)]
pub struct Markov {
    /// Context (oldest first) to `(next symbol, count)`.
    continuations: BTreeMap<Vec<usize>, Vec<(usize, u32)>>,
    order: usize,
    /// Tail of the training cycle, used as the starting context.
    seed_context: Vec<usize>,
}

impl Markov {
    /// Train on `symbols`. An empty sequence gives a model that generates
    /// nothing.
    pub fn learn(symbols: &[usize], order: usize) -> Self {
        let n = symbols.len();
        let order = order.min(n);
        let mut continuations: BTreeMap<Vec<usize>, Vec<(usize, u32)>> = BTreeMap::new();
        for (i, &next) in symbols.iter().enumerate() {
            for k in 0..=order {
                let context: Vec<usize> = (0..k).map(|j| symbols[(i + n - k + j) % n]).collect();
                let counts = continuations.entry(context).or_default();
                match counts.iter_mut().find(|(s, _)| *s == next) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((next, 1)),
                }
            }
        }
        Self {
            continuations,
            order,
            seed_context: symbols[n - order..].to_vec(),
        }
    }

    /// Draw `len` symbols.
    pub fn generate(&self, len: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.continuations.is_empty() {
            return Vec::new();
        }
        let mut history = self.seed_context.clone();
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let Some(next) = self.draw(&history, rng) else {
                break;
            };
            out.push(next);
            history.push(next);
            if history.len() > self.order {
                history.remove(0);
            }
        }
        out
    }

    fn draw(&self, history: &[usize], rng: &mut StdRng) -> Option<usize> {
        let counts = (0..=history.len())
            .rev()
            .find_map(|k| self.continuations.get(&history[history.len() - k..]))?;
        let total: u32 = counts.iter().map(|(_, c)| c).sum();
        let mut pick = rng.gen_range(0..total);
        for &(symbol, count) in counts {
            if pick < count {
                return Some(symbol);
            }
            pick -= count;
        }
        None
    }
}
