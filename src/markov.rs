use crate::model::CodeElement;
use std::collections::BTreeMap;
use tracing::debug;

/// Fixed-order Markov model over dependency successor sequences.
///
/// Successor lists are taken in lexicographic target order; every contiguous
/// window of `order` successors is a state and the following successor is the
/// observed transition target. Adjacency order stands in for a temporal
/// sequence here: this yields a structural-regularity signal, not a genuine
/// stochastic process over time, and is kept as-is deliberately.
#[derive(Debug, Clone)]
pub struct MarkovModel {
    order: usize,
    table: BTreeMap<Vec<String>, BTreeMap<String, f64>>,
    contributing_elements: usize,
}

impl MarkovModel {
    /// Build the transition table from every element's resolved successors.
    /// Built once per run; read-only afterwards.
    pub fn build(elements: &BTreeMap<String, CodeElement>, order: usize) -> Self {
        let mut counts: BTreeMap<Vec<String>, BTreeMap<String, f64>> = BTreeMap::new();
        let mut contributing_elements = 0;

        for element in elements.values() {
            let successors: Vec<&String> = element.dependencies.iter().collect();
            if successors.len() <= order {
                continue;
            }
            contributing_elements += 1;

            for window in successors.windows(order + 1) {
                let state: Vec<String> = window[..order].iter().map(|s| (*s).clone()).collect();
                let target = window[order].clone();
                *counts.entry(state).or_default().entry(target).or_insert(0.0) += 1.0;
            }
        }

        for distribution in counts.values_mut() {
            let total: f64 = distribution.values().sum();
            if total > 0.0 {
                for probability in distribution.values_mut() {
                    *probability /= total;
                }
            }
        }

        debug!(
            states = counts.len(),
            contributing_elements, "built markov transition table"
        );

        Self {
            order,
            table: counts,
            contributing_elements,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    pub fn transitions(&self) -> &BTreeMap<Vec<String>, BTreeMap<String, f64>> {
        &self.table
    }

    /// Number of elements whose successor list produced at least one state.
    pub fn contributing_elements(&self) -> usize {
        self.contributing_elements
    }

    /// Share of elements that contributed transitions.
    pub fn coverage(&self, total_elements: usize) -> f64 {
        if total_elements == 0 {
            0.0
        } else {
            self.contributing_elements as f64 / total_elements as f64
        }
    }

    /// Outgoing distribution of a state. Unseen states yield None: not an
    /// error and never an implicit uniform guess.
    pub fn distribution(&self, state: &[String]) -> Option<&BTreeMap<String, f64>> {
        self.table.get(state)
    }

    /// Distribution of a state, with an explicit uniform fallback over all
    /// observed targets when the state was never seen.
    pub fn distribution_or_uniform(&self, state: &[String]) -> BTreeMap<String, f64> {
        if let Some(distribution) = self.table.get(state) {
            return distribution.clone();
        }

        let targets: std::collections::BTreeSet<&String> =
            self.table.values().flat_map(|d| d.keys()).collect();
        let count = targets.len();
        if count == 0 {
            return BTreeMap::new();
        }
        targets
            .into_iter()
            .map(|t| (t.clone(), 1.0 / count as f64))
            .collect()
    }
}
