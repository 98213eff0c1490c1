use crate::model::{CodeElement, FiniteElement};
use statrs::distribution::{Binomial, Discrete};
use std::collections::BTreeMap;
use tracing::warn;

/// Statistical validation of cluster quality.
///
/// A cluster of size n with k members above the stability threshold is
/// tested against a low base-rate null: under H0 each member is "good" with
/// probability p0. A small p-value means the cluster's share of stable
/// members is improbably high (or low) under that null.
pub struct BinomialValidator {
    p0: f64,
    stability_threshold: f64,
}

impl BinomialValidator {
    pub fn new(p0: f64, stability_threshold: f64) -> Self {
        Self {
            p0,
            stability_threshold,
        }
    }

    /// Attach the p-value and good-element ratio to a finalized cluster.
    /// This is the only mutation a cluster sees after creation.
    pub fn validate(
        &self,
        cluster: &mut FiniteElement,
        elements: &BTreeMap<String, CodeElement>,
    ) {
        let n = cluster.members.len() as u64;
        let k = cluster
            .members
            .iter()
            .filter_map(|id| elements.get(id))
            .filter(|e| e.stability > self.stability_threshold)
            .count() as u64;

        let p_value = two_sided_p_value(k, n, self.p0);
        cluster.boundary_conditions.binomial_test = p_value;
        cluster.boundary_conditions.good_elements_ratio =
            if n > 0 { k as f64 / n as f64 } else { 0.0 };
        cluster.boundary_conditions.passes = p_value < 0.05;
    }
}

/// Exact two-sided binomial test: the total probability of outcomes no more
/// likely than the observed one. n = 0 is defined to return 1.0, never an
/// error.
pub fn two_sided_p_value(k: u64, n: u64, p0: f64) -> f64 {
    if n == 0 {
        return 1.0;
    }

    let distribution = match Binomial::new(p0, n) {
        Ok(distribution) => distribution,
        Err(e) => {
            warn!(p0, n, error = %e, "invalid binomial parameters, reporting no signal");
            return 1.0;
        }
    };

    let observed = distribution.pmf(k.min(n));
    let relative_error = 1.0 + 1e-7;

    let mut p_value = 0.0;
    for i in 0..=n {
        let mass = distribution.pmf(i);
        if mass <= observed * relative_error {
            p_value += mass;
        }
    }

    p_value.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundaryConditions, ElementKind, SourceFile};

    #[test]
    fn empty_cluster_has_no_signal() {
        assert_eq!(two_sided_p_value(0, 0, 0.05), 1.0);
    }

    #[test]
    fn p_value_stays_within_unit_interval() {
        for n in 1..=30u64 {
            for k in 0..=n {
                let p = two_sided_p_value(k, n, 0.05);
                assert!((0.0..=1.0).contains(&p), "p={p} for k={k} n={n}");
            }
        }
    }

    #[test]
    fn expected_count_under_null_is_not_significant() {
        // k = 0 of 5 at p0 = 0.05 is the most likely outcome.
        let p = two_sided_p_value(0, 5, 0.05);
        assert!(p > 0.05);
    }

    #[test]
    fn four_of_five_good_members_is_significant() {
        let p = two_sided_p_value(4, 5, 0.05);
        assert!(p < 0.05, "p={p}");
    }

    #[test]
    fn validate_attaches_boundary_conditions() {
        let mut elements = BTreeMap::new();
        let stabilities = [0.9, 0.9, 0.9, 0.9, 0.2];
        let mut members = Vec::new();
        for (i, stability) in stabilities.iter().enumerate() {
            let path = format!("m{i}.py");
            let file = SourceFile {
                path: path.clone(),
                content: String::new(),
                kind: ElementKind::Python,
                size: 0,
            };
            let mut element = CodeElement::from_source(&file);
            element.stability = *stability;
            elements.insert(path.clone(), element);
            members.push(path);
        }

        let mut cluster = FiniteElement {
            id: 0,
            center: [0.0; 3],
            radius: 0.0,
            members,
            stress: 0.0,
            strain: 0.0,
            boundary_conditions: BoundaryConditions::default(),
        };

        BinomialValidator::new(0.05, 0.7).validate(&mut cluster, &elements);
        let boundary = &cluster.boundary_conditions;
        assert!((boundary.good_elements_ratio - 0.8).abs() < 1e-12);
        assert!(boundary.binomial_test < 0.05);
        assert!(boundary.passes);
    }
}
