use crate::model::CodeElement;

/// Stress: normalized aggregate of average member complexity and dependency
/// density. Always within [0, 1].
pub fn stress(members: &[&CodeElement]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }

    let mean_complexity =
        members.iter().map(|m| m.complexity).sum::<f64>() / members.len() as f64;
    let dependency_density = members
        .iter()
        .map(|m| m.dependencies.len() as f64)
        .sum::<f64>()
        / members.len() as f64;

    (0.6 * mean_complexity / 100.0 + 0.4 * dependency_density).clamp(0.0, 1.0)
}

/// Strain: population standard deviation of member stability. Exactly 0 for
/// a single-member cluster.
pub fn strain(members: &[&CodeElement]) -> f64 {
    if members.len() < 2 {
        return 0.0;
    }

    let n = members.len() as f64;
    let mean = members.iter().map(|m| m.stability).sum::<f64>() / n;
    let variance = members
        .iter()
        .map(|m| (m.stability - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeElement, ElementKind, SourceFile};
    use approx::assert_relative_eq;

    fn element(complexity: f64, stability: f64, deps: usize) -> CodeElement {
        let file = SourceFile {
            path: "x.py".to_string(),
            content: String::new(),
            kind: ElementKind::Python,
            size: 0,
        };
        let mut element = CodeElement::from_source(&file);
        element.complexity = complexity;
        element.stability = stability;
        for i in 0..deps {
            element.dependencies.insert(format!("dep_{i}.py"));
        }
        element
    }

    #[test]
    fn stress_of_complexity_only_cluster() {
        let members = [element(50.0, 0.5, 0), element(70.0, 0.5, 0)];
        let refs: Vec<&CodeElement> = members.iter().collect();
        // No dependencies: stress is purely the complexity term.
        assert_relative_eq!(stress(&refs), 0.6 * 60.0 / 100.0, epsilon = 1e-12);
    }

    #[test]
    fn stress_is_clamped_to_one() {
        let members = [element(100.0, 0.5, 40)];
        let refs: Vec<&CodeElement> = members.iter().collect();
        assert_eq!(stress(&refs), 1.0);
    }

    #[test]
    fn strain_of_singleton_is_exactly_zero() {
        let members = [element(10.0, 0.9, 0)];
        let refs: Vec<&CodeElement> = members.iter().collect();
        assert_eq!(strain(&refs), 0.0);
    }

    #[test]
    fn strain_is_population_stdev() {
        let members = [element(0.0, 0.2, 0), element(0.0, 0.8, 0)];
        let refs: Vec<&CodeElement> = members.iter().collect();
        // Population stdev of {0.2, 0.8} is 0.3.
        assert_relative_eq!(strain(&refs), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn uniform_stability_has_zero_strain() {
        let members = [element(0.0, 0.5, 0), element(0.0, 0.5, 0), element(0.0, 0.5, 0)];
        let refs: Vec<&CodeElement> = members.iter().collect();
        assert_relative_eq!(strain(&refs), 0.0, epsilon = 1e-12);
    }
}
