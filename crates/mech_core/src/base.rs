//! Component model shared by all systems.
//!
//! A system is made of elements (particles), interactions between two
//! elements, interactions of one element with its environment, and a space.
//! This module holds the label bookkeeping and validation rules; physics lives
//! in [`crate::mechanics`].

use crate::error::ModelError;
use std::collections::HashSet;
use std::fmt;

/// Separator between a parameter name and the labels it belongs to.
pub const LABEL_SEPARATOR: &str = "__";

pub trait Component {
    fn label(&self) -> &str;
}

pub trait ElementsInteraction: Component {
    fn element_1_label(&self) -> &str;
    fn element_2_label(&self) -> &str;
}

pub trait EnvironmentInteraction: Component {
    fn element_label(&self) -> &str;
}

/// Symbol name of an unset component parameter: `{param}__{label}__{...}`.
pub fn parameter_symbol(param: &str, labels: &[&str]) -> String {
    let mut name = param.to_string();
    for label in labels {
        name.push_str(LABEL_SEPARATOR);
        name.push_str(label);
    }
    name
}

pub fn check_elements<E: Component>(elements: &[E]) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    for element in elements {
        if !seen.insert(element.label()) {
            return Err(ModelError::DuplicateElement(element.label().to_string()));
        }
    }
    Ok(())
}

pub fn check_elements_interactions<E, I>(elements: &[E], interactions: &[I]) -> Result<(), ModelError>
where
    E: Component,
    I: ElementsInteraction,
{
    let labels: HashSet<&str> = elements.iter().map(Component::label).collect();
    let mut seen = HashSet::new();
    for interaction in interactions {
        let (first, second) = (interaction.element_1_label(), interaction.element_2_label());
        if !labels.contains(first) {
            return Err(ModelError::UnknownElement1(first.to_string()));
        }
        if !labels.contains(second) {
            return Err(ModelError::UnknownElement2(second.to_string()));
        }
        if first == second {
            return Err(ModelError::SameElements(first.to_string(), second.to_string()));
        }
        if !seen.insert((interaction.label(), first, second)) {
            return Err(ModelError::DuplicateElementsInteraction(
                interaction.label().to_string(),
                first.to_string(),
                second.to_string(),
            ));
        }
    }
    Ok(())
}

pub fn check_environment_interactions<E, I>(elements: &[E], interactions: &[I]) -> Result<(), ModelError>
where
    E: Component,
    I: EnvironmentInteraction,
{
    let labels: HashSet<&str> = elements.iter().map(Component::label).collect();
    let mut seen = HashSet::new();
    for interaction in interactions {
        let element = interaction.element_label();
        if !labels.contains(element) {
            return Err(ModelError::UnknownElement(element.to_string()));
        }
        if !seen.insert((interaction.label(), element)) {
            return Err(ModelError::DuplicateEnvironmentInteraction(
                interaction.label().to_string(),
                element.to_string(),
            ));
        }
    }
    Ok(())
}

pub fn check_space<S>(space: Option<&S>) -> Result<&S, ModelError> {
    space.ok_or(ModelError::MissingSpace)
}

/// An interaction an element takes part in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction<'a, I, X> {
    Elements(&'a I),
    Environment(&'a X),
}

/// Interactions acting on `label`: elements interactions where it is the
/// first element, then its environment interactions.
pub fn interactions_of<'a, I, X>(
    label: &str,
    elements_interactions: &'a [I],
    environment_interactions: &'a [X],
) -> Vec<Interaction<'a, I, X>>
where
    I: ElementsInteraction,
    X: EnvironmentInteraction,
{
    let internal = elements_interactions
        .iter()
        .filter(|interaction| interaction.element_1_label() == label)
        .map(Interaction::Elements);
    let external = environment_interactions
        .iter()
        .filter(|interaction| interaction.element_label() == label)
        .map(Interaction::Environment);
    internal.chain(external).collect()
}

/// One-line description of a system's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSummary<'a> {
    pub name: &'a str,
    pub elements: usize,
    pub elements_interactions: usize,
    pub environment_interactions: usize,
}

impl fmt::Display for SystemSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} with {} element(s), {} elements interactions and {} environment interactions.",
            self.name, self.elements, self.elements_interactions, self.environment_interactions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Element(&'static str);

    impl Component for Element {
        fn label(&self) -> &str {
            self.0
        }
    }

    struct Link(&'static str, &'static str, &'static str);

    impl Component for Link {
        fn label(&self) -> &str {
            self.0
        }
    }

    impl ElementsInteraction for Link {
        fn element_1_label(&self) -> &str {
            self.1
        }

        fn element_2_label(&self) -> &str {
            self.2
        }
    }

    struct Field(&'static str, &'static str);

    impl Component for Field {
        fn label(&self) -> &str {
            self.0
        }
    }

    impl EnvironmentInteraction for Field {
        fn element_label(&self) -> &str {
            self.1
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T, ModelError>, needle: &str) {
        match result {
            Ok(value) => panic!("expected error, got {value:?}"),
            Err(err) => {
                let message = err.to_string();
                assert!(
                    message.contains(needle),
                    "expected error to contain \"{needle}\", got \"{message}\""
                );
            }
        }
    }

    #[test]
    fn parameter_symbol_joins_labels() {
        assert_eq!(parameter_symbol("m", &["body"]), "m__body");
        assert_eq!(parameter_symbol("Fx", &["spring", "a", "b"]), "Fx__spring__a__b");
    }

    #[test]
    fn duplicate_elements_are_rejected() {
        let elements = [Element("a"), Element("b"), Element("a")];
        assert_err_contains(check_elements(&elements), "Got `a` more than once");
        assert!(check_elements(&elements[..2]).is_ok());
    }

    #[test]
    fn elements_interactions_must_reference_distinct_known_elements() {
        let elements = [Element("a"), Element("b")];
        assert_err_contains(
            check_elements_interactions(&elements, &[Link("s", "c", "b")]),
            "Element label 1 should be one of the available elements labels. Got c instead.",
        );
        assert_err_contains(
            check_elements_interactions(&elements, &[Link("s", "a", "c")]),
            "Element label 2",
        );
        assert_err_contains(
            check_elements_interactions(&elements, &[Link("s", "a", "a")]),
            "Got a and a instead",
        );
        assert_err_contains(
            check_elements_interactions(&elements, &[Link("s", "a", "b"), Link("s", "a", "b")]),
            "Got (s, a, b) more than once",
        );
        assert!(check_elements_interactions(&elements, &[Link("s", "a", "b"), Link("s", "b", "a")]).is_ok());
    }

    #[test]
    fn environment_interactions_must_reference_known_elements() {
        let elements = [Element("a")];
        assert_err_contains(
            check_environment_interactions(&elements, &[Field("g", "b")]),
            "Got b instead",
        );
        assert_err_contains(
            check_environment_interactions(&elements, &[Field("g", "a"), Field("g", "a")]),
            "Got (g, a) more than once",
        );
        assert!(check_environment_interactions(&elements, &[Field("g", "a"), Field("drag", "a")]).is_ok());
    }

    #[test]
    fn missing_space_is_an_error() {
        assert_err_contains(check_space::<()>(None), "`space` is required");
        assert!(check_space(Some(&())).is_ok());
    }

    #[test]
    fn interactions_of_lists_internal_then_external() {
        let links = [Link("s1", "a", "b"), Link("s2", "b", "a"), Link("s3", "a", "c")];
        let fields = [Field("g", "b"), Field("g", "a")];
        let interactions = interactions_of("a", &links, &fields);
        let labels: Vec<&str> = interactions
            .iter()
            .map(|interaction| match interaction {
                Interaction::Elements(link) => link.label(),
                Interaction::Environment(field) => field.label(),
            })
            .collect();
        assert_eq!(labels, ["s1", "s3", "g"]);
    }

    #[test]
    fn summary_reports_counts() {
        let summary = SystemSummary {
            name: "ClassicalMechanicsSystem",
            elements: 2,
            elements_interactions: 1,
            environment_interactions: 0,
        };
        assert_eq!(
            summary.to_string(),
            "ClassicalMechanicsSystem with 2 element(s), 1 elements interactions and 0 environment interactions."
        );
    }
}
