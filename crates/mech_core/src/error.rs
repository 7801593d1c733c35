//! Error types for parsing, compiling, building and solving models.

use thiserror::Error;

/// Errors raised while parsing an expression string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unexpected token `{found}` at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("Unknown character `{found}` at position {position}")]
    UnknownCharacter { found: char, position: usize },

    #[error("Unknown function `{name}` at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("Invalid number `{text}` at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("Expected ')' at position {position}")]
    ExpectedClosingParen { position: usize },
}

/// Errors raised while lowering an expression to bytecode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Unknown variable or parameter: {0}")]
    UnknownSymbol(String),

    #[error("Derivative of order {order} of `{name}` cannot be evaluated from the state")]
    UnsupportedDerivative { name: String, order: u32 },
}

/// Errors raised by numeric evaluation of a symbolic expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Symbol `{0}` has no value")]
    UnboundSymbol(String),

    #[error("Function `{0}(t)` cannot be evaluated without a trajectory")]
    TimeFunction(String),
}

/// Errors raised by the symbolic solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("Equation for `{function}` is not linear: {reason}")]
    NotLinear { function: String, reason: String },

    #[error("Equation for `{function}` has a time-dependent coefficient `{coefficient}`")]
    TimeDependentCoefficient { function: String, coefficient: String },

    #[error("Equation for `{function}` does not contain its second derivative")]
    Degenerate { function: String },

    #[error(
        "Forcing term `{term}` of the equation for `{function}` is not a polynomial in t \
         (powers of sums are expanded up to {max})",
        max = crate::symbolic::calculus::MAX_POLYNOMIAL_DEGREE
    )]
    UnsupportedForcing { function: String, term: String },

    #[error(
        "Cannot decide the sign of `{expr}` in the equation for `{function}`; \
         declare the involved symbols positive"
    )]
    UndecidableSign { function: String, expr: String },

    #[error("Initial conditions of `{label}` should have {expected} entries. Got {got} instead.")]
    InitialConditionsLength {
        label: String,
        expected: usize,
        got: usize,
    },
}

/// Errors raised while validating and analyzing a mechanics model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Elements should have unique labels. Got `{0}` more than once.")]
    DuplicateElement(String),

    #[error("Element label 1 should be one of the available elements labels. Got {0} instead.")]
    UnknownElement1(String),

    #[error("Element label 2 should be one of the available elements labels. Got {0} instead.")]
    UnknownElement2(String),

    #[error("Element label should be one of the available elements labels. Got {0} instead.")]
    UnknownElement(String),

    #[error("Element labels 1 and 2 should be different. Got {0} and {1} instead.")]
    SameElements(String, String),

    #[error(
        "Interactions between elements should have unique labels of the form \
         (label, element_1_label, element_2_label). Got ({0}, {1}, {2}) more than once."
    )]
    DuplicateElementsInteraction(String, String, String),

    #[error(
        "Interactions of elements with environment should have unique labels of the form \
         (label, element_label). Got ({0}, {1}) more than once."
    )]
    DuplicateEnvironmentInteraction(String, String),

    #[error("Parameter `space` is required to analyze the system.")]
    MissingSpace,

    #[error("Parameter `m` of particle `{label}` should be a positive finite number. Got {value} instead.")]
    InvalidMass { label: String, value: f64 },

    #[error("Parameter `n_dim` should be between 1 and 3. Got {0} instead.")]
    InvalidDimension(usize),

    #[error("Parameter `coordinate_system` should be equal to {allowed} for {n_dim} dimension(s). Got `{system}` instead.")]
    InvalidCoordinateSystem {
        n_dim: usize,
        system: String,
        allowed: String,
    },

    #[error("Force `{label}` should have {expected} components. Got {got} instead.")]
    ForceDimension {
        label: String,
        expected: usize,
        got: usize,
    },

    #[error("Force vector {0} is a list but does not have three elements.")]
    ForceVectorLength(String),

    #[error("Wrong variable name `{0}` was found.")]
    WrongVariableName(String),

    #[error("Call the method `analyze` before the `solve`.")]
    NotAnalyzed,

    #[error("No equations were derived for particle `{0}`.")]
    UnknownParticle(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offending_values() {
        let err = ModelError::UnknownElement1("ghost".to_string());
        assert!(err.to_string().contains("Got ghost instead"));

        let err = ModelError::ForceVectorLength("[0, 1]".to_string());
        assert_eq!(
            err.to_string(),
            "Force vector [0, 1] is a list but does not have three elements."
        );

        let err = ParseError::UnknownCharacter {
            found: '$',
            position: 3,
        };
        assert_eq!(err.to_string(), "Unknown character `$` at position 3");
    }

    #[test]
    fn solve_errors_convert_into_model_errors() {
        let err: ModelError = SolveError::Degenerate {
            function: "x__body".to_string(),
        }
        .into();
        assert!(err.to_string().contains("x__body"));
    }
}
