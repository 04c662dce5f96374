//! Operators, request phases and operation results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wordcalc_embeddings::{Embedding, RankedResult, similarity};

use crate::error::AnalogyError;

/// Arithmetic applied to the two word vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
}

impl Operation {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
        }
    }

    /// Combine `a` and `b`. Subtraction is `a - b`.
    pub fn apply(self, a: &[f32], b: &[f32]) -> wordcalc_embeddings::Result<Embedding> {
        match self {
            Self::Add => similarity::add(a, b),
            Self::Subtract => similarity::subtract(a, b),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operation {
    type Err = AnalogyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "+" | "add" | "plus" => Ok(Self::Add),
            "-" | "subtract" | "minus" => Ok(Self::Subtract),
            other => Err(AnalogyError::InvalidInput(format!(
                "unknown operation {other:?}, expected \"+\" or \"-\""
            ))),
        }
    }
}

/// Steps of a single request. The sequence is strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Start,
    ResolvingWord1,
    ResolvingWord2,
    Combining,
    Ranking,
    Done,
}

impl RequestPhase {
    /// The step after this one; `Done` stays `Done`.
    pub fn next(self) -> Self {
        match self {
            Self::Start => Self::ResolvingWord1,
            Self::ResolvingWord1 => Self::ResolvingWord2,
            Self::ResolvingWord2 => Self::Combining,
            Self::Combining => Self::Ranking,
            Self::Ranking | Self::Done => Self::Done,
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::ResolvingWord1 => "resolving word 1",
            Self::ResolvingWord2 => "resolving word 2",
            Self::Combining => "combining",
            Self::Ranking => "ranking",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Response to a successful operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Best matches, most similar first.
    pub results: Vec<RankedResult>,

    /// Leading components of the combined vector.
    pub combined_vector_preview: Option<Vec<f32>>,

    /// True when a word was resolved by the synthetic fallback, meaning the
    /// ranking carries no semantic signal for that word.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_operation() {
        assert_eq!("+".parse::<Operation>().unwrap(), Operation::Add);
        assert_eq!(" - ".parse::<Operation>().unwrap(), Operation::Subtract);
        assert_eq!("Subtract".parse::<Operation>().unwrap(), Operation::Subtract);
        assert!(matches!(
            "*".parse::<Operation>(),
            Err(AnalogyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_subtract_is_ordered() {
        let a = [3.0, 1.0];
        let b = [1.0, 1.0];
        assert_eq!(Operation::Subtract.apply(&a, &b).unwrap(), vec![2.0, 0.0]);
        assert_eq!(Operation::Subtract.apply(&b, &a).unwrap(), vec![-2.0, 0.0]);
        assert_eq!(
            Operation::Add.apply(&a, &b).unwrap(),
            Operation::Add.apply(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_phases_are_linear() {
        let mut phase = RequestPhase::Start;
        let mut seen = vec![phase];
        while phase != RequestPhase::Done {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                RequestPhase::Start,
                RequestPhase::ResolvingWord1,
                RequestPhase::ResolvingWord2,
                RequestPhase::Combining,
                RequestPhase::Ranking,
                RequestPhase::Done,
            ]
        );
        assert_eq!(RequestPhase::Done.next(), RequestPhase::Done);
    }

    #[test]
    fn test_operation_wire_form() {
        assert_eq!(serde_json::to_string(&Operation::Subtract).unwrap(), "\"-\"");
    }
}
