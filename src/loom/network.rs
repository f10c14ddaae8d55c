//! Executes a tensor network along a contraction order decided elsewhere.
//!
//! The network is described by an index equation such as `"ab,bc->ac"`: one label string per
//! input tensor, and the labels of the result after `->`. A [`ContractionPath`] lists pairs of
//! operand positions; each step removes both operands and appends their contraction.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::tensor::{Tensor, TensorError};
use crate::runtime::Scheduler;

/// A pairwise contraction order, optionally with labels to slice over.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractionPath {
    pub steps: Vec<(usize, usize)>,
    /// Labels whose extents should be cut to bound memory per step.
    #[serde(default)]
    pub sliced: Vec<char>,
}

#[derive(Debug)]
pub struct Network<S: Scheduler> {
    operands: Vec<(Vec<char>, Tensor<S>)>,
    output: Vec<char>,
}

/// Splits an equation into input label strings and output labels.
///
/// Without `->`, the output holds every label appearing exactly once, sorted.
fn parse(equation: &str) -> Result<(Vec<Vec<char>>, Vec<char>), TensorError> {
    let equation: String = equation.chars().filter(|c| !c.is_whitespace()).collect();
    let (inputs, output) = match equation.split_once("->") {
        Some((inputs, output)) => (inputs, Some(output)),
        None => (equation.as_str(), None),
    };
    let inputs = inputs.split(',').map(|term| term.chars().collect_vec()).collect_vec();
    if let Some(c) = inputs.iter().flatten().find(|c| !c.is_alphabetic()) {
        return Err(TensorError::Equation(format!("invalid label `{c}` in `{equation}`")));
    }

    let output = match output {
        Some(output) => output.chars().collect_vec(),
        None => inputs
            .iter()
            .flatten()
            .counts()
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|(&c, _)| c)
            .sorted()
            .collect(),
    };
    if !output.iter().all_unique() {
        return Err(TensorError::Equation(format!("repeated output label in `{equation}`")));
    }
    if let Some(c) = output.iter().find(|c| !inputs.iter().flatten().contains(c)) {
        return Err(TensorError::Equation(format!("output label `{c}` appears in no input")));
    }
    Ok((inputs, output))
}

fn positions(labels: &[char], shared: &[char]) -> Vec<usize> {
    shared
        .iter()
        .filter_map(|c| labels.iter().position(|x| x == c))
        .collect()
}

impl<S: Scheduler> Network<S> {
    pub fn new(equation: &str, tensors: Vec<Tensor<S>>) -> Result<Self, TensorError> {
        let (inputs, output) = parse(equation)?;
        if inputs.len() != tensors.len() {
            return Err(TensorError::Equation(format!(
                "`{equation}` has {} inputs, got {} tensors",
                inputs.len(),
                tensors.len()
            )));
        }
        for (labels, tensor) in inputs.iter().zip_eq(&tensors) {
            if labels.len() != tensor.rank() {
                return Err(TensorError::Equation(format!(
                    "labels `{}` do not match rank {} of {tensor}",
                    labels.iter().collect::<String>(),
                    tensor.rank()
                )));
            }
            // a label repeated within one operand would be a trace
            if !labels.iter().all_unique() {
                let axes = (0..labels.len())
                    .filter(|&i| labels[..i].contains(&labels[i]))
                    .collect();
                return Err(TensorError::InvalidAxes(axes));
            }
        }
        let operands = inputs.into_iter().zip_eq(tensors).collect();
        Ok(Self { operands, output })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.operands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    #[inline]
    pub fn output(&self) -> &[char] {
        &self.output
    }

    /// Contracts the whole network along `path` and permutes the result into output order.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub fn contract(self, path: &ContractionPath) -> Result<Tensor<S>, TensorError> {
        if !path.sliced.is_empty() {
            return Err(TensorError::NotImplemented("sliced contraction"));
        }

        let Self {
            mut operands,
            output,
        } = self;
        for &(i, j) in &path.steps {
            if i == j || i.max(j) >= operands.len() {
                return Err(TensorError::InvalidAxes(vec![i, j]));
            }
            let second = operands.remove(i.max(j));
            let first = operands.remove(i.min(j));
            let ((labels_a, a), (labels_b, b)) = match i < j {
                true => (first, second),
                false => (second, first),
            };

            let remaining = operands
                .iter()
                .flat_map(|(labels, _)| labels.iter())
                .chain(output.iter())
                .copied()
                .collect_vec();
            let shared = labels_a
                .iter()
                .filter(|&c| labels_b.contains(c) && !remaining.contains(c))
                .copied()
                .collect_vec();
            let axes_a = positions(&labels_a, &shared);
            let axes_b = positions(&labels_b, &shared);

            let tensor = a.tensordot(&b, [&axes_a[..], &axes_b[..]])?;
            let labels = labels_a
                .iter()
                .chain(labels_b.iter())
                .filter(|&c| !shared.contains(c))
                .copied()
                .collect_vec();
            log::debug!(
                "contract {} with {} into {}",
                labels_a.iter().collect::<String>(),
                labels_b.iter().collect::<String>(),
                labels.iter().collect::<String>()
            );
            operands.push((labels, tensor));
        }

        let (Some((labels, mut tensor)), true) = (operands.pop(), operands.is_empty()) else {
            return Err(TensorError::Equation(format!(
                "path leaves {} operands",
                operands.len() + 1
            )));
        };
        if labels.len() != output.len() {
            let labels: String = labels.iter().collect();
            let output: String = output.iter().collect();
            return Err(TensorError::Equation(format!(
                "result `{labels}` cannot be arranged as `{output}`"
            )));
        }
        let axes = output
            .iter()
            .map(|c| labels.iter().position(|x| x == c))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TensorError::InvalidAxes(vec![]))?;
        if axes.iter().enumerate().any(|(i, &axis)| i != axis) {
            tensor.transpose(&axes)?;
        }
        Ok(tensor)
    }
}
