// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use ahs_ir::Result;

use crate::builder::Builder;
use crate::node::{BuilderNode, Step, StepKind};

/// Forward cursor over a builder chain, oldest node first.
pub(crate) struct BuilderStream<'a> {
    nodes: &'a [BuilderNode],
    order: Vec<usize>,
    cursor: usize,
}

impl<'a> BuilderStream<'a> {
    pub(crate) fn new(builder: &'a Builder) -> Result<Self> {
        Ok(BuilderStream {
            nodes: builder.nodes(),
            order: builder.chain()?,
            cursor: 0,
        })
    }

    pub(crate) fn step(&self, index: usize) -> &'a Step {
        &self.nodes[index].step
    }

    pub(crate) fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    fn peek(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }

    /// Skip forward to the next node whose kind is in `kinds` and consume it.
    pub(crate) fn read_next(&mut self, kinds: &[StepKind]) -> Option<usize> {
        while let Some(index) = self.peek() {
            self.cursor += 1;
            if kinds.contains(&self.step(index).kind()) {
                return Some(index);
            }
        }
        None
    }

    /// Consume the run of nodes whose kind is in `kinds` or `skips`.
    ///
    /// Returns the consumed nodes matching `kinds`.
    pub(crate) fn eat(&mut self, kinds: &[StepKind], skips: &[StepKind]) -> Vec<usize> {
        let mut out = Vec::new();
        while let Some(index) = self.peek() {
            let kind = self.step(index).kind();
            if kinds.contains(&kind) {
                out.push(index);
            } else if !skips.contains(&kind) {
                break;
            }
            self.cursor += 1;
        }
        out
    }

    /// Every node of the chain, oldest first.
    pub(crate) fn all(&self) -> impl Iterator<Item = (usize, &'a Step)> + '_ {
        self.order.iter().map(|&index| (index, self.step(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::{AtomArrangement, BravaisLattice};

    #[test]
    fn test_read_next_and_eat() {
        let builder = Builder::start(AtomArrangement::from(BravaisLattice::chain(2, 1, false).unwrap()))
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(|b| b.location([0]))
            .and_then(|b| b.scale(2))
            .and_then(|b| b.location([1]))
            .and_then(|b| b.constant(1, 1))
            .unwrap();
        let mut stream = BuilderStream::new(&builder).unwrap();
        let head = stream.read_next(&[StepKind::Location]).unwrap();
        assert_eq!(head, 3);
        let run = stream.eat(&[StepKind::Location], &[StepKind::LocationScale]);
        assert_eq!(run, vec![5]);
        assert_eq!(stream.eat(&[StepKind::Waveform], &[]), vec![6]);
        assert_eq!(stream.read_next(&[StepKind::Uniform]), None);
        assert_eq!(stream.all().count(), 7);
    }
}
