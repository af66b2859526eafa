// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Bravais lattice generators.

use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::location::{LocationInfo, SiteFilling};
use crate::scalar::{Cast, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatticeKind {
    Chain { vertical: bool },
    Square,
    Rectangular,
    Honeycomb,
    Triangular,
    Lieb,
    Kagome,
}

/// Lattice of `shape` unit cells scaled by a per-axis spacing.
///
/// Only rectangular lattices use distinct spacings along x and y.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BravaisLattice {
    kind: LatticeKind,
    shape: Vec<usize>,
    spacing_x: Scalar,
    spacing_y: Scalar,
}

fn sqrt3_over(denominator: f64) -> Decimal {
    Decimal::from_f64(3f64.sqrt() / denominator).unwrap_or_default()
}

fn half() -> Decimal {
    Decimal::from_f64(0.5).unwrap_or_default()
}

fn quarter() -> Decimal {
    Decimal::from_f64(0.25).unwrap_or_default()
}

type Vector = [Decimal; 2];

fn vector(x: Decimal, y: Decimal) -> Vector {
    [x, y]
}

impl BravaisLattice {
    fn new(kind: LatticeKind, shape: Vec<usize>, spacing: Scalar) -> Self {
        BravaisLattice {
            kind,
            shape,
            spacing_x: spacing.clone(),
            spacing_y: spacing,
        }
    }

    pub fn chain(length: usize, spacing: impl Cast, vertical: bool) -> Result<Self> {
        Ok(Self::new(LatticeKind::Chain { vertical }, vec![length], spacing.cast()?))
    }

    pub fn square(nx: usize, ny: usize, spacing: impl Cast) -> Result<Self> {
        Ok(Self::new(LatticeKind::Square, vec![nx, ny], spacing.cast()?))
    }

    pub fn rectangular(
        width: usize,
        height: usize,
        spacing_x: impl Cast,
        spacing_y: impl Cast,
    ) -> Result<Self> {
        Ok(BravaisLattice {
            kind: LatticeKind::Rectangular,
            shape: vec![width, height],
            spacing_x: spacing_x.cast()?,
            spacing_y: spacing_y.cast()?,
        })
    }

    pub fn honeycomb(nx: usize, ny: usize, spacing: impl Cast) -> Result<Self> {
        Ok(Self::new(LatticeKind::Honeycomb, vec![nx, ny], spacing.cast()?))
    }

    pub fn triangular(nx: usize, ny: usize, spacing: impl Cast) -> Result<Self> {
        Ok(Self::new(LatticeKind::Triangular, vec![nx, ny], spacing.cast()?))
    }

    pub fn lieb(nx: usize, ny: usize, spacing: impl Cast) -> Result<Self> {
        Ok(Self::new(LatticeKind::Lieb, vec![nx, ny], spacing.cast()?))
    }

    pub fn kagome(nx: usize, ny: usize, spacing: impl Cast) -> Result<Self> {
        Ok(Self::new(LatticeKind::Kagome, vec![nx, ny], spacing.cast()?))
    }

    pub fn kind(&self) -> LatticeKind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn spacing(&self) -> (&Scalar, &Scalar) {
        (&self.spacing_x, &self.spacing_y)
    }

    /// Unit cell vectors, one per lattice dimension.
    pub fn cell_vectors(&self) -> Vec<Vector> {
        let zero = Decimal::zero;
        let one = Decimal::one;
        match self.kind {
            LatticeKind::Chain { vertical: false } => vec![vector(one(), zero())],
            LatticeKind::Chain { vertical: true } => vec![vector(zero(), one())],
            LatticeKind::Square | LatticeKind::Rectangular | LatticeKind::Lieb => {
                vec![vector(one(), zero()), vector(zero(), one())]
            }
            LatticeKind::Honeycomb | LatticeKind::Triangular | LatticeKind::Kagome => {
                vec![vector(one(), zero()), vector(half(), sqrt3_over(2.0))]
            }
        }
    }

    /// Positions of the atoms in one unit cell.
    pub fn cell_atoms(&self) -> Vec<Vector> {
        let zero = Decimal::zero;
        match self.kind {
            LatticeKind::Chain { .. }
            | LatticeKind::Square
            | LatticeKind::Rectangular
            | LatticeKind::Triangular => vec![vector(zero(), zero())],
            LatticeKind::Honeycomb => vec![vector(zero(), zero()), vector(half(), sqrt3_over(6.0))],
            LatticeKind::Lieb => vec![
                vector(zero(), zero()),
                vector(half(), zero()),
                vector(zero(), half()),
            ],
            LatticeKind::Kagome => vec![
                vector(zero(), zero()),
                vector(half(), zero()),
                vector(quarter(), sqrt3_over(4.0)),
            ],
        }
    }

    pub fn n_sites(&self) -> usize {
        self.shape.iter().product::<usize>() * self.cell_atoms().len()
    }

    /// Enumerate sites: outer index over the first cell vector, inner over
    /// the second, then the atoms of the cell.
    pub fn enumerate(&self) -> Vec<LocationInfo> {
        let vectors = self.cell_vectors();
        let atoms = self.cell_atoms();
        let mut out = Vec::with_capacity(self.n_sites());
        let counts: Vec<usize> = (0..2).map(|axis| self.shape.get(axis).copied().unwrap_or(1)).collect();
        for i in 0..counts[0] {
            for j in 0..counts[1] {
                for atom in &atoms {
                    let mut position = atom.clone();
                    for (index, cell) in [i, j].into_iter().enumerate() {
                        if let Some(v) = vectors.get(index) {
                            position[0] = &position[0] + &(&v[0] * &Decimal::from(cell));
                            position[1] = &position[1] + &(&v[1] * &Decimal::from(cell));
                        }
                    }
                    let [x, y] = position;
                    out.push(LocationInfo::new(
                        self.spacing_x.clone() * Scalar::Literal(x),
                        self.spacing_y.clone() * Scalar::Literal(y),
                        SiteFilling::Filled,
                    ));
                }
            }
        }
        out
    }

    pub fn scale(&self, factor: &Scalar) -> BravaisLattice {
        BravaisLattice {
            spacing_x: self.spacing_x.clone() * factor.clone(),
            spacing_y: self.spacing_y.clone() * factor.clone(),
            ..self.clone()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let expected = match self.kind {
            LatticeKind::Chain { .. } => 1,
            _ => 2,
        };
        if self.shape.len() != expected {
            return Err(Error::shape("lattice shape", expected, self.shape.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Assignments;

    fn coordinates(lattice: &BravaisLattice) -> Vec<(f64, f64)> {
        lattice
            .enumerate()
            .iter()
            .map(|site| {
                let (x, y) = site.position();
                (
                    x.eval(&Assignments::new()).unwrap().to_f64(),
                    y.eval(&Assignments::new()).unwrap().to_f64(),
                )
            })
            .collect()
    }

    #[test]
    fn test_square_enumeration_order() {
        let lattice = BravaisLattice::square(2, 2, 4).unwrap();
        assert_eq!(
            coordinates(&lattice),
            vec![(0.0, 0.0), (0.0, 4.0), (4.0, 0.0), (4.0, 4.0)]
        );
    }

    #[test]
    fn test_rectangular_spacing() {
        let lattice = BravaisLattice::rectangular(2, 1, 3, 5).unwrap();
        assert_eq!(coordinates(&lattice), vec![(0.0, 0.0), (3.0, 0.0)]);
        let lattice = BravaisLattice::rectangular(1, 2, 3, 5).unwrap();
        assert_eq!(coordinates(&lattice), vec![(0.0, 0.0), (0.0, 5.0)]);
    }

    #[test]
    fn test_site_counts() {
        assert_eq!(BravaisLattice::chain(5, 1, false).unwrap().n_sites(), 5);
        assert_eq!(BravaisLattice::honeycomb(2, 2, 1).unwrap().n_sites(), 8);
        assert_eq!(BravaisLattice::lieb(2, 3, 1).unwrap().n_sites(), 18);
        assert_eq!(BravaisLattice::kagome(1, 1, 1).unwrap().enumerate().len(), 3);
    }

    #[test]
    fn test_vertical_chain() {
        let lattice = BravaisLattice::chain(3, 2, true).unwrap();
        assert_eq!(coordinates(&lattice), vec![(0.0, 0.0), (0.0, 2.0), (0.0, 4.0)]);
    }

    #[test]
    fn test_triangular_second_row() {
        let lattice = BravaisLattice::triangular(1, 2, 1).unwrap();
        let sites = coordinates(&lattice);
        assert_eq!(sites[1].0, 0.5);
        assert!((sites[1].1 - 3f64.sqrt() / 2.0).abs() < 1e-12);
    }
}
