// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Atom arrangements.

pub mod bravais;

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use bravais::{BravaisLattice, LatticeKind};

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::params::Assignments;
use crate::scalar::{Cast, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteFilling {
    Filled,
    Vacant,
}

impl SiteFilling {
    pub fn is_filled(&self) -> bool {
        matches!(self, SiteFilling::Filled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationInfo {
    position: (Scalar, Scalar),
    filling: SiteFilling,
}

impl LocationInfo {
    pub fn new(x: Scalar, y: Scalar, filling: SiteFilling) -> Self {
        LocationInfo {
            position: (x, y),
            filling,
        }
    }

    pub fn position(&self) -> (&Scalar, &Scalar) {
        (&self.position.0, &self.position.1)
    }

    pub fn filling(&self) -> SiteFilling {
        self.filling
    }

    /// Evaluated coordinates.
    pub fn coordinates(&self, assignments: &Assignments) -> Result<(Decimal, Decimal)> {
        Ok((
            self.position.0.eval(assignments)?,
            self.position.1.eval(assignments)?,
        ))
    }

    fn with_filling(&self, filling: SiteFilling) -> Self {
        LocationInfo {
            filling,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomArrangement {
    List(Vec<LocationInfo>),
    Lattice(BravaisLattice),
}

impl From<BravaisLattice> for AtomArrangement {
    fn from(lattice: BravaisLattice) -> Self {
        AtomArrangement::Lattice(lattice)
    }
}

impl AtomArrangement {
    pub fn empty() -> Self {
        AtomArrangement::List(Vec::new())
    }

    /// Build from filled positions.
    pub fn from_positions<X: Cast, Y: Cast>(positions: impl IntoIterator<Item = (X, Y)>) -> Result<Self> {
        positions
            .into_iter()
            .try_fold(AtomArrangement::empty(), |arrangement, (x, y)| {
                arrangement.add_position((x, y), SiteFilling::Filled)
            })
    }

    pub fn lattice(lattice: BravaisLattice) -> Result<Self> {
        lattice.validate()?;
        Ok(AtomArrangement::Lattice(lattice))
    }

    pub fn enumerate(&self) -> Vec<LocationInfo> {
        match self {
            AtomArrangement::List(locations) => locations.clone(),
            AtomArrangement::Lattice(lattice) => lattice.enumerate(),
        }
    }

    pub fn n_sites(&self) -> usize {
        match self {
            AtomArrangement::List(locations) => locations.len(),
            AtomArrangement::Lattice(lattice) => lattice.n_sites(),
        }
    }

    pub fn n_atoms(&self) -> usize {
        match self {
            AtomArrangement::List(locations) => {
                locations.iter().filter(|l| l.filling.is_filled()).count()
            }
            AtomArrangement::Lattice(lattice) => lattice.n_sites(),
        }
    }

    pub fn n_vacant(&self) -> usize {
        self.n_sites() - self.n_atoms()
    }

    pub fn n_dims(&self) -> usize {
        2
    }

    fn into_locations(self) -> Vec<LocationInfo> {
        match self {
            AtomArrangement::List(locations) => locations,
            AtomArrangement::Lattice(lattice) => lattice.enumerate(),
        }
    }

    pub fn add_position<X: Cast, Y: Cast>(self, position: (X, Y), filling: SiteFilling) -> Result<Self> {
        let site = LocationInfo::new(position.0.cast()?, position.1.cast()?, filling);
        let mut locations = self.into_locations();
        locations.push(site);
        Ok(AtomArrangement::List(locations))
    }

    pub fn add_positions<X: Cast, Y: Cast>(
        self,
        positions: impl IntoIterator<Item = (X, Y)>,
        filling: SiteFilling,
    ) -> Result<Self> {
        positions
            .into_iter()
            .try_fold(self, |arrangement, position| arrangement.add_position(position, filling))
    }

    /// Make exactly `count` randomly chosen filled sites vacant.
    pub fn apply_defect_count<R: Rng + ?Sized>(self, count: usize, rng: &mut R) -> Result<Self> {
        let mut locations = self.into_locations();
        let filled: Vec<usize> = locations
            .iter()
            .enumerate()
            .filter(|(_, l)| l.filling.is_filled())
            .map(|(index, _)| index)
            .collect();
        if count > filled.len() {
            return Err(Error::Bounds(format!(
                "Cannot remove {count} atoms from an arrangement with {} atoms.",
                filled.len()
            )));
        }
        for picked in rand::seq::index::sample(rng, filled.len(), count) {
            let site = filled[picked];
            locations[site] = locations[site].with_filling(SiteFilling::Vacant);
        }
        Ok(AtomArrangement::List(locations))
    }

    /// Make each filled site vacant with probability `density`.
    pub fn apply_defect_density<R: Rng + ?Sized>(self, density: f64, rng: &mut R) -> Result<Self> {
        if !(0.0..=1.0).contains(&density) {
            return Err(Error::InvalidInput(format!(
                "Defect density must be within [0, 1], got {density}."
            )));
        }
        let locations = self
            .into_locations()
            .into_iter()
            .map(|site| {
                if site.filling.is_filled() && rng.random::<f64>() < density {
                    site.with_filling(SiteFilling::Vacant)
                } else {
                    site
                }
            })
            .collect();
        Ok(AtomArrangement::List(locations))
    }

    pub fn remove_vacant_sites(self) -> Self {
        let mut locations = self.into_locations();
        locations.retain(|site| site.filling.is_filled());
        AtomArrangement::List(locations)
    }

    pub fn scale(self, factor: impl Cast) -> Result<Self> {
        let factor = factor.cast()?;
        Ok(match self {
            AtomArrangement::Lattice(lattice) => AtomArrangement::Lattice(lattice.scale(&factor)),
            AtomArrangement::List(locations) => AtomArrangement::List(
                locations
                    .into_iter()
                    .map(|site| {
                        LocationInfo::new(
                            site.position.0 * factor.clone(),
                            site.position.1 * factor.clone(),
                            site.filling,
                        )
                    })
                    .collect(),
            ),
        })
    }

    /// Substitute assigned variables. The result is always a site list.
    pub fn assign(&self, assignments: &Assignments) -> Result<Self> {
        let locations = self
            .enumerate()
            .into_iter()
            .map(|site| {
                Ok(LocationInfo::new(
                    site.position.0.assign(assignments)?,
                    site.position.1.assign(assignments)?,
                    site.filling,
                ))
            })
            .collect::<Result<_>>()?;
        Ok(AtomArrangement::List(locations))
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        self.enumerate()
            .iter()
            .flat_map(|site| {
                site.position
                    .0
                    .free_variables()
                    .into_iter()
                    .chain(site.position.1.free_variables())
            })
            .collect()
    }

    /// Evaluated coordinates of every site.
    pub fn coordinates(&self, assignments: &Assignments) -> Result<Vec<(Decimal, Decimal)>> {
        self.enumerate()
            .iter()
            .map(|site| site.coordinates(assignments))
            .collect()
    }
}

/// Directive to replicate an arrangement over the device working area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelRegister {
    register: AtomArrangement,
    cluster_spacing: Scalar,
}

impl ParallelRegister {
    pub fn new(register: AtomArrangement, cluster_spacing: impl Cast) -> Result<Self> {
        Ok(ParallelRegister {
            register,
            cluster_spacing: cluster_spacing.cast()?,
        })
    }

    pub fn register(&self) -> &AtomArrangement {
        &self.register
    }

    pub fn cluster_spacing(&self) -> &Scalar {
        &self.cluster_spacing
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Self> {
        Ok(ParallelRegister {
            register: self.register.assign(assignments)?,
            cluster_spacing: self.cluster_spacing.assign(assignments)?,
        })
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = self.register.free_variables();
        out.extend(self.cluster_spacing.free_variables());
        out
    }
}
