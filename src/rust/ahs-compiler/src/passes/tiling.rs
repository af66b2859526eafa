// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Replication of a register over the device working area.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ahs_ir::{Assignments, AtomArrangement, Decimal, Error, LocationInfo, Result, SiteFilling};

use crate::capabilities::DeviceLimits;

/// Integer offset of a cluster in units of the cluster shift vectors.
pub type ClusterIndex = (i64, i64);

const NEIGHBOURS: [ClusterIndex; 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Origin of one emitted site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterSite {
    pub cluster: ClusterIndex,
    pub local: usize,
}

/// Maps every emitted site back to its cluster and its index in the
/// original register.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParallelDecoder {
    sites: Vec<ClusterSite>,
}

impl ParallelDecoder {
    /// Decoder of an untiled register.
    pub fn identity(n_sites: usize) -> Self {
        ParallelDecoder {
            sites: (0..n_sites)
                .map(|local| ClusterSite {
                    cluster: (0, 0),
                    local,
                })
                .collect(),
        }
    }

    pub fn sites(&self) -> &[ClusterSite] {
        &self.sites
    }

    /// Clusters in tiling order.
    pub fn clusters(&self) -> Vec<ClusterIndex> {
        let mut seen = HashSet::new();
        self.sites
            .iter()
            .filter(|site| seen.insert(site.cluster))
            .map(|site| site.cluster)
            .collect()
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters().len()
    }

    /// Split a per-site vector into one vector per cluster, indexed like the
    /// original register.
    pub fn decode<T: Clone>(&self, values: &[T]) -> Result<IndexMap<ClusterIndex, Vec<T>>> {
        if values.len() != self.sites.len() {
            return Err(Error::shape("decoded sites", self.sites.len(), values.len()));
        }
        let mut out: IndexMap<ClusterIndex, Vec<(usize, T)>> = IndexMap::new();
        for (site, value) in self.sites.iter().zip(values) {
            out.entry(site.cluster)
                .or_default()
                .push((site.local, value.clone()));
        }
        Ok(out
            .into_iter()
            .map(|(cluster, mut entries)| {
                entries.sort_by_key(|(local, _)| *local);
                (cluster, entries.into_iter().map(|(_, value)| value).collect())
            })
            .collect())
    }
}

/// Concrete register ready for code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TiledRegister {
    pub sites: Vec<(Decimal, Decimal)>,
    pub filling: Vec<SiteFilling>,
    pub decoder: ParallelDecoder,
}

impl TiledRegister {
    /// The register as is, in a single cluster.
    pub fn single(register: &AtomArrangement, assignments: &Assignments) -> Result<TiledRegister> {
        Ok(TiledRegister {
            sites: register.coordinates(assignments)?,
            filling: register.enumerate().iter().map(LocationInfo::filling).collect(),
            decoder: ParallelDecoder::identity(register.n_sites()),
        })
    }

    pub fn n_clusters(&self) -> usize {
        self.decoder.n_clusters()
    }
}

/// Tile `register` over the working area of the device.
///
/// Clusters are placed on a grid whose pitch is the bounding box of the
/// register plus `cluster_spacing`, flood filling from the origin over
/// 4-connected neighbours. A cluster that leaves the working area or
/// exceeds the site budget is skipped together with the clusters only
/// reachable through it.
pub fn tile(
    register: &AtomArrangement,
    cluster_spacing: &Decimal,
    limits: &DeviceLimits,
    assignments: &Assignments,
) -> Result<TiledRegister> {
    if cluster_spacing.is_negative() || cluster_spacing.is_zero() {
        return Err(Error::InvalidInput(format!(
            "Cluster spacing must be positive, got {cluster_spacing}."
        )));
    }
    let coordinates = register.coordinates(assignments)?;
    let fillings: Vec<SiteFilling> = register.enumerate().iter().map(LocationInfo::filling).collect();
    let (Some(min_x), Some(max_x)) = (
        coordinates.iter().map(|(x, _)| x).min(),
        coordinates.iter().map(|(x, _)| x).max(),
    ) else {
        return Err(Error::InvalidInput("Cannot tile an empty register.".to_string()));
    };
    let (Some(min_y), Some(max_y)) = (
        coordinates.iter().map(|(_, y)| y).min(),
        coordinates.iter().map(|(_, y)| y).max(),
    ) else {
        return Err(Error::InvalidInput("Cannot tile an empty register.".to_string()));
    };
    let shift_x = &(max_x - min_x) + cluster_spacing;
    let shift_y = &(max_y - min_y) + cluster_spacing;
    let base: Vec<(Decimal, Decimal)> = coordinates
        .iter()
        .map(|(x, y)| (x - min_x, y - min_y))
        .collect();

    let zero = Decimal::zero();
    let inside = |(x, y): &(Decimal, Decimal)| {
        *x >= zero && *x <= limits.width && *y >= zero && *y <= limits.height
    };
    let mut tiled = TiledRegister {
        sites: Vec::new(),
        filling: Vec::new(),
        decoder: ParallelDecoder::default(),
    };
    let mut queue = VecDeque::from([(0, 0)]);
    let mut visited = HashSet::from([(0, 0)]);
    while let Some(cluster) = queue.pop_front() {
        let offset_x = &shift_x * &Decimal::from(cluster.0);
        let offset_y = &shift_y * &Decimal::from(cluster.1);
        let translated: Vec<(Decimal, Decimal)> = base
            .iter()
            .map(|(x, y)| (x + &offset_x, y + &offset_y))
            .collect();
        let fits = translated.iter().all(inside)
            && tiled.sites.len() + translated.len() <= limits.number_sites_max;
        if !fits {
            if cluster == (0, 0) {
                return Err(Error::Bounds(format!(
                    "Register of {} sites does not fit the {} x {} working area with at most {} sites.",
                    base.len(),
                    limits.width,
                    limits.height,
                    limits.number_sites_max
                )));
            }
            continue;
        }
        tiled.sites.extend(translated);
        tiled.filling.extend(fillings.iter().copied());
        tiled.decoder.sites.extend(
            (0..base.len()).map(|local| ClusterSite { cluster, local }),
        );
        for (dx, dy) in NEIGHBOURS {
            let next = (cluster.0 + dx, cluster.1 + dy);
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    ahs_log::diagnostic!(
        "Tiled {} clusters of {} sites",
        tiled.n_clusters(),
        base.len()
    );
    Ok(tiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use ahs_ir::BravaisLattice;
    use proptest::prelude::*;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn limits() -> DeviceLimits {
        Capabilities::aquila().unwrap().device_limits().unwrap()
    }

    fn square(n: usize) -> AtomArrangement {
        AtomArrangement::from(BravaisLattice::square(n, n, 5).unwrap())
    }

    #[test]
    fn test_tiling_fills_working_area() {
        // Clusters of extent 5 with pitch 15 in a 75 x 76 area.
        let tiled = tile(&square(2), &d("10"), &limits(), &Assignments::new()).unwrap();
        assert_eq!(tiled.n_clusters(), 25);
        assert_eq!(tiled.sites.len(), 100);
        assert!(tiled.sites.iter().all(|(x, y)| *x <= d("75") && *y <= d("76")));
        assert_eq!(tiled.decoder.clusters()[..3], [(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn test_site_budget_prunes() {
        let mut limits = limits();
        limits.number_sites_max = 10;
        let tiled = tile(&square(2), &d("10"), &limits, &Assignments::new()).unwrap();
        assert_eq!(tiled.n_clusters(), 2);
        limits.number_sites_max = 3;
        assert!(matches!(
            tile(&square(2), &d("10"), &limits, &Assignments::new()),
            Err(Error::Bounds(_))
        ));
    }

    #[test]
    fn test_decode_splits_per_cluster() {
        let mut limits = limits();
        limits.number_sites_max = 8;
        let tiled = tile(&square(2), &d("10"), &limits, &Assignments::new()).unwrap();
        let measured: Vec<usize> = (0..8).collect();
        let decoded = tiled.decoder.decode(&measured).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[&(0, 0)], vec![0, 1, 2, 3]);
        assert_eq!(decoded[&(1, 0)], vec![4, 5, 6, 7]);
        assert!(tiled.decoder.decode(&measured[..3]).is_err());
    }

    proptest! {
        #[test]
        fn test_tiling_is_monotonic_in_site_budget(budget in 4usize..200, extra in 0usize..100) {
            let count = |sites: usize| {
                let mut limits = limits();
                limits.number_sites_max = sites;
                tile(&square(2), &d("10"), &limits, &Assignments::new())
                    .map(|tiled| tiled.n_clusters())
                    .unwrap_or(0)
            };
            prop_assert!(count(budget) <= count(budget + extra));
        }
    }
}
