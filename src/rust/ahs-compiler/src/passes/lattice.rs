// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use ahs_ir::{Assignments, Decimal, Error, Result, SpatialModulation};

/// Dense per-site coefficients of a spatial modulation.
///
/// There is one entry per register site. Sites not listed by a
/// [`SpatialModulation::ScaledLocations`] get zero.
pub fn site_coefficients(
    modulation: &SpatialModulation,
    n_sites: usize,
    assignments: &Assignments,
) -> Result<Vec<Decimal>> {
    match modulation {
        SpatialModulation::Uniform => Ok(vec![Decimal::one(); n_sites]),
        SpatialModulation::ScaledLocations(locations) => {
            let mut out = vec![Decimal::zero(); n_sites];
            for (site, scale) in locations {
                let slot = out.get_mut(*site).ok_or_else(|| {
                    Error::Bounds(format!(
                        "Site {site} is addressed but the register has {n_sites} sites."
                    ))
                })?;
                *slot = scale.eval(assignments)?;
            }
            Ok(out)
        }
        SpatialModulation::RunTimeVector(name) => Err(Error::unassigned(name.clone())),
        SpatialModulation::AssignedRunTimeVector { name, values } => {
            if values.len() != n_sites {
                return Err(Error::shape(
                    format!("vector '{name}'"),
                    n_sites,
                    values.len(),
                ));
            }
            Ok(values.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::Scalar;

    #[test]
    fn test_scaled_locations_are_dense() {
        let modulation = SpatialModulation::scaled_locations([(2, Scalar::literal(3))]);
        let empty = Assignments::new();
        let coefficients = site_coefficients(&modulation, 4, &empty).unwrap();
        assert_eq!(
            coefficients,
            vec![Decimal::zero(), Decimal::zero(), Decimal::from(3), Decimal::zero()]
        );
        assert!(matches!(
            site_coefficients(&modulation, 2, &empty),
            Err(Error::Bounds(_))
        ));
    }

    #[test]
    fn test_vector_length_must_match() {
        let modulation = SpatialModulation::AssignedRunTimeVector {
            name: "mask".to_string(),
            values: vec![Decimal::one(); 3],
        };
        let empty = Assignments::new();
        assert!(matches!(
            site_coefficients(&modulation, 2, &empty),
            Err(Error::ShapeMismatch { expected: 2, found: 3, .. })
        ));
        assert_eq!(site_coefficients(&modulation, 3, &empty).unwrap().len(), 3);
        assert!(matches!(
            site_coefficients(&SpatialModulation::RunTimeVector("mask".to_string()), 3, &empty),
            Err(Error::UnassignedVariable { .. })
        ));
    }
}
