// this file defines a doubly-constrained gravity model, which generates a trip demand matrix from
// zone productions and attractions.
use ndarray::prelude::*;

use super::errors::SimError;
use super::geometry::{geodesic_distances, GeoPoint};


static MAX_ITERATIONS: usize = 100;
static TOLERANCE: f64 = 1e-3;
static MIN_TOTAL_FRICTION: f64 = 1e-6;


/// A zone's trip ends: where it is, how many trips start there, and how many end there.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneDemand {
    pub name: String,
    pub centroid: GeoPoint,
    pub production: f64,
    pub attraction: f64,
}


/// Parameters of the deterrence function `a * d^b * exp(c * d)`, with `d` in km.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrictionParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for FrictionParams {
    fn default() -> FrictionParams {
        FrictionParams {
            a: 28507.,
            b: -0.02,
            c: -0.123,
        }
    }
}


/// Deterrence between every pair of zones.  Zones at distance 0 (including each zone and itself)
/// have no friction, so no trips are generated between them.
pub fn friction_matrix(distances: &Array2<f64>, params: &FrictionParams) -> Array2<f64> {
    let params = *params;
    let mut friction = distances.clone();
    friction.par_mapv_inplace(|dist| {
        if dist == 0. {
            0.
        } else {
            params.a * dist.powf(params.b) * (params.c * dist).exp()
        }
    });
    friction
}

/// Distributes each zone's production over destinations in proportion to attraction times
/// friction.
pub fn trip_matrix(friction: &Array2<f64>, productions: &Array1<f64>,
                   attractions: &Array1<f64>) -> Array2<f64> {
    let weighted = friction * attractions;
    let totals = weighted.sum_axis(Axis(1)).mapv(|tt| tt.max(MIN_TOTAL_FRICTION));
    let scale = (productions / &totals).insert_axis(Axis(1));
    weighted * &scale
}

fn mean_squared_error(expected: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    let diff = expected - actual;
    (&diff * &diff).mean().unwrap_or(0.)
}

fn errors(trips: &Array2<f64>, productions: &Array1<f64>, attractions: &Array1<f64>)
          -> (f64, f64) {
    let prod_error = mean_squared_error(productions, &trips.sum_axis(Axis(1)));
    let attr_error = mean_squared_error(attractions, &trips.sum_axis(Axis(0)));
    (prod_error, attr_error)
}

/// Rescales the attraction weights until the trip matrix's column sums match `attractions` as
/// well as its row sums match `productions`.
pub fn balance(trips: Array2<f64>, friction: &Array2<f64>, productions: &Array1<f64>,
               attractions: &Array1<f64>) -> Result<Array2<f64>, SimError> {
    let mut trips = trips;
    let mut weights = attractions.clone();
    let (prod_error, attr_error) = errors(&trips, productions, attractions);
    if prod_error < TOLERANCE && attr_error < TOLERANCE {
        return Ok(trips);
    }

    for iteration in 1..MAX_ITERATIONS {
        weights = weights * attractions / &trips.sum_axis(Axis(0));
        trips = trip_matrix(friction, productions, &weights);
        let (prod_error, attr_error) = errors(&trips, productions, attractions);
        log::debug!("balancing iteration {}: production error {}, attraction error {}",
                    iteration, prod_error, attr_error);
        if prod_error < TOLERANCE && attr_error < TOLERANCE {
            return Ok(trips);
        }
    }
    Err(SimError::GravityDidNotConverge(MAX_ITERATIONS))
}

/// Builds a balanced trip matrix for `zones`, rounded to whole trips.
pub fn run_gravity_model(zones: &[ZoneDemand]) -> Result<Array2<u64>, SimError> {
    let centroids: Vec<GeoPoint> = zones.iter().map(|zz| zz.centroid).collect();
    let productions: Array1<f64> = zones.iter().map(|zz| zz.production).collect();
    let attractions: Array1<f64> = zones.iter().map(|zz| zz.attraction).collect();

    let distances = geodesic_distances(&centroids);
    let friction = friction_matrix(&distances, &FrictionParams::default());
    let trips = trip_matrix(&friction, &productions, &attractions);
    let trips = balance(trips, &friction, &productions, &attractions)?;
    log::info!("Gravity model generated {} trips between {} zones", trips.sum().round(),
               zones.len());
    Ok(trips.mapv(|tt| tt.round().max(0.) as u64))
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_zones() -> Vec<ZoneDemand> {
        let zone = |name: &str, production, attraction, lat, lon| ZoneDemand {
            name: String::from(name),
            centroid: GeoPoint::new(lat, lon),
            production,
            attraction,
        };
        vec![
            zone("zone1", 140., 300., 60., 30.),
            zone("zone2", 330., 270., 60., 30.04),
            zone("zone3", 280., 180., 60.05, 30.055),
        ]
    }

    #[test]
    fn test_friction() {
        let distances = arr2(&[[0., 1.], [10., 0.]]);
        let friction = friction_matrix(&distances, &FrictionParams::default());
        assert_eq!(friction[[0, 0]], 0.);
        assert_eq!(friction[[1, 1]], 0.);
        assert_relative_eq!(friction[[0, 1]], 28507. * (-0.123f64).exp(), max_relative = 1e-12);
        assert_relative_eq!(friction[[1, 0]], 28507. * 10f64.powf(-0.02) * (-1.23f64).exp(),
                            max_relative = 1e-12);
    }

    #[test]
    fn test_trip_matrix_meets_productions() {
        let friction = arr2(&[[0., 2., 1.], [2., 0., 4.], [1., 4., 0.]]);
        let productions = arr1(&[10., 20., 30.]);
        let attractions = arr1(&[5., 5., 10.]);
        let trips = trip_matrix(&friction, &productions, &attractions);
        for (ii, row_sum) in trips.sum_axis(Axis(1)).iter().enumerate() {
            assert_relative_eq!(*row_sum, productions[ii], max_relative = 1e-12);
        }
        // row 0 splits 10 trips in proportion 5 * 2 : 10 * 1
        assert_relative_eq!(trips[[0, 1]], 5., max_relative = 1e-12);
        assert_relative_eq!(trips[[0, 2]], 5., max_relative = 1e-12);
    }

    #[test]
    fn test_reference_case() {
        let trips = run_gravity_model(&reference_zones()).unwrap();
        assert_eq!(trips, arr2(&[[0, 97, 43], [193, 0, 137], [107, 173, 0]]));
        assert_eq!(trips.sum_axis(Axis(1)), arr1(&[140, 330, 280]));
        assert_eq!(trips.sum_axis(Axis(0)), arr1(&[300, 270, 180]));
    }

    #[test]
    fn test_unreachable_balance() {
        // a lone zone can't send its production anywhere
        let zones = vec![ZoneDemand {
            name: String::from("alone"),
            centroid: GeoPoint::new(0., 0.),
            production: 10.,
            attraction: 10.,
        }];
        match run_gravity_model(&zones) {
            Err(SimError::GravityDidNotConverge(100)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
