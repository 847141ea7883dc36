use geo::{Distance, Geodesic, Point};
use ndarray::prelude::*;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint{lat, lon}
    }

    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Distance along the WGS84 ellipsoid to `other`, in km.
    pub fn geodesic_distance_km(&self, other: &GeoPoint) -> f64 {
        Geodesic.distance(self.to_point(), other.to_point()) / 1000.
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(pos: GeoPoint) -> Point<f64> {
        pos.to_point()
    }
}


/// Computes the distance in km between every pair of points.  The diagonal is exactly zero.
pub fn geodesic_distances(points: &[GeoPoint]) -> Array<f64, Ix2> {
    let mut dists_mat = Array::zeros((points.len(), points.len()));
    for (ii, pi) in points.iter().enumerate() {
        for (jj, pj) in points.iter().enumerate() {
            if ii != jj {
                dists_mat[[ii, jj]] = pi.geodesic_distance_km(pj);
            }
        }
    }
    dists_mat
}
