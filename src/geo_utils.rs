use serde::{Deserialize, Serialize};

// unit: meter
pub const EARTH_RADIUS: f64 = 6371000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GpsPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GpsPoint { lat, lon }
    }

    // great-circle distance in meters
    pub fn haversine_distance(&self, other: &GpsPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS * c
    }

    /// `[longitude, latitude]`, the order used by every geometry we emit.
    pub fn to_coord(self) -> geo_types::Coord<f64> {
        geo_types::Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    // Exact comparison. Points coming out of the same source row compare
    // equal bit for bit, which is what merging relies on.
    pub fn same_location(&self, other: &GpsPoint) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

pub fn lerp(from: f64, to: f64, fraction: f64) -> f64 {
    from + (to - from) * fraction
}

#[cfg(test)]
mod tests {
    use super::{lerp, GpsPoint};
    use assert_float_eq::*;

    #[test]
    fn haversine() {
        let p = GpsPoint::new(55.67821, 12.55512);
        assert_eq!(p.haversine_distance(&p), 0.0);

        // one degree of latitude is ~111.195km with this radius
        let q = GpsPoint::new(56.67821, 12.55512);
        assert_float_absolute_eq!(p.haversine_distance(&q), 111194.93, 0.01);
        assert_float_absolute_eq!(
            p.haversine_distance(&q),
            q.haversine_distance(&p),
            1e-9
        );
    }

    #[test]
    fn coord_is_lon_lat() {
        let coord = GpsPoint::new(55.7, 12.4).to_coord();
        assert_eq!(coord.x, 12.4);
        assert_eq!(coord.y, 55.7);
    }

    #[test]
    fn lerp_basic() {
        assert_eq!(lerp(0.0, 100.0, 0.5), 50.0);
        assert_eq!(lerp(10.0, 10.0, 0.3), 10.0);
        assert_eq!(lerp(-1.0, 1.0, 0.0), -1.0);
    }
}
