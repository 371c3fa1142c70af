//! Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Uses the Krüger series in the third flattening `n`, truncated after the
//! third order. Within a UTM zone (±3° from the central meridian) the error
//! is well below a millimetre, which is far finer than a 10 m Sentinel-2
//! pixel.
//!
//! UTM is the special case with:
//! - Scale factor on the central meridian k0 = 0.9996
//! - False easting 500 000 m
//! - False northing 0 m (north) or 10 000 000 m (south)
//! - Central meridian = zone * 6 - 183 degrees

/// WGS84 semi-major axis (meters)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    lon0_deg: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    /// False easting (meters)
    pub false_easting: f64,
    /// False northing (meters)
    pub false_northing: f64,
    /// First eccentricity
    e: f64,
    /// Rectifying radius A scaled by k0
    k0_a: f64,
    /// Forward series coefficients (alpha)
    alpha: [f64; 3],
    /// Inverse series coefficients (beta)
    beta: [f64; 3],
    /// Conformal -> geodetic latitude coefficients (delta)
    delta: [f64; 3],
}

impl TransverseMercator {
    /// Create a projection on the WGS84 ellipsoid.
    ///
    /// # Arguments
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `k0` - Scale factor on the central meridian
    /// * `false_easting` - Added to every easting (meters)
    /// * `false_northing` - Added to every northing (meters)
    pub fn new(lon0_deg: f64, k0: f64, false_easting: f64, false_northing: f64) -> Self {
        let f = WGS84_F;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;

        let rectifying_radius = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ];

        Self {
            lon0: lon0_deg.to_radians(),
            lon0_deg,
            k0,
            false_easting,
            false_northing,
            e: (f * (2.0 - f)).sqrt(),
            k0_a: k0 * rectifying_radius,
            alpha,
            beta,
            delta,
        }
    }

    /// WGS84 / UTM zone projection.
    pub fn utm(zone: u8, north: bool) -> Self {
        let lon0 = zone as f64 * 6.0 - 183.0;
        let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
        Self::new(lon0, UTM_K0, UTM_FALSE_EASTING, false_northing)
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        self.lon0_deg
    }

    /// Convert geographic coordinates (degrees) to easting/northing (meters).
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let phi = lat_deg.to_radians();
        let lam = normalize_angle(lon_deg.to_radians() - self.lon0);

        // Conformal latitude via tau' = sinh(atanh(sin phi) - e atanh(e sin phi))
        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();

        let xi_prime = t.atan2(lam.cos());
        let eta_prime = (lam.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        (
            self.false_easting + self.k0_a * eta,
            self.false_northing + self.k0_a * xi,
        )
    }

    /// Convert easting/northing (meters) to geographic coordinates (degrees).
    ///
    /// Returns (lon, lat) in degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let xi_prime = (northing - self.false_northing) / self.k0_a;
        let eta_prime = (easting - self.false_easting) / self.k0_a;

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi -= b * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta -= b * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let chi = (xi.sin() / eta.cosh()).asin();
        let lam = eta.sinh().atan2(xi.cos());

        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            phi += d * (2.0 * (j as f64 + 1.0) * chi).sin();
        }

        (
            normalize_angle(self.lon0 + lam).to_degrees(),
            phi.to_degrees(),
        )
    }
}

/// Normalize an angle to [-π, π].
fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_central_meridian_maps_to_false_easting() {
        let proj = TransverseMercator::utm(31, true);
        assert_eq!(proj.central_meridian(), 3.0);
        assert_eq!(TransverseMercator::utm(40, true).central_meridian(), 57.0);

        // 45°N on the central meridian: k0 times the meridian arc length
        let (e, n) = proj.forward(3.0, 45.0);
        assert!((e - 500_000.0).abs() < 1e-6, "easting {}", e);
        assert!((n - 4_982_950.400).abs() < 0.01, "northing {}", n);
    }

    #[test]
    fn test_equator_three_degrees_off_meridian() {
        let proj = TransverseMercator::utm(31, true);
        let (e, n) = proj.forward(6.0, 0.0);
        assert!((e - 833_978.557).abs() < 0.01, "easting {}", e);
        assert!(n.abs() < 1e-6, "northing {}", n);
    }

    #[test]
    fn test_al_ain_aoi_corner_zone_40() {
        let proj = TransverseMercator::utm(40, true);
        let (e, n) = proj.forward(55.742, 24.205);
        assert!((e - 372_244.112).abs() < 0.01, "easting {}", e);
        assert!((n - 2_677_498.294).abs() < 0.01, "northing {}", n);
    }

    #[test]
    fn test_southern_hemisphere_false_northing() {
        let proj = TransverseMercator::utm(33, false);
        let (_, n) = proj.forward(15.0, -10.0);
        assert!(n > 8_800_000.0 && n < 9_000_000.0, "northing {}", n);
    }

    #[test]
    fn test_inverse_recovers_geographic_point() {
        let proj = TransverseMercator::utm(40, true);
        let (lon, lat) = proj.inverse(372_244.112, 2_677_498.294);
        assert!((lon - 55.742).abs() < 1e-7, "lon {}", lon);
        assert!((lat - 24.205).abs() < 1e-7, "lat {}", lat);
    }
}
