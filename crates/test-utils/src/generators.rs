//! Synthetic band data with predictable values.
//!
//! All generators return raw Sentinel-2 style digital numbers (reflectance
//! times 10 000) in row-major order.

/// Converts reflectance values to raw digital numbers.
///
/// # Example
///
/// ```
/// use test_utils::reflectance_to_raw;
///
/// assert_eq!(reflectance_to_raw(&[0.1, 0.45]), vec![1000, 4500]);
/// ```
pub fn reflectance_to_raw(reflectance: &[f64]) -> Vec<u16> {
    reflectance
        .iter()
        .map(|r| (r * 10_000.0).round().clamp(0.0, u16::MAX as f64) as u16)
        .collect()
}

/// A band filled with one raw value.
pub fn constant_band(width: usize, height: usize, raw: u16) -> Vec<u16> {
    vec![raw; width * height]
}

/// A band whose raw value encodes the pixel position: `1000 + row * 100 + col`.
///
/// Makes it easy to verify that a windowed read picked the right pixels.
///
/// # Example
///
/// ```
/// use test_utils::position_band;
///
/// let band = position_band(10, 5);
/// assert_eq!(band[0], 1000);
/// assert_eq!(band[12], 1102); // row 1, col 2
/// ```
pub fn position_band(width: usize, height: usize) -> Vec<u16> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((1000 + row * 100 + col) as u16);
        }
    }
    data
}

/// Red and near-infrared bands for a field whose vegetation density rises
/// from left to right. NDVI goes from about 0.05 at column 0 towards 0.8.
pub fn vegetation_gradient_bands(width: usize, height: usize) -> (Vec<u16>, Vec<u16>) {
    let mut red = Vec::with_capacity(width * height);
    let mut nir = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let t = if width > 1 {
                col as f64 / (width - 1) as f64
            } else {
                0.0
            };
            red.push((1500.0 - 1100.0 * t) as u16);
            nir.push((1700.0 + 2300.0 * t) as u16);
        }
    }
    (red, nir)
}

/// Sets every `stride`-th pixel to 0, the Sentinel-2 no-data value.
pub fn with_nodata(mut data: Vec<u16>, stride: usize) -> Vec<u16> {
    for v in data.iter_mut().step_by(stride.max(1)) {
        *v = 0;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_ndvi_increases() {
        let (red, nir) = vegetation_gradient_bands(5, 1);
        let ndvi: Vec<f64> = red
            .iter()
            .zip(&nir)
            .map(|(&r, &n)| (n as f64 - r as f64) / (n as f64 + r as f64))
            .collect();
        assert!(ndvi.windows(2).all(|w| w[0] < w[1]));
        assert!(ndvi[0] < 0.1);
        assert!(ndvi[4] > 0.75);
    }

    #[test]
    fn test_with_nodata() {
        let data = with_nodata(constant_band(6, 1, 500), 3);
        assert_eq!(data, vec![0, 500, 500, 0, 500, 500]);
    }
}
