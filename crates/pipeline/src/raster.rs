//! GeoTIFF band reading.
//!
//! Only the tiles (or strips) that overlap the requested pixel window are
//! decoded, so a 10980 x 10980 band never has to be held in memory to
//! extract a few thousand pixels.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

use agri_common::{AgriError, AgriResult, Band, BoundingBox, CrsCode};

/// GeoKey ids used to identify the raster CRS.
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// Affine transform for a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X of the upper-left corner of the upper-left pixel
    pub origin_x: f64,
    /// Y of the upper-left corner of the upper-left pixel
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// World coordinates of a pixel center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a world point.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Transform for a window starting at (`col_off`, `row_off`).
    pub fn offset(&self, col_off: usize, row_off: usize) -> Self {
        Self {
            origin_x: self.origin_x + col_off as f64 * self.pixel_width,
            origin_y: self.origin_y + row_off as f64 * self.pixel_height,
            ..*self
        }
    }
}

/// Rectangular pixel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Georeferencing and size of a band file.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: CrsCode,
}

impl RasterInfo {
    /// Ground footprint of the whole raster in its own CRS.
    pub fn extent(&self) -> BoundingBox {
        let gt = &self.transform;
        let far_x = gt.origin_x + self.width as f64 * gt.pixel_width;
        let far_y = gt.origin_y + self.height as f64 * gt.pixel_height;
        BoundingBox::new(
            gt.origin_x.min(far_x),
            gt.origin_y.min(far_y),
            gt.origin_x.max(far_x),
            gt.origin_y.max(far_y),
        )
    }

    /// Smallest window covering `bbox` (in the raster CRS), clamped to the
    /// raster. `None` when the box misses the raster entirely.
    pub fn window_for(&self, bbox: &BoundingBox) -> Option<PixelWindow> {
        let overlap = bbox.intersection(&self.extent())?;
        let (c0, r0) = self.transform.world_to_pixel(overlap.min_x, overlap.max_y);
        let (c1, r1) = self.transform.world_to_pixel(overlap.max_x, overlap.min_y);

        let col_min = c0.min(c1).floor().max(0.0);
        let col_max = c0.max(c1).ceil().min(self.width as f64);
        let row_min = r0.min(r1).floor().max(0.0);
        let row_max = r0.max(r1).ceil().min(self.height as f64);

        if col_max <= col_min || row_max <= row_min {
            return None;
        }

        Some(PixelWindow {
            col_off: col_min as usize,
            row_off: row_min as usize,
            width: (col_max - col_min) as usize,
            height: (row_max - row_min) as usize,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A clipped band held in memory. "No value" pixels are NaN.
#[derive(Debug, Clone)]
pub struct BandRaster {
    pub band: Band,
    pub width: usize,
    pub height: usize,
    /// Row-major raw digital numbers
    pub data: Vec<f32>,
    pub transform: GeoTransform,
    pub crs: CrsCode,
}

impl BandRaster {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

fn raster_error(band: Band, message: impl Into<String>) -> AgriError {
    AgriError::RasterRead {
        band: band.to_string(),
        message: message.into(),
    }
}

fn open_decoder(path: &Path, band: Band) -> AgriResult<Decoder<BufReader<File>>> {
    let file = File::open(path)
        .map_err(|e| raster_error(band, format!("cannot open {}: {}", path.display(), e)))?;
    Decoder::new(BufReader::new(file))
        .map_err(|e| raster_error(band, format!("TIFF decode error: {}", e)))
}

/// Read size and georeferencing without decoding pixels.
pub fn read_raster_info(path: &Path, band: Band) -> AgriResult<RasterInfo> {
    let mut decoder = open_decoder(path, band)?;
    raster_info(&mut decoder, band)
}

fn raster_info<R: Read + Seek>(decoder: &mut Decoder<R>, band: Band) -> AgriResult<RasterInfo> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| raster_error(band, format!("cannot read dimensions: {}", e)))?;

    let transform = read_geotransform(decoder).ok_or_else(|| {
        raster_error(band, "missing ModelPixelScale/ModelTiepoint georeferencing")
    })?;

    let epsg = read_epsg(decoder).ok_or_else(|| raster_error(band, "missing EPSG GeoKey"))?;
    let crs = CrsCode::from_epsg(epsg).map_err(|e| raster_error(band, e.to_string()))?;

    Ok(RasterInfo {
        width: width as usize,
        height: height as usize,
        transform,
        crs,
    })
}

/// Geotransform from ModelTiepoint + ModelPixelScale, or ModelTransformation.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
            return Some(GeoTransform::new(
                tiepoint[3] - tiepoint[0] * scale[0],
                tiepoint[4] + tiepoint[1] * scale[1],
                scale[0],
                -scale[1],
            ));
        }
    }

    let matrix = decoder
        .get_tag_f64_vec(Tag::ModelTransformationTag)
        .ok()?;
    if matrix.len() >= 8 {
        return Some(GeoTransform::new(matrix[3], matrix[7], matrix[0], matrix[5]));
    }
    None
}

/// EPSG code from the GeoKey directory.
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_geokey_epsg(&keys)
}

/// Find the projected (preferred) or geographic CRS code in a GeoKey
/// directory. Only keys stored inline (location 0) are considered.
pub fn parse_geokey_epsg(keys: &[u16]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries = keys[4..].chunks_exact(4).take(count);

    let mut geographic = None;
    for entry in entries {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_GEO_KEY => return Some(value as u32),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value as u32),
            _ => {}
        }
    }
    geographic
}

/// Read a pixel window of a single-band GeoTIFF as raw values.
pub fn read_window(path: &Path, band: Band, window: PixelWindow) -> AgriResult<BandRaster> {
    let mut decoder = open_decoder(path, band)?;
    let info = raster_info(&mut decoder, band)?;

    if window.col_off + window.width > info.width || window.row_off + window.height > info.height
    {
        return Err(raster_error(
            band,
            format!(
                "window {:?} exceeds raster {}x{}",
                window, info.width, info.height
            ),
        ));
    }

    match decoder.colortype() {
        Ok(ColorType::Gray(_)) => {}
        Ok(other) => {
            return Err(raster_error(
                band,
                format!("unsupported color type {:?}, expected single band", other),
            ))
        }
        Err(e) => return Err(raster_error(band, format!("cannot read color type: {}", e))),
    }

    let mut data = vec![f32::NAN; window.pixel_count()];
    if window.pixel_count() == 0 {
        return Ok(BandRaster {
            band,
            width: window.width,
            height: window.height,
            data,
            transform: info.transform.offset(window.col_off, window.row_off),
            crs: info.crs,
        });
    }

    let (chunk_w, chunk_h) = decoder.chunk_dimensions();
    let (chunk_w, chunk_h) = (chunk_w as usize, chunk_h as usize);
    let chunks_across = (info.width + chunk_w - 1) / chunk_w;

    let col_end = window.col_off + window.width;
    let row_end = window.row_off + window.height;

    for cy in (window.row_off / chunk_h)..=((row_end - 1) / chunk_h) {
        for cx in (window.col_off / chunk_w)..=((col_end - 1) / chunk_w) {
            let index = (cy * chunks_across + cx) as u32;
            let (data_w, data_h) = decoder.chunk_data_dimensions(index);
            let (data_w, data_h) = (data_w as usize, data_h as usize);

            let chunk = decoder
                .read_chunk(index)
                .map_err(|e| raster_error(band, format!("cannot read chunk {}: {}", index, e)))?;
            let values = decoding_result_to_f32(chunk)
                .ok_or_else(|| raster_error(band, "unsupported sample format"))?;

            let x0 = cx * chunk_w;
            let y0 = cy * chunk_h;
            let cols = x0.max(window.col_off)..(x0 + data_w).min(col_end);
            for row in y0.max(window.row_off)..(y0 + data_h).min(row_end) {
                let src = (row - y0) * data_w;
                let dst = (row - window.row_off) * window.width;
                for col in cols.clone() {
                    data[dst + col - window.col_off] = values[src + col - x0];
                }
            }
        }
    }

    Ok(BandRaster {
        band,
        width: window.width,
        height: window.height,
        data,
        transform: info.transform.offset(window.col_off, window.row_off),
        crs: info.crs,
    })
}

fn decoding_result_to_f32(result: DecodingResult) -> Option<Vec<f32>> {
    let values = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(values)
}
