//! Minimal single-band GeoTIFF writer for band fixtures.
//!
//! Writes 16-bit grayscale rasters with ModelPixelScale, ModelTiepoint and a
//! GeoKey directory naming the EPSG code, which is all the pipeline's
//! reader needs. Striped files go through the `tiff` encoder. Tiled files,
//! laid out like Sentinel-2 COGs with DEFLATE tiles, are assembled by hand
//! because the encoder only writes strips.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use tiff::encoder::colortype::Gray16;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// A north-up, square-pixel band raster to be written as GeoTIFF.
#[derive(Debug, Clone)]
pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    /// Upper-left corner X in CRS units
    pub origin_x: f64,
    /// Upper-left corner Y in CRS units
    pub origin_y: f64,
    pub pixel_size: f64,
    /// 4326 or a WGS84 / UTM code such as 32640
    pub epsg: u16,
    /// Row-major raw values
    pub data: Vec<u16>,
    /// Force multiple strips; `None` lets the encoder choose
    pub rows_per_strip: Option<u32>,
    /// Tile width and height; when set the file is tiled and DEFLATE compressed
    pub tile_size: Option<(u32, u32)>,
}

impl GeoTiffFixture {
    pub fn new(
        width: u32,
        height: u32,
        origin: (f64, f64),
        pixel_size: f64,
        epsg: u16,
        data: Vec<u16>,
    ) -> Self {
        Self {
            width,
            height,
            origin_x: origin.0,
            origin_y: origin.1,
            pixel_size,
            epsg,
            data,
            rows_per_strip: None,
            tile_size: None,
        }
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    /// Write DEFLATE compressed tiles instead of strips. Edge tiles are
    /// zero padded to the full tile size.
    pub fn with_tiles(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_size = Some((tile_width, tile_height));
        self
    }

    fn geokeys(&self) -> Vec<u16> {
        let geographic = self.epsg == 4326;
        let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
        vec![
            1, 1, 0, 3, // version 1.1.0, 3 keys
            1024, 0, 1, model_type, // GTModelTypeGeoKey
            1025, 0, 1, 1, // GTRasterTypeGeoKey = PixelIsArea
            crs_key, 0, 1, self.epsg,
        ]
    }

    /// Write the fixture to `path`.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        match self.tile_size {
            Some((tile_w, tile_h)) => std::fs::write(path, self.tiled_bytes(tile_w, tile_h)?),
            None => self.write_strips(path),
        }
    }

    fn write_strips(&self, path: &Path) -> io::Result<()> {
        let to_io = |e: tiff::TiffError| io::Error::new(io::ErrorKind::Other, e.to_string());

        let file = File::create(path)?;
        let mut encoder = TiffEncoder::new(file).map_err(to_io)?;
        let mut image = encoder
            .new_image::<Gray16>(self.width, self.height)
            .map_err(to_io)?;

        if let Some(rows) = self.rows_per_strip {
            image.rows_per_strip(rows).map_err(to_io)?;
        }

        let scale = [self.pixel_size, self.pixel_size, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(to_io)?;

        let tiepoint = [0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(to_io)?;

        let geokeys = self.geokeys();
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
            .map_err(to_io)?;

        image.write_data(&self.data).map_err(to_io)?;
        Ok(())
    }

    /// Little-endian classic TIFF: header, tile data, out-of-line tag
    /// values, then the single IFD.
    fn tiled_bytes(&self, tile_w: u32, tile_h: u32) -> io::Result<Vec<u8>> {
        let across = (self.width + tile_w - 1) / tile_w;
        let down = (self.height + tile_h - 1) / tile_h;

        let mut buf = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();

        for ty in 0..down {
            for tx in 0..across {
                let mut raw = Vec::with_capacity((tile_w * tile_h * 2) as usize);
                for row in ty * tile_h..(ty + 1) * tile_h {
                    for col in tx * tile_w..(tx + 1) * tile_w {
                        let value = if row < self.height && col < self.width {
                            self.data[(row * self.width + col) as usize]
                        } else {
                            0
                        };
                        raw.extend_from_slice(&value.to_le_bytes());
                    }
                }

                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
                encoder.write_all(&raw)?;
                let compressed = encoder.finish()?;

                offsets.push(buf.len() as u32);
                byte_counts.push(compressed.len() as u32);
                buf.extend_from_slice(&compressed);
                pad_to_word(&mut buf);
            }
        }

        let short = |v: u16| IfdValue::Short(vec![v]);
        let long = |v: u32| IfdValue::Long(vec![v]);
        let entries = [
            (256, long(self.width)),
            (257, long(self.height)),
            (258, short(16)),
            (259, short(8)), // Deflate
            (262, short(1)), // BlackIsZero
            (277, short(1)),
            (284, short(1)),
            (322, long(tile_w)),
            (323, long(tile_h)),
            (324, IfdValue::Long(offsets)),
            (325, IfdValue::Long(byte_counts)),
            (339, short(1)), // unsigned integer samples
            (33550, IfdValue::Double(vec![self.pixel_size, self.pixel_size, 0.0])),
            (
                33922,
                IfdValue::Double(vec![0.0, 0.0, 0.0, self.origin_x, self.origin_y, 0.0]),
            ),
            (34735, IfdValue::Short(self.geokeys())),
        ];

        // Values over four bytes live outside the IFD entry
        let mut fields = Vec::with_capacity(entries.len());
        for (tag, value) in &entries {
            let bytes = value.to_le_bytes();
            let slot = if bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                inline
            } else {
                let offset = buf.len() as u32;
                buf.extend_from_slice(&bytes);
                pad_to_word(&mut buf);
                offset.to_le_bytes()
            };
            fields.push((*tag, value.type_id(), value.count(), slot));
        }

        let ifd_offset = buf.len() as u32;
        buf[4..8].copy_from_slice(&ifd_offset.to_le_bytes());
        buf.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for (tag, type_id, count, slot) in fields {
            buf.extend_from_slice(&(tag as u16).to_le_bytes());
            buf.extend_from_slice(&type_id.to_le_bytes());
            buf.extend_from_slice(&count.to_le_bytes());
            buf.extend_from_slice(&slot);
        }
        buf.extend_from_slice(&0u32.to_le_bytes());

        Ok(buf)
    }
}

enum IfdValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Double(Vec<f64>),
}

impl IfdValue {
    fn type_id(&self) -> u16 {
        match self {
            IfdValue::Short(_) => 3,
            IfdValue::Long(_) => 4,
            IfdValue::Double(_) => 12,
        }
    }

    fn count(&self) -> u32 {
        match self {
            IfdValue::Short(v) => v.len() as u32,
            IfdValue::Long(v) => v.len() as u32,
            IfdValue::Double(v) => v.len() as u32,
        }
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            IfdValue::Short(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            IfdValue::Long(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            IfdValue::Double(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

fn pad_to_word(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.push(0);
    }
}
