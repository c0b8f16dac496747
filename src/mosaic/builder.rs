//! Mosaic construction
//!
//! Builds a VRT over the band assets of one scene. A single asset is passed
//! through with all of its bands; several assets are stacked as separate
//! bands in the order given. The descriptor lives in a temporary file owned
//! by the returned `Mosaic`.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::coordinate::{BoundingBox, GeoTransform};
use crate::error::{ChipError, ChipResult};
use crate::io::source::{SourceLocation, SourceOpener};
use crate::raster::{GeoRaster, Region};

use super::vrt::{PixelRect, VrtBand, VrtDataset, VrtSource};

/// North-up sampling grid in the mosaic's coordinate system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGrid {
    /// Upper-left corner
    pub origin_x: f64,
    pub origin_y: f64,
    /// Ground size of one output pixel
    pub x_res: f64,
    pub y_res: f64,
    pub width: u32,
    pub height: u32,
}

impl SampleGrid {
    /// Map coordinates of the centre of an output pixel
    pub fn pixel_center(&self, col: u32, row: u32) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.x_res,
            self.origin_y - (row as f64 + 0.5) * self.y_res,
        )
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin_x,
            self.origin_y - self.height as f64 * self.y_res,
            self.origin_x + self.width as f64 * self.x_res,
            self.origin_y,
        )
    }
}

/// A VRT mosaic backed by a descriptor file
///
/// Mosaics made by `MosaicBuilder` own a temporary descriptor that is
/// deleted when the mosaic is dropped.
pub struct Mosaic {
    dataset: VrtDataset,
    path: PathBuf,
    _file: Option<NamedTempFile>,
    opener: SourceOpener,
    rasters: Mutex<HashMap<String, Arc<GeoRaster>>>,
}

impl Mosaic {
    /// Open an existing VRT descriptor
    pub fn open<P: AsRef<Path>>(path: P, opener: SourceOpener) -> ChipResult<Self> {
        let dataset = VrtDataset::read(path.as_ref())?;
        debug!("Opened VRT {} with {} bands", path.as_ref().display(), dataset.bands.len());
        Ok(Mosaic {
            dataset,
            path: path.as_ref().to_path_buf(),
            _file: None,
            opener,
            rasters: Mutex::new(HashMap::new()),
        })
    }

    pub fn dataset(&self) -> &VrtDataset {
        &self.dataset
    }

    /// Path of the descriptor file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn epsg(&self) -> u32 {
        self.dataset.epsg
    }

    pub fn band_count(&self) -> usize {
        self.dataset.bands.len()
    }

    pub fn geotransform(&self) -> GeoTransform {
        self.dataset.geotransform
    }

    /// Extent in map coordinates
    pub fn bounds(&self) -> BoundingBox {
        self.dataset.geotransform.bounds(self.dataset.width as u64, self.dataset.height as u64)
    }

    /// Source filenames of every band, in band order
    pub fn band_sources(&self) -> Vec<Vec<String>> {
        self.dataset.bands.iter()
            .map(|band| band.sources.iter().map(|s| s.filename.clone()).collect())
            .collect()
    }

    fn raster(&self, filename: &str) -> ChipResult<Arc<GeoRaster>> {
        let mut rasters = self.rasters.lock()
            .map_err(|_| ChipError::Mosaic("Raster cache lock poisoned".to_string()))?;
        if let Some(raster) = rasters.get(filename) {
            return Ok(Arc::clone(raster));
        }
        let raster = Arc::new(GeoRaster::open(&SourceLocation::parse(filename), &self.opener)?);
        rasters.insert(filename.to_string(), Arc::clone(&raster));
        Ok(raster)
    }

    /// Nearest-neighbour samples of one band (0-based) at the grid's pixel
    /// centres
    ///
    /// Pixels outside the mosaic, or on a source's nodata value, are `None`.
    pub fn sample_band(&self, band: usize, grid: &SampleGrid) -> ChipResult<Vec<Option<f64>>> {
        let vrt_band = self.dataset.band(band)
            .ok_or_else(|| ChipError::Mosaic(format!("Band {} not in mosaic", band + 1)))?;
        let gt = &self.dataset.geotransform;
        let mut out = vec![None; grid.width as usize * grid.height as usize];

        // Position of every output pixel centre in VRT pixel space
        let mut vrt_pixels = Vec::with_capacity(out.len());
        for row in 0..grid.height {
            for col in 0..grid.width {
                let (x, y) = grid.pixel_center(col, row);
                let pixel = gt.world_to_pixel(x, y)
                    .filter(|&(px, py)| {
                        px >= 0.0 && py >= 0.0
                            && px < self.dataset.width as f64 && py < self.dataset.height as f64
                    });
                vrt_pixels.push(pixel);
            }
        }

        for source in &vrt_band.sources {
            let raster = self.raster(&source.filename)?;
            let (src_w, src_h) = (raster.width(), raster.height());

            let mut hits = Vec::new();
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
            for (index, pixel) in vrt_pixels.iter().enumerate() {
                let Some((px, py)) = *pixel else { continue };
                let Some((sx, sy)) = source.to_source_pixel(px, py) else { continue };
                if sx < 0.0 || sy < 0.0 {
                    continue;
                }
                let (sx, sy) = (sx.floor() as u32, sy.floor() as u32);
                if sx >= src_w || sy >= src_h {
                    continue;
                }
                min_x = min_x.min(sx);
                min_y = min_y.min(sy);
                max_x = max_x.max(sx);
                max_y = max_y.max(sy);
                hits.push((index, sx, sy));
            }

            if hits.is_empty() {
                debug!("Source {} does not cover the sampling grid", source.filename);
                continue;
            }

            let region = Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
            let window = raster.read_window(source.source_band - 1, region)?;
            let nodata = vrt_band.nodata.or(raster.nodata());

            for (index, sx, sy) in hits {
                if let Some(value) = window.get_absolute(sx, sy) {
                    if nodata != Some(value) && value.is_finite() {
                        out[index] = Some(value);
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Builds mosaics from band asset references
#[derive(Clone)]
pub struct MosaicBuilder {
    opener: SourceOpener,
}

impl MosaicBuilder {
    pub fn new(opener: SourceOpener) -> Self {
        MosaicBuilder { opener }
    }

    /// Build a mosaic over the given band assets
    ///
    /// One reference is passed through with all its bands. Several
    /// references become separate bands, band i taken from band 1 of
    /// reference i. Sources are opened to read their georeferencing, so
    /// unreachable assets fail here.
    pub fn build(&self, band_asset_urls: &[String]) -> ChipResult<Mosaic> {
        if band_asset_urls.is_empty() {
            return Err(ChipError::Mosaic("No band assets supplied".to_string()));
        }

        let separate = band_asset_urls.len() > 1;
        info!("Building VRT over {} source(s){}", band_asset_urls.len(),
              if separate { " as separate bands" } else { "" });

        let mut rasters = Vec::with_capacity(band_asset_urls.len());
        for url in band_asset_urls {
            let location = SourceLocation::parse(url);
            let raster = GeoRaster::open(&location, &self.opener)?;
            rasters.push((location.to_reference(), Arc::new(raster)));
        }

        let dataset = describe(&rasters, separate)?;

        let mut file = tempfile::Builder::new()
            .prefix("chipkit-")
            .suffix(".vrt")
            .tempfile()?;
        file.write_all(dataset.to_xml()?.as_bytes())?;
        file.flush()?;
        debug!("Wrote VRT descriptor {}", file.path().display());

        Ok(Mosaic {
            dataset,
            path: file.path().to_path_buf(),
            _file: Some(file),
            opener: self.opener.clone(),
            rasters: Mutex::new(rasters.into_iter().collect()),
        })
    }
}

/// Build a mosaic with a fresh builder
pub fn build_mosaic(band_asset_urls: &[String], opener: &SourceOpener) -> ChipResult<Mosaic> {
    MosaicBuilder::new(opener.clone()).build(band_asset_urls)
}

/// VRT description of the given sources: union extent at average resolution
fn describe(rasters: &[(String, Arc<GeoRaster>)], separate: bool) -> ChipResult<VrtDataset> {
    let epsg = rasters[0].1.epsg();
    let mut extent: Option<BoundingBox> = None;
    let (mut sum_x_res, mut sum_y_res) = (0.0, 0.0);

    for (reference, raster) in rasters {
        if raster.epsg() != epsg {
            return Err(ChipError::Mosaic(format!(
                "{} is in EPSG:{}, expected EPSG:{}", reference, raster.epsg(), epsg
            )));
        }
        let gt = raster.geotransform();
        if !gt.is_north_up() {
            return Err(ChipError::Mosaic(format!("{} has a rotated geotransform", reference)));
        }
        sum_x_res += gt.pixel_width.abs();
        sum_y_res += gt.pixel_height.abs();
        let bounds = raster.bounds();
        extent = Some(extent.map_or(bounds, |e| e.union(&bounds)));
    }

    let extent = extent.ok_or_else(|| ChipError::Mosaic("No sources".to_string()))?;
    let x_res = sum_x_res / rasters.len() as f64;
    let y_res = sum_y_res / rasters.len() as f64;
    let width = (extent.width() / x_res).round().max(1.0) as u32;
    let height = (extent.height() / y_res).round().max(1.0) as u32;
    let geotransform = GeoTransform::north_up(extent.min_x, extent.max_y, x_res, y_res);

    let source_for = |reference: &str, raster: &GeoRaster, band: usize| {
        let bounds = raster.bounds();
        VrtSource {
            filename: reference.to_string(),
            source_band: band,
            raster_size: (raster.width(), raster.height()),
            data_type: raster.data_type_name().to_string(),
            src_rect: PixelRect::new(0.0, 0.0, raster.width() as f64, raster.height() as f64),
            dst_rect: PixelRect::new(
                (bounds.min_x - extent.min_x) / x_res,
                (extent.max_y - bounds.max_y) / y_res,
                bounds.width() / x_res,
                bounds.height() / y_res,
            ),
        }
    };

    let bands = if separate {
        rasters.iter().enumerate()
            .map(|(index, (reference, raster))| {
                if raster.band_count() > 1 {
                    warn!("{} has {} bands, only band 1 is used", reference, raster.band_count());
                }
                VrtBand {
                    band: index + 1,
                    data_type: raster.data_type_name().to_string(),
                    nodata: raster.nodata(),
                    sources: vec![source_for(reference, raster, 1)],
                }
            })
            .collect()
    } else {
        let (reference, raster) = &rasters[0];
        (1..=raster.band_count())
            .map(|band| VrtBand {
                band,
                data_type: raster.data_type_name().to_string(),
                nodata: raster.nodata(),
                sources: vec![source_for(reference, raster, band)],
            })
            .collect()
    };

    debug!("VRT {}x{} at {}x{} map units, EPSG:{}", width, height, x_res, y_res, epsg);
    Ok(VrtDataset { width, height, epsg, geotransform, bands })
}
