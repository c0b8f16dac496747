//! GDAL virtual raster (VRT) descriptors
//!
//! In-memory model of the subset of the VRT format the mosaic builder
//! produces: a north-up dataset whose bands each draw from one or more
//! source rasters through source/destination rectangles. Written and
//! parsed with `quick-xml`.

use lazy_static::lazy_static;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use regex::Regex;
use std::fs;
use std::path::Path;

use crate::coordinate::{CoordinateSystem, GeoTransform};
use crate::tiff::errors::{TiffError, TiffResult};

lazy_static! {
    static ref EPSG_AUTHORITY: Regex = Regex::new(r#"AUTHORITY\["EPSG","(\d+)"\]\]\s*$"#)
        .expect("static regex");
    static ref EPSG_CODE: Regex = Regex::new(r"^\s*EPSG:(\d+)\s*$").expect("static regex");
}

/// Pixel rectangle, fractional offsets allowed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x_off: f64,
    pub y_off: f64,
    pub x_size: f64,
    pub y_size: f64,
}

impl PixelRect {
    pub fn new(x_off: f64, y_off: f64, x_size: f64, y_size: f64) -> Self {
        PixelRect { x_off, y_off, x_size, y_size }
    }

    /// Whether a fractional pixel position falls inside the rectangle
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_off && x < self.x_off + self.x_size && y >= self.y_off && y < self.y_off + self.y_size
    }
}

/// One source contributing to a VRT band
#[derive(Debug, Clone, PartialEq)]
pub struct VrtSource {
    /// Source reference (`/vsicurl/` URL or local path)
    pub filename: String,
    /// 1-based band of the source
    pub source_band: usize,
    /// Size of the source raster in pixels
    pub raster_size: (u32, u32),
    pub data_type: String,
    pub src_rect: PixelRect,
    pub dst_rect: PixelRect,
}

impl VrtSource {
    /// Map a fractional VRT pixel position into source pixel space
    pub fn to_source_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !self.dst_rect.contains(x, y) || self.dst_rect.x_size == 0.0 || self.dst_rect.y_size == 0.0 {
            return None;
        }
        let sx = self.src_rect.x_off + (x - self.dst_rect.x_off) * self.src_rect.x_size / self.dst_rect.x_size;
        let sy = self.src_rect.y_off + (y - self.dst_rect.y_off) * self.src_rect.y_size / self.dst_rect.y_size;
        Some((sx, sy))
    }
}

/// A VRT raster band
#[derive(Debug, Clone, PartialEq)]
pub struct VrtBand {
    /// 1-based band number
    pub band: usize,
    pub data_type: String,
    pub nodata: Option<f64>,
    pub sources: Vec<VrtSource>,
}

/// A VRT dataset
#[derive(Debug, Clone, PartialEq)]
pub struct VrtDataset {
    pub width: u32,
    pub height: u32,
    pub epsg: u32,
    pub geotransform: GeoTransform,
    pub bands: Vec<VrtBand>,
}

fn xml_error<E: std::fmt::Display>(error: E) -> TiffError {
    TiffError::InvalidVrt(error.to_string())
}

impl VrtDataset {
    /// Serialize to VRT XML
    pub fn to_xml(&self) -> TiffResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let w = &mut writer;

        let width = self.width.to_string();
        let height = self.height.to_string();
        w.write_event(Event::Start(
            BytesStart::new("VRTDataset")
                .with_attributes([("rasterXSize", width.as_str()), ("rasterYSize", height.as_str())]),
        )).map_err(xml_error)?;

        let wkt = CoordinateSystem::from_epsg(self.epsg).to_wkt();
        w.write_event(Event::Start(BytesStart::new("SRS").with_attributes([("dataAxisToSRSAxisMapping", "1,2")])))
            .map_err(xml_error)?;
        w.write_event(Event::Text(BytesText::new(&wkt))).map_err(xml_error)?;
        w.write_event(Event::End(BytesEnd::new("SRS"))).map_err(xml_error)?;

        let gt = self.geotransform.to_array();
        let gt_text = gt.iter()
            .map(|v| format!("{:.16e}", v))
            .collect::<Vec<_>>()
            .join(", ");
        write_text_element(w, "GeoTransform", &gt_text)?;

        for band in &self.bands {
            let number = band.band.to_string();
            w.write_event(Event::Start(
                BytesStart::new("VRTRasterBand")
                    .with_attributes([("dataType", band.data_type.as_str()), ("band", number.as_str())]),
            )).map_err(xml_error)?;

            if let Some(nodata) = band.nodata {
                write_text_element(w, "NoDataValue", &nodata.to_string())?;
            }

            for source in &band.sources {
                w.write_event(Event::Start(BytesStart::new("SimpleSource"))).map_err(xml_error)?;
                w.write_event(Event::Start(
                    BytesStart::new("SourceFilename").with_attributes([("relativeToVRT", "0")]),
                )).map_err(xml_error)?;
                w.write_event(Event::Text(BytesText::new(&source.filename))).map_err(xml_error)?;
                w.write_event(Event::End(BytesEnd::new("SourceFilename"))).map_err(xml_error)?;
                write_text_element(w, "SourceBand", &source.source_band.to_string())?;

                let (sw, sh) = (source.raster_size.0.to_string(), source.raster_size.1.to_string());
                w.write_event(Event::Empty(BytesStart::new("SourceProperties").with_attributes([
                    ("RasterXSize", sw.as_str()),
                    ("RasterYSize", sh.as_str()),
                    ("DataType", source.data_type.as_str()),
                ]))).map_err(xml_error)?;
                write_rect(w, "SrcRect", &source.src_rect)?;
                write_rect(w, "DstRect", &source.dst_rect)?;
                w.write_event(Event::End(BytesEnd::new("SimpleSource"))).map_err(xml_error)?;
            }

            w.write_event(Event::End(BytesEnd::new("VRTRasterBand"))).map_err(xml_error)?;
        }

        w.write_event(Event::End(BytesEnd::new("VRTDataset"))).map_err(xml_error)?;

        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    /// Parse VRT XML
    pub fn from_xml(xml: &str) -> TiffResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut width = None;
        let mut height = None;
        let mut epsg = None;
        let mut geotransform = None;
        let mut bands: Vec<VrtBand> = Vec::new();
        let mut source: Option<VrtSource> = None;
        let mut current_element = String::new();

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let attrs = attributes(e)?;
                    match name.as_str() {
                        "VRTDataset" => {
                            width = Some(parse_attr::<u32>(&attrs, "rasterXSize")?);
                            height = Some(parse_attr::<u32>(&attrs, "rasterYSize")?);
                        }
                        "VRTRasterBand" => {
                            bands.push(VrtBand {
                                band: parse_attr::<usize>(&attrs, "band").unwrap_or(bands.len() + 1),
                                data_type: attr(&attrs, "dataType").unwrap_or("Byte").to_string(),
                                nodata: None,
                                sources: Vec::new(),
                            });
                        }
                        "SimpleSource" | "ComplexSource" => {
                            source = Some(VrtSource {
                                filename: String::new(),
                                source_band: 1,
                                raster_size: (0, 0),
                                data_type: "Byte".to_string(),
                                src_rect: PixelRect::new(0.0, 0.0, 0.0, 0.0),
                                dst_rect: PixelRect::new(0.0, 0.0, 0.0, 0.0),
                            });
                        }
                        "SourceProperties" => {
                            if let Some(s) = source.as_mut() {
                                s.raster_size = (
                                    parse_attr::<u32>(&attrs, "RasterXSize")?,
                                    parse_attr::<u32>(&attrs, "RasterYSize")?,
                                );
                                s.data_type = attr(&attrs, "DataType").unwrap_or("Byte").to_string();
                            }
                        }
                        "SrcRect" | "DstRect" => {
                            let rect = parse_rect(&attrs)?;
                            if let Some(s) = source.as_mut() {
                                if name == "SrcRect" { s.src_rect = rect } else { s.dst_rect = rect }
                            }
                        }
                        _ => {}
                    }
                    current_element = name;
                }
                Event::Text(ref t) => {
                    let text = t.unescape().map_err(xml_error)?.into_owned();
                    match current_element.as_str() {
                        "SRS" => epsg = Some(parse_srs(&text)?),
                        "GeoTransform" => geotransform = Some(parse_geotransform(&text)?),
                        "NoDataValue" => {
                            if let Some(band) = bands.last_mut() {
                                band.nodata = text.trim().parse::<f64>().ok();
                            }
                        }
                        "SourceFilename" => {
                            if let Some(s) = source.as_mut() {
                                s.filename = text;
                            }
                        }
                        "SourceBand" => {
                            if let Some(s) = source.as_mut() {
                                s.source_band = text.trim().parse::<usize>().map_err(xml_error)?;
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let name = e.name();
                    if matches!(name.as_ref(), b"SimpleSource" | b"ComplexSource") {
                        if let (Some(s), Some(band)) = (source.take(), bands.last_mut()) {
                            band.sources.push(s);
                        }
                    }
                    current_element.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let width = width.ok_or_else(|| TiffError::InvalidVrt("Missing VRTDataset element".to_string()))?;
        let height = height.ok_or_else(|| TiffError::InvalidVrt("Missing VRTDataset element".to_string()))?;
        let epsg = epsg.ok_or_else(|| TiffError::InvalidVrt("Missing SRS".to_string()))?;
        let geotransform = geotransform.ok_or_else(|| TiffError::InvalidVrt("Missing GeoTransform".to_string()))?;
        if bands.is_empty() {
            return Err(TiffError::InvalidVrt("VRT has no bands".to_string()));
        }

        Ok(VrtDataset { width, height, epsg, geotransform, bands })
    }

    /// Write the descriptor to a file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> TiffResult<()> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// Read a descriptor from a file
    pub fn read<P: AsRef<Path>>(path: P) -> TiffResult<Self> {
        let xml = fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    /// Band by 0-based index
    pub fn band(&self, index: usize) -> Option<&VrtBand> {
        self.bands.get(index)
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> TiffResult<()> {
    writer.write_event(Event::Start(BytesStart::new(name))).map_err(xml_error)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(xml_error)?;
    Ok(())
}

fn write_rect(writer: &mut Writer<Vec<u8>>, name: &str, rect: &PixelRect) -> TiffResult<()> {
    let values = [rect.x_off, rect.y_off, rect.x_size, rect.y_size].map(|v| v.to_string());
    writer.write_event(Event::Empty(BytesStart::new(name).with_attributes([
        ("xOff", values[0].as_str()),
        ("yOff", values[1].as_str()),
        ("xSize", values[2].as_str()),
        ("ySize", values[3].as_str()),
    ]))).map_err(xml_error)?;
    Ok(())
}

fn attributes(element: &BytesStart) -> TiffResult<Vec<(String, String)>> {
    element.attributes()
        .map(|attribute| {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

fn parse_attr<T: std::str::FromStr>(attrs: &[(String, String)], name: &str) -> TiffResult<T> {
    attr(attrs, name)
        .ok_or_else(|| TiffError::InvalidVrt(format!("Missing attribute {}", name)))?
        .trim()
        .parse::<T>()
        .map_err(|_| TiffError::InvalidVrt(format!("Invalid value for attribute {}", name)))
}

fn parse_rect(attrs: &[(String, String)]) -> TiffResult<PixelRect> {
    Ok(PixelRect::new(
        parse_attr(attrs, "xOff")?,
        parse_attr(attrs, "yOff")?,
        parse_attr(attrs, "xSize")?,
        parse_attr(attrs, "ySize")?,
    ))
}

/// EPSG code of an SRS given as WKT with a top-level authority or `EPSG:n`
fn parse_srs(text: &str) -> TiffResult<u32> {
    EPSG_AUTHORITY.captures(text)
        .or_else(|| EPSG_CODE.captures(text))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .ok_or_else(|| TiffError::InvalidVrt(format!("Unsupported SRS: {}", text)))
}

fn parse_geotransform(text: &str) -> TiffResult<GeoTransform> {
    let values = text.split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(xml_error)?;
    let gt: [f64; 6] = values.try_into()
        .map_err(|_| TiffError::InvalidVrt(format!("GeoTransform needs 6 values: {}", text)))?;
    Ok(GeoTransform::from_array(gt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, dst_x: f64) -> VrtSource {
        VrtSource {
            filename: name.to_string(),
            source_band: 1,
            raster_size: (100, 100),
            data_type: "UInt16".to_string(),
            src_rect: PixelRect::new(0.0, 0.0, 100.0, 100.0),
            dst_rect: PixelRect::new(dst_x, 0.0, 50.0, 50.0),
        }
    }

    fn dataset() -> VrtDataset {
        let names = ["/vsicurl/https://example.com/B11.tif?a=1&b=2", "/data/B8A.tif", "/data/B04.tif"];
        VrtDataset {
            width: 60,
            height: 50,
            epsg: 32654,
            geotransform: GeoTransform::north_up(300000.0, 4000000.0, 20.0, 20.0),
            bands: names.iter().enumerate()
                .map(|(i, name)| VrtBand {
                    band: i + 1,
                    data_type: "UInt16".to_string(),
                    nodata: if i == 0 { Some(0.0) } else { None },
                    sources: vec![source(name, i as f64 * 5.0)],
                })
                .collect(),
        }
    }

    #[test]
    fn test_xml_round_trip_keeps_band_order() {
        let vrt = dataset();
        let xml = vrt.to_xml().unwrap();
        assert!(xml.contains("<VRTDataset rasterXSize=\"60\" rasterYSize=\"50\">"));
        assert!(xml.contains("&amp;b=2"));

        let parsed = VrtDataset::from_xml(&xml).unwrap();
        assert_eq!(parsed, vrt);
        assert_eq!(parsed.band(1).unwrap().sources[0].filename, "/data/B8A.tif");
    }

    #[test]
    fn test_parse_gdal_style_descriptor() {
        let xml = r#"<VRTDataset rasterXSize="10" rasterYSize="20">
  <SRS>EPSG:32733</SRS>
  <GeoTransform>  5.0e+05,  1.0e+01,  0.0e+00,  8.0e+06,  0.0e+00, -1.0e+01</GeoTransform>
  <VRTRasterBand dataType="Byte" band="1">
    <ComplexSource>
      <SourceFilename relativeToVRT="0">a.tif</SourceFilename>
      <SourceBand>2</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="10" ySize="20"/>
      <DstRect xOff="0" yOff="0" xSize="10" ySize="20"/>
    </ComplexSource>
  </VRTRasterBand>
</VRTDataset>"#;
        let vrt = VrtDataset::from_xml(xml).unwrap();
        assert_eq!(vrt.epsg, 32733);
        assert_eq!(vrt.geotransform.pixel_height, -10.0);
        assert_eq!(vrt.bands[0].sources[0].source_band, 2);
    }

    #[test]
    fn test_source_pixel_mapping() {
        // 100 source pixels squeezed into 50 VRT pixels starting at column 5
        let s = source("a.tif", 5.0);
        assert_eq!(s.to_source_pixel(5.0, 0.0), Some((0.0, 0.0)));
        assert_eq!(s.to_source_pixel(10.25, 2.5), Some((10.5, 5.0)));
        assert_eq!(s.to_source_pixel(4.9, 0.0), None);
        assert_eq!(s.to_source_pixel(55.0, 0.0), None);
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(VrtDataset::from_xml("<VRTDataset rasterXSize=\"1\"/>").is_err());
        assert!(VrtDataset::from_xml("<VRTDataset rasterXSize=\"1\" rasterYSize=\"1\"><SRS>LOCAL_CS[\"x\"]</SRS></VRTDataset>").is_err());
    }
}
