//! Coordinate Reference System handling

/// Identifier for the coordinate systems the pipeline can work in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// WGS 84 (EPSG:4326)
    WGS84,
    /// Web Mercator (EPSG:3857)
    WebMercator,
    /// WGS 84 UTM zone (EPSG:326xx for northern hemisphere, 327xx for southern)
    UTM(u8, bool),
    /// Other EPSG code
    Other(u32),
}

impl CoordinateSystem {
    /// Create a coordinate system from an EPSG code
    pub fn from_epsg(epsg: u32) -> Self {
        match epsg {
            4326 => CoordinateSystem::WGS84,
            3857 | 900913 => CoordinateSystem::WebMercator,
            32601..=32660 => CoordinateSystem::UTM((epsg - 32600) as u8, true),
            32701..=32760 => CoordinateSystem::UTM((epsg - 32700) as u8, false),
            _ => CoordinateSystem::Other(epsg),
        }
    }

    /// Get the EPSG code for this coordinate system
    pub fn epsg_code(&self) -> u32 {
        match self {
            CoordinateSystem::WGS84 => 4326,
            CoordinateSystem::WebMercator => 3857,
            CoordinateSystem::UTM(zone, true) => 32600 + *zone as u32,
            CoordinateSystem::UTM(zone, false) => 32700 + *zone as u32,
            CoordinateSystem::Other(code) => *code,
        }
    }

    /// Get a description of this coordinate system
    pub fn description(&self) -> String {
        match self {
            CoordinateSystem::WGS84 => "WGS 84 (EPSG:4326)".to_string(),
            CoordinateSystem::WebMercator => "Web Mercator (EPSG:3857)".to_string(),
            CoordinateSystem::UTM(zone, is_northern) => format!(
                "WGS 84 / UTM zone {}{} (EPSG:{})",
                zone,
                if *is_northern { "N" } else { "S" },
                self.epsg_code()
            ),
            CoordinateSystem::Other(code) => format!("EPSG:{}", code),
        }
    }

    /// Minimal OGC WKT for the `.aux.xml` sidecar
    pub fn to_wkt(&self) -> String {
        const GEOGCS: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]";
        match self {
            CoordinateSystem::WGS84 => GEOGCS.to_string(),
            CoordinateSystem::WebMercator => format!(
                "PROJCS[\"WGS 84 / Pseudo-Mercator\",{},PROJECTION[\"Mercator_1SP\"],PARAMETER[\"central_meridian\",0],PARAMETER[\"scale_factor\",1],PARAMETER[\"false_easting\",0],PARAMETER[\"false_northing\",0],UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]],AUTHORITY[\"EPSG\",\"3857\"]]",
                GEOGCS
            ),
            CoordinateSystem::UTM(zone, is_northern) => format!(
                "PROJCS[\"WGS 84 / UTM zone {}{}\",{},PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"latitude_of_origin\",0],PARAMETER[\"central_meridian\",{}],PARAMETER[\"scale_factor\",0.9996],PARAMETER[\"false_easting\",500000],PARAMETER[\"false_northing\",{}],UNIT[\"metre\",1,AUTHORITY[\"EPSG\",\"9001\"]],AUTHORITY[\"EPSG\",\"{}\"]]",
                zone,
                if *is_northern { "N" } else { "S" },
                GEOGCS,
                utm_central_meridian(*zone),
                if *is_northern { 0 } else { 10_000_000 },
                self.epsg_code()
            ),
            CoordinateSystem::Other(code) => format!("EPSG:{}", code),
        }
    }
}

/// Central meridian of a UTM zone, in degrees
fn utm_central_meridian(zone: u8) -> i32 {
    (zone as i32 - 1) * 6 - 177
}
