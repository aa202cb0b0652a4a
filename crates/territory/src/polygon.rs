//! Polygon vertex paths and their wire form.
//!
//! A `PolygonPath` holds the vertices as the map reports them, open or closed.
//! Serialization rounds every coordinate to 7 decimals and then closes the
//! ring, so every geometry that leaves the process satisfies first == last.

use foundation::bounds::LatLngBounds;
use foundation::geo::LatLng;
use streaming::protocol::Geometry;

use crate::error::ValidationError;

pub const MIN_VERTICES: usize = 3;
pub const COORDINATE_DECIMALS: i32 = 7;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonPath {
    vertices: Vec<LatLng>,
}

impl PolygonPath {
    pub fn new(vertices: Vec<LatLng>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Distinct corners: a trailing copy of the first vertex is not counted.
    pub fn vertex_count(&self) -> usize {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) if self.vertices.len() > 1 && first == last => {
                self.vertices.len() - 1
            }
            _ => self.vertices.len(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(index) = self.vertices.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteVertex { index });
        }
        let found = self.vertex_count();
        if found < MIN_VERTICES {
            return Err(ValidationError::TooFewVertices { found });
        }
        Ok(())
    }

    /// Closed, rounded `Polygon` geometry in `[lng, lat]` order.
    pub fn to_geometry(&self) -> Result<Geometry, ValidationError> {
        self.validate()?;
        let mut ring: Vec<[f64; 2]> = self
            .vertices
            .iter()
            .map(|v| v.rounded(COORDINATE_DECIMALS).to_lng_lat())
            .collect();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        Ok(Geometry::polygon(ring))
    }

    /// Outer ring of `geometry` without its closing vertex.
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let mut vertices: Vec<LatLng> = geometry
            .outer_ring()
            .iter()
            .map(|pair| LatLng::from_lng_lat(*pair))
            .collect();
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    /// Parses `POLYGON((lng lat, lng lat, ...))`. Inner rings are ignored.
    pub fn parse_wkt(wkt: &str) -> Result<Self, ValidationError> {
        let text = wkt.trim();
        let text = match text.split_once(';') {
            Some((srid, rest)) if srid.trim_start().to_ascii_uppercase().starts_with("SRID=") => {
                rest.trim()
            }
            _ => text,
        };
        let Some(keyword_end) = text.find('(') else {
            return Err(ValidationError::InvalidWkt("missing coordinates".into()));
        };
        if !text[..keyword_end].trim().eq_ignore_ascii_case("POLYGON") {
            return Err(ValidationError::InvalidWkt(format!(
                "expected POLYGON, found {}",
                text[..keyword_end].trim()
            )));
        }

        let body = text[keyword_end..].trim_start_matches(|c: char| c == '(' || c.is_whitespace());
        let outer = match body.find(')') {
            Some(end) => &body[..end],
            None => return Err(ValidationError::InvalidWkt("unterminated ring".into())),
        };

        let mut vertices = Vec::new();
        for pair in outer.split(',') {
            let mut parts = pair.split_whitespace();
            let (Some(lng), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(ValidationError::InvalidWkt(format!("bad coordinate pair `{}`", pair.trim())));
            };
            let (Ok(lng), Ok(lat)) = (lng.parse::<f64>(), lat.parse::<f64>()) else {
                return Err(ValidationError::InvalidWkt(format!("bad coordinate pair `{}`", pair.trim())));
            };
            vertices.push(LatLng::new(lat, lng));
        }
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        let path = Self { vertices };
        path.validate()?;
        Ok(path)
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::from_points(self.vertices.iter().filter(|v| v.is_finite()))
    }

    pub fn set_vertex(&mut self, index: usize, vertex: LatLng) -> bool {
        match self.vertices.get_mut(index) {
            Some(slot) => {
                *slot = vertex;
                true
            }
            None => false,
        }
    }

    pub fn insert_vertex(&mut self, index: usize, vertex: LatLng) -> bool {
        if index > self.vertices.len() {
            return false;
        }
        self.vertices.insert(index, vertex);
        true
    }

    pub fn remove_vertex(&mut self, index: usize) -> Option<LatLng> {
        (index < self.vertices.len()).then(|| self.vertices.remove(index))
    }
}
