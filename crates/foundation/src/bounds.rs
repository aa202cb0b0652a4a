use crate::geo::LatLng;

/// Geographic bounding box given by its south-west and north-east corners.
///
/// Boxes crossing the antimeridian are not normalized; callers receive the
/// corners exactly as the map reports them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub const fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut out = Self::new(first, first);
        for p in iter {
            out.south_west.lat = out.south_west.lat.min(p.lat);
            out.south_west.lng = out.south_west.lng.min(p.lng);
            out.north_east.lat = out.north_east.lat.max(p.lat);
            out.north_east.lng = out.north_east.lng.max(p.lng);
        }
        Some(out)
    }

    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Grows the box by one full span on every side (3x width, 3x height).
    pub fn expanded_by_span(&self) -> Self {
        let d_lat = self.lat_span();
        let d_lng = self.lng_span();
        Self {
            south_west: LatLng::new(self.south_west.lat - d_lat, self.south_west.lng - d_lng),
            north_east: LatLng::new(self.north_east.lat + d_lat, self.north_east.lng + d_lng),
        }
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
            && p.lng >= self.south_west.lng
            && p.lng <= self.north_east.lng
    }

    pub fn contains_bounds(&self, other: &LatLngBounds) -> bool {
        self.contains(other.south_west) && self.contains(other.north_east)
    }
}

#[cfg(test)]
mod tests {
    use super::LatLngBounds;
    use crate::geo::LatLng;

    fn b(s: f64, w: f64, n: f64, e: f64) -> LatLngBounds {
        LatLngBounds::new(LatLng::new(s, w), LatLng::new(n, e))
    }

    #[test]
    fn expands_by_one_span_each_side() {
        let out = b(10.0, 20.0, 12.0, 25.0).expanded_by_span();
        assert_eq!(out, b(8.0, 15.0, 14.0, 30.0));
    }

    #[test]
    fn from_points_covers_all() {
        let pts = [
            LatLng::new(1.0, 5.0),
            LatLng::new(-2.0, 7.0),
            LatLng::new(3.0, 4.0),
        ];
        assert_eq!(LatLngBounds::from_points(&pts), Some(b(-2.0, 4.0, 3.0, 7.0)));
        assert_eq!(LatLngBounds::from_points(&[]), None);
    }

    #[test]
    fn containment() {
        let outer = b(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains_bounds(&b(1.0, 1.0, 9.0, 9.0)));
        assert!(!outer.contains_bounds(&b(1.0, 1.0, 11.0, 9.0)));
        assert_eq!(outer.center(), LatLng::new(5.0, 5.0));
    }
}
