use streaming::protocol::LeadStatus;

pub const CLUSTER_MIN_SCALE_PX: f64 = 20.0;
pub const CLUSTER_MAX_SCALE_PX: f64 = 50.0;
/// Counts are normalized over `1..=1000`; larger clusters get the max scale.
pub const CLUSTER_COUNT_RANGE: f64 = 999.0;
pub const CLUSTER_FILL: &str = "#007bff";

pub const STATUS_FALLBACK_COLOR: &str = "#007bff";

pub const DEFAULT_TERRITORY_COLOR: &str = "#FF0000";
pub const ASSIGN_POLYGON_COLOR: &str = "#FF9800";

/// Marker radius for a cluster of `count` points.
pub fn cluster_scale(count: u64) -> f64 {
    let normalized = ((count as f64 - 1.0) / CLUSTER_COUNT_RANGE).clamp(0.0, 1.0);
    CLUSTER_MIN_SCALE_PX + normalized * (CLUSTER_MAX_SCALE_PX - CLUSTER_MIN_SCALE_PX)
}

pub fn status_color(status: Option<LeadStatus>) -> &'static str {
    match status {
        Some(LeadStatus::New) => "#6A0DAD",
        Some(LeadStatus::Gone) => "#FFD700",
        Some(LeadStatus::Later) => "#1E90FF",
        Some(LeadStatus::Nope) => "#FF6347",
        Some(LeadStatus::Sold) => "#32CD32",
        Some(LeadStatus::Return) => "#00008B",
        None => STATUS_FALLBACK_COLOR,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonStyle {
    pub fill_color: String,
    pub fill_opacity: f32,
    pub stroke_color: String,
    pub stroke_opacity: f32,
    pub stroke_weight: f32,
}

impl PolygonStyle {
    pub fn for_color(color: &str) -> Self {
        Self {
            fill_color: color.to_string(),
            fill_opacity: 0.35,
            stroke_color: color.to_string(),
            stroke_opacity: 0.8,
            stroke_weight: 2.0,
        }
    }
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self::for_color(DEFAULT_TERRITORY_COLOR)
    }
}
