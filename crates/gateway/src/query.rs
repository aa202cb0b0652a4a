//! Pure request builders, kept apart from the transport so they can be
//! checked without a server.

use foundation::bounds::LatLngBounds;
use streaming::protocol::{ClusterParams, PointFilter};

pub const CLUSTERS_RPC: &str = "get_cached_clusters";
pub const POLYGON_STATS_RPC: &str = "get_restaurant_counts_by_polygon";
pub const ASSIGN_RPC: &str = "assign_restaurants_within_polygon";
pub const ASSIGN_MANAGERS_RPC: &str = "assign_managers_to_polygon";

pub const TERRITORIES_TABLE: &str = "territories";
pub const PROFILES_TABLE: &str = "profiles";
pub const ZIP_TABLE: &str = "zctas";
pub const ZIP_COLUMN: &str = "ZCTA5CE20";

pub const POINT_COLUMNS: &str = "id,address,address2,city,state,phone,first_name,last_name,\
latitude,longitude,status,knocks,last_knocked,email,updated_at,user_id";
pub const TERRITORY_COLUMNS: &str = "id,name,color,geom";
pub const MANAGER_COLUMNS: &str = "user_id,first_name,last_name";

/// Query string for the bounding-box point lookup: column selection, the
/// four bound comparisons, then each filter in order.
pub fn individuals_query(bounds: &LatLngBounds, filters: &[PointFilter]) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("select".to_string(), POINT_COLUMNS.to_string()),
        ("latitude".to_string(), format!("lte.{}", bounds.north_east.lat)),
        ("latitude".to_string(), format!("gte.{}", bounds.south_west.lat)),
        ("longitude".to_string(), format!("lte.{}", bounds.north_east.lng)),
        ("longitude".to_string(), format!("gte.{}", bounds.south_west.lng)),
    ];
    pairs.extend(filters.iter().map(PointFilter::query_pair));
    pairs
}

/// `None` bounds leave every corner null, which the RPC reads as "whole world".
pub fn cluster_params(zoom_level: u8, bounds: Option<&LatLngBounds>) -> ClusterParams {
    ClusterParams {
        p_zoom_level: zoom_level,
        p_min_lat: bounds.map(|b| b.south_west.lat),
        p_min_lon: bounds.map(|b| b.south_west.lng),
        p_max_lat: bounds.map(|b| b.north_east.lat),
        p_max_lon: bounds.map(|b| b.north_east.lng),
    }
}

pub fn territories_query() -> Vec<(String, String)> {
    vec![("select".to_string(), TERRITORY_COLUMNS.to_string())]
}

pub fn delete_territory_query(territory_id: &str) -> Vec<(String, String)> {
    vec![("id".to_string(), format!("eq.{territory_id}"))]
}

pub fn managers_query() -> Vec<(String, String)> {
    vec![
        ("select".to_string(), MANAGER_COLUMNS.to_string()),
        ("order".to_string(), "first_name.asc".to_string()),
    ]
}

pub fn zip_query(zip: &str) -> Vec<(String, String)> {
    vec![
        ("select".to_string(), "geometry".to_string()),
        (ZIP_COLUMN.to_string(), format!("eq.{}", zip.trim())),
        ("limit".to_string(), "1".to_string()),
    ]
}
