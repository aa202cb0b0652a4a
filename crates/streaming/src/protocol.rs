//! Wire types exchanged with the hosted data service.
//!
//! This module defines:
//! - Records returned by the cluster, point, and polygon-stats queries
//! - RPC parameter bodies (cluster query, polygon stats, assignment)
//! - Territory and manager records used by the persistence calls
//!
//! The service is loose about numeric types (numeric columns can arrive as
//! JSON strings), so coordinates, counts, and ids are parsed leniently.

use foundation::geo::LatLng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Aggregate of many points, produced server-side for one LOD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPoint {
    #[serde(deserialize_with = "lenient_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub longitude: f64,
    #[serde(deserialize_with = "lenient_u64")]
    pub count: u64,
}

impl ClusterPoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Lead status codes as stored by the service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LeadStatus {
    New,
    Gone,
    Later,
    Nope,
    Sold,
    Return,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::New,
        LeadStatus::Gone,
        LeadStatus::Later,
        LeadStatus::Nope,
        LeadStatus::Sold,
        LeadStatus::Return,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LeadStatus::New),
            1 => Some(LeadStatus::Gone),
            2 => Some(LeadStatus::Later),
            3 => Some(LeadStatus::Nope),
            4 => Some(LeadStatus::Sold),
            5 => Some(LeadStatus::Return),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Gone => 1,
            LeadStatus::Later => 2,
            LeadStatus::Nope => 3,
            LeadStatus::Sold => 4,
            LeadStatus::Return => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Gone => "Gone",
            LeadStatus::Later => "Later",
            LeadStatus::Nope => "Nope",
            LeadStatus::Sold => "Sold",
            LeadStatus::Return => "Return",
        }
    }
}

/// One lead ("restaurant") record from the bounding-box query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualPoint {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub longitude: f64,
    /// Raw status code; see [`IndividualPoint::status`].
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub knocks: Option<i64>,
    #[serde(default)]
    pub last_knocked: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub user_id: Option<String>,
}

impl IndividualPoint {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// `None` for missing or unrecognized codes.
    pub fn status(&self) -> Option<LeadStatus> {
        self.status.and_then(LeadStatus::from_code)
    }

    pub fn contact_name(&self) -> String {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// Per-assignee count inside a polygon. `assignee_id == None` is the
/// unassigned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStatsRow {
    #[serde(
        rename = "the_user_id",
        alias = "assignee_id",
        alias = "user_id",
        default,
        deserialize_with = "lenient_opt_string"
    )]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total: u64,
}

/// GeoJSON geometry as accepted by the polygon RPCs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Rings of `[lng, lat]` pairs; the first ring is the outer boundary.
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    pub fn polygon(outer: Vec<[f64; 2]>) -> Self {
        Geometry::Polygon {
            coordinates: vec![outer],
        }
    }

    pub fn outer_ring(&self) -> &[[f64; 2]] {
        match self {
            Geometry::Polygon { coordinates } => {
                coordinates.first().map(Vec::as_slice).unwrap_or(&[])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterParams {
    pub p_zoom_level: u8,
    pub p_min_lat: Option<f64>,
    pub p_min_lon: Option<f64>,
    pub p_max_lat: Option<f64>,
    pub p_max_lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolygonParams<'a> {
    pub p_polygon: &'a Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignParams<'a> {
    pub p_polygon: &'a Geometry,
    pub p_user_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignManagersParams<'a> {
    pub p_polygon: &'a Geometry,
    pub p_manager_ids: &'a [String],
}

/// Persisted territory as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient_geometry")]
    pub geom: Option<Geometry>,
}

/// Insert body for a new territory row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritoryInsert<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub geom: &'a Geometry,
}

/// Everything needed to create a territory, managers included.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTerritory {
    pub name: String,
    pub color: String,
    pub polygon: Geometry,
    pub manager_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedTerritory {
    pub record: TerritoryRecord,
    /// Set when the row was saved but linking managers failed.
    pub manager_warning: Option<String>,
}

/// Read-only reference to a user who can own leads or territories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerRef {
    #[serde(deserialize_with = "lenient_string")]
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl ManagerRef {
    /// "First Last", or the user id when no first name is known.
    pub fn display_name(&self) -> String {
        match self.first_name.as_deref() {
            Some(first) if !first.trim().is_empty() => {
                join_name(Some(first), self.last_name.as_deref())
            }
            _ => self.user_id.clone(),
        }
    }
}

/// Comparison operators accepted by the point query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
}

impl FilterOp {
    pub fn parse(symbol: &str) -> Result<Self, FilterError> {
        match symbol.trim() {
            "=" => Ok(FilterOp::Eq),
            "!=" => Ok(FilterOp::Neq),
            ">" => Ok(FilterOp::Gt),
            "<" => Ok(FilterOp::Lt),
            ">=" => Ok(FilterOp::Gte),
            "<=" => Ok(FilterOp::Lte),
            s if s.eq_ignore_ascii_case("like") => Ok(FilterOp::Like),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }

    /// Operator keyword in the service's query-string syntax.
    pub fn keyword(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
        }
    }
}

/// Column filter applied to the individual-point query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointFilter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl PointFilter {
    pub fn new(column: &str, op: &str, value: impl Into<String>) -> Result<Self, FilterError> {
        let column = column.trim();
        let valid = !column.is_empty()
            && column
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(FilterError::InvalidColumn(column.to_string()));
        }
        Ok(Self {
            column: column.to_string(),
            op: FilterOp::parse(op)?,
            value: value.into(),
        })
    }

    /// `(column, "op.value")` query pair.
    pub fn query_pair(&self) -> (String, String) {
        (
            self.column.clone(),
            format!("{}.{}", self.op.keyword(), self.value),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    UnknownOperator(String),
    InvalidColumn(String),
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::UnknownOperator(op) => write!(f, "Invalid operator: {op}"),
            FilterError::InvalidColumn(col) => write!(f, "Invalid filter column: {col:?}"),
        }
    }
}

impl std::error::Error for FilterError {}

fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    let first = first.unwrap_or("").trim();
    let last = last.unwrap_or("").trim();
    format!("{first} {last}").trim().to_string()
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_geometry<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Geometry>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).ok())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn cluster_accepts_string_coordinates() {
        let c: ClusterPoint =
            serde_json::from_value(json!({"latitude": "39.5", "longitude": -98.0, "count": "12"}))
                .expect("cluster");
        assert_eq!(c.position(), LatLng::new(39.5, -98.0));
        assert_eq!(c.count, 12);

        let bad: ClusterPoint =
            serde_json::from_value(json!({"latitude": "n/a", "longitude": 1.0, "count": 1}))
                .expect("cluster");
        assert!(!bad.position().is_finite());
    }

    #[test]
    fn point_status_parses_string_codes() {
        let p: IndividualPoint = serde_json::from_value(json!({
            "id": 42,
            "latitude": 1.0,
            "longitude": 2.0,
            "status": "4",
            "first_name": "Ana",
        }))
        .expect("point");
        assert_eq!(p.id, "42");
        assert_eq!(p.status(), Some(LeadStatus::Sold));
        assert_eq!(p.contact_name(), "Ana");

        let unknown: IndividualPoint =
            serde_json::from_value(json!({"id": "x", "latitude": 1, "longitude": 2, "status": 9}))
                .expect("point");
        assert_eq!(unknown.status(), None);
    }

    #[test]
    fn stats_row_reads_null_assignee() {
        let rows: Vec<AssignmentStatsRow> = serde_json::from_value(json!([
            {"the_user_id": null, "total": 3},
            {"the_user_id": "u1", "first_name": "A", "last_name": "B", "total": 5},
        ]))
        .expect("rows");
        assert_eq!(rows[0].assignee_id, None);
        assert_eq!(rows[1].assignee_id.as_deref(), Some("u1"));
        assert_eq!(rows[1].total, 5);
    }

    #[test]
    fn geometry_serializes_as_geojson() {
        let g = Geometry::polygon(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]);
        assert_eq!(
            serde_json::to_value(&g).expect("json"),
            json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]})
        );
    }

    #[test]
    fn territory_with_unsupported_geometry_keeps_record() {
        let t: TerritoryRecord = serde_json::from_value(json!({
            "id": 7, "name": "North", "color": "#FF0000",
            "geom": {"type": "MultiPolygon", "coordinates": []}
        }))
        .expect("territory");
        assert_eq!(t.id, "7");
        assert_eq!(t.geom, None);
    }

    #[test]
    fn filters_map_to_query_syntax() {
        let f = PointFilter::new("status", ">=", "2").expect("filter");
        assert_eq!(f.query_pair(), ("status".to_string(), "gte.2".to_string()));
        assert!(matches!(
            PointFilter::new("status", "~", "2"),
            Err(FilterError::UnknownOperator(_))
        ));
        assert!(matches!(
            PointFilter::new("status;drop", "=", "2"),
            Err(FilterError::InvalidColumn(_))
        ));
    }

    #[test]
    fn manager_name_falls_back_to_id() {
        let m = ManagerRef {
            user_id: "u9".into(),
            first_name: None,
            last_name: Some("X".into()),
        };
        assert_eq!(m.display_name(), "u9");
    }
}
