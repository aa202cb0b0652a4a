//! I/O contracts for the hosted data service.
//!
//! The controllers only ever talk to these traits:
//! - `GeoDataGateway` for cluster, point, polygon-stats, and assignment calls
//! - `TerritoryPersistence` for territory CRUD and manager linking
//! - `ManagerDirectory` for the read-only list of assignable users
//!
//! Every query is idempotent; `commit_assignment`, `assign_managers`,
//! `create_territory`, and `delete_territory` are the only calls with side
//! effects, and each is all-or-nothing from the caller's point of view.

use std::future::Future;
use std::pin::Pin;

use foundation::bounds::LatLngBounds;

use crate::protocol::{
    AssignmentStatsRow, ClusterPoint, CreateTerritory, CreatedTerritory, Geometry,
    IndividualPoint, ManagerRef, PointFilter, TerritoryRecord,
};

/// Boxed future for dyn-compatible gateway traits.
///
/// Not `Send`: controllers run on a single-threaded event loop and the
/// browser transports they wrap are not `Send` either.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub type GatewayResult<T> = Result<T, DataUnavailable>;

/// Any failure reported by a gateway call (transport, HTTP status, decode).
#[derive(Debug)]
pub struct DataUnavailable {
    pub message: String,
    /// Message reported by the service itself, shown to users verbatim.
    pub server_message: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.server_message {
            Some(server) => write!(f, "{}: {server}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DataUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl DataUnavailable {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            server_message: None,
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            server_message: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn from_server(message: impl Into<String>, server_message: impl Into<String>) -> Self {
        let server_message = server_message.into();
        Self {
            message: message.into(),
            server_message: (!server_message.trim().is_empty()).then_some(server_message),
            source: None,
        }
    }

    /// The service's message if it sent one, otherwise `fallback`.
    pub fn user_message<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.server_message.as_deref().unwrap_or(fallback)
    }
}

/// Point and aggregate queries plus the point→assignee commit.
pub trait GeoDataGateway {
    /// Cluster aggregates for `zoom_level`. `bounds == None` asks for the whole
    /// world and is only used at the coarsest level.
    fn query_clusters(
        &self,
        zoom_level: u8,
        bounds: Option<LatLngBounds>,
    ) -> BoxFuture<'_, GatewayResult<Vec<ClusterPoint>>>;

    /// Individual points inside `bounds` (already expanded by the caller).
    fn query_individuals(
        &self,
        bounds: LatLngBounds,
        filters: Vec<PointFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<IndividualPoint>>>;

    fn query_polygon_stats(
        &self,
        polygon: Geometry,
    ) -> BoxFuture<'_, GatewayResult<Vec<AssignmentStatsRow>>>;

    /// Assigns every point inside `polygon` to `assignee_id`; returns the number
    /// of points the service updated.
    fn commit_assignment(
        &self,
        polygon: Geometry,
        assignee_id: String,
    ) -> BoxFuture<'_, GatewayResult<u64>>;
}

/// Territory CRUD and manager linking.
pub trait TerritoryPersistence {
    /// Every persisted territory, in service order.
    fn list_territories(&self) -> BoxFuture<'_, GatewayResult<Vec<TerritoryRecord>>>;

    fn create_territory(
        &self,
        request: CreateTerritory,
    ) -> BoxFuture<'_, GatewayResult<CreatedTerritory>>;

    fn delete_territory(&self, territory_id: String) -> BoxFuture<'_, GatewayResult<()>>;

    /// Links `manager_ids` to every point inside the territory polygon.
    fn assign_managers(
        &self,
        territory_id: String,
        polygon: Geometry,
        manager_ids: Vec<String>,
    ) -> BoxFuture<'_, GatewayResult<u64>>;

    /// WKT polygon for a zip code, `Ok(None)` if the zip is unknown.
    fn zip_polygon(&self, zip: String) -> BoxFuture<'_, GatewayResult<Option<String>>>;
}

pub trait ManagerDirectory {
    /// All assignable users, ordered by first name.
    fn list_managers(&self) -> BoxFuture<'_, GatewayResult<Vec<ManagerRef>>>;
}
