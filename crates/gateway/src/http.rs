//! reqwest-backed gateway.
//!
//! Every call goes through [`HttpGateway::send`], which attaches the API key,
//! maps transport failures to [`DataUnavailable::with_source`], and lifts the
//! service's JSON `message` field into [`DataUnavailable::from_server`] for
//! non-2xx responses.

use foundation::bounds::LatLngBounds;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use streaming::gateway::{
    BoxFuture, DataUnavailable, GatewayResult, GeoDataGateway, ManagerDirectory,
    TerritoryPersistence,
};
use streaming::protocol::{
    AssignManagersParams, AssignParams, AssignmentStatsRow, ClusterPoint, CreateTerritory,
    CreatedTerritory, Geometry, IndividualPoint, ManagerRef, PointFilter, PolygonParams,
    TerritoryInsert, TerritoryRecord,
};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::query;

pub const MANAGER_LINK_WARNING: &str = "Territory saved, but failed to assign managers.";

pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, DataUnavailable> {
        if config.base_url.trim().is_empty() {
            return Err(DataUnavailable::new("service URL is not configured"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataUnavailable::with_source("Failed to build HTTP client", e))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            return req;
        }
        req.header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn send(
        &self,
        what: &str,
        req: reqwest::RequestBuilder,
    ) -> GatewayResult<reqwest::Response> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| {
                warn!(what, error = %e, "request failed");
                DataUnavailable::with_source(format!("{what}: HTTP request failed"), e)
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let server = server_message(&body).unwrap_or_default();
        warn!(what, %status, server = %server, "service returned an error");
        Err(DataUnavailable::from_server(
            format!("{what}: HTTP error: {status}"),
            server,
        ))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        what: &str,
        req: reqwest::RequestBuilder,
    ) -> GatewayResult<T> {
        let resp = self.send(what, req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| DataUnavailable::with_source(format!("{what}: invalid response"), e))
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        body: &impl serde::Serialize,
    ) -> GatewayResult<T> {
        let req = self.client.post(self.config.rpc_url(function)).json(body);
        self.json(function, req).await
    }

    async fn rpc_count(&self, function: &str, body: &impl serde::Serialize) -> GatewayResult<u64> {
        let value: Value = self.rpc(function, body).await?;
        Ok(lenient_count(&value))
    }
}

/// `message` from a PostgREST error body, if the body is one.
pub fn server_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

/// Affected-row counts come back as a number, a numeric string, or null.
pub fn lenient_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl GeoDataGateway for HttpGateway {
    fn query_clusters(
        &self,
        zoom_level: u8,
        bounds: Option<LatLngBounds>,
    ) -> BoxFuture<'_, GatewayResult<Vec<ClusterPoint>>> {
        Box::pin(async move {
            let params = query::cluster_params(zoom_level, bounds.as_ref());
            let rows: Option<Vec<ClusterPoint>> = self.rpc(query::CLUSTERS_RPC, &params).await?;
            let rows = rows.unwrap_or_default();
            debug!(zoom_level, count = rows.len(), "clusters loaded");
            Ok(rows)
        })
    }

    fn query_individuals(
        &self,
        bounds: LatLngBounds,
        filters: Vec<PointFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<IndividualPoint>>> {
        Box::pin(async move {
            let req = self
                .client
                .get(self.config.rest_url(&self.config.points_table))
                .query(&query::individuals_query(&bounds, &filters));
            let rows: Vec<IndividualPoint> = self.json("points", req).await?;
            debug!(count = rows.len(), filters = filters.len(), "points loaded");
            Ok(rows)
        })
    }

    fn query_polygon_stats(
        &self,
        polygon: Geometry,
    ) -> BoxFuture<'_, GatewayResult<Vec<AssignmentStatsRow>>> {
        Box::pin(async move {
            let params = PolygonParams {
                p_polygon: &polygon,
            };
            let rows: Option<Vec<AssignmentStatsRow>> =
                self.rpc(query::POLYGON_STATS_RPC, &params).await?;
            Ok(rows.unwrap_or_default())
        })
    }

    fn commit_assignment(
        &self,
        polygon: Geometry,
        assignee_id: String,
    ) -> BoxFuture<'_, GatewayResult<u64>> {
        Box::pin(async move {
            let params = AssignParams {
                p_polygon: &polygon,
                p_user_id: &assignee_id,
            };
            self.rpc_count(query::ASSIGN_RPC, &params).await
        })
    }
}

impl TerritoryPersistence for HttpGateway {
    fn list_territories(&self) -> BoxFuture<'_, GatewayResult<Vec<TerritoryRecord>>> {
        Box::pin(async move {
            let req = self
                .client
                .get(self.config.rest_url(query::TERRITORIES_TABLE))
                .query(&query::territories_query());
            self.json("territories", req).await
        })
    }

    fn create_territory(
        &self,
        request: CreateTerritory,
    ) -> BoxFuture<'_, GatewayResult<CreatedTerritory>> {
        Box::pin(async move {
            let insert = TerritoryInsert {
                name: &request.name,
                color: &request.color,
                geom: &request.polygon,
            };
            let req = self
                .client
                .post(self.config.rest_url(query::TERRITORIES_TABLE))
                .header("Prefer", "return=representation")
                .json(&insert);
            let mut rows: Vec<TerritoryRecord> = self.json("save territory", req).await?;
            if rows.is_empty() {
                return Err(DataUnavailable::new("save territory: no row returned"));
            }
            let mut record = rows.swap_remove(0);
            if record.geom.is_none() {
                record.geom = Some(request.polygon.clone());
            }

            let mut manager_warning = None;
            if !request.manager_ids.is_empty() {
                let params = AssignManagersParams {
                    p_polygon: &request.polygon,
                    p_manager_ids: &request.manager_ids,
                };
                if let Err(e) = self.rpc_count(query::ASSIGN_MANAGERS_RPC, &params).await {
                    warn!(territory = %record.id, error = %e, "linking managers failed");
                    manager_warning = Some(MANAGER_LINK_WARNING.to_string());
                }
            }
            Ok(CreatedTerritory {
                record,
                manager_warning,
            })
        })
    }

    fn delete_territory(&self, territory_id: String) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            let req = self
                .client
                .delete(self.config.rest_url(query::TERRITORIES_TABLE))
                .query(&query::delete_territory_query(&territory_id));
            self.send("delete territory", req).await?;
            Ok(())
        })
    }

    fn assign_managers(
        &self,
        territory_id: String,
        polygon: Geometry,
        manager_ids: Vec<String>,
    ) -> BoxFuture<'_, GatewayResult<u64>> {
        Box::pin(async move {
            let params = AssignManagersParams {
                p_polygon: &polygon,
                p_manager_ids: &manager_ids,
            };
            let affected = self.rpc_count(query::ASSIGN_MANAGERS_RPC, &params).await?;
            debug!(territory = %territory_id, managers = manager_ids.len(), affected, "managers linked");
            Ok(affected)
        })
    }

    fn zip_polygon(&self, zip: String) -> BoxFuture<'_, GatewayResult<Option<String>>> {
        Box::pin(async move {
            #[derive(Deserialize)]
            struct ZipRow {
                geometry: Option<String>,
            }
            let req = self
                .client
                .get(self.config.rest_url(query::ZIP_TABLE))
                .query(&query::zip_query(&zip));
            let rows: Vec<ZipRow> = self.json("zip lookup", req).await?;
            Ok(rows.into_iter().next().and_then(|r| r.geometry))
        })
    }
}

impl ManagerDirectory for HttpGateway {
    fn list_managers(&self) -> BoxFuture<'_, GatewayResult<Vec<ManagerRef>>> {
        Box::pin(async move {
            let req = self
                .client
                .get(self.config.rest_url(query::PROFILES_TABLE))
                .query(&query::managers_query());
            self.json("managers", req).await
        })
    }
}
