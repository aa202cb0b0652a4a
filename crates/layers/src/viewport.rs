//! Viewport-driven marker loading.
//!
//! Every map "idle" goes through `begin`, which plans the fetch, clears the
//! layer being left, and takes a ticket from the viewport stream before any
//! I/O. The awaited response goes through `complete`; only the latest ticket
//! may draw markers or touch the loading and error indicators.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::bounds::LatLngBounds;
use runtime::notices::{NoticeBoard, NoticeKind};
use streaming::gateway::{GatewayResult, GeoDataGateway};
use streaming::load::LoadState;
use streaming::protocol::{ClusterPoint, IndividualPoint, PointFilter};
use streaming::request::{FetchStream, Ticket};
use tracing::{debug, info, warn};

use crate::layer::MarkerLayer;
use crate::lod::{FetchPlan, LodTracker, ViewportConfig};
use crate::map::{MapSurface, MarkerHandle};
use crate::markers::{MarkerClick, MarkerRenderManager};

pub const VIEWPORT_STREAM: &str = "viewport";
pub const CLUSTERS_FAILED: &str = "Failed to load clusters.";
pub const INDIVIDUALS_FAILED: &str = "Failed to fetch individuals.";

/// Map state reported when the map settles.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub bounds: LatLngBounds,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    Clusters {
        lod: u8,
        bounds: Option<LatLngBounds>,
    },
    Individuals {
        bounds: LatLngBounds,
        filters: Vec<PointFilter>,
    },
}

/// A planned fetch and the ticket its result must present.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub ticket: Ticket,
    pub request: FetchRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    Clusters(Vec<ClusterPoint>),
    Individuals(Vec<IndividualPoint>),
}

struct ViewportState<M: MapSurface + ?Sized> {
    stream: FetchStream,
    tracker: LodTracker,
    markers: MarkerRenderManager<M>,
    load: LoadState,
    notices: NoticeBoard,
    filters: Vec<PointFilter>,
}

/// Cheap-to-clone handle; clones share the same markers and stream.
pub struct ViewportController<G: ?Sized, M: MapSurface + ?Sized> {
    gateway: Rc<G>,
    state: Rc<RefCell<ViewportState<M>>>,
}

impl<G: ?Sized, M: MapSurface + ?Sized> Clone for ViewportController<G, M> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
            state: Rc::clone(&self.state),
        }
    }
}

impl<G: GeoDataGateway + ?Sized, M: MapSurface + ?Sized> ViewportController<G, M> {
    pub fn new(gateway: Rc<G>, map: Rc<M>) -> Self {
        Self::with_config(gateway, map, ViewportConfig::default())
    }

    pub fn with_config(gateway: Rc<G>, map: Rc<M>, config: ViewportConfig) -> Self {
        Self {
            gateway,
            state: Rc::new(RefCell::new(ViewportState {
                stream: FetchStream::new(VIEWPORT_STREAM),
                tracker: LodTracker::new(config),
                markers: MarkerRenderManager::new(map),
                load: LoadState::Idle,
                notices: NoticeBoard::new(),
                filters: Vec::new(),
            })),
        }
    }

    /// Handles a settled map: plans, fetches, and applies if still current.
    /// Returns whether markers were redrawn.
    pub async fn on_idle(&self, viewport: Viewport) -> bool {
        match self.begin(&viewport) {
            Some(pending) => self.run(pending).await,
            None => false,
        }
    }

    /// Synchronous half of `on_idle`. `None` when the change needs no fetch.
    pub fn begin(&self, viewport: &Viewport) -> Option<PendingFetch> {
        let mut state = self.state.borrow_mut();
        let plan = state.tracker.plan(viewport);
        let request = match plan {
            FetchPlan::Skip => {
                debug!(zoom = viewport.zoom, "viewport change needs no fetch");
                return None;
            }
            FetchPlan::Clusters {
                lod,
                bounds,
                clear_individuals,
            } => {
                if clear_individuals {
                    state.markers.clear(MarkerLayer::Individuals);
                }
                FetchRequest::Clusters { lod, bounds }
            }
            FetchPlan::Individuals {
                bounds,
                clear_clusters,
            } => {
                if clear_clusters {
                    state.markers.clear(MarkerLayer::Clusters);
                }
                FetchRequest::Individuals {
                    bounds,
                    filters: state.filters.clone(),
                }
            }
        };
        let ticket = state.stream.begin();
        state.load = LoadState::Loading {
            generation: ticket.generation,
        };
        debug!(generation = %ticket.generation, ?request, "viewport fetch issued");
        Some(PendingFetch { ticket, request })
    }

    /// Awaits the gateway for `pending` and applies the result.
    pub async fn run(&self, pending: PendingFetch) -> bool {
        let result = match &pending.request {
            FetchRequest::Clusters { lod, bounds } => self
                .gateway
                .query_clusters(*lod, *bounds)
                .await
                .map(FetchResponse::Clusters),
            FetchRequest::Individuals { bounds, filters } => self
                .gateway
                .query_individuals(*bounds, filters.clone())
                .await
                .map(FetchResponse::Individuals),
        };
        self.complete(&pending, result)
    }

    /// Applies a response if `pending` is still the latest viewport fetch.
    /// Stale responses, errors included, change nothing.
    pub fn complete(&self, pending: &PendingFetch, result: GatewayResult<FetchResponse>) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(result) = state.stream.settle(pending.ticket, result) else {
            return false;
        };
        match (result, &pending.request) {
            (Ok(FetchResponse::Clusters(clusters)), _) => {
                let drawn = state.markers.draw_clusters(clusters);
                info!(drawn, "clusters drawn");
                state.load = LoadState::Ready;
                state.notices.clear_kind(NoticeKind::Error);
                true
            }
            (Ok(FetchResponse::Individuals(points)), request) => {
                let drawn = state.markers.draw_individuals(points);
                info!(drawn, "individual points drawn");
                if let FetchRequest::Individuals { bounds, .. } = request {
                    state.tracker.record_individuals_loaded(*bounds);
                }
                state.load = LoadState::Ready;
                state.notices.clear_kind(NoticeKind::Error);
                true
            }
            (Err(err), request) => {
                let fallback = match request {
                    FetchRequest::Clusters { .. } => CLUSTERS_FAILED,
                    FetchRequest::Individuals { .. } => INDIVIDUALS_FAILED,
                };
                warn!(error = %err, "viewport fetch failed");
                let message = err.user_message(fallback).to_string();
                state.notices.replace(NoticeKind::Error, message.clone());
                state.load = LoadState::Failed { message };
                false
            }
        }
    }

    /// Replaces the point filters; the next idle in individual mode refetches.
    /// A fetch still in flight with the old filters is dropped on arrival.
    pub fn set_filters(&self, filters: Vec<PointFilter>) {
        let mut state = self.state.borrow_mut();
        state.filters = filters;
        state.tracker.invalidate_individuals();
        state.stream.invalidate();
        if state.load.is_loading() {
            state.load = LoadState::Idle;
        }
    }

    pub fn on_marker_click(&self, handle: MarkerHandle) -> Option<MarkerClick> {
        self.state.borrow().markers.on_marker_click(handle)
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().load.is_loading()
    }

    pub fn load_state(&self) -> LoadState {
        self.state.borrow().load.clone()
    }

    /// Error shown to the user, if not dismissed.
    pub fn error(&self) -> Option<String> {
        let state = self.state.borrow();
        state
            .notices
            .latest(NoticeKind::Error)
            .map(|notice| notice.message.clone())
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().notices.clear_kind(NoticeKind::Error);
    }

    pub fn marker_count(&self, layer: MarkerLayer) -> usize {
        self.state.borrow().markers.len(layer)
    }

    /// Responses dropped because a newer fetch had been issued.
    pub fn stale_responses(&self) -> u64 {
        self.state.borrow().stream.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RecordingMap;
    use foundation::geo::LatLng;
    use futures::executor::block_on;
    use streaming::gateway::{BoxFuture, DataUnavailable};
    use streaming::protocol::{AssignmentStatsRow, Geometry};

    /// Answers cluster queries with one cluster per call, failing when asked.
    #[derive(Default)]
    struct CannedGateway {
        fail: RefCell<bool>,
        calls: RefCell<Vec<(u8, Option<LatLngBounds>)>>,
    }

    impl GeoDataGateway for CannedGateway {
        fn query_clusters(
            &self,
            zoom_level: u8,
            bounds: Option<LatLngBounds>,
        ) -> BoxFuture<'_, GatewayResult<Vec<ClusterPoint>>> {
            self.calls.borrow_mut().push((zoom_level, bounds));
            let fail = *self.fail.borrow();
            Box::pin(async move {
                if fail {
                    return Err(DataUnavailable::new("boom"));
                }
                Ok(vec![ClusterPoint {
                    latitude: 1.0,
                    longitude: 2.0,
                    count: 10,
                }])
            })
        }

        fn query_individuals(
            &self,
            _bounds: LatLngBounds,
            _filters: Vec<PointFilter>,
        ) -> BoxFuture<'_, GatewayResult<Vec<IndividualPoint>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn query_polygon_stats(
            &self,
            _polygon: Geometry,
        ) -> BoxFuture<'_, GatewayResult<Vec<AssignmentStatsRow>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn commit_assignment(
            &self,
            _polygon: Geometry,
            _assignee_id: String,
        ) -> BoxFuture<'_, GatewayResult<u64>> {
            Box::pin(async { Ok(0) })
        }
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport {
            bounds: LatLngBounds::new(LatLng::new(40.0, -75.0), LatLng::new(41.0, -74.0)),
            zoom,
        }
    }

    #[test]
    fn coarse_zoom_queries_the_whole_world() {
        let gateway = Rc::new(CannedGateway::default());
        let map = Rc::new(RecordingMap::new());
        let controller = ViewportController::new(gateway.clone(), map.clone());

        assert!(block_on(controller.on_idle(viewport(4.0))));
        assert_eq!(gateway.calls.borrow().as_slice(), &[(5, None)]);
        assert_eq!(map.live_markers(), 1);
        assert!(!controller.is_loading());
    }

    #[test]
    fn failure_keeps_last_clusters_and_shows_dismissible_error() {
        let gateway = Rc::new(CannedGateway::default());
        let map = Rc::new(RecordingMap::new());
        let controller = ViewportController::new(gateway.clone(), map.clone());
        block_on(controller.on_idle(viewport(9.0)));

        *gateway.fail.borrow_mut() = true;
        assert!(!block_on(controller.on_idle(viewport(10.0))));
        assert_eq!(controller.marker_count(MarkerLayer::Clusters), 1);
        assert_eq!(controller.error().as_deref(), Some(CLUSTERS_FAILED));
        assert_eq!(controller.load_state().error(), Some(CLUSTERS_FAILED));

        controller.dismiss_error();
        assert_eq!(controller.error(), None);
    }

    #[test]
    fn begin_marks_loading_before_any_io() {
        let gateway = Rc::new(CannedGateway::default());
        let map = Rc::new(RecordingMap::new());
        let controller = ViewportController::new(gateway.clone(), map);

        let pending = controller.begin(&viewport(12.0));
        assert!(pending.is_some());
        assert!(controller.is_loading());
        assert!(gateway.calls.borrow().is_empty());
    }
}
