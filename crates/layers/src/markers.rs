use std::rc::Rc;

use streaming::protocol::{ClusterPoint, IndividualPoint};
use tracing::debug;

use crate::layer::MarkerLayer;
use crate::map::{InfoPopup, MapSurface, MarkerHandle, MarkerSpec};
use crate::symbology::{CLUSTER_FILL, cluster_scale, status_color};

/// Map zoom levels added when a cluster is clicked.
pub const CLUSTER_CLICK_ZOOM_STEP: i32 = 2;

/// Outcome of a marker click.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerClick {
    ZoomedIntoCluster { count: u64 },
    OpenedPopup { id: String },
}

/// Owns the markers currently placed on the map, one collection per layer.
///
/// Each marker keeps the data it was drawn from so a popup always shows the
/// snapshot the marker represents, not whatever was loaded later.
pub struct MarkerRenderManager<M: MapSurface + ?Sized> {
    map: Rc<M>,
    clusters: Vec<(MarkerHandle, ClusterPoint)>,
    individuals: Vec<(MarkerHandle, IndividualPoint)>,
}

impl<M: MapSurface + ?Sized> MarkerRenderManager<M> {
    pub fn new(map: Rc<M>) -> Self {
        Self {
            map,
            clusters: Vec::new(),
            individuals: Vec::new(),
        }
    }

    pub fn len(&self, layer: MarkerLayer) -> usize {
        match layer {
            MarkerLayer::Clusters => self.clusters.len(),
            MarkerLayer::Individuals => self.individuals.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.individuals.is_empty()
    }

    /// Removes every marker of `layer` from the map. Returns how many were removed.
    pub fn clear(&mut self, layer: MarkerLayer) -> usize {
        let handles: Vec<MarkerHandle> = match layer {
            MarkerLayer::Clusters => self.clusters.drain(..).map(|(h, _)| h).collect(),
            MarkerLayer::Individuals => self.individuals.drain(..).map(|(h, _)| h).collect(),
        };
        for handle in &handles {
            self.map.remove_marker(*handle);
        }
        handles.len()
    }

    /// Replaces the cluster collection. Clusters with non-finite coordinates are skipped.
    pub fn draw_clusters(&mut self, clusters: Vec<ClusterPoint>) -> usize {
        self.clear(MarkerLayer::Clusters);
        let mut skipped = 0usize;
        for cluster in clusters {
            let position = cluster.position();
            if !position.is_finite() {
                skipped += 1;
                continue;
            }
            let handle = self.map.place_marker(MarkerSpec::Cluster {
                position,
                label: cluster.count.to_string(),
                scale: cluster_scale(cluster.count),
                fill: CLUSTER_FILL,
            });
            self.clusters.push((handle, cluster));
        }
        if skipped > 0 {
            debug!(skipped, "clusters without usable coordinates");
        }
        self.clusters.len()
    }

    /// Replaces the individual collection. Points with non-finite coordinates are skipped.
    pub fn draw_individuals(&mut self, points: Vec<IndividualPoint>) -> usize {
        self.clear(MarkerLayer::Individuals);
        let mut skipped = 0usize;
        for point in points {
            let position = point.position();
            if !position.is_finite() {
                skipped += 1;
                continue;
            }
            let handle = self.map.place_marker(MarkerSpec::Pin {
                position,
                title: pin_title(&point),
                color: status_color(point.status()),
            });
            self.individuals.push((handle, point));
        }
        if skipped > 0 {
            debug!(skipped, "points without usable coordinates");
        }
        self.individuals.len()
    }

    /// Clusters zoom the map in around themselves; points open their popup.
    /// Returns `None` for handles this manager does not own.
    pub fn on_marker_click(&self, handle: MarkerHandle) -> Option<MarkerClick> {
        if let Some((_, cluster)) = self.clusters.iter().find(|(h, _)| *h == handle) {
            self.map.zoom_into(cluster.position(), CLUSTER_CLICK_ZOOM_STEP);
            return Some(MarkerClick::ZoomedIntoCluster {
                count: cluster.count,
            });
        }
        let (_, point) = self.individuals.iter().find(|(h, _)| *h == handle)?;
        self.map.open_popup(handle, info_popup(point));
        Some(MarkerClick::OpenedPopup {
            id: point.id.clone(),
        })
    }
}

impl<M: MapSurface + ?Sized> Drop for MarkerRenderManager<M> {
    fn drop(&mut self) {
        self.clear(MarkerLayer::Clusters);
        self.clear(MarkerLayer::Individuals);
    }
}

fn pin_title(point: &IndividualPoint) -> String {
    let name = point.contact_name();
    if !name.is_empty() {
        return name;
    }
    point.address.clone().unwrap_or_else(|| point.id.clone())
}

fn or_na(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "N/A".to_string(),
    }
}

pub fn info_popup(point: &IndividualPoint) -> InfoPopup {
    let address = [
        point.address.as_deref(),
        point.city.as_deref(),
        point.state.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ");

    InfoPopup {
        title: pin_title(point),
        rows: vec![
            ("Address", or_na(Some(address.as_str()))),
            ("Phone", or_na(point.phone.as_deref())),
            (
                "Status",
                point.status().map_or("Unknown", |s| s.label()).to_string(),
            ),
            ("Last updated", or_na(point.updated_at.as_deref())),
        ],
    }
}
