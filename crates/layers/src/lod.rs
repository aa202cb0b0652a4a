//! Zoom → level-of-detail policy.
//!
//! The service pre-aggregates clusters at a handful of levels; `lod_for_zoom`
//! snaps a continuous map zoom onto them. At or above the individual threshold
//! the map stops showing clusters and loads raw points instead.

use foundation::bounds::LatLngBounds;

use crate::viewport::Viewport;

pub const INDIVIDUAL_ZOOM_THRESHOLD: f64 = 15.0;
/// Coarsest cluster level. Queried without bounds.
pub const WORLD_LOD: u8 = 5;

pub fn lod_for_zoom(zoom: f64) -> u8 {
    if zoom.is_nan() {
        return 0;
    }
    if zoom >= 12.0 {
        10
    } else if zoom >= 11.0 {
        9
    } else if zoom >= 10.0 {
        8
    } else if zoom >= 8.0 {
        6
    } else if zoom >= 3.0 {
        WORLD_LOD
    } else {
        zoom.round().max(0.0) as u8
    }
}

pub fn is_individual_mode(zoom: f64) -> bool {
    zoom >= INDIVIDUAL_ZOOM_THRESHOLD
}

/// Bounds sent with a cluster query; `None` asks for the whole world.
pub fn cluster_bounds_for(lod: u8, viewport: LatLngBounds) -> Option<LatLngBounds> {
    (lod != WORLD_LOD).then_some(viewport)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    Clusters { lod: u8 },
    Individuals,
}

impl DisplayMode {
    pub fn for_zoom(zoom: f64) -> Self {
        Self::with_threshold(zoom, INDIVIDUAL_ZOOM_THRESHOLD)
    }

    fn with_threshold(zoom: f64, threshold: f64) -> Self {
        if zoom >= threshold {
            DisplayMode::Individuals
        } else {
            DisplayMode::Clusters {
                lod: lod_for_zoom(zoom),
            }
        }
    }
}

/// What a viewport change should do.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    Skip,
    Clusters {
        lod: u8,
        bounds: Option<LatLngBounds>,
        /// Leaving individual mode: drop point markers before fetching.
        clear_individuals: bool,
    },
    Individuals {
        /// Viewport expanded by one span on every side.
        bounds: LatLngBounds,
        /// Entering individual mode: drop cluster markers before fetching.
        clear_clusters: bool,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportConfig {
    pub individual_zoom_threshold: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            individual_zoom_threshold: INDIVIDUAL_ZOOM_THRESHOLD,
        }
    }
}

/// Remembers the last planned mode and the area covered by loaded points.
#[derive(Debug, Clone, Default)]
pub struct LodTracker {
    config: ViewportConfig,
    mode: Option<DisplayMode>,
    last_zoom: Option<f64>,
    individuals_coverage: Option<LatLngBounds>,
}

impl LodTracker {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Option<DisplayMode> {
        self.mode
    }

    pub fn individuals_loaded(&self) -> bool {
        self.individuals_coverage.is_some()
    }

    /// Decides the fetch for `viewport` and records it as the current mode.
    pub fn plan(&mut self, viewport: &Viewport) -> FetchPlan {
        let target = DisplayMode::with_threshold(viewport.zoom, self.config.individual_zoom_threshold);
        let previous = self.mode.replace(target);
        let zoom_changed = self.last_zoom != Some(viewport.zoom);
        self.last_zoom = Some(viewport.zoom);

        match target {
            DisplayMode::Individuals => {
                let staying = previous == Some(DisplayMode::Individuals);
                if staying {
                    if let Some(coverage) = self.individuals_coverage {
                        if zoom_changed || coverage.contains_bounds(&viewport.bounds) {
                            return FetchPlan::Skip;
                        }
                    }
                }
                FetchPlan::Individuals {
                    bounds: viewport.bounds.expanded_by_span(),
                    clear_clusters: !staying,
                }
            }
            DisplayMode::Clusters { lod } => {
                let leaving = previous == Some(DisplayMode::Individuals);
                if leaving {
                    self.individuals_coverage = None;
                }
                FetchPlan::Clusters {
                    lod,
                    bounds: cluster_bounds_for(lod, viewport.bounds),
                    clear_individuals: leaving,
                }
            }
        }
    }

    /// Points covering `bounds` were drawn.
    pub fn record_individuals_loaded(&mut self, bounds: LatLngBounds) {
        if self.mode == Some(DisplayMode::Individuals) {
            self.individuals_coverage = Some(bounds);
        }
    }

    /// Forces the next individual-mode plan to fetch.
    pub fn invalidate_individuals(&mut self) {
        self.individuals_coverage = None;
    }
}
