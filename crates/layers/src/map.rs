//! Seam between the controllers and whatever draws the map.
//!
//! Methods take `&self`: map SDKs hand out shared handles and do their own
//! interior bookkeeping, and the controllers call back into the surface from
//! several components at once.

use std::cell::RefCell;

use foundation::bounds::LatLngBounds;
use foundation::geo::LatLng;
use foundation::handles::{Handle, HandleAllocator};

use crate::symbology::PolygonStyle;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub Handle);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayHandle(pub Handle);

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerSpec {
    Cluster {
        position: LatLng,
        label: String,
        scale: f64,
        fill: &'static str,
    },
    Pin {
        position: LatLng,
        title: String,
        color: &'static str,
    },
}

impl MarkerSpec {
    pub fn position(&self) -> LatLng {
        match self {
            MarkerSpec::Cluster { position, .. } | MarkerSpec::Pin { position, .. } => *position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoPopup {
    pub title: String,
    pub rows: Vec<(&'static str, String)>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DrawingMode {
    #[default]
    Off,
    Polygon,
}

pub trait MapSurface {
    fn place_marker(&self, spec: MarkerSpec) -> MarkerHandle;
    fn remove_marker(&self, marker: MarkerHandle);
    fn open_popup(&self, anchor: MarkerHandle, popup: InfoPopup);
    fn zoom_into(&self, center: LatLng, levels: i32);
    fn set_drawing_mode(&self, mode: DrawingMode, style: &PolygonStyle);
    fn show_polygon(&self, vertices: &[LatLng], style: &PolygonStyle, editable: bool) -> OverlayHandle;
    fn remove_overlay(&self, overlay: OverlayHandle);
    fn fit_bounds(&self, bounds: LatLngBounds);
}

/// Every call a `RecordingMap` received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOp {
    PlaceMarker(MarkerHandle, MarkerSpec),
    RemoveMarker(MarkerHandle),
    OpenPopup(MarkerHandle, InfoPopup),
    ZoomInto(LatLng, i32),
    SetDrawingMode(DrawingMode),
    ShowPolygon(OverlayHandle, Vec<LatLng>, bool),
    RemoveOverlay(OverlayHandle),
    FitBounds(LatLngBounds),
}

/// Headless surface: allocates handles and logs every call.
#[derive(Debug, Default)]
pub struct RecordingMap {
    markers: RefCell<HandleAllocator>,
    overlays: RefCell<HandleAllocator>,
    drawing_mode: RefCell<DrawingMode>,
    ops: RefCell<Vec<MapOp>>,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<MapOp> {
        self.ops.borrow().clone()
    }

    pub fn take_ops(&self) -> Vec<MapOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn live_markers(&self) -> usize {
        self.markers.borrow().live_count()
    }

    pub fn live_overlays(&self) -> usize {
        self.overlays.borrow().live_count()
    }

    pub fn is_marker_live(&self, marker: MarkerHandle) -> bool {
        self.markers.borrow().is_live(marker.0)
    }

    pub fn is_overlay_live(&self, overlay: OverlayHandle) -> bool {
        self.overlays.borrow().is_live(overlay.0)
    }

    pub fn drawing_mode(&self) -> DrawingMode {
        *self.drawing_mode.borrow()
    }

    fn log(&self, op: MapOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl MapSurface for RecordingMap {
    fn place_marker(&self, spec: MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle(self.markers.borrow_mut().allocate());
        self.log(MapOp::PlaceMarker(handle, spec));
        handle
    }

    fn remove_marker(&self, marker: MarkerHandle) {
        self.markers.borrow_mut().release(marker.0);
        self.log(MapOp::RemoveMarker(marker));
    }

    fn open_popup(&self, anchor: MarkerHandle, popup: InfoPopup) {
        self.log(MapOp::OpenPopup(anchor, popup));
    }

    fn zoom_into(&self, center: LatLng, levels: i32) {
        self.log(MapOp::ZoomInto(center, levels));
    }

    fn set_drawing_mode(&self, mode: DrawingMode, _style: &PolygonStyle) {
        *self.drawing_mode.borrow_mut() = mode;
        self.log(MapOp::SetDrawingMode(mode));
    }

    fn show_polygon(&self, vertices: &[LatLng], _style: &PolygonStyle, editable: bool) -> OverlayHandle {
        let handle = OverlayHandle(self.overlays.borrow_mut().allocate());
        self.log(MapOp::ShowPolygon(handle, vertices.to_vec(), editable));
        handle
    }

    fn remove_overlay(&self, overlay: OverlayHandle) {
        self.overlays.borrow_mut().release(overlay.0);
        self.log(MapOp::RemoveOverlay(overlay));
    }

    fn fit_bounds(&self, bounds: LatLngBounds) {
        self.log(MapOp::FitBounds(bounds));
    }
}
