use std::rc::Rc;

use foundation::geo::LatLng;
use layers::map::{DrawingMode, MapSurface, OverlayHandle};
use layers::symbology::PolygonStyle;
use tracing::debug;

use crate::error::ValidationError;
use crate::polygon::PolygonPath;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Idle,
    /// Drawing tool active, waiting for the user to finish a shape.
    Drawing,
    /// One editable polygon on the map.
    Drawn {
        overlay: OverlayHandle,
        path: PolygonPath,
    },
    Committed,
    Discarded,
}

/// A vertex change reported by the map for the editable polygon.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum VertexEdit {
    Set(usize, LatLng),
    Insert(usize, LatLng),
    Remove(usize),
}

/// Draw/edit lifecycle of the single user polygon.
///
/// Owns at most one overlay; every transition away from `Drawn` removes it.
pub struct PolygonEditor<M: MapSurface + ?Sized> {
    map: Rc<M>,
    style: PolygonStyle,
    state: EditorState,
}

impl<M: MapSurface + ?Sized> PolygonEditor<M> {
    pub fn new(map: Rc<M>, style: PolygonStyle) -> Self {
        Self {
            map,
            style,
            state: EditorState::Idle,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn path(&self) -> Option<&PolygonPath> {
        match &self.state {
            EditorState::Drawn { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, EditorState::Drawing)
    }

    /// Applies to the next shape drawn or loaded.
    pub fn set_style(&mut self, style: PolygonStyle) {
        self.style = style;
    }

    /// Discards any current polygon and turns the drawing tool on.
    pub fn start_drawing(&mut self) {
        self.teardown();
        self.map.set_drawing_mode(DrawingMode::Polygon, &self.style);
        self.state = EditorState::Drawing;
    }

    /// The user closed a shape. Shapes under three vertices are rejected and
    /// the tool stays on.
    pub fn on_overlay_complete(&mut self, vertices: Vec<LatLng>) -> Result<PolygonPath, ValidationError> {
        if !self.is_drawing() {
            debug!(state = ?self.state, "overlay completed outside drawing mode");
            return Err(ValidationError::NoPolygon);
        }
        let path = PolygonPath::new(vertices);
        path.validate()?;
        self.map.set_drawing_mode(DrawingMode::Off, &self.style);
        self.show(path.clone());
        Ok(path)
    }

    /// Shows `path` as the editable polygon, replacing whatever was there.
    pub fn load_path(&mut self, path: PolygonPath) -> Result<PolygonPath, ValidationError> {
        path.validate()?;
        self.teardown();
        self.map.set_drawing_mode(DrawingMode::Off, &self.style);
        self.show(path.clone());
        Ok(path)
    }

    pub fn set_vertex(&mut self, index: usize, vertex: LatLng) -> Option<PolygonPath> {
        self.edit(|path| path.set_vertex(index, vertex))
    }

    pub fn insert_vertex(&mut self, index: usize, vertex: LatLng) -> Option<PolygonPath> {
        self.edit(|path| path.insert_vertex(index, vertex))
    }

    pub fn remove_vertex(&mut self, index: usize) -> Option<PolygonPath> {
        self.edit(|path| path.remove_vertex(index).is_some())
    }

    /// Dispatches a map edit event; returns the updated path to re-emit.
    pub fn apply(&mut self, edit: VertexEdit) -> Option<PolygonPath> {
        match edit {
            VertexEdit::Set(i, v) => self.set_vertex(i, v),
            VertexEdit::Insert(i, v) => self.insert_vertex(i, v),
            VertexEdit::Remove(i) => self.remove_vertex(i),
        }
    }

    /// Drops the polygon without any data call.
    pub fn cancel(&mut self) {
        if matches!(self.state, EditorState::Idle) {
            return;
        }
        self.teardown();
        self.map.set_drawing_mode(DrawingMode::Off, &self.style);
        self.state = EditorState::Discarded;
    }

    /// Marks the polygon as saved and removes it from the map.
    pub fn commit(&mut self) -> Option<PolygonPath> {
        let path = self.path().cloned()?;
        self.teardown();
        self.map.set_drawing_mode(DrawingMode::Off, &self.style);
        self.state = EditorState::Committed;
        Some(path)
    }

    fn show(&mut self, path: PolygonPath) {
        let overlay = self.map.show_polygon(path.vertices(), &self.style, true);
        self.state = EditorState::Drawn { overlay, path };
    }

    fn edit(&mut self, change: impl FnOnce(&mut PolygonPath) -> bool) -> Option<PolygonPath> {
        match &mut self.state {
            EditorState::Drawn { path, .. } => change(path).then(|| path.clone()),
            _ => None,
        }
    }

    fn teardown(&mut self) {
        if let EditorState::Drawn { overlay, .. } = self.state {
            self.map.remove_overlay(overlay);
            self.state = EditorState::Discarded;
        }
    }
}

impl<M: MapSurface + ?Sized> Drop for PolygonEditor<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
