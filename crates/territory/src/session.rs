use std::cell::RefCell;
use std::rc::Rc;

use foundation::geo::LatLng;
use layers::map::MapSurface;
use layers::symbology::{ASSIGN_POLYGON_COLOR, PolygonStyle};
use runtime::frame::Frame;
use streaming::gateway::{GeoDataGateway, ManagerDirectory};
use streaming::protocol::ManagerRef;

use crate::assign::{AssignConfig, AssignmentWorkflow};
use crate::editor::{EditorState, PolygonEditor, VertexEdit};
use crate::error::WorkflowError;
use crate::polygon::PolygonPath;
use crate::stats::PolygonStatsPanel;

/// The "assign leads" mode of the map: one drawn polygon, its live counts,
/// and the assignment panel, wired together.
pub struct AssignLeadsSession<G: ?Sized, M: MapSurface + ?Sized> {
    editor: Rc<RefCell<PolygonEditor<M>>>,
    stats: PolygonStatsPanel<G>,
    workflow: AssignmentWorkflow<G>,
    draw_mode: Rc<RefCell<bool>>,
}

impl<G: ?Sized, M: MapSurface + ?Sized> Clone for AssignLeadsSession<G, M> {
    fn clone(&self) -> Self {
        Self {
            editor: Rc::clone(&self.editor),
            stats: self.stats.clone(),
            workflow: self.workflow.clone(),
            draw_mode: Rc::clone(&self.draw_mode),
        }
    }
}

impl<G: GeoDataGateway + ?Sized, M: MapSurface + ?Sized> AssignLeadsSession<G, M> {
    pub fn new(gateway: Rc<G>, map: Rc<M>) -> Self {
        Self::with_config(gateway, map, AssignConfig::default())
    }

    pub fn with_config(gateway: Rc<G>, map: Rc<M>, config: AssignConfig) -> Self {
        let style = PolygonStyle::for_color(ASSIGN_POLYGON_COLOR);
        Self {
            editor: Rc::new(RefCell::new(PolygonEditor::new(map, style))),
            stats: PolygonStatsPanel::new(Rc::clone(&gateway)),
            workflow: AssignmentWorkflow::with_config(gateway, config),
            draw_mode: Rc::new(RefCell::new(false)),
        }
    }

    pub fn stats(&self) -> &PolygonStatsPanel<G> {
        &self.stats
    }

    pub fn workflow(&self) -> &AssignmentWorkflow<G> {
        &self.workflow
    }

    pub fn editor_state(&self) -> EditorState {
        self.editor.borrow().state().clone()
    }

    pub fn path(&self) -> Option<PolygonPath> {
        self.editor.borrow().path().cloned()
    }

    pub fn is_draw_mode(&self) -> bool {
        *self.draw_mode.borrow()
    }

    /// Turns draw mode on (starting a fresh polygon) or off (discarding it).
    /// Either way an assignment still in flight for the old polygon is dropped.
    pub fn set_draw_mode(&self, on: bool) {
        *self.draw_mode.borrow_mut() = on;
        self.workflow.abandon();
        if on {
            self.editor.borrow_mut().start_drawing();
            self.workflow.open();
        } else {
            self.editor.borrow_mut().cancel();
        }
        self.stats.clear();
    }

    pub async fn load_assignees<D: ManagerDirectory + ?Sized>(&self, directory: &D) -> Vec<ManagerRef> {
        self.workflow.load_assignees(directory).await
    }

    pub fn select_assignee(&self, assignee: Option<String>) {
        self.workflow.select_assignee(assignee);
    }

    /// The drawing tool finished a shape. Refreshes stats for it.
    pub async fn on_overlay_complete(&self, vertices: Vec<LatLng>) -> Result<PolygonPath, WorkflowError> {
        let path = self.editor.borrow_mut().on_overlay_complete(vertices)?;
        self.stats.refresh(&path).await;
        Ok(path)
    }

    /// A vertex of the drawn polygon moved, appeared, or was removed.
    pub async fn on_vertex_edit(&self, edit: VertexEdit) -> Option<PolygonPath> {
        let path = self.editor.borrow_mut().apply(edit)?;
        self.stats.refresh(&path).await;
        Some(path)
    }

    /// Commits the assignment. On success the polygon is removed and draw
    /// mode turns off; on failure both stay as they were.
    pub async fn assign(&self) -> Result<u64, WorkflowError> {
        let path = self.path();
        let affected = self.workflow.assign(path.as_ref()).await?;
        self.editor.borrow_mut().commit();
        *self.draw_mode.borrow_mut() = false;
        Ok(affected)
    }

    /// Drives the auto-close timer; closing the panel leaves assign mode.
    pub fn advance(&self, frame: Frame) -> bool {
        let closed = self.workflow.advance(frame);
        if closed {
            self.close();
        }
        closed
    }

    pub fn close(&self) {
        self.workflow.close();
        self.set_draw_mode(false);
    }
}
