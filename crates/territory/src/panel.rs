//! Territory sidebar: browse, add (drawn or zip-code polygons), view,
//! delete, and link managers.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::geo::LatLng;
use layers::map::{MapSurface, OverlayHandle};
use layers::symbology::{DEFAULT_TERRITORY_COLOR, PolygonStyle};
use runtime::notices::{NoticeBoard, NoticeKind};
use streaming::gateway::{ManagerDirectory, TerritoryPersistence};
use streaming::protocol::{CreateTerritory, ManagerRef, TerritoryRecord};
use streaming::request::FetchStream;
use tracing::{debug, info, warn};

use crate::editor::{PolygonEditor, VertexEdit};
use crate::error::{ValidationError, WorkflowError};
use crate::polygon::PolygonPath;
use crate::store::{Territory, TerritoryId, TerritoryStore};

pub const PANEL_STREAM: &str = "territory-panel";
pub const SAVED: &str = "Territory saved successfully.";
pub const SAVE_FAILED: &str = "Failed to save territory.";
pub const DELETED: &str = "Territory deleted successfully.";
pub const MANAGERS_ASSIGNED: &str = "Managers assigned successfully.";
pub const MANAGERS_FAILED: &str = "Failed to assign managers.";
pub const ZIP_FAILED: &str = "Error searching zip code.";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AddMode {
    #[default]
    Draw,
    Zip,
}

/// Form contents while adding a territory.
#[derive(Debug, Clone, PartialEq)]
pub struct TerritoryDraft {
    pub name: String,
    pub color: String,
    pub mode: AddMode,
    pub zip: String,
    pub manager_ids: Vec<String>,
}

impl Default for TerritoryDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: DEFAULT_TERRITORY_COLOR.to_string(),
            mode: AddMode::Draw,
            zip: String::new(),
            manager_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PanelState {
    #[default]
    Browsing,
    Adding(TerritoryDraft),
    Viewing {
        territory: TerritoryId,
        manager_selection: Vec<String>,
    },
}

struct PanelInner<M: MapSurface + ?Sized> {
    map: Rc<M>,
    state: PanelState,
    query: String,
    store: TerritoryStore,
    editor: PolygonEditor<M>,
    drawn: Vec<OverlayHandle>,
    notices: NoticeBoard,
    stream: FetchStream,
    saving: bool,
    managers: Vec<ManagerRef>,
}

impl<M: MapSurface + ?Sized> PanelInner<M> {
    fn redraw(&mut self) {
        for overlay in self.drawn.drain(..) {
            self.map.remove_overlay(overlay);
        }
        if matches!(self.state, PanelState::Adding(_)) {
            return;
        }
        for territory in self.store.iter() {
            if territory.path.validate().is_err() {
                continue;
            }
            let style = PolygonStyle::for_color(&territory.color);
            let overlay = self.map.show_polygon(territory.path.vertices(), &style, false);
            self.drawn.push(overlay);
        }
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        self.notices.replace(NoticeKind::Error, err.to_string());
        err
    }
}

impl<M: MapSurface + ?Sized> Drop for PanelInner<M> {
    fn drop(&mut self) {
        for overlay in self.drawn.drain(..) {
            self.map.remove_overlay(overlay);
        }
    }
}

pub struct TerritoryPanel<P: ?Sized, M: MapSurface + ?Sized> {
    persistence: Rc<P>,
    inner: Rc<RefCell<PanelInner<M>>>,
}

impl<P: ?Sized, M: MapSurface + ?Sized> Clone for TerritoryPanel<P, M> {
    fn clone(&self) -> Self {
        Self {
            persistence: Rc::clone(&self.persistence),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: TerritoryPersistence + ?Sized, M: MapSurface + ?Sized> TerritoryPanel<P, M> {
    pub fn new(persistence: Rc<P>, map: Rc<M>) -> Self {
        let editor = PolygonEditor::new(Rc::clone(&map), PolygonStyle::default());
        Self {
            persistence,
            inner: Rc::new(RefCell::new(PanelInner {
                map,
                state: PanelState::Browsing,
                query: String::new(),
                store: TerritoryStore::new(),
                editor,
                drawn: Vec::new(),
                notices: NoticeBoard::new(),
                stream: FetchStream::new(PANEL_STREAM),
                saving: false,
                managers: Vec::new(),
            })),
        }
    }

    /// Replaces the list with persisted territories and draws them.
    pub fn load(&self, records: Vec<TerritoryRecord>) {
        let mut inner = self.inner.borrow_mut();
        inner.store.load(records);
        inner.redraw();
    }

    /// Fetches the persisted list and redraws. Returns how many were loaded.
    pub async fn reload(&self) -> Result<usize, WorkflowError> {
        match self.persistence.list_territories().await {
            Ok(records) => {
                let count = records.len();
                self.load(records);
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "failed to load territories");
                let mut inner = self.inner.borrow_mut();
                inner.notices.replace(
                    NoticeKind::Error,
                    err.user_message("Failed to load territories.").to_string(),
                );
                Err(err.into())
            }
        }
    }

    pub async fn load_managers<D: ManagerDirectory + ?Sized>(&self, directory: &D) -> Vec<ManagerRef> {
        match directory.list_managers().await {
            Ok(managers) => {
                self.inner.borrow_mut().managers = managers.clone();
                managers
            }
            Err(err) => {
                warn!(error = %err, "failed to load managers");
                let mut inner = self.inner.borrow_mut();
                inner
                    .notices
                    .replace(NoticeKind::Error, err.user_message("Failed to load managers.").to_string());
                Vec::new()
            }
        }
    }

    pub fn managers(&self) -> Vec<ManagerRef> {
        self.inner.borrow().managers.clone()
    }

    pub fn state(&self) -> PanelState {
        self.inner.borrow().state.clone()
    }

    pub fn territories(&self) -> Vec<Territory> {
        self.inner.borrow().store.iter().cloned().collect()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.inner.borrow_mut().query = query.into();
    }

    /// Territories whose name matches the current search query.
    pub fn visible(&self) -> Vec<Territory> {
        let inner = self.inner.borrow();
        inner.store.search(&inner.query).into_iter().cloned().collect()
    }

    pub fn begin_add(&self) {
        let mut inner = self.inner.borrow_mut();
        let draft = TerritoryDraft::default();
        inner.editor.set_style(PolygonStyle::for_color(&draft.color));
        inner.editor.start_drawing();
        inner.state = PanelState::Adding(draft);
        inner.redraw();
    }

    /// Switches between drawing and zip-code lookup. Any polygon so far is dropped.
    pub fn set_add_mode(&self, mode: AddMode) {
        let mut inner = self.inner.borrow_mut();
        let PanelState::Adding(draft) = &mut inner.state else {
            return;
        };
        draft.mode = mode;
        inner.stream.invalidate();
        match mode {
            AddMode::Draw => inner.editor.start_drawing(),
            AddMode::Zip => inner.editor.cancel(),
        }
    }

    /// Edits the add form. Color changes apply to the next polygon shown.
    pub fn update_draft(&self, change: impl FnOnce(&mut TerritoryDraft)) -> bool {
        let mut inner = self.inner.borrow_mut();
        let PanelState::Adding(draft) = &mut inner.state else {
            return false;
        };
        change(draft);
        let style = PolygonStyle::for_color(&draft.color);
        inner.editor.set_style(style);
        true
    }

    pub fn draft_path(&self) -> Option<PolygonPath> {
        self.inner.borrow().editor.path().cloned()
    }

    pub fn on_overlay_complete(&self, vertices: Vec<LatLng>) -> Result<PolygonPath, ValidationError> {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, PanelState::Adding(_)) {
            return Err(ValidationError::NoPolygon);
        }
        inner.editor.on_overlay_complete(vertices)
    }

    pub fn on_vertex_edit(&self, edit: VertexEdit) -> Option<PolygonPath> {
        self.inner.borrow_mut().editor.apply(edit)
    }

    /// Looks up the draft's zip code and loads its outline as the editable polygon.
    pub async fn search_zip(&self) -> Result<PolygonPath, WorkflowError> {
        let (ticket, zip) = {
            let mut inner = self.inner.borrow_mut();
            let zip = match &inner.state {
                PanelState::Adding(draft) => draft.zip.trim().to_string(),
                _ => return Err(WorkflowError::Superseded),
            };
            if zip.is_empty() {
                return Err(inner.fail(ValidationError::EmptyZip.into()));
            }
            (inner.stream.begin(), zip)
        };

        let result = self.persistence.zip_polygon(zip.clone()).await;

        let mut inner = self.inner.borrow_mut();
        let Some(result) = inner.stream.settle(ticket, result) else {
            return Err(WorkflowError::Superseded);
        };
        if !matches!(inner.state, PanelState::Adding(_)) {
            return Err(WorkflowError::Superseded);
        }
        let wkt = match result {
            Ok(Some(wkt)) => wkt,
            Ok(None) => return Err(inner.fail(ValidationError::ZipNotFound(zip).into())),
            Err(err) => {
                warn!(error = %err, %zip, "zip lookup failed");
                inner.notices.replace(NoticeKind::Error, ZIP_FAILED);
                return Err(err.into());
            }
        };
        let loaded = PolygonPath::parse_wkt(&wkt).and_then(|path| inner.editor.load_path(path));
        match loaded {
            Ok(path) => {
                debug!(%zip, vertices = path.vertex_count(), "zip polygon loaded");
                inner.notices.clear_kind(NoticeKind::Error);
                Ok(path)
            }
            Err(err) => Err(inner.fail(err.into())),
        }
    }

    /// Persists the draft. The territory shows up immediately under a
    /// placeholder id, is replaced in place on success, and removed on failure.
    pub async fn save(&self) -> Result<TerritoryId, WorkflowError> {
        let (pending, path, request) = {
            let mut inner = self.inner.borrow_mut();
            if inner.saving {
                return Err(WorkflowError::Busy);
            }
            let PanelState::Adding(draft) = &inner.state else {
                return Err(inner.fail(ValidationError::NoPolygon.into()));
            };
            let draft = draft.clone();
            let name = draft.name.trim().to_string();
            if name.is_empty() {
                return Err(inner.fail(ValidationError::EmptyName.into()));
            }
            let Some(path) = inner.editor.path().cloned() else {
                return Err(inner.fail(ValidationError::NoPolygon.into()));
            };
            let polygon = match path.to_geometry() {
                Ok(polygon) => polygon,
                Err(err) => return Err(inner.fail(err.into())),
            };
            let pending = inner.store.insert_pending(name.clone(), draft.color.clone(), path.clone());
            inner.saving = true;
            let request = CreateTerritory {
                name,
                color: draft.color,
                polygon,
                manager_ids: draft.manager_ids,
            };
            (pending, path, request)
        };

        let result = self.persistence.create_territory(request).await;

        let mut inner = self.inner.borrow_mut();
        inner.saving = false;
        match result {
            Ok(created) => {
                let confirmed = inner.store.confirm(&pending, created.record.clone());
                let id = match confirmed {
                    Some(id) => id,
                    // The list was reloaded while saving and the placeholder went with it.
                    None => inner.store.upsert(created.record, path),
                };
                info!(territory = %id, "territory saved");
                inner.notices.replace(NoticeKind::Success, SAVED);
                match created.manager_warning {
                    Some(warning) => {
                        warn!(territory = %id, %warning, "territory saved without managers");
                        inner.notices.replace(NoticeKind::Error, warning);
                    }
                    None => inner.notices.clear_kind(NoticeKind::Error),
                }
                if matches!(inner.state, PanelState::Adding(_)) {
                    inner.editor.commit();
                    inner.state = PanelState::Viewing {
                        territory: id.clone(),
                        manager_selection: Vec::new(),
                    };
                }
                inner.redraw();
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, "territory save failed");
                inner.store.rollback(&pending);
                inner
                    .notices
                    .replace(NoticeKind::Error, err.user_message(SAVE_FAILED).to_string());
                Err(err.into())
            }
        }
    }

    pub fn cancel_add(&self) {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, PanelState::Adding(_)) {
            return;
        }
        inner.stream.invalidate();
        inner.editor.cancel();
        inner.state = PanelState::Browsing;
        inner.redraw();
    }

    /// Opens a territory and fits the map to it.
    pub fn select(&self, id: &TerritoryId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(bounds) = inner.store.get(id).map(|t| t.path.bounds()) else {
            return false;
        };
        let was_adding = matches!(inner.state, PanelState::Adding(_));
        if was_adding {
            inner.stream.invalidate();
            inner.editor.cancel();
        }
        inner.state = PanelState::Viewing {
            territory: id.clone(),
            manager_selection: Vec::new(),
        };
        if was_adding {
            inner.redraw();
        }
        if let Some(bounds) = bounds {
            inner.map.fit_bounds(bounds);
        }
        true
    }

    pub fn close_view(&self) {
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.state, PanelState::Viewing { .. }) {
            inner.state = PanelState::Browsing;
        }
    }

    pub fn set_manager_selection(&self, ids: Vec<String>) -> bool {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.state {
            PanelState::Viewing {
                manager_selection, ..
            } => {
                *manager_selection = ids;
                true
            }
            _ => false,
        }
    }

    pub async fn delete(&self, id: &TerritoryId) -> Result<(), WorkflowError> {
        let saved_id = {
            let mut inner = self.inner.borrow_mut();
            if inner.store.get(id).is_none() {
                return Err(inner.fail(ValidationError::UnknownTerritory.into()));
            }
            match id.saved() {
                Some(saved) => saved.to_string(),
                None => return Err(inner.fail(ValidationError::UnsavedTerritory.into())),
            }
        };

        let result = self.persistence.delete_territory(saved_id).await;

        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(()) => {
                inner.store.remove(id);
                if matches!(&inner.state, PanelState::Viewing { territory, .. } if territory == id) {
                    inner.state = PanelState::Browsing;
                }
                inner.redraw();
                inner.notices.replace(NoticeKind::Success, DELETED);
                info!(territory = %id, "territory deleted");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, territory = %id, "territory delete failed");
                let message = format!("Error deleting territory. {}", err.user_message(&err.message));
                inner.notices.replace(NoticeKind::Error, message);
                Err(err.into())
            }
        }
    }

    /// Links the selected managers to every point inside the open territory.
    pub async fn assign_managers(&self) -> Result<u64, WorkflowError> {
        let (territory_id, polygon, manager_ids) = {
            let mut inner = self.inner.borrow_mut();
            let PanelState::Viewing {
                territory,
                manager_selection,
            } = &inner.state
            else {
                return Err(inner.fail(ValidationError::UnknownTerritory.into()));
            };
            let (territory, manager_ids) = (territory.clone(), manager_selection.clone());
            let Some(saved) = territory.saved().map(str::to_string) else {
                return Err(inner.fail(ValidationError::UnsavedTerritory.into()));
            };
            if manager_ids.is_empty() {
                return Err(inner.fail(ValidationError::NoManagers.into()));
            }
            let geometry = inner.store.get(&territory).map(|t| t.path.to_geometry());
            let polygon = match geometry {
                Some(Ok(polygon)) => polygon,
                Some(Err(err)) => return Err(inner.fail(err.into())),
                None => return Err(inner.fail(ValidationError::UnknownTerritory.into())),
            };
            (saved, polygon, manager_ids)
        };

        let result = self
            .persistence
            .assign_managers(territory_id.clone(), polygon, manager_ids)
            .await;

        let mut inner = self.inner.borrow_mut();
        match result {
            Ok(affected) => {
                info!(territory = %territory_id, affected, "managers assigned");
                inner.notices.replace(NoticeKind::Success, MANAGERS_ASSIGNED);
                if let PanelState::Viewing {
                    manager_selection, ..
                } = &mut inner.state
                {
                    manager_selection.clear();
                }
                Ok(affected)
            }
            Err(err) => {
                warn!(error = %err, territory = %territory_id, "manager assignment failed");
                inner
                    .notices
                    .replace(NoticeKind::Error, err.user_message(MANAGERS_FAILED).to_string());
                Err(err.into())
            }
        }
    }

    /// Redraws saved territories (hidden while adding).
    pub fn redraw(&self) {
        self.inner.borrow_mut().redraw();
    }

    pub fn success_message(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.notices.latest(NoticeKind::Success).map(|n| n.message.clone())
    }

    pub fn error(&self) -> Option<String> {
        let inner = self.inner.borrow();
        inner.notices.latest(NoticeKind::Error).map(|n| n.message.clone())
    }

    pub fn dismiss_notices(&self) {
        self.inner.borrow_mut().notices.clear();
    }
}
