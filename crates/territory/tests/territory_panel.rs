use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use foundation::geo::LatLng;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use layers::map::{MapOp, RecordingMap};
use pretty_assertions::assert_eq;
use streaming::gateway::{BoxFuture, DataUnavailable, GatewayResult, TerritoryPersistence};
use streaming::protocol::{CreateTerritory, CreatedTerritory, Geometry, TerritoryRecord};
use territory::{AddMode, PanelState, TerritoryId, TerritoryPanel, ValidationError, WorkflowError};

type Reply<T> = oneshot::Receiver<GatewayResult<T>>;

#[derive(Default)]
struct ScriptedPersistence {
    creates: RefCell<VecDeque<Reply<CreatedTerritory>>>,
    create_calls: RefCell<Vec<CreateTerritory>>,
    delete_reply: RefCell<Option<GatewayResult<()>>>,
    delete_calls: RefCell<Vec<String>>,
    assign_calls: RefCell<Vec<(String, Vec<String>)>>,
    zip_reply: RefCell<Option<GatewayResult<Option<String>>>>,
}

impl ScriptedPersistence {
    fn script_create(&self) -> oneshot::Sender<GatewayResult<CreatedTerritory>> {
        let (tx, rx) = oneshot::channel();
        self.creates.borrow_mut().push_back(rx);
        tx
    }
}

impl TerritoryPersistence for ScriptedPersistence {
    fn list_territories(&self) -> BoxFuture<'_, GatewayResult<Vec<TerritoryRecord>>> {
        Box::pin(async { Ok(vec![record("t1", "North"), record("t2", "South")]) })
    }

    fn create_territory(
        &self,
        request: CreateTerritory,
    ) -> BoxFuture<'_, GatewayResult<CreatedTerritory>> {
        self.create_calls.borrow_mut().push(request);
        let rx = self.creates.borrow_mut().pop_front();
        Box::pin(async move {
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(DataUnavailable::new("reply dropped"))),
                None => Err(DataUnavailable::new("no reply scripted")),
            }
        })
    }

    fn delete_territory(&self, territory_id: String) -> BoxFuture<'_, GatewayResult<()>> {
        self.delete_calls.borrow_mut().push(territory_id);
        let reply = self.delete_reply.borrow_mut().take().unwrap_or(Ok(()));
        Box::pin(async move { reply })
    }

    fn assign_managers(
        &self,
        territory_id: String,
        _polygon: Geometry,
        manager_ids: Vec<String>,
    ) -> BoxFuture<'_, GatewayResult<u64>> {
        self.assign_calls.borrow_mut().push((territory_id, manager_ids));
        Box::pin(async { Ok(11) })
    }

    fn zip_polygon(&self, _zip: String) -> BoxFuture<'_, GatewayResult<Option<String>>> {
        let reply = self.zip_reply.borrow_mut().take().unwrap_or(Ok(None));
        Box::pin(async move { reply })
    }
}

fn record(id: &str, name: &str) -> TerritoryRecord {
    TerritoryRecord {
        id: id.to_string(),
        name: name.to_string(),
        color: Some("#00AA00".into()),
        geom: Some(Geometry::polygon(vec![
            [-75.0, 40.0],
            [-74.0, 40.0],
            [-74.0, 41.0],
            [-75.0, 40.0],
        ])),
    }
}

fn triangle() -> Vec<LatLng> {
    vec![
        LatLng::new(39.0, -76.0),
        LatLng::new(39.0, -75.5),
        LatLng::new(39.5, -75.5),
    ]
}

fn setup() -> (
    Rc<ScriptedPersistence>,
    Rc<RecordingMap>,
    TerritoryPanel<ScriptedPersistence, RecordingMap>,
) {
    let persistence = Rc::new(ScriptedPersistence::default());
    let map = Rc::new(RecordingMap::new());
    let panel = TerritoryPanel::new(persistence.clone(), map.clone());
    (persistence, map, panel)
}

#[test]
fn saved_territories_are_drawn_except_while_adding() {
    let (_persistence, map, panel) = setup();
    assert_eq!(block_on(panel.reload()).ok(), Some(2));
    assert_eq!(map.live_overlays(), 2);

    panel.begin_add();
    assert_eq!(map.live_overlays(), 0);
    panel.cancel_add();
    assert_eq!(map.live_overlays(), 2);
    assert_eq!(panel.state(), PanelState::Browsing);
}

#[test]
fn save_shows_placeholder_then_confirms_in_place() {
    let (persistence, _map, panel) = setup();
    panel.load(vec![record("t1", "North")]);
    panel.begin_add();
    panel.update_draft(|d| {
        d.name = "  Harbor ".into();
        d.manager_ids = vec!["m1".into()];
    });
    panel.on_overlay_complete(triangle()).expect("valid shape");

    let tx = persistence.script_create();
    let mut save = Box::pin(panel.save());
    assert!((&mut save).now_or_never().is_none());
    let names: Vec<_> = panel.territories().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["North".to_string(), "Harbor".to_string()]);
    assert!(matches!(panel.territories()[1].id, TerritoryId::Pending(_)));
    assert!(matches!(block_on(panel.save()), Err(WorkflowError::Busy)));

    tx.send(Ok(CreatedTerritory {
        record: record("t9", "Harbor"),
        manager_warning: None,
    }))
    .expect("receiver alive");
    let id = block_on(&mut save).expect("saved");
    assert_eq!(id, TerritoryId::Saved("t9".into()));
    assert_eq!(panel.territories()[1].id, id);
    assert_eq!(
        panel.state(),
        PanelState::Viewing {
            territory: id,
            manager_selection: Vec::new(),
        }
    );
    assert_eq!(panel.success_message().as_deref(), Some("Territory saved successfully."));

    let calls = persistence.create_calls.borrow();
    let request = &calls[0];
    assert_eq!(request.name, "Harbor");
    assert_eq!(request.manager_ids, vec!["m1".to_string()]);
    assert_eq!(request.polygon.outer_ring().len(), 4);
}

#[test]
fn save_survives_a_reload_while_in_flight() {
    let (persistence, map, panel) = setup();
    panel.begin_add();
    panel.update_draft(|d| d.name = "Harbor".into());
    panel.on_overlay_complete(triangle()).expect("valid shape");

    let tx = persistence.script_create();
    let mut save = Box::pin(panel.save());
    assert!((&mut save).now_or_never().is_none());
    assert_eq!(block_on(panel.reload()).ok(), Some(2));

    let mut saved = record("t9", "Harbor");
    saved.geom = None;
    tx.send(Ok(CreatedTerritory {
        record: saved,
        manager_warning: None,
    }))
    .expect("receiver alive");
    let id = block_on(&mut save).expect("saved");
    assert_eq!(id, TerritoryId::Saved("t9".into()));

    let ids: Vec<_> = panel.territories().into_iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, vec!["t1".to_string(), "t2".to_string(), "t9".to_string()]);
    let harbor = panel
        .territories()
        .into_iter()
        .find(|t| t.id == id)
        .expect("saved territory listed");
    assert_eq!(harbor.path.vertex_count(), 3);
    assert!(panel.select(&id));
    assert_eq!(map.live_overlays(), 3);
}

#[test]
fn manager_link_warning_is_reported_as_an_error() {
    let (persistence, _map, panel) = setup();
    panel.begin_add();
    panel.update_draft(|d| {
        d.name = "Harbor".into();
        d.manager_ids = vec!["m1".into()];
    });
    panel.on_overlay_complete(triangle()).expect("valid shape");

    persistence
        .script_create()
        .send(Ok(CreatedTerritory {
            record: record("t9", "Harbor"),
            manager_warning: Some("Territory saved, but failed to assign managers.".into()),
        }))
        .expect("receiver alive");
    assert!(block_on(panel.save()).is_ok());
    assert_eq!(panel.success_message().as_deref(), Some("Territory saved successfully."));
    assert_eq!(
        panel.error().as_deref(),
        Some("Territory saved, but failed to assign managers.")
    );
}

#[test]
fn failed_save_rolls_back_and_keeps_the_draft() {
    let (persistence, map, panel) = setup();
    panel.begin_add();
    panel.update_draft(|d| d.name = "Harbor".into());
    panel.on_overlay_complete(triangle()).expect("valid shape");

    persistence
        .script_create()
        .send(Err(DataUnavailable::new("insert failed")))
        .expect("receiver alive");
    assert!(block_on(panel.save()).is_err());
    assert!(panel.territories().is_empty());
    assert!(matches!(panel.state(), PanelState::Adding(_)));
    assert!(panel.draft_path().is_some());
    assert_eq!(map.live_overlays(), 1);
    assert_eq!(panel.error().as_deref(), Some("Failed to save territory."));
}

#[test]
fn save_requires_name_and_polygon() {
    let (persistence, _map, panel) = setup();
    panel.begin_add();
    let err = block_on(panel.save()).expect_err("no name");
    assert!(matches!(err, WorkflowError::Validation(ValidationError::EmptyName)));

    panel.update_draft(|d| d.name = "Harbor".into());
    let err = block_on(panel.save()).expect_err("no polygon");
    assert!(matches!(err, WorkflowError::Validation(ValidationError::NoPolygon)));
    assert!(persistence.create_calls.borrow().is_empty());
}

#[test]
fn zip_lookup_loads_an_editable_polygon() {
    let (persistence, map, panel) = setup();
    panel.begin_add();
    panel.set_add_mode(AddMode::Zip);
    panel.update_draft(|d| d.zip = " 19103 ".into());
    *persistence.zip_reply.borrow_mut() = Some(Ok(Some(
        "POLYGON((-75.18 39.95, -75.16 39.95, -75.16 39.96, -75.18 39.96, -75.18 39.95))".into(),
    )));

    let path = block_on(panel.search_zip()).expect("zip polygon");
    assert_eq!(path.vertex_count(), 4);
    assert!(matches!(
        map.ops().last(),
        Some(MapOp::ShowPolygon(_, _, true))
    ));

    *persistence.zip_reply.borrow_mut() = Some(Ok(None));
    let err = block_on(panel.search_zip()).expect_err("unknown zip");
    assert!(matches!(err, WorkflowError::Validation(ValidationError::ZipNotFound(_))));
    assert!(panel.draft_path().is_some());
}

#[test]
fn select_fits_bounds_and_assigns_managers() {
    let (persistence, map, panel) = setup();
    panel.load(vec![record("t1", "North")]);
    let id = TerritoryId::Saved("t1".into());
    assert!(panel.select(&id));
    assert!(matches!(map.ops().last(), Some(MapOp::FitBounds(_))));

    let err = block_on(panel.assign_managers()).expect_err("no managers");
    assert!(matches!(err, WorkflowError::Validation(ValidationError::NoManagers)));

    panel.set_manager_selection(vec!["m1".into(), "m2".into()]);
    assert_eq!(block_on(panel.assign_managers()).ok(), Some(11));
    assert_eq!(
        persistence.assign_calls.borrow().as_slice(),
        &[("t1".to_string(), vec!["m1".to_string(), "m2".to_string()])]
    );
}

#[test]
fn delete_removes_from_list_and_map() {
    let (persistence, map, panel) = setup();
    panel.load(vec![record("t1", "North"), record("t2", "South")]);
    let id = TerritoryId::Saved("t1".into());
    panel.select(&id);

    block_on(panel.delete(&id)).expect("deleted");
    assert_eq!(persistence.delete_calls.borrow().as_slice(), &["t1".to_string()]);
    assert_eq!(panel.territories().len(), 1);
    assert_eq!(panel.state(), PanelState::Browsing);
    assert_eq!(map.live_overlays(), 1);

    *persistence.delete_reply.borrow_mut() = Some(Err(DataUnavailable::new("row is locked")));
    let south = TerritoryId::Saved("t2".into());
    assert!(block_on(panel.delete(&south)).is_err());
    assert_eq!(panel.territories().len(), 1);
    assert_eq!(
        panel.error().as_deref(),
        Some("Error deleting territory. row is locked")
    );
}

#[test]
fn search_filters_by_name() {
    let (_persistence, _map, panel) = setup();
    panel.load(vec![record("t1", "North Side"), record("t2", "Downtown")]);
    panel.set_query("side");
    let names: Vec<_> = panel.visible().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["North Side".to_string()]);
}
