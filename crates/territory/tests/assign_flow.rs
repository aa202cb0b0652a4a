use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use foundation::bounds::LatLngBounds;
use foundation::geo::LatLng;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use layers::map::{DrawingMode, RecordingMap};
use pretty_assertions::assert_eq;
use runtime::frame::Frame;
use streaming::gateway::{BoxFuture, DataUnavailable, GatewayResult, GeoDataGateway};
use streaming::protocol::{
    AssignmentStatsRow, ClusterPoint, Geometry, IndividualPoint, PointFilter,
};
use territory::{AssignLeadsSession, EditorState, VertexEdit, WorkflowError};

type Reply<T> = oneshot::Receiver<GatewayResult<T>>;

#[derive(Default)]
struct ScriptedGateway {
    stats: RefCell<VecDeque<Reply<Vec<AssignmentStatsRow>>>>,
    commits: RefCell<VecDeque<Reply<u64>>>,
    stats_calls: RefCell<Vec<Geometry>>,
    commit_calls: RefCell<Vec<(Geometry, String)>>,
}

impl ScriptedGateway {
    fn script_stats(&self) -> oneshot::Sender<GatewayResult<Vec<AssignmentStatsRow>>> {
        let (tx, rx) = oneshot::channel();
        self.stats.borrow_mut().push_back(rx);
        tx
    }

    fn script_commit(&self) -> oneshot::Sender<GatewayResult<u64>> {
        let (tx, rx) = oneshot::channel();
        self.commits.borrow_mut().push_back(rx);
        tx
    }
}

fn reply<T: 'static>(queue: &RefCell<VecDeque<Reply<T>>>) -> BoxFuture<'static, GatewayResult<T>> {
    let rx = queue.borrow_mut().pop_front();
    Box::pin(async move {
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(DataUnavailable::new("reply dropped"))),
            None => Err(DataUnavailable::new("no reply scripted")),
        }
    })
}

impl GeoDataGateway for ScriptedGateway {
    fn query_clusters(
        &self,
        _zoom_level: u8,
        _bounds: Option<LatLngBounds>,
    ) -> BoxFuture<'_, GatewayResult<Vec<ClusterPoint>>> {
        Box::pin(async { Err(DataUnavailable::new("unused")) })
    }

    fn query_individuals(
        &self,
        _bounds: LatLngBounds,
        _filters: Vec<PointFilter>,
    ) -> BoxFuture<'_, GatewayResult<Vec<IndividualPoint>>> {
        Box::pin(async { Err(DataUnavailable::new("unused")) })
    }

    fn query_polygon_stats(
        &self,
        polygon: Geometry,
    ) -> BoxFuture<'_, GatewayResult<Vec<AssignmentStatsRow>>> {
        self.stats_calls.borrow_mut().push(polygon);
        reply(&self.stats)
    }

    fn commit_assignment(
        &self,
        polygon: Geometry,
        assignee_id: String,
    ) -> BoxFuture<'_, GatewayResult<u64>> {
        self.commit_calls.borrow_mut().push((polygon, assignee_id));
        reply(&self.commits)
    }
}

fn row(id: Option<&str>, total: u64) -> AssignmentStatsRow {
    AssignmentStatsRow {
        assignee_id: id.map(str::to_string),
        first_name: id.map(|_| "A".to_string()),
        last_name: id.map(|_| "B".to_string()),
        total,
    }
}

fn square() -> Vec<LatLng> {
    vec![
        LatLng::new(40.0, -75.0),
        LatLng::new(40.0, -74.9),
        LatLng::new(40.1, -74.9),
        LatLng::new(40.1, -75.0),
    ]
}

fn setup() -> (
    Rc<ScriptedGateway>,
    Rc<RecordingMap>,
    AssignLeadsSession<ScriptedGateway, RecordingMap>,
) {
    let gateway = Rc::new(ScriptedGateway::default());
    let map = Rc::new(RecordingMap::new());
    let session = AssignLeadsSession::new(gateway.clone(), map.clone());
    (gateway, map, session)
}

#[test]
fn completed_shape_shows_totals_including_unassigned() {
    let (gateway, map, session) = setup();
    session.set_draw_mode(true);
    assert_eq!(map.drawing_mode(), DrawingMode::Polygon);

    gateway
        .script_stats()
        .send(Ok(vec![row(None, 3), row(Some("u1"), 5)]))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");

    let stats = session.stats().stats();
    assert_eq!(stats.total, 8);
    assert_eq!(stats.unassigned(), 3);
    assert_eq!(stats.lines()[0], "No assigned user: 3 pin(s)");

    let calls = gateway.stats_calls.borrow();
    let sent = &calls[0];
    assert_eq!(sent.outer_ring().first(), sent.outer_ring().last());
}

#[test]
fn latest_edit_wins_for_stats() {
    let (gateway, _map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(vec![row(None, 1)]))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");

    let tx_old = gateway.script_stats();
    let tx_new = gateway.script_stats();
    let mut old = Box::pin(session.on_vertex_edit(VertexEdit::Set(0, LatLng::new(39.9, -75.1))));
    assert!((&mut old).now_or_never().is_none());
    let mut new = Box::pin(session.on_vertex_edit(VertexEdit::Insert(1, LatLng::new(39.95, -74.95))));
    assert!((&mut new).now_or_never().is_none());

    tx_new.send(Ok(vec![row(Some("u1"), 12)])).expect("receiver alive");
    assert!(block_on(&mut new).is_some());
    tx_old.send(Ok(vec![row(Some("u1"), 99)])).expect("receiver alive");
    assert!(block_on(&mut old).is_some());

    assert_eq!(session.stats().stats().total, 12);
}

#[test]
fn short_shapes_never_reach_the_service() {
    let (gateway, _map, session) = setup();
    session.set_draw_mode(true);
    session.select_assignee(Some("u1".into()));

    let err = block_on(session.on_overlay_complete(vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]))
        .expect_err("two vertices");
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(block_on(session.assign()).is_err());

    assert!(gateway.stats_calls.borrow().is_empty());
    assert!(gateway.commit_calls.borrow().is_empty());
    assert_eq!(session.stats().stats().total, 0);
}

#[test]
fn removing_vertices_below_three_resets_stats() {
    let (gateway, _map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(vec![row(None, 4)]))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    assert_eq!(session.stats().stats().total, 4);

    gateway
        .script_stats()
        .send(Ok(vec![row(None, 2)]))
        .expect("receiver alive");
    block_on(session.on_vertex_edit(VertexEdit::Remove(3)));
    assert_eq!(session.stats().stats().total, 2);

    block_on(session.on_vertex_edit(VertexEdit::Remove(2)));
    assert_eq!(session.stats().stats().total, 0);
    assert_eq!(gateway.stats_calls.borrow().len(), 2);
}

#[test]
fn successful_assignment_reports_count_and_tears_down() {
    let (gateway, map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(vec![row(None, 7)]))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    session.select_assignee(Some("u1".into()));
    assert_eq!(map.live_overlays(), 1);

    gateway.script_commit().send(Ok(7)).expect("receiver alive");
    assert_eq!(block_on(session.assign()).ok(), Some(7));

    let message = session.workflow().success_message().expect("success shown");
    assert!(message.contains('7'), "{message}");
    assert_eq!(map.live_overlays(), 0);
    assert_eq!(session.editor_state(), EditorState::Committed);
    assert!(!session.is_draw_mode());

    let (polygon, assignee) = gateway.commit_calls.borrow()[0].clone();
    assert_eq!(assignee, "u1");
    assert_eq!(polygon.outer_ring().len(), 5);

    let tick = Frame::new(0, Duration::from_secs(1));
    assert!(!session.advance(tick));
    assert!(session.advance(tick.next()));
    assert!(!session.workflow().is_open());
}

#[test]
fn failed_assignment_keeps_polygon_and_selection() {
    let (gateway, map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(Vec::new()))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    session.select_assignee(Some("u1".into()));

    gateway
        .script_commit()
        .send(Err(DataUnavailable::from_server("rpc failed", "user is inactive")))
        .expect("receiver alive");
    assert!(matches!(
        block_on(session.assign()),
        Err(WorkflowError::Unavailable(_))
    ));
    assert_eq!(session.workflow().error().as_deref(), Some("user is inactive"));
    assert_eq!(map.live_overlays(), 1);
    assert!(session.path().is_some());
    assert_eq!(session.workflow().assignee().as_deref(), Some("u1"));
    assert!(session.is_draw_mode());
}

#[test]
fn second_submit_while_in_flight_is_busy() {
    let (gateway, _map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(Vec::new()))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    session.select_assignee(Some("u1".into()));

    let tx = gateway.script_commit();
    let mut first = Box::pin(session.assign());
    assert!((&mut first).now_or_never().is_none());
    assert!(matches!(block_on(session.assign()), Err(WorkflowError::Busy)));

    tx.send(Ok(3)).expect("receiver alive");
    assert_eq!(block_on(&mut first).ok(), Some(3));
    assert_eq!(gateway.commit_calls.borrow().len(), 1);
}

#[test]
fn closing_the_panel_drops_an_in_flight_commit() {
    let (gateway, _map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(Vec::new()))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    session.select_assignee(Some("u1".into()));

    let tx = gateway.script_commit();
    let mut pending = Box::pin(session.assign());
    assert!((&mut pending).now_or_never().is_none());
    session.close();

    tx.send(Ok(5)).expect("receiver alive");
    assert!(matches!(block_on(&mut pending), Err(WorkflowError::Superseded)));
    assert_eq!(session.workflow().success_message(), None);
}

#[test]
fn redrawing_drops_the_old_polygons_commit() {
    let (gateway, map, session) = setup();
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(Vec::new()))
        .expect("receiver alive");
    block_on(session.on_overlay_complete(square())).expect("valid shape");
    session.select_assignee(Some("u1".into()));

    let tx = gateway.script_commit();
    let mut pending = Box::pin(session.assign());
    assert!((&mut pending).now_or_never().is_none());

    session.set_draw_mode(false);
    session.set_draw_mode(true);
    gateway
        .script_stats()
        .send(Ok(vec![row(None, 2)]))
        .expect("receiver alive");
    let triangle = vec![
        LatLng::new(41.0, -75.0),
        LatLng::new(41.0, -74.9),
        LatLng::new(41.1, -74.9),
    ];
    let drawn = block_on(session.on_overlay_complete(triangle)).expect("valid shape");

    tx.send(Ok(5)).expect("receiver alive");
    assert!(matches!(block_on(&mut pending), Err(WorkflowError::Superseded)));
    assert_eq!(map.live_overlays(), 1);
    assert!(session.is_draw_mode());
    assert_eq!(session.path(), Some(drawn));
    assert!(matches!(session.editor_state(), EditorState::Drawn { .. }));
    assert_eq!(session.workflow().success_message(), None);
    assert_eq!(session.stats().stats().total, 2);
}
