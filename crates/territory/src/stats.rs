use std::cell::RefCell;
use std::rc::Rc;

use runtime::notices::{NoticeBoard, NoticeKind};
use streaming::gateway::GeoDataGateway;
use streaming::load::LoadState;
use streaming::protocol::AssignmentStatsRow;
use streaming::request::FetchStream;
use tracing::{debug, warn};

use crate::polygon::PolygonPath;

pub const STATS_STREAM: &str = "polygon-stats";
pub const STATS_FAILED: &str = "Failed to load polygon stats.";

/// Point counts inside one polygon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolygonStats {
    pub total: u64,
    pub rows: Vec<AssignmentStatsRow>,
}

impl PolygonStats {
    /// Grand total is the sum of every row, the unassigned bucket included.
    pub fn from_rows(rows: Vec<AssignmentStatsRow>) -> Self {
        let total = rows.iter().map(|row| row.total).sum();
        Self { total, rows }
    }

    pub fn unassigned(&self) -> u64 {
        self.rows
            .iter()
            .filter(|row| row.assignee_id.is_none())
            .map(|row| row.total)
            .sum()
    }

    /// One display line per row, in service order.
    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(row_line).collect()
    }
}

fn row_line(row: &AssignmentStatsRow) -> String {
    let Some(id) = row.assignee_id.as_deref() else {
        return format!("No assigned user: {} pin(s)", row.total);
    };
    let first = row.first_name.as_deref().map(str::trim).unwrap_or("");
    let last = row.last_name.as_deref().map(str::trim).unwrap_or("");
    if first.is_empty() || last.is_empty() {
        format!("Unknown user ({id}) - {} pin(s)", row.total)
    } else {
        format!("{first} {last} - {} pin(s)", row.total)
    }
}

#[derive(Debug, Default)]
struct StatsState {
    stats: PolygonStats,
    load: LoadState,
    notices: NoticeBoard,
}

/// Live counts for the polygon being edited.
///
/// Every emission of the editor calls `refresh`; the stream keeps only the
/// latest answer, so a slow query for an older shape never overwrites a newer one.
pub struct PolygonStatsPanel<G: ?Sized> {
    gateway: Rc<G>,
    stream: Rc<RefCell<FetchStream>>,
    state: Rc<RefCell<StatsState>>,
}

impl<G: ?Sized> Clone for PolygonStatsPanel<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
            stream: Rc::clone(&self.stream),
            state: Rc::clone(&self.state),
        }
    }
}

impl<G: GeoDataGateway + ?Sized> PolygonStatsPanel<G> {
    pub fn new(gateway: Rc<G>) -> Self {
        Self {
            gateway,
            stream: Rc::new(RefCell::new(FetchStream::new(STATS_STREAM))),
            state: Rc::new(RefCell::new(StatsState::default())),
        }
    }

    /// Queries counts for `path`. Paths that do not validate reset the panel
    /// without calling the service. Returns whether new stats were applied.
    pub async fn refresh(&self, path: &PolygonPath) -> bool {
        let geometry = match path.to_geometry() {
            Ok(geometry) => geometry,
            Err(err) => {
                debug!(%err, "polygon not ready for stats");
                self.clear();
                return false;
            }
        };
        let ticket = self.stream.borrow_mut().begin();
        self.state.borrow_mut().load = LoadState::Loading {
            generation: ticket.generation,
        };

        let result = self.gateway.query_polygon_stats(geometry).await;

        let Some(result) = self.stream.borrow_mut().settle(ticket, result) else {
            return false;
        };
        let mut state = self.state.borrow_mut();
        match result {
            Ok(rows) => {
                state.stats = PolygonStats::from_rows(rows);
                state.load = LoadState::Ready;
                state.notices.clear_kind(NoticeKind::Error);
                true
            }
            Err(err) => {
                warn!(error = %err, "polygon stats query failed");
                state.stats = PolygonStats::default();
                state.notices.replace(NoticeKind::Error, STATS_FAILED);
                state.load = LoadState::Failed {
                    message: STATS_FAILED.to_string(),
                };
                false
            }
        }
    }

    /// Zeroes the counts and drops any in-flight answer.
    pub fn clear(&self) {
        self.stream.borrow_mut().invalidate();
        let mut state = self.state.borrow_mut();
        state.stats = PolygonStats::default();
        state.load = LoadState::Idle;
        state.notices.clear();
    }

    pub fn stats(&self) -> PolygonStats {
        self.state.borrow().stats.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().load.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        let state = self.state.borrow();
        state.notices.latest(NoticeKind::Error).map(|n| n.message.clone())
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().notices.clear_kind(NoticeKind::Error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(id: Option<&str>, first: Option<&str>, last: Option<&str>, total: u64) -> AssignmentStatsRow {
        AssignmentStatsRow {
            assignee_id: id.map(str::to_string),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            total,
        }
    }

    #[test]
    fn unassigned_rows_count_toward_the_total() {
        let stats = PolygonStats::from_rows(vec![
            row(None, None, None, 3),
            row(Some("u1"), Some("A"), Some("B"), 5),
        ]);
        assert_eq!(stats.total, 8);
        assert_eq!(stats.unassigned(), 3);
        assert_eq!(
            stats.lines(),
            vec!["No assigned user: 3 pin(s)".to_string(), "A B - 5 pin(s)".to_string()]
        );
    }

    #[test]
    fn missing_names_fall_back_to_the_id() {
        let stats = PolygonStats::from_rows(vec![row(Some("u9"), Some("Ann"), None, 2)]);
        assert_eq!(stats.lines(), vec!["Unknown user (u9) - 2 pin(s)".to_string()]);
    }

    #[test]
    fn empty_rows_mean_zero() {
        assert_eq!(PolygonStats::from_rows(Vec::new()), PolygonStats::default());
    }
}
