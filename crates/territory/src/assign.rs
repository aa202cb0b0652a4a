//! Points → assignee commit for the polygon being edited.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use runtime::frame::{Countdown, Frame};
use runtime::notices::{NoticeBoard, NoticeKind};
use streaming::gateway::{GeoDataGateway, ManagerDirectory};
use streaming::protocol::ManagerRef;
use streaming::request::FetchStream;
use tracing::{info, warn};

use crate::error::{ValidationError, WorkflowError};
use crate::polygon::PolygonPath;

pub const ASSIGN_STREAM: &str = "assignment";
pub const AUTO_CLOSE_DELAY: Duration = Duration::from_secs(2);
pub const ASSIGN_FAILED: &str = "Failed to assign leads. Please try again.";
pub const USERS_FAILED: &str = "Failed to load users. Please try again.";

pub fn assigned_message(affected: u64) -> String {
    format!("Successfully assigned {affected} pins to user.")
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AssignConfig {
    /// How long the success message stays up before the panel closes.
    pub auto_close: Duration,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            auto_close: AUTO_CLOSE_DELAY,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssignPhase {
    Open,
    Assigning,
    Succeeded { affected: u64 },
    Closed,
}

#[derive(Debug)]
struct AssignState {
    phase: AssignPhase,
    assignee: Option<String>,
    assignees: Vec<ManagerRef>,
    countdown: Option<Countdown>,
    notices: NoticeBoard,
    stream: FetchStream,
}

pub struct AssignmentWorkflow<G: ?Sized> {
    gateway: Rc<G>,
    config: AssignConfig,
    state: Rc<RefCell<AssignState>>,
}

impl<G: ?Sized> Clone for AssignmentWorkflow<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
            config: self.config,
            state: Rc::clone(&self.state),
        }
    }
}

impl<G: GeoDataGateway + ?Sized> AssignmentWorkflow<G> {
    pub fn new(gateway: Rc<G>) -> Self {
        Self::with_config(gateway, AssignConfig::default())
    }

    pub fn with_config(gateway: Rc<G>, config: AssignConfig) -> Self {
        Self {
            gateway,
            config,
            state: Rc::new(RefCell::new(AssignState {
                phase: AssignPhase::Open,
                assignee: None,
                assignees: Vec::new(),
                countdown: None,
                notices: NoticeBoard::new(),
                stream: FetchStream::new(ASSIGN_STREAM),
            })),
        }
    }

    pub fn phase(&self) -> AssignPhase {
        self.state.borrow().phase
    }

    pub fn is_open(&self) -> bool {
        self.phase() != AssignPhase::Closed
    }

    pub fn select_assignee(&self, assignee: Option<String>) {
        self.state.borrow_mut().assignee = assignee.filter(|id| !id.trim().is_empty());
    }

    pub fn assignee(&self) -> Option<String> {
        self.state.borrow().assignee.clone()
    }

    /// Users offered for selection, as last loaded.
    pub fn assignees(&self) -> Vec<ManagerRef> {
        self.state.borrow().assignees.clone()
    }

    pub async fn load_assignees<D: ManagerDirectory + ?Sized>(&self, directory: &D) -> Vec<ManagerRef> {
        match directory.list_managers().await {
            Ok(managers) => {
                self.state.borrow_mut().assignees = managers.clone();
                managers
            }
            Err(err) => {
                warn!(error = %err, "failed to load assignable users");
                self.state
                    .borrow_mut()
                    .notices
                    .replace(NoticeKind::Error, USERS_FAILED);
                Vec::new()
            }
        }
    }

    /// Assigns every point inside `path` to the selected user.
    ///
    /// Failures keep the selection and leave the panel open; the service's
    /// own message is shown when it sent one.
    pub async fn assign(&self, path: Option<&PolygonPath>) -> Result<u64, WorkflowError> {
        let (ticket, geometry, assignee) = {
            let mut state = self.state.borrow_mut();
            if state.phase == AssignPhase::Assigning {
                return Err(WorkflowError::Busy);
            }
            let prepared = match (state.assignee.clone(), path) {
                (None, _) => Err(ValidationError::NoAssignee),
                (Some(_), None) => Err(ValidationError::NoPolygon),
                (Some(assignee), Some(path)) => path.to_geometry().map(|g| (g, assignee)),
            };
            let (geometry, assignee) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    state.notices.replace(NoticeKind::Error, err.to_string());
                    return Err(err.into());
                }
            };
            state.notices.clear();
            state.phase = AssignPhase::Assigning;
            (state.stream.begin(), geometry, assignee)
        };

        let result = self.gateway.commit_assignment(geometry, assignee.clone()).await;

        let mut state = self.state.borrow_mut();
        let Some(result) = state.stream.settle(ticket, result) else {
            return Err(WorkflowError::Superseded);
        };
        match result {
            Ok(affected) => {
                info!(affected, %assignee, "leads assigned");
                state.notices.replace(NoticeKind::Success, assigned_message(affected));
                state.phase = AssignPhase::Succeeded { affected };
                state.countdown = Some(Countdown::new(self.config.auto_close));
                Ok(affected)
            }
            Err(err) => {
                warn!(error = %err, "lead assignment failed");
                state
                    .notices
                    .replace(NoticeKind::Error, err.user_message(ASSIGN_FAILED).to_string());
                state.phase = AssignPhase::Open;
                Err(err.into())
            }
        }
    }

    /// Runs the auto-close timer. Returns `true` on the frame that closes the panel.
    pub fn advance(&self, frame: Frame) -> bool {
        let elapsed = {
            let mut state = self.state.borrow_mut();
            match state.countdown.as_mut() {
                Some(countdown) => countdown.tick(frame),
                None => false,
            }
        };
        if elapsed {
            self.close();
        }
        elapsed
    }

    /// Closes the panel. A commit still in flight is ignored when it lands.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.stream.invalidate();
        state.phase = AssignPhase::Closed;
        state.countdown = None;
        state.notices.clear();
    }

    /// The polygon being assigned was discarded. A commit still in flight is
    /// ignored when it lands and the panel accepts a new submit.
    pub fn abandon(&self) {
        let mut state = self.state.borrow_mut();
        state.stream.invalidate();
        if state.phase == AssignPhase::Assigning {
            state.phase = AssignPhase::Open;
        }
    }

    pub fn open(&self) {
        let mut state = self.state.borrow_mut();
        if state.phase == AssignPhase::Closed {
            state.phase = AssignPhase::Open;
        }
    }

    pub fn success_message(&self) -> Option<String> {
        let state = self.state.borrow();
        state.notices.latest(NoticeKind::Success).map(|n| n.message.clone())
    }

    pub fn error(&self) -> Option<String> {
        let state = self.state.borrow();
        state.notices.latest(NoticeKind::Error).map(|n| n.message.clone())
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().notices.clear_kind(NoticeKind::Error);
    }
}
