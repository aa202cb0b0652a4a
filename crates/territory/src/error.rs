use streaming::gateway::DataUnavailable;

/// A local precondition that failed before any call was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    TooFewVertices { found: usize },
    NonFiniteVertex { index: usize },
    NoPolygon,
    NoAssignee,
    EmptyName,
    NoManagers,
    UnsavedTerritory,
    UnknownTerritory,
    EmptyZip,
    ZipNotFound(String),
    InvalidWkt(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::TooFewVertices { .. } => {
                write!(f, "Polygon is not complete, it needs at least 3 points.")
            }
            ValidationError::NonFiniteVertex { index } => {
                write!(f, "Polygon vertex {index} has no valid coordinates.")
            }
            ValidationError::NoPolygon => write!(f, "No polygon drawn. Please draw one first."),
            ValidationError::NoAssignee => write!(f, "Please select a user to assign."),
            ValidationError::EmptyName => write!(f, "Please provide a territory name."),
            ValidationError::NoManagers => write!(f, "Please select one or more managers."),
            ValidationError::UnsavedTerritory => {
                write!(f, "The territory has not finished saving yet.")
            }
            ValidationError::UnknownTerritory => write!(f, "No territory selected."),
            ValidationError::EmptyZip => write!(f, "Please enter a zip code."),
            ValidationError::ZipNotFound(zip) => write!(f, "No polygon found for zip code {zip}."),
            ValidationError::InvalidWkt(msg) => write!(f, "Polygon not valid: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug)]
pub enum WorkflowError {
    Validation(ValidationError),
    Unavailable(DataUnavailable),
    /// The same action is already in flight.
    Busy,
    /// A newer request or a reset made this result irrelevant; nothing was applied.
    Superseded,
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Validation(e) => write!(f, "{e}"),
            WorkflowError::Unavailable(e) => write!(f, "{e}"),
            WorkflowError::Busy => write!(f, "request already in progress"),
            WorkflowError::Superseded => write!(f, "result superseded by a newer request"),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Validation(e) => Some(e),
            WorkflowError::Unavailable(e) => Some(e),
            WorkflowError::Busy | WorkflowError::Superseded => None,
        }
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(e: ValidationError) -> Self {
        WorkflowError::Validation(e)
    }
}

impl From<DataUnavailable> for WorkflowError {
    fn from(e: DataUnavailable) -> Self {
        WorkflowError::Unavailable(e)
    }
}
