use std::fmt;

/// Coarse-grained verdict a `SchdError` carries, per `sched_error`'s
/// `status_code` field: distinguishes transient ineligibility from
/// "this job can never run as specified".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    SchdUnknown,
    NotRun,
    NeverRun,
    SchdError,
}

/// Stable failure codes. Higher layers (backfill, calendar) switch on
/// these to decide whether a job is worth calendaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoTotalNodes,
    NoFreeNodes,
    InsufficientResource,
    DedTime,
    CrossDedTimeBoundary,
    PrimeBoundary,
    ServerUserLimitReached,
    QueueUserLimitReached,
    GroupCpuShare,
    GroupCpuInsufficient,
    BackfillConflict,
    NotProvisionable,
    CantSpanPset,
    QueueNotStarted,
    QueueDisabled,
    ReservationConflict,
    LicenseUnavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One failure in the eligibility chain: a stable code, the status it
/// implies, and the resource name it concerns when relevant -- the
/// returned error identifies the limiting resource.
#[derive(Debug, Clone)]
pub struct SchdError {
    pub code: ErrorCode,
    pub status: StatusCode,
    pub resource: Option<String>,
    pub message: String,
}

impl SchdError {
    pub fn new(code: ErrorCode, status: StatusCode, message: impl Into<String>) -> Self {
        SchdError { code, status, resource: None, message: message.into() }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

impl fmt::Display for SchdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(r) => write!(f, "{}: {} ({r})", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// The accumulated result of one `is_ok_to_run` call. Short-circuits to a
/// single entry unless `RETURN_ALL_ERR` is set, in which case every failed
/// check appends here instead of stopping the walk.
#[derive(Debug, Clone, Default)]
pub struct SchdErrorChain {
    pub errors: Vec<SchdError>,
}

impl SchdErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, err: SchdError) {
        self.errors.push(err);
    }

    pub fn first(&self) -> Option<&SchdError> {
        self.errors.first()
    }

    /// True if any accumulated error implies the job can never run under
    /// any circumstance (vs. merely not right now).
    pub fn has_never_run(&self) -> bool {
        self.errors.iter().any(|e| e.status == StatusCode::NeverRun)
    }
}
