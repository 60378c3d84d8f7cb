use thiserror::Error;

/// Ambient failures: bad config files, bad wire snapshots, I/O. These are
/// distinct from `eligibility::SchdError`, which is the in-band scheduling
/// failure taxonomy that becomes a job's `comment` rather than aborting a cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error reading '{path}': {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse snapshot JSON: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("malformed sched_config line {line}: {reason}")]
    SchedConfig { line: usize, reason: String },

    #[error("malformed holidays file at line {line}: {reason}")]
    HolidaysFile { line: usize, reason: String },

    #[error("malformed resource-group file at line {line}: {reason}")]
    ResourceGroupFile { line: usize, reason: String },

    #[error("malformed dedicated-time file at line {line}: {reason}")]
    DedicatedTimeFile { line: usize, reason: String },

    #[error("usage file '{path}' has bad magic header")]
    UsageFileMagic { path: String },

    #[error("usage file '{path}' has unsupported version {version}")]
    UsageFileVersion { path: String, version: u8 },

    #[error("unknown resource definition: {0}")]
    UnknownResourceDef(String),

    #[error("invalid resource value for '{name}': {value}")]
    BadResourceValue { name: String, value: String },

    #[error("resource type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid select spec: {0}")]
    BadSelectSpec(String),

    #[error("invalid place spec: {0}")]
    BadPlaceSpec(String),

    #[error("scheduler context construction failed: {0}")]
    ContextConstruction(String),
}

impl Error {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
