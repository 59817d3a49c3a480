//! Error taxonomy (C8, §7). One `thiserror` enum per subsystem, aggregated
//! by a top-level [`Error`] with `#[error(transparent)]` variants, mirroring
//! the nested sense-code enums this codebase already uses for SCSI errors.

use thiserror::Error;

use crate::types::MediaFlags;

/// Errors raised while the planner (C4) searches the capability graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("no chain of plug-ins connects the requested input and output")]
    NotSupported,

    #[error("session flags are mutually exclusive: {0}")]
    FlagConflict(&'static str),

    #[error("destination drive rejects the requested flags")]
    DriveRejected,

    #[error("plug-in {name} is not active under the current check mode")]
    PluginUnavailable { name: String },
}

/// Errors raised by the capability registry (C2) at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("plug-in {name} declares a link with no candidate plug-ins")]
    EmptyLink { name: String },

    #[error("plug-in name {0} is already registered")]
    DuplicateName(String),
}

/// Errors raised by a running chain (C5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("stage {plugin} failed: {message}")]
    StageError { plugin: String, message: String },

    #[error("run was cancelled")]
    Cancelled,

    #[error(
        "run touches a medium of kind {media:?} and was refused because the dangerous flag is set"
    )]
    Dangerous { media: MediaFlags },
}

/// Crate-level aggregate error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
