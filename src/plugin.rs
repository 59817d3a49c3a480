//! Plug-in contract (C6, §4.5).
//!
//! A plug-in is a boxed [`Plugin`] trait object registered with the
//! [`crate::registry::Registry`]. The contract is intentionally narrow: a
//! handful of pure capability queries plus four lifecycle calls the
//! scheduler (C5) drives through `Idle -> Activating -> Running -> Stopping`.

use bitflags::bitflags;

use crate::types::{BurnFlags, IoFlags, MediaFlags, TrackType};

bitflags! {
    /// Runtime admission state of a plug-in, checked by the registry's
    /// `is_active` under the prevailing [`ActiveMode`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActiveFlags: u8 {
        const ENABLED = 1 << 0;
        const MISSING_DOWNLOAD = 1 << 1;
        const ERROR = 1 << 2;
    }
}

/// Whether the registry should return plug-ins that are merely installable
/// (`MissingDownload`/`Error`) alongside the genuinely `Enabled` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveMode {
    #[default]
    EnabledOnly,
    IgnoreErrors,
}

/// One (input, output, io_flags) edge a plug-in is able to realize.
#[derive(Debug, Clone)]
pub struct DeclaredLink {
    pub input: TrackType,
    /// `None` marks a blanking link: the plug-in erases rather than
    /// transforms (destination is the graph's NIL sentinel, see 4.3).
    pub output: Option<TrackType>,
    pub io_flags: IoFlags,
}

/// A `(supported, compulsory)` flag pair, as returned by every
/// `*_flags` query in the plug-in contract and by the planner's flag
/// reconciliation (4.4.7/4.4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagSet {
    pub supported: BurnFlags,
    pub compulsory: BurnFlags,
}

impl FlagSet {
    pub fn union(self, other: FlagSet) -> FlagSet {
        FlagSet {
            supported: self.supported | other.supported,
            compulsory: self.compulsory | other.compulsory,
        }
    }

    /// Combines two *alternative* paths: OR across supported, AND across
    /// compulsory, matching 4.4.7's "where multiple links produce
    /// alternative paths" rule.
    pub fn alternative(self, other: FlagSet) -> FlagSet {
        FlagSet {
            supported: self.supported | other.supported,
            compulsory: self.compulsory & other.compulsory,
        }
    }
}

/// Mutable context a stage receives at each lifecycle call. Owned by the
/// scheduler for the duration of one run; never shared across runs.
#[derive(Debug, Default)]
pub struct StageContext {
    pub check_mode: bool,
    pub progress: f64,
    pub written_bytes: u64,
    pub dangerous: bool,
    pub cancel_requested: bool,
    /// Set by a stage to request that the scheduler restart the whole
    /// chain from the first stage (e.g. a multi-track source reporting
    /// there is another track to process), per 4.6's retry rule.
    pub retry_requested: bool,
}

/// Outcome of `activate`/`start`, per the contract in 4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionResult {
    Ok,
    /// This stage is a no-op for this input; skip it silently.
    NotRunning,
    /// This plug-in declines; the planner/scheduler may try another.
    NotSupported,
    /// This stage failed outright; the scheduler converts this into a
    /// `SchedulerError::StageError` and aborts the run.
    Err(String),
}

/// Outcome of a stage's `stop` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Ok,
    Err(String),
}

/// The narrow interface every back-end implements (4.5). All methods
/// excluding `activate`/`start`/`stop`/`clock_tick` are pure functions of
/// their arguments.
pub trait Plugin: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Declared (input, output, io_flags) edges this plug-in realizes.
    fn declared_links(&self) -> Vec<DeclaredLink>;

    /// Static priority; higher wins when multiple plug-ins realize the same
    /// link (4.4.8). Ties are broken by `name()`, ascending (§9).
    fn priority(&self) -> i32 {
        0
    }

    fn active_flags(&self) -> ActiveFlags {
        ActiveFlags::ENABLED
    }

    fn check_media_restrictions(&self, _media: MediaFlags) -> bool {
        true
    }

    fn check_record_flags(&self, media: MediaFlags, session_flags: BurnFlags) -> bool {
        let flags = self.record_flags(media, session_flags);
        session_flags & BurnFlags::RECORD_MASK & !flags.supported == BurnFlags::empty()
    }

    fn check_image_flags(&self, media: MediaFlags, session_flags: BurnFlags) -> bool {
        let flags = self.image_flags(media, session_flags);
        session_flags & BurnFlags::IMAGE_MASK & !flags.supported == BurnFlags::empty()
    }

    fn check_blank_flags(&self, media: MediaFlags, session_flags: BurnFlags) -> bool {
        let flags = self.blank_flags(media, session_flags);
        session_flags & !flags.supported == BurnFlags::empty()
    }

    fn record_flags(&self, media: MediaFlags, session_flags: BurnFlags) -> FlagSet;
    fn image_flags(&self, media: MediaFlags, session_flags: BurnFlags) -> FlagSet;

    /// Plug-ins with no blanking link may use the default: nothing supported.
    fn blank_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet::default()
    }

    fn activate(&self, ctx: &mut StageContext) -> AdmissionResult {
        let _ = ctx;
        AdmissionResult::Ok
    }

    fn start(&self, ctx: &mut StageContext) -> AdmissionResult {
        let _ = ctx;
        AdmissionResult::Ok
    }

    fn stop(&self, ctx: &mut StageContext) -> StopOutcome {
        let _ = ctx;
        StopOutcome::Ok
    }

    fn clock_tick(&self, ctx: &mut StageContext) {
        let _ = ctx;
    }
}
