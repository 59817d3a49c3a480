//! Session model (C7, §3) and the drive identity used by the same-drive
//! copy planner (4.4.6).

use derive_more::{From, Into};

use crate::types::{BurnFlags, ImageFormat, MediaFlags, TrackType};

bitflags::bitflags! {
    /// Per-call planning mode, carried alongside `session_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CheckFlags: u8 {
        /// Enforce per-plug-in/per-drive flag acceptance during traversal.
        /// When unset, the planner answers "could a chain exist at all"
        /// ignoring flag admissibility.
        const USE_FLAGS = 1 << 0;
        /// Return plug-ins that are merely installable alongside active ones.
        const IGNORE_PLUGIN_ERRORS = 1 << 1;
        /// Emit a `need_download` hint for links blocked only by
        /// `MissingDownload` (4.4.4's last bullet).
        const SIGNAL_PLUGIN_ERRORS = 1 << 2;
    }
}

impl CheckFlags {
    pub fn active_mode(self) -> crate::plugin::ActiveMode {
        if self.contains(CheckFlags::IGNORE_PLUGIN_ERRORS) {
            crate::plugin::ActiveMode::IgnoreErrors
        } else {
            crate::plugin::ActiveMode::EnabledOnly
        }
    }
}

/// Opaque handle identifying a physical drive. Two sessions referencing the
/// same drive trigger the same-drive copy planner (4.4.6); beyond identity
/// comparison, drive enumeration is out of scope (§1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct DriveId(pub u32);

/// Where a session's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Drive(DriveId),
    File,
}

/// Immutable-during-run snapshot of inputs, destination and flags (§3).
#[derive(Debug, Clone)]
pub struct Session {
    pub input: TrackType,
    pub output: TrackType,
    pub destination: Destination,
    pub source_drive: Option<DriveId>,
    pub session_flags: BurnFlags,
    pub check_flags: CheckFlags,
    pub requested_image_format: Option<ImageFormat>,
}

impl Session {
    pub fn new(input: TrackType, output: TrackType, destination: Destination) -> Self {
        Session {
            input,
            output,
            destination,
            source_drive: None,
            session_flags: BurnFlags::empty(),
            check_flags: CheckFlags::empty(),
            requested_image_format: None,
        }
    }

    pub fn with_flags(mut self, flags: BurnFlags) -> Self {
        self.session_flags = flags;
        self
    }

    pub fn with_check_flags(mut self, flags: CheckFlags) -> Self {
        self.check_flags = flags;
        self
    }

    pub fn with_source_drive(mut self, drive: DriveId) -> Self {
        self.source_drive = Some(drive);
        self
    }

    /// Pins the image sub-planner (4.4.5) to a caller-chosen container
    /// format instead of letting `session_default_output_format` pick one.
    pub fn with_requested_image_format(mut self, format: ImageFormat) -> Self {
        self.requested_image_format = Some(format);
        self
    }

    /// True when source and destination name the same physical drive,
    /// triggering the same-drive copy planner (4.4.1 step 2).
    pub fn is_same_drive(&self) -> bool {
        matches!(
            (self.source_drive, self.destination),
            (Some(src), Destination::Drive(dst)) if src == dst
        )
    }

    pub fn is_writing_to_file(&self) -> bool {
        matches!(self.destination, Destination::File)
    }

    /// `NoTmpFiles => AcceptPipe else AcceptFile` (4.4.1 step 4).
    pub fn resolved_io_flags(&self) -> crate::types::IoFlags {
        if self.session_flags.contains(BurnFlags::NO_TMP_FILES) {
            crate::types::IoFlags::ACCEPT_PIPE
        } else {
            crate::types::IoFlags::ACCEPT_FILE
        }
    }

    pub fn output_media(&self) -> Option<MediaFlags> {
        self.output.media()
    }
}
