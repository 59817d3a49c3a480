//! Closed type algebra for track kinds and flag sets (C1).
//!
//! Every bitmask here follows the same shape: a `bitflags!` struct for the
//! subtype bits, plus free functions on [`TrackType`] for the tag-level
//! predicates the planner needs (`has_medium`, `is_compatible`, ...).

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid image format code: {0}")]
    InvalidImageFormat(u8),
}

/// Closed, single-selection image container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[num_enum(error_type(name = TypeError, constructor = TypeError::InvalidImageFormat))]
#[repr(u8)]
pub enum ImageFormat {
    None = 0,
    Bin = 1,
    Cue = 2,
    Cdrdao = 3,
    Clone = 4,
}

impl ImageFormat {
    /// Order in which the image sub-planner (4.4.5) and the same-drive copy
    /// planner (4.4.6) probe candidate formats.
    pub const PROBE_ORDER: [ImageFormat; 4] = [
        ImageFormat::Cdrdao,
        ImageFormat::Cue,
        ImageFormat::Clone,
        ImageFormat::Bin,
    ];

    /// `Cdrdao`/`Cue`/`Clone` are CD-only containers; `Bin` has no media
    /// restriction of its own.
    pub fn is_cd_only(self) -> bool {
        matches!(self, ImageFormat::Cdrdao | ImageFormat::Cue | ImageFormat::Clone)
    }
}

bitflags! {
    /// Mask of image formats, as returned by `session_possible_output_formats`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFormatMask: u8 {
        const BIN = 1 << 0;
        const CUE = 1 << 1;
        const CDRDAO = 1 << 2;
        const CLONE = 1 << 3;
    }
}

impl From<ImageFormat> for ImageFormatMask {
    fn from(value: ImageFormat) -> Self {
        match value {
            ImageFormat::None => ImageFormatMask::empty(),
            ImageFormat::Bin => ImageFormatMask::BIN,
            ImageFormat::Cue => ImageFormatMask::CUE,
            ImageFormat::Cdrdao => ImageFormatMask::CDRDAO,
            ImageFormat::Clone => ImageFormatMask::CLONE,
        }
    }
}

bitflags! {
    /// Filesystem traits of a `Data` track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FsFlags: u8 {
        const ISO = 1 << 0;
        const JOLIET = 1 << 1;
        const VIDEO = 1 << 2;
    }
}

bitflags! {
    /// Audio encoding traits of a `Stream` track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AudioFlags: u8 {
        const RAW = 1 << 0;
        const DTS = 1 << 1;
    }
}

bitflags! {
    /// Video encoding traits of a `Stream` track.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VideoFlags: u8 {
        const VIDEO = 1 << 0;
    }
}

bitflags! {
    /// Physical family, writability, state and content bits of a disc medium.
    ///
    /// Invariants enforced by [`MediaFlags::is_well_formed`]: `READ_ONLY`
    /// excludes `WRITABLE`/`REWRITABLE`; `BLANK` excludes
    /// `HAS_AUDIO`/`HAS_DATA`/`APPENDABLE`/`CLOSED`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MediaFlags: u32 {
        // physical family
        const CD = 1 << 0;
        const DVD = 1 << 1;
        const DVD_PLUS = 1 << 2;
        const DVD_RW_RESTRICTED = 1 << 3;
        const DVD_RW_SEQUENTIAL = 1 << 4;
        const BD = 1 << 5;
        const ROM = 1 << 6;
        const FILE = 1 << 7;
        // writability
        const WRITABLE = 1 << 8;
        const REWRITABLE = 1 << 9;
        const READ_ONLY = 1 << 10;
        // state
        const BLANK = 1 << 11;
        const APPENDABLE = 1 << 12;
        const CLOSED = 1 << 13;
        const UNFORMATTED = 1 << 14;
        // content
        const HAS_AUDIO = 1 << 15;
        const HAS_DATA = 1 << 16;
    }
}

impl MediaFlags {
    pub fn is_well_formed(self) -> bool {
        let writable_conflict = self.contains(MediaFlags::READ_ONLY)
            && self.intersects(MediaFlags::WRITABLE | MediaFlags::REWRITABLE);
        let blank_conflict = self.contains(MediaFlags::BLANK)
            && self.intersects(
                MediaFlags::HAS_AUDIO
                    | MediaFlags::HAS_DATA
                    | MediaFlags::APPENDABLE
                    | MediaFlags::CLOSED,
            );
        !writable_conflict && !blank_conflict
    }

    pub fn is_dvd_rw_sequential(self) -> bool {
        self.contains(MediaFlags::DVD_RW_SEQUENTIAL)
    }

    pub fn is_dvd_plus(self) -> bool {
        self.contains(MediaFlags::DVD_PLUS)
    }

    /// Clears the state/content bits and sets `BLANK`, as done by the
    /// blanked-retry of `try_output_with_blanking` (4.4.2).
    pub fn blanked(self) -> MediaFlags {
        (self
            & !(MediaFlags::CLOSED
                | MediaFlags::APPENDABLE
                | MediaFlags::UNFORMATTED
                | MediaFlags::HAS_DATA
                | MediaFlags::HAS_AUDIO))
            | MediaFlags::BLANK
    }
}

bitflags! {
    /// User/planner-selected burn options (conjunctive, order-independent).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BurnFlags: u32 {
        const DUMMY = 1 << 0;
        const BURNPROOF = 1 << 1;
        const EJECT = 1 << 2;
        const MULTI = 1 << 3;
        const DAO = 1 << 4;
        const APPEND = 1 << 5;
        const MERGE = 1 << 6;
        const BLANK_BEFORE_WRITE = 1 << 7;
        const FAST_BLANK = 1 << 8;
        const NO_TMP_FILES = 1 << 9;
        const CHECK_SIZE = 1 << 10;
        const NO_GRACE = 1 << 11;
        const OVERBURN = 1 << 12;
        const RAW = 1 << 13;
    }
}

impl BurnFlags {
    /// Subset of flags relevant to a recording (disc-writing) link, consulted
    /// by `find_link` (4.4.4) and `get_burn_flags` (4.4.7).
    pub const RECORD_MASK: BurnFlags = BurnFlags::DUMMY
        .union(BurnFlags::BURNPROOF)
        .union(BurnFlags::MULTI)
        .union(BurnFlags::DAO)
        .union(BurnFlags::BLANK_BEFORE_WRITE)
        .union(BurnFlags::FAST_BLANK)
        .union(BurnFlags::OVERBURN)
        .union(BurnFlags::RAW)
        .union(BurnFlags::NO_GRACE);

    /// Subset relevant to an image-producing (data-typed destination) link.
    pub const IMAGE_MASK: BurnFlags = BurnFlags::APPEND.union(BurnFlags::MERGE);
}

bitflags! {
    /// How a stage interoperates with its neighbors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IoFlags: u8 {
        const ACCEPT_FILE = 1 << 0;
        const ACCEPT_PIPE = 1 << 1;
    }
}

/// Tagged union over the kinds of track a session may consume or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    None,
    Data(FsFlags),
    Stream {
        audio: AudioFlags,
        video: VideoFlags,
        has_metadata: bool,
    },
    Image(ImageFormat),
    Disc(MediaFlags),
}

impl TrackType {
    pub fn has_data(&self) -> bool {
        matches!(self, TrackType::Data(_))
    }

    pub fn has_stream(&self) -> bool {
        matches!(self, TrackType::Stream { .. })
    }

    pub fn has_image(&self) -> bool {
        matches!(self, TrackType::Image(_))
    }

    pub fn has_medium(&self) -> bool {
        matches!(self, TrackType::Disc(_))
    }

    pub fn media(&self) -> Option<MediaFlags> {
        match self {
            TrackType::Disc(media) => Some(*media),
            _ => None,
        }
    }

    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            TrackType::Image(format) => Some(*format),
            _ => None,
        }
    }

    /// Holds when `self` and `other` share the same tag and `self`'s subtype
    /// is a subset (or equal) of `other`'s subtype under the per-tag rule in
    /// 4.1. Type equality is bit-exact; there is no coercion across tags.
    pub fn is_compatible(&self, other: &TrackType) -> bool {
        match (self, other) {
            (TrackType::None, TrackType::None) => true,
            (TrackType::Data(a), TrackType::Data(b)) => b.contains(*a),
            (
                TrackType::Stream {
                    audio: a_audio,
                    video: a_video,
                    has_metadata: a_meta,
                },
                TrackType::Stream {
                    audio: b_audio,
                    video: b_video,
                    has_metadata: b_meta,
                },
            ) => b_audio.contains(*a_audio) && b_video.contains(*a_video) && (!a_meta || *b_meta),
            (TrackType::Image(a), TrackType::Image(b)) => a == b,
            (TrackType::Disc(a), TrackType::Disc(b)) => (*a & *b) == *a,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_flags_reject_ill_formed_combinations() {
        let ro_writable = MediaFlags::READ_ONLY | MediaFlags::WRITABLE;
        assert!(!ro_writable.is_well_formed());

        let blank_with_data = MediaFlags::BLANK | MediaFlags::HAS_DATA;
        assert!(!blank_with_data.is_well_formed());

        let ok = MediaFlags::CD | MediaFlags::WRITABLE | MediaFlags::BLANK;
        assert!(ok.is_well_formed());
    }

    #[test]
    fn blanked_clears_state_and_content_bits() {
        let closed = MediaFlags::DVD_RW_SEQUENTIAL | MediaFlags::CLOSED | MediaFlags::HAS_DATA;
        let blanked = closed.blanked();
        assert!(blanked.contains(MediaFlags::BLANK));
        assert!(!blanked.contains(MediaFlags::CLOSED));
        assert!(!blanked.contains(MediaFlags::HAS_DATA));
        assert!(blanked.contains(MediaFlags::DVD_RW_SEQUENTIAL));
    }

    #[test]
    fn disc_compatibility_is_subset_on_media_bits() {
        let narrow = TrackType::Disc(MediaFlags::CD | MediaFlags::WRITABLE);
        let wide = TrackType::Disc(MediaFlags::CD | MediaFlags::WRITABLE | MediaFlags::BLANK);
        assert!(narrow.is_compatible(&wide));
        assert!(!wide.is_compatible(&narrow));
    }

    #[test]
    fn image_compatibility_is_exact() {
        let bin = TrackType::Image(ImageFormat::Bin);
        let cue = TrackType::Image(ImageFormat::Cue);
        assert!(bin.is_compatible(&bin));
        assert!(!bin.is_compatible(&cue));
    }
}
