//! Reference DVD-writer plug-in, grounded on the `growisofs` back-end: it
//! consumes a `Bin` image or an ISO/Joliet/video data tree and writes it to
//! a blank, appendable or closed-but-reopenable DVD+/DVD-RW medium.
//!
//! This does not spawn a real `growisofs` process; it stands in for one so
//! the planner and scheduler have a concrete multi-link plug-in to exercise.

use std::sync::Mutex;

use crate::plugin::{
    AdmissionResult, DeclaredLink, FlagSet, Plugin, StageContext, StopOutcome,
};
use crate::types::{BurnFlags, FsFlags, ImageFormat, IoFlags, MediaFlags, TrackType};

#[derive(Debug)]
pub struct Growisofs {
    ticks_to_completion: u32,
    remaining: Mutex<u32>,
}

impl Growisofs {
    pub fn new() -> Self {
        Growisofs {
            ticks_to_completion: 1,
            remaining: Mutex::new(1),
        }
    }
}

impl Default for Growisofs {
    fn default() -> Self {
        Self::new()
    }
}

fn dvd_plus_blank() -> MediaFlags {
    MediaFlags::DVD | MediaFlags::DVD_PLUS | MediaFlags::WRITABLE | MediaFlags::BLANK
}

fn dvd_rw_restricted_closed_data() -> MediaFlags {
    MediaFlags::DVD
        | MediaFlags::DVD_PLUS
        | MediaFlags::DVD_RW_RESTRICTED
        | MediaFlags::REWRITABLE
        | MediaFlags::CLOSED
        | MediaFlags::HAS_DATA
}

fn dvd_sequential_appendable_data() -> MediaFlags {
    MediaFlags::DVD
        | MediaFlags::DVD_PLUS
        | MediaFlags::DVD_RW_RESTRICTED
        | MediaFlags::DVD_RW_SEQUENTIAL
        | MediaFlags::WRITABLE
        | MediaFlags::REWRITABLE
        | MediaFlags::BLANK
        | MediaFlags::APPENDABLE
        | MediaFlags::HAS_DATA
}

impl Plugin for Growisofs {
    fn name(&self) -> &str {
        "growisofs"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn declared_links(&self) -> Vec<DeclaredLink> {
        vec![
            DeclaredLink {
                input: TrackType::Image(ImageFormat::Bin),
                output: Some(TrackType::Disc(dvd_plus_blank())),
                io_flags: IoFlags::ACCEPT_FILE | IoFlags::ACCEPT_PIPE,
            },
            DeclaredLink {
                input: TrackType::Image(ImageFormat::Bin),
                output: Some(TrackType::Disc(dvd_rw_restricted_closed_data())),
                io_flags: IoFlags::ACCEPT_FILE | IoFlags::ACCEPT_PIPE,
            },
            DeclaredLink {
                input: TrackType::Data(FsFlags::ISO | FsFlags::JOLIET | FsFlags::VIDEO),
                output: Some(TrackType::Disc(dvd_sequential_appendable_data())),
                io_flags: IoFlags::ACCEPT_FILE | IoFlags::ACCEPT_PIPE,
            },
        ]
    }

    fn check_media_restrictions(&self, media: MediaFlags) -> bool {
        media.contains(MediaFlags::DVD)
    }

    fn record_flags(&self, media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        // for DVD-W/-RW sequential blank: DAO and Multi are mutually
        // exclusive variants of the same underlying link (source NOTE)
        let mut supported = BurnFlags::BURNPROOF
            | BurnFlags::OVERBURN
            | BurnFlags::DUMMY
            | BurnFlags::NO_GRACE
            | BurnFlags::APPEND
            | BurnFlags::MERGE;

        if media.is_dvd_rw_sequential() && media.contains(MediaFlags::BLANK) {
            supported |= BurnFlags::MULTI | BurnFlags::DAO;
        }

        if media.contains(MediaFlags::DVD_RW_RESTRICTED) && media.contains(MediaFlags::REWRITABLE)
        {
            supported |= BurnFlags::DAO | BurnFlags::MULTI | BurnFlags::BLANK_BEFORE_WRITE;
        }

        if media.is_dvd_plus() {
            supported.remove(BurnFlags::DUMMY);
        }

        FlagSet {
            supported,
            compulsory: BurnFlags::empty(),
        }
    }

    fn image_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet {
            supported: BurnFlags::APPEND | BurnFlags::MERGE,
            compulsory: BurnFlags::empty(),
        }
    }

    fn activate(&self, _ctx: &mut StageContext) -> AdmissionResult {
        *self.remaining.lock().unwrap() = self.ticks_to_completion;
        AdmissionResult::Ok
    }

    fn clock_tick(&self, ctx: &mut StageContext) {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
        }
        ctx.progress = if *remaining == 0 { 1.0 } else { 0.5 };
    }

    fn stop(&self, _ctx: &mut StageContext) -> StopOutcome {
        StopOutcome::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_is_dropped_on_dvd_plus() {
        let plugin = Growisofs::new();
        let flags = plugin.record_flags(dvd_plus_blank(), BurnFlags::empty());
        assert!(!flags.supported.contains(BurnFlags::DUMMY));
    }

    #[test]
    fn dvd_rw_sequential_blank_supports_dao_and_multi() {
        let plugin = Growisofs::new();
        let media = MediaFlags::DVD
            | MediaFlags::DVD_RW_SEQUENTIAL
            | MediaFlags::WRITABLE
            | MediaFlags::REWRITABLE
            | MediaFlags::BLANK;
        let flags = plugin.record_flags(media, BurnFlags::empty());
        assert!(flags.supported.contains(BurnFlags::DAO));
        assert!(flags.supported.contains(BurnFlags::MULTI));
    }
}
