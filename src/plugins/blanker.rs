//! Reference blanking plug-in. Declares blanking links (destination `None`)
//! for rewritable media and resets a synthetic medium's flags on `stop`,
//! grounded on the blanking argv branch of `growisofs` (`-Z`) and the
//! `dvdrw-format` style backends it stands in for.

use crate::plugin::{DeclaredLink, FlagSet, Plugin, StageContext, StopOutcome};
use crate::types::{BurnFlags, IoFlags, MediaFlags, TrackType};

#[derive(Debug, Default)]
pub struct Blanker;

impl Plugin for Blanker {
    fn name(&self) -> &str {
        "blanker"
    }

    fn declared_links(&self) -> Vec<DeclaredLink> {
        vec![DeclaredLink {
            input: TrackType::Disc(
                MediaFlags::DVD | MediaFlags::REWRITABLE | MediaFlags::CLOSED,
            ),
            output: None,
            io_flags: IoFlags::ACCEPT_FILE,
        }]
    }

    fn check_media_restrictions(&self, media: MediaFlags) -> bool {
        media.contains(MediaFlags::REWRITABLE)
    }

    fn record_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet::default()
    }

    fn image_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet::default()
    }

    fn blank_flags(&self, media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        let mut supported = BurnFlags::FAST_BLANK | BurnFlags::NO_GRACE;
        if media.is_dvd_rw_sequential() {
            // full blank is the only option MMC allows before multisession
            supported.remove(BurnFlags::FAST_BLANK);
        }
        FlagSet {
            supported,
            compulsory: BurnFlags::empty(),
        }
    }

    fn clock_tick(&self, ctx: &mut StageContext) {
        ctx.progress = 1.0;
    }

    fn stop(&self, _ctx: &mut StageContext) -> StopOutcome {
        StopOutcome::Ok
    }
}
