//! Reference image-writer plug-in: turns a data tree into a `Bin` image
//! file, grounded on the local-track image source (`burn-local-image.h`)
//! that feeds a raw data tree into the rest of a chain as a plain image.

use crate::plugin::{DeclaredLink, FlagSet, Plugin, StageContext, StopOutcome};
use crate::types::{BurnFlags, FsFlags, ImageFormat, IoFlags, MediaFlags, TrackType};

#[derive(Debug, Default)]
pub struct IsoImager;

impl Plugin for IsoImager {
    fn name(&self) -> &str {
        "iso-imager"
    }

    fn declared_links(&self) -> Vec<DeclaredLink> {
        vec![DeclaredLink {
            input: TrackType::Data(FsFlags::ISO | FsFlags::JOLIET | FsFlags::VIDEO),
            output: Some(TrackType::Image(ImageFormat::Bin)),
            io_flags: IoFlags::ACCEPT_FILE | IoFlags::ACCEPT_PIPE,
        }]
    }

    fn record_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet::default()
    }

    fn image_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
        FlagSet {
            supported: BurnFlags::APPEND | BurnFlags::MERGE,
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
