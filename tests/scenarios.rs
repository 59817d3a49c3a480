//! Integration tests exercising the concrete scenarios this planner is
//! expected to handle, each against a small hand-built registry.

use std::sync::Arc;

use burnplan::plugin::{ActiveFlags, DeclaredLink, FlagSet, Plugin};
use burnplan::{
    AudioFlags, BurnFlags, CheckFlags, Destination, DriveId, FsFlags, MediaFlags, Planner,
    RegistryBuilder, Session, TrackType, VideoFlags,
};

fn cd_writable_blank() -> MediaFlags {
    MediaFlags::CD | MediaFlags::WRITABLE | MediaFlags::BLANK
}

// ---- S1: data tree to a blank, appendable DVD --------------------------

mod s1 {
    use super::*;

    #[test]
    fn data_to_dvd_with_burnproof_and_multi_is_supported() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(burnplan::plugins::iso_imager::IsoImager))
            .with_plugin(Arc::new(burnplan::plugins::growisofs::Growisofs::new()))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let dvd = MediaFlags::DVD
            | MediaFlags::DVD_PLUS
            | MediaFlags::DVD_RW_RESTRICTED
            | MediaFlags::DVD_RW_SEQUENTIAL
            | MediaFlags::WRITABLE
            | MediaFlags::REWRITABLE
            | MediaFlags::BLANK
            | MediaFlags::APPENDABLE
            | MediaFlags::HAS_DATA;

        let session = Session::new(
            TrackType::Data(FsFlags::ISO | FsFlags::JOLIET),
            TrackType::Disc(dvd),
            Destination::Drive(DriveId(1)),
        )
        .with_flags(BurnFlags::BURNPROOF | BurnFlags::MULTI);

        assert!(planner.session_supported(&session).is_ok());

        let flags = planner.session_get_burn_flags(&session).unwrap();
        assert!(flags.supported.contains(BurnFlags::BURNPROOF));
        assert!(flags.supported.contains(BurnFlags::MULTI));

        let required = planner.session_required_media_type(&session);
        assert!(required.contains(MediaFlags::DVD | MediaFlags::WRITABLE));
    }
}

// ---- S2: ripping a closed audio CD to a file image, same drive ---------

mod s2 {
    use super::*;

    #[derive(Debug)]
    struct CdRipper;
    impl Plugin for CdRipper {
        fn name(&self) -> &str {
            "cd-ripper"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Disc(MediaFlags::CD | MediaFlags::HAS_AUDIO),
                output: Some(TrackType::Stream {
                    audio: AudioFlags::RAW,
                    video: VideoFlags::empty(),
                    has_metadata: true,
                }),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    #[derive(Debug)]
    struct CdImager;
    impl Plugin for CdImager {
        fn name(&self) -> &str {
            "cd-imager"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Disc(MediaFlags::CD | MediaFlags::HAS_AUDIO),
                output: Some(TrackType::Image(burnplan::ImageFormat::Bin)),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    #[test]
    fn closed_audio_cd_ripped_to_file_image_same_drive() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(CdRipper))
            .with_plugin(Arc::new(CdImager))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let session = Session::new(
            TrackType::Disc(MediaFlags::CD | MediaFlags::HAS_AUDIO | MediaFlags::CLOSED),
            TrackType::Image(burnplan::ImageFormat::Bin),
            Destination::Drive(DriveId(9)),
        )
        .with_source_drive(DriveId(9));

        assert!(session.is_same_drive());
        assert!(planner.session_supported(&session).is_ok());

        let intermediate = planner.session_tmp_image_type_same_src_dest(&session).unwrap();
        assert_eq!(
            intermediate,
            TrackType::Stream {
                audio: AudioFlags::RAW,
                video: VideoFlags::empty(),
                has_metadata: true,
            }
        );
    }
}

// ---- S3: a Clone image onto a blank CD forces Raw, drops DAO -----------

mod s3 {
    use super::*;

    #[derive(Debug)]
    struct CdWriter;
    impl Plugin for CdWriter {
        fn name(&self) -> &str {
            "cd-writer"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Image(burnplan::ImageFormat::Clone),
                output: Some(TrackType::Disc(cd_writable_blank())),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet {
                supported: BurnFlags::BURNPROOF,
                compulsory: BurnFlags::empty(),
            }
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    #[test]
    fn clone_image_to_cd_requires_raw_and_drops_dao() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(CdWriter))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let session = Session::new(
            TrackType::Image(burnplan::ImageFormat::Clone),
            TrackType::Disc(cd_writable_blank()),
            Destination::Drive(DriveId(1)),
        );

        let flags = planner.session_get_burn_flags(&session).unwrap();
        assert!(flags.compulsory.contains(BurnFlags::RAW));
        assert!(!flags.supported.contains(BurnFlags::DAO));
    }
}

// ---- S4: writing data onto a closed DVD-RW sequential disc needs a -----
// ---- blank-before-write retry ------------------------------------------

mod s4 {
    use super::*;

    fn closed_sequential() -> MediaFlags {
        MediaFlags::DVD
            | MediaFlags::DVD_RW_SEQUENTIAL
            | MediaFlags::WRITABLE
            | MediaFlags::REWRITABLE
            | MediaFlags::CLOSED
            | MediaFlags::HAS_DATA
    }

    fn blank_sequential() -> MediaFlags {
        MediaFlags::DVD
            | MediaFlags::DVD_RW_SEQUENTIAL
            | MediaFlags::WRITABLE
            | MediaFlags::REWRITABLE
            | MediaFlags::BLANK
    }

    #[derive(Debug)]
    struct SequentialBlanker;
    impl Plugin for SequentialBlanker {
        fn name(&self) -> &str {
            "sequential-blanker"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Disc(closed_sequential()),
                output: None,
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
        fn blank_flags(&self, _media: MediaFlags, _session_flags: BurnFlags) -> FlagSet {
            FlagSet {
                supported: BurnFlags::FAST_BLANK
                    | BurnFlags::NO_GRACE
                    | BurnFlags::BLANK_BEFORE_WRITE,
                compulsory: BurnFlags::empty(),
            }
        }
    }

    #[derive(Debug)]
    struct SequentialWriter;
    impl Plugin for SequentialWriter {
        fn name(&self) -> &str {
            "sequential-writer"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Data(FsFlags::ISO),
                output: Some(TrackType::Disc(blank_sequential())),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet {
                supported: BurnFlags::BURNPROOF,
                compulsory: BurnFlags::empty(),
            }
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    #[test]
    fn closed_sequential_dvd_needs_blanked_retry() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(SequentialBlanker))
            .with_plugin(Arc::new(SequentialWriter))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let session = Session::new(
            TrackType::Data(FsFlags::ISO),
            TrackType::Disc(closed_sequential()),
            Destination::Drive(DriveId(2)),
        );

        assert!(planner.session_can_blank(&session));
        assert!(planner.session_supported(&session).is_ok());

        let flags = planner.session_get_burn_flags(&session).unwrap();
        assert!(flags.supported.contains(BurnFlags::BLANK_BEFORE_WRITE));
    }
}

// ---- S5: metadata-bearing audio forces DAO, excludes Multi --------------

mod s5 {
    use super::*;

    #[derive(Debug)]
    struct CdAudioWriter;
    impl Plugin for CdAudioWriter {
        fn name(&self) -> &str {
            "cd-audio-writer"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Stream {
                    audio: AudioFlags::RAW,
                    video: VideoFlags::empty(),
                    has_metadata: true,
                },
                output: Some(TrackType::Disc(cd_writable_blank())),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            // a CD-DA writer has no notion of a multi-session audio disc
            FlagSet {
                supported: BurnFlags::BURNPROOF | BurnFlags::DAO,
                compulsory: BurnFlags::empty(),
            }
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    fn session(check_flags: CheckFlags, session_flags: BurnFlags) -> Session {
        Session::new(
            TrackType::Stream {
                audio: AudioFlags::RAW,
                video: VideoFlags::empty(),
                has_metadata: true,
            },
            TrackType::Disc(cd_writable_blank()),
            Destination::Drive(DriveId(3)),
        )
        .with_flags(session_flags)
        .with_check_flags(check_flags)
    }

    #[test]
    fn audio_with_metadata_requires_dao_and_excludes_multi() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(CdAudioWriter))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let flags = planner
            .session_get_burn_flags(&session(CheckFlags::empty(), BurnFlags::empty()))
            .unwrap();
        assert!(flags.compulsory.contains(BurnFlags::DAO));
        assert!(!flags.supported.contains(BurnFlags::MULTI));
    }

    #[test]
    fn requesting_multi_under_use_flags_is_not_supported() {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(CdAudioWriter))
            .build()
            .unwrap();
        let planner = Planner::new(registry);

        let session = session(CheckFlags::USE_FLAGS, BurnFlags::MULTI);
        assert!(planner.session_supported(&session).is_err());
    }
}

// ---- S6: the only writer plug-in is disabled ----------------------------

mod s6 {
    use super::*;

    #[derive(Debug)]
    struct UndownloadedWriter;
    impl Plugin for UndownloadedWriter {
        fn name(&self) -> &str {
            "undownloaded-writer"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Data(FsFlags::ISO),
                output: Some(TrackType::Disc(cd_writable_blank())),
                io_flags: burnplan::IoFlags::ACCEPT_FILE,
            }]
        }
        fn active_flags(&self) -> ActiveFlags {
            ActiveFlags::MISSING_DOWNLOAD
        }
        fn record_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
        fn image_flags(&self, _m: MediaFlags, _s: BurnFlags) -> FlagSet {
            FlagSet::default()
        }
    }

    fn planner() -> Planner {
        let registry = RegistryBuilder::new()
            .with_plugin(Arc::new(UndownloadedWriter))
            .build()
            .unwrap();
        Planner::new(registry)
    }

    fn session(check_flags: CheckFlags) -> Session {
        Session::new(
            TrackType::Data(FsFlags::ISO),
            TrackType::Disc(cd_writable_blank()),
            Destination::Drive(DriveId(4)),
        )
        .with_check_flags(check_flags)
    }

    #[test]
    fn disabled_writer_is_not_supported() {
        let p = planner();
        assert!(p.session_supported(&session(CheckFlags::empty())).is_err());
    }

    #[test]
    fn signal_plugin_errors_reports_the_missing_plugin() {
        let p = planner();
        let session = session(CheckFlags::IGNORE_PLUGIN_ERRORS | CheckFlags::SIGNAL_PLUGIN_ERRORS);
        let need_download = p.session_need_download(&session);
        assert_eq!(need_download, vec!["undownloaded-writer".to_string()]);
    }
}
