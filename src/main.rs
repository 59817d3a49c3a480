use chrono::Local;

use burnplan::{
    BurnFlags, CheckFlags, Destination, FsFlags, MediaFlags, Planner, RegistryBuilder, Session,
    TrackType,
};

/// A small, illustrative driver: build the bundled reference registry,
/// construct one hard-coded session and print what the planner decides.
/// No file dialogs, no drive enumeration, no translation -- this exercises
/// the library the same direct way the rest of this codebase's `main.rs`
/// exercises a single command.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("burnplan session check, {}", Local::now());
    println!();

    let registry = RegistryBuilder::new()
        .with_plugin(std::sync::Arc::new(burnplan::plugins::iso_imager::IsoImager))
        .with_plugin(std::sync::Arc::new(
            burnplan::plugins::growisofs::Growisofs::new(),
        ))
        .with_plugin(std::sync::Arc::new(burnplan::plugins::blanker::Blanker))
        .build()
        .expect("bundled reference plug-ins are well-formed");

    let planner = Planner::new(registry);

    let session = Session::new(
        TrackType::Data(FsFlags::ISO | FsFlags::JOLIET),
        TrackType::Disc(MediaFlags::DVD | MediaFlags::WRITABLE | MediaFlags::BLANK),
        Destination::Drive(burnplan::DriveId(0)),
    )
    .with_flags(BurnFlags::BURNPROOF | BurnFlags::MULTI)
    .with_check_flags(CheckFlags::USE_FLAGS);

    match planner.session_supported(&session) {
        Ok(()) => {
            println!("session supported");
            match planner.session_get_burn_flags(&session) {
                Ok(flags) => {
                    println!("supported flags:  {:?}", flags.supported);
                    println!("compulsory flags: {:?}", flags.compulsory);
                }
                Err(err) => println!("could not reconcile flags: {err}"),
            }
            println!(
                "required media type: {:?}",
                planner.session_required_media_type(&session)
            );
        }
        Err(err) => println!("session not supported: {err}"),
    }
}
