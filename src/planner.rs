//! The planner (C4, §4.4) — the core algorithm of this crate.
//!
//! All four external queries (`session_supported`, `get_burn_flags`,
//! `get_blank_flags`, chain materialization) share the same underlying
//! depth-first, output-toward-input traversal of the capability graph.
//! Recursion is bounded defensively by [`MAX_DEPTH`]; the DAG invariant
//! maintained at registration time (§9) means it is never actually hit.

use tracing::debug;

use crate::errors::PlannerError;
use crate::graph::{Caps, CapsLink, Graph};
use crate::plugin::{ActiveMode, FlagSet, Plugin};
use crate::registry::{Registry, drive_rejects};
use crate::session::{CheckFlags, Session};
use crate::types::{BurnFlags, ImageFormat, IoFlags, MediaFlags, TrackType};

const MAX_DEPTH: u32 = 64;

/// One realized step of a materialized [`Chain`].
#[derive(Debug, Clone)]
pub struct Stage {
    pub plugin: std::sync::Arc<dyn Plugin>,
    pub input_type: TrackType,
    pub output_type: Option<TrackType>,
    pub io_flags: IoFlags,
    pub effective_flags: BurnFlags,
}

impl Stage {
    pub fn plugin_name(&self) -> &str {
        self.plugin.name()
    }
}

/// Ordered sequence of stages, input-first (3's `Chain`).
#[derive(Debug, Clone, Default)]
pub struct Chain {
    pub stages: Vec<Stage>,
}

/// Result of a reachability search: whether a chain exists, plus any
/// `need_download` hints collected along the winning path (4.4.4's last
/// bullet).
#[derive(Debug, Clone, Default)]
pub struct Reachability {
    pub supported: bool,
    pub need_download: Vec<String>,
}

/// Wraps a frozen [`Registry`] and the [`Graph`] derived from it. Built
/// once; every query method takes `&self`.
#[derive(Debug)]
pub struct Planner {
    registry: Registry,
    graph: Graph,
}

impl Planner {
    pub fn new(registry: Registry) -> Self {
        let graph = Graph::build(&registry);
        Planner { registry, graph }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    // ---- 4.4.4 find_link -------------------------------------------------

    /// The two admission gates `brasero-caps-session.c:527-549` applies to a
    /// candidate link before it may be taken: a disc destination under
    /// `USE_FLAGS` must have a plug-in accepting the record-flag subset, and
    /// -- independently, not as an alternative -- a data destination under
    /// `USE_FLAGS` must have one accepting the image-flag subset, while any
    /// other destination is always subject to the unconditional
    /// media-restriction check. Shared by `find_link`, `materialize_path` and
    /// `collect_burn_flags` so the three traversals never disagree on which
    /// links are admissible.
    fn link_admissible(
        &self,
        node: &Caps,
        link: &CapsLink,
        dest: &TrackType,
        session: &Session,
        mode: ActiveMode,
        use_flags: bool,
    ) -> bool {
        let media = node.track_type.media().unwrap_or(MediaFlags::empty());

        if node.track_type.has_medium() && use_flags {
            let record_mask = session.session_flags & BurnFlags::RECORD_MASK;
            if !link
                .active_plugins(&self.registry, mode)
                .any(|p| p.check_record_flags(media, record_mask))
            {
                return false;
            }
        }

        if dest.has_data() {
            if use_flags {
                let image_mask = session.session_flags & BurnFlags::IMAGE_MASK;
                if !link
                    .active_plugins(&self.registry, mode)
                    .any(|p| p.check_image_flags(media, image_mask))
                {
                    return false;
                }
            }
        } else if !link
            .active_plugins(&self.registry, mode)
            .any(|p| p.check_media_restrictions(media))
        {
            return false;
        }

        true
    }

    fn find_link(
        &self,
        node: &Caps,
        session: &Session,
        io_flags: IoFlags,
        input: &TrackType,
        depth: u32,
        need_download: &mut Vec<String>,
    ) -> bool {
        if depth >= MAX_DEPTH {
            return false;
        }

        let mode = session.check_flags.active_mode();
        let use_flags = session.check_flags.contains(CheckFlags::USE_FLAGS);

        for link in &node.links {
            if link.is_blanking() {
                continue;
            }
            if !link.has_active_plugin(&self.registry, mode) {
                continue;
            }

            let dest = match &link.destination {
                Some(dest) => dest,
                None => continue,
            };

            if !self.link_admissible(node, link, dest, session, mode, use_flags) {
                continue;
            }

            let perfect_fit =
                link.io_flags.contains(IoFlags::ACCEPT_FILE) && input.is_compatible(dest);

            let succeeded = if perfect_fit {
                true
            } else if dest.has_medium() {
                // disc nodes can only be terminal input, never an
                // intermediate hop
                false
            } else if !link.io_flags.intersects(io_flags) {
                false
            } else if let Some(dest_caps) = self.graph.start_caps(dest) {
                self.find_link(dest_caps, session, io_flags, input, depth + 1, need_download)
            } else {
                false
            };

            if succeeded {
                if session.check_flags.contains(CheckFlags::SIGNAL_PLUGIN_ERRORS) {
                    collect_need_download(link, need_download);
                }
                return true;
            }
        }

        false
    }

    fn reachability(
        &self,
        output: &TrackType,
        input: &TrackType,
        io_flags: IoFlags,
        session: &Session,
    ) -> Reachability {
        let Some(start) = self.graph.start_caps(output) else {
            return Reachability::default();
        };

        let mut need_download = Vec::new();
        let supported = self.find_link(start, session, io_flags, input, 0, &mut need_download);
        Reachability {
            supported,
            need_download,
        }
    }

    // ---- 4.4.2 try_output_with_blanking -----------------------------------

    fn try_output_with_blanking(
        &self,
        output: &TrackType,
        input: &TrackType,
        io_flags: IoFlags,
        session: &Session,
    ) -> Reachability {
        let direct = self.reachability(output, input, io_flags, session);
        if direct.supported {
            return direct;
        }

        let TrackType::Disc(media) = output else {
            return direct;
        };

        let blank_before_write = session.session_flags.contains(BurnFlags::BLANK_BEFORE_WRITE);
        let can_blank_now =
            blank_before_write || self.can_blank(*media, session.session_flags);

        if !can_blank_now {
            return direct;
        }

        let blanked_output = TrackType::Disc(media.blanked());
        self.reachability(&blanked_output, input, io_flags, session)
    }

    // ---- 4.4.8 chain materialization ---------------------------------------

    /// Repeats the traversal of [`Self::find_link`] and, at each accepted
    /// link, selects the highest-priority active plug-in. Returns stages in
    /// pipeline order (input-first).
    pub fn materialize(&self, session: &Session) -> Result<Chain, PlannerError> {
        let io_flags = session.resolved_io_flags();
        let start = self
            .graph
            .start_caps(&session.output)
            .ok_or(PlannerError::NotSupported)?;

        let mut stages = Vec::new();
        if self.materialize_path(start, session, io_flags, &session.input, 0, &mut stages) {
            stages.reverse();
            Ok(Chain { stages })
        } else {
            Err(PlannerError::NotSupported)
        }
    }

    fn materialize_path(
        &self,
        node: &Caps,
        session: &Session,
        io_flags: IoFlags,
        input: &TrackType,
        depth: u32,
        acc: &mut Vec<Stage>,
    ) -> bool {
        if depth >= MAX_DEPTH {
            return false;
        }

        let mode = session.check_flags.active_mode();
        let use_flags = session.check_flags.contains(CheckFlags::USE_FLAGS);

        for link in &node.links {
            if link.is_blanking() || !link.has_active_plugin(&self.registry, mode) {
                continue;
            }
            let Some(dest) = &link.destination else { continue };

            if !self.link_admissible(node, link, dest, session, mode, use_flags) {
                continue;
            }

            let perfect_fit =
                link.io_flags.contains(IoFlags::ACCEPT_FILE) && input.is_compatible(dest);

            let continues = if perfect_fit {
                true
            } else if dest.has_medium() || !link.io_flags.intersects(io_flags) {
                false
            } else if let Some(dest_caps) = self.graph.start_caps(dest) {
                self.materialize_path(dest_caps, session, io_flags, input, depth + 1, acc)
            } else {
                false
            };

            if continues {
                let Some(plugin) = link.best_active_plugin(&self.registry, mode) else {
                    continue;
                };
                acc.push(Stage {
                    plugin: plugin.clone(),
                    input_type: node.track_type,
                    output_type: Some(*dest),
                    io_flags: link.io_flags,
                    effective_flags: session.session_flags,
                });
                return true;
            }
        }

        false
    }

    // ---- 4.4.1 session_supported ------------------------------------------

    pub fn session_supported(&self, session: &Session) -> Result<(), PlannerError> {
        if let Some(reason) = conflicting_flags(session) {
            debug!(reason, "session flags are mutually exclusive");
            return Err(PlannerError::FlagConflict(reason));
        }

        if let TrackType::Image(_) = session.output {
            // image sub-planner: the output itself already names its
            // format, so a direct reachability check suffices (4.4.5)
            let io_flags = session.resolved_io_flags();
            let result =
                self.try_output_with_blanking(&session.output, &session.input, io_flags, session);
            return if result.supported {
                Ok(())
            } else {
                Err(PlannerError::NotSupported)
            };
        }

        if session.is_same_drive() {
            self.session_tmp_image_type_same_src_dest(session)?;
            return Ok(());
        }

        if session.check_flags.contains(CheckFlags::USE_FLAGS)
            && drive_rejects(&self.registry.drive_profile, session.session_flags)
        {
            return Err(PlannerError::DriveRejected);
        }

        let io_flags = session.resolved_io_flags();
        let result =
            self.try_output_with_blanking(&session.output, &session.input, io_flags, session);

        if result.supported {
            for name in &result.need_download {
                debug!(plugin = %name, "need_download");
            }
            Ok(())
        } else {
            Err(PlannerError::NotSupported)
        }
    }

    /// Whether `candidate_input` could feed the session's existing output,
    /// everything else about the session (flags, destination) held fixed.
    pub fn session_input_supported(
        &self,
        session: &Session,
        candidate_input: &TrackType,
    ) -> Result<(), PlannerError> {
        let io_flags = session.resolved_io_flags();
        let result =
            self.try_output_with_blanking(&session.output, candidate_input, io_flags, session);
        if result.supported {
            Ok(())
        } else {
            Err(PlannerError::NotSupported)
        }
    }

    /// Whether the session's existing input could reach `candidate_output`,
    /// everything else about the session held fixed.
    pub fn session_output_supported(
        &self,
        session: &Session,
        candidate_output: &TrackType,
    ) -> Result<(), PlannerError> {
        let io_flags = session.resolved_io_flags();
        let result =
            self.try_output_with_blanking(candidate_output, &session.input, io_flags, session);
        if result.supported {
            Ok(())
        } else {
            Err(PlannerError::NotSupported)
        }
    }

    /// Plug-in names blocked only by `MissingDownload` along the winning
    /// path, collected when `SignalPluginErrors` is set (4.4.4's last
    /// bullet). Empty whenever no chain exists or the flag is unset.
    pub fn session_need_download(&self, session: &Session) -> Vec<String> {
        let io_flags = session.resolved_io_flags();
        self.try_output_with_blanking(&session.output, &session.input, io_flags, session)
            .need_download
    }

    // ---- 4.4.6 same-drive copy planner ------------------------------------

    pub fn session_tmp_image_type_same_src_dest(
        &self,
        session: &Session,
    ) -> Result<TrackType, PlannerError> {
        let source_is_cd = session
            .input
            .media()
            .is_some_and(|m| m.contains(MediaFlags::CD));

        if source_is_cd {
            let stream = TrackType::Stream {
                audio: crate::types::AudioFlags::RAW,
                video: crate::types::VideoFlags::empty(),
                has_metadata: true,
            };
            if self.type_reachable(&stream, session) {
                return Ok(stream);
            }
        }

        for format in ImageFormat::PROBE_ORDER {
            if format.is_cd_only() && !source_is_cd {
                continue;
            }
            let candidate = TrackType::Image(format);
            if self.type_reachable(&candidate, session) {
                return Ok(candidate);
            }
        }

        Err(PlannerError::NotSupported)
    }

    fn type_reachable(&self, candidate: &TrackType, session: &Session) -> bool {
        let io_flags = session.resolved_io_flags();
        self.reachability(candidate, &session.input, io_flags, session)
            .supported
    }

    // ---- 4.4.5 image output sub-planner -----------------------------------

    pub fn session_default_output_format(&self, session: &Session) -> Option<ImageFormat> {
        if let Some(format) = session.input.image_format() {
            return Some(format);
        }

        if let Some(requested) = session.requested_image_format {
            if requested != ImageFormat::None
                && self.type_reachable(&TrackType::Image(requested), session)
            {
                return Some(requested);
            }
        }

        let prefers_bin = session.input.has_data()
            || session
                .output
                .media()
                .is_some_and(|m| m.contains(MediaFlags::DVD));
        if prefers_bin {
            return Some(ImageFormat::Bin);
        }

        if session.input.has_stream() {
            for format in ImageFormat::PROBE_ORDER {
                if self.type_reachable(&TrackType::Image(format), session) {
                    return Some(format);
                }
            }
        }

        None
    }

    pub fn session_possible_output_formats(&self, session: &Session) -> (u32, crate::types::ImageFormatMask) {
        let mut mask = crate::types::ImageFormatMask::empty();
        let mut count = 0;
        for format in ImageFormat::PROBE_ORDER {
            if self.type_reachable(&TrackType::Image(format), session) {
                mask |= crate::types::ImageFormatMask::from(format);
                count += 1;
            }
        }
        (count, mask)
    }

    // ---- required media type ----------------------------------------------

    /// The source system passes a literal boolean as the check-flags
    /// bitmask argument at this call site; treated here as "use default
    /// check flags" rather than replicated bit-for-bit (§9, DESIGN.md).
    pub fn session_required_media_type(&self, session: &Session) -> MediaFlags {
        match session.output {
            TrackType::Disc(media) => media,
            _ => MediaFlags::empty(),
        }
    }

    // ---- 4.4.9 blanking sub-planner -----------------------------------------

    fn blanking_links(&self, media: MediaFlags) -> Vec<&CapsLink> {
        let Some(node) = self.graph.start_caps(&TrackType::Disc(media)) else {
            return Vec::new();
        };
        node.links.iter().filter(|l| l.is_blanking()).collect()
    }

    pub fn can_blank(&self, media: MediaFlags, flags: BurnFlags) -> bool {
        let mode = ActiveMode::EnabledOnly;
        let restricted = media.is_dvd_rw_sequential() && flags.contains(BurnFlags::MULTI);

        self.blanking_links(media).into_iter().any(|link| {
            link.active_plugins(&self.registry, mode)
                .any(|p| {
                    let accepts = p.check_blank_flags(media, flags);
                    if !restricted {
                        accepts
                    } else {
                        accepts && !p.blank_flags(media, flags).compulsory.contains(BurnFlags::FAST_BLANK)
                    }
                })
        })
    }

    pub fn get_blank_flags(&self, media: MediaFlags, flags: BurnFlags) -> FlagSet {
        let mode = ActiveMode::EnabledOnly;
        let mut combined = FlagSet::default();

        for link in self.blanking_links(media) {
            for plugin in link.active_plugins(&self.registry, mode) {
                combined = combined.union(plugin.blank_flags(media, flags));
            }
        }

        if media.is_dvd_rw_sequential() && flags.contains(BurnFlags::MULTI) {
            combined.supported.remove(BurnFlags::FAST_BLANK);
            combined.compulsory.remove(BurnFlags::FAST_BLANK);
        }

        combined
    }

    pub fn session_can_blank(&self, session: &Session) -> bool {
        let Some(media) = session.output.media() else {
            return false;
        };
        self.can_blank(media, session.session_flags)
    }

    pub fn session_get_blank_flags(&self, session: &Session) -> Result<FlagSet, PlannerError> {
        let media = session
            .output
            .media()
            .ok_or(PlannerError::NotSupported)?;
        if !self.can_blank(media, session.session_flags) {
            return Err(PlannerError::NotSupported);
        }
        Ok(self.get_blank_flags(media, session.session_flags))
    }

    // ---- 4.4.7 flag reconciliation ------------------------------------------

    fn collect_burn_flags(
        &self,
        node: &Caps,
        session: &Session,
        io_flags: IoFlags,
        input: &TrackType,
        depth: u32,
    ) -> Option<FlagSet> {
        if depth >= MAX_DEPTH {
            return None;
        }

        let mode = session.check_flags.active_mode();
        let use_flags = session.check_flags.contains(CheckFlags::USE_FLAGS);
        let mut combined: Option<FlagSet> = None;

        for link in &node.links {
            if link.is_blanking() || !link.has_active_plugin(&self.registry, mode) {
                continue;
            }
            let Some(dest) = &link.destination else { continue };

            if !self.link_admissible(node, link, dest, session, mode, use_flags) {
                continue;
            }

            let link_flags = if node.track_type.has_medium() {
                let mut acc = FlagSet::default();
                for plugin in link.active_plugins(&self.registry, mode) {
                    acc = acc.union(plugin.record_flags(
                        node.track_type.media().unwrap_or(MediaFlags::empty()),
                        session.session_flags,
                    ));
                }
                acc
            } else if dest.has_data() {
                let mut acc = FlagSet::default();
                for plugin in link.active_plugins(&self.registry, mode) {
                    acc = acc.union(plugin.image_flags(MediaFlags::empty(), session.session_flags));
                }
                acc
            } else {
                FlagSet::default()
            };

            let perfect_fit =
                link.io_flags.contains(IoFlags::ACCEPT_FILE) && input.is_compatible(dest);

            let step = if perfect_fit {
                Some(link_flags)
            } else if dest.has_medium() {
                None
            } else if !link.io_flags.intersects(io_flags) {
                None
            } else {
                self.graph.start_caps(dest).and_then(|dest_caps| {
                    self.collect_burn_flags(dest_caps, session, io_flags, input, depth + 1)
                        .map(|rest| link_flags.union(rest))
                })
            };

            if let Some(flags) = step {
                combined = Some(match combined {
                    Some(c) => c.alternative(flags),
                    None => flags,
                });
            }
        }

        combined
    }

    pub fn session_get_burn_flags(&self, session: &Session) -> Result<FlagSet, PlannerError> {
        let io_flags = session.resolved_io_flags();

        let mut seed = FlagSet {
            supported: BurnFlags::CHECK_SIZE | BurnFlags::NO_GRACE,
            compulsory: BurnFlags::empty(),
        };
        if !session.is_writing_to_file() {
            seed.supported |= BurnFlags::EJECT;
        }

        let Some(start) = self.graph.start_caps(&session.output) else {
            return Err(PlannerError::NotSupported);
        };

        let traversal = self.collect_burn_flags(start, session, io_flags, &session.input, 0);

        let media = session.output.media().unwrap_or(MediaFlags::empty());
        let blank_before_write = session.session_flags.contains(BurnFlags::BLANK_BEFORE_WRITE);
        let needs_blanking = blank_before_write
            || (traversal.is_none() && self.can_blank(media, session.session_flags));

        let combined = match (traversal, needs_blanking) {
            (Some(flags), false) => flags,
            (Some(flags), true) if self.can_blank(media, session.session_flags) => {
                flags.alternative(self.get_blank_flags(media, session.session_flags))
            }
            (Some(flags), true) => flags,
            (None, true) if self.can_blank(media, session.session_flags) => {
                self.get_blank_flags(media, session.session_flags)
            }
            (None, _) => return Err(PlannerError::NotSupported),
        };

        Ok(seed.union(apply_burn_flag_rules(combined, session, &self.registry)))
    }
}

/// Session-flag combinations that can never be jointly honored, regardless
/// of registry contents (§7's `FlagConflict` examples).
fn conflicting_flags(session: &Session) -> Option<&'static str> {
    let flags = session.session_flags;
    if flags.contains(BurnFlags::MERGE) && flags.contains(BurnFlags::BLANK_BEFORE_WRITE) {
        return Some("Merge and BlankBeforeWrite are mutually exclusive");
    }
    let media = session.output.media().unwrap_or(MediaFlags::empty());
    if flags.contains(BurnFlags::MERGE)
        && flags.contains(BurnFlags::APPEND)
        && media.contains(MediaFlags::BLANK)
    {
        return Some("Merge and Append cannot both apply to a blank medium");
    }
    None
}

fn apply_burn_flag_rules(mut flags: FlagSet, session: &Session, registry: &Registry) -> FlagSet {
    // rule 1: pipe-only transport
    if session.session_flags.contains(BurnFlags::NO_TMP_FILES) {
        flags.supported |= BurnFlags::NO_TMP_FILES;
    }

    // rule 2: Clone input forces Raw, drops DAO; otherwise Raw is dropped
    if matches!(session.input, TrackType::Image(ImageFormat::Clone)) {
        flags.supported |= BurnFlags::RAW;
        flags.compulsory |= BurnFlags::RAW;
        flags.supported.remove(BurnFlags::DAO);
        flags.compulsory.remove(BurnFlags::DAO);
    } else {
        flags.supported.remove(BurnFlags::RAW);
    }

    // rule 3: metadata-bearing audio forces DAO
    if let TrackType::Stream { has_metadata: true, .. } = session.input {
        flags.supported |= BurnFlags::DAO;
        flags.compulsory |= BurnFlags::DAO;
    }

    let media = session.output.media().unwrap_or(MediaFlags::empty());

    // rule 4: DVD-RW sequential + Multi drops FastBlank
    if media.is_dvd_rw_sequential() && session.session_flags.contains(BurnFlags::MULTI) {
        flags.supported.remove(BurnFlags::FAST_BLANK);
    }

    // rule 5: same-drive copy
    if session.is_same_drive() {
        flags.supported.remove(BurnFlags::NO_TMP_FILES | BurnFlags::MERGE);
        flags.compulsory.remove(BurnFlags::NO_TMP_FILES | BurnFlags::MERGE);
        flags.supported |= BurnFlags::BLANK_BEFORE_WRITE | BurnFlags::FAST_BLANK;
    }

    // rule 6: audio medium forces DAO, drops Multi
    if media.contains(MediaFlags::HAS_AUDIO) {
        flags.supported |= BurnFlags::DAO;
        flags.compulsory |= BurnFlags::DAO;
        flags.supported.remove(BurnFlags::MULTI);
        flags.compulsory.remove(BurnFlags::MULTI);
    }

    // rule 7: per-drive quirks
    let profile = &registry.drive_profile;
    if profile.tao_only && !media.contains(MediaFlags::REWRITABLE) {
        flags.supported.remove(BurnFlags::MULTI);
        flags.compulsory.remove(BurnFlags::MULTI);
    }
    if media.is_dvd_plus() {
        flags.supported.remove(BurnFlags::DUMMY);
        flags.compulsory.remove(BurnFlags::DUMMY);
    }
    if media.contains(MediaFlags::DVD) && !profile.can_use_dummy_for_sao {
        flags.supported.remove(BurnFlags::DUMMY);
    }
    if !profile.has_burnfree {
        flags.supported.remove(BurnFlags::BURNPROOF);
        flags.compulsory.remove(BurnFlags::BURNPROOF);
    }

    flags
}

fn collect_need_download(link: &CapsLink, out: &mut Vec<String>) {
    use crate::plugin::ActiveFlags;

    for plugin in &link.plugins {
        let flags = plugin.active_flags();
        if flags.contains(ActiveFlags::MISSING_DOWNLOAD) && !flags.contains(ActiveFlags::ENABLED) {
            out.push(plugin.name().to_string());
        }
    }
}
