//! Capability graph (C3, §4.3): Caps nodes and CapsLink edges, derived from
//! a frozen [`Registry`] at construction time.

use std::sync::Arc;

use crate::plugin::{ActiveMode, Plugin};
use crate::registry::Registry;
use crate::types::{IoFlags, TrackType};

/// A canonical representative of a track-type equivalence class.
#[derive(Debug, Clone)]
pub struct Caps {
    pub track_type: TrackType,
    pub links: Vec<CapsLink>,
}

/// One outgoing edge of a [`Caps`] node.
///
/// `destination` is `None` for a **blanking link**: the admitted plug-ins
/// erase the medium rather than transform it into another type (3.3's NIL
/// sentinel).
#[derive(Debug, Clone)]
pub struct CapsLink {
    pub destination: Option<TrackType>,
    pub io_flags: IoFlags,
    /// Candidate plug-ins able to realize this link, ordered by descending
    /// priority (then name, §9). Invariant: never empty at construction
    /// time; a link whose plug-ins are all inactive is treated as absent by
    /// callers, not removed from the graph.
    pub plugins: Vec<Arc<dyn Plugin>>,
}

impl CapsLink {
    pub fn is_blanking(&self) -> bool {
        self.destination.is_none()
    }

    /// At least one plug-in on this link is active under `mode`.
    pub fn has_active_plugin(&self, registry: &Registry, mode: ActiveMode) -> bool {
        self.plugins
            .iter()
            .any(|p| registry.is_active(p.as_ref(), mode))
    }

    pub fn active_plugins<'a>(
        &'a self,
        registry: &'a Registry,
        mode: ActiveMode,
    ) -> impl Iterator<Item = &'a Arc<dyn Plugin>> + 'a {
        self.plugins
            .iter()
            .filter(move |p| registry.is_active(p.as_ref(), mode))
    }

    /// Highest-priority active plug-in, used at chain-materialization time
    /// (4.4.8).
    pub fn best_active_plugin(
        &self,
        registry: &Registry,
        mode: ActiveMode,
    ) -> Option<&Arc<dyn Plugin>> {
        self.active_plugins(registry, mode)
            .max_by(|a, b| a.priority().cmp(&b.priority()).then(b.name().cmp(a.name())))
    }
}

/// Derived index over a [`Registry`]: one [`Caps`] node per distinct input
/// `TrackType` any plug-in declares, each with its outgoing links.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Caps>,
}

impl Graph {
    /// Nodes are keyed by the type a link *produces*: a normal link's output,
    /// or -- since a blanking link has no output -- its own input medium.
    /// This is what lets `start_caps` look a session's output type up
    /// directly; `CapsLink::destination` then holds the type one step closer
    /// to the session's input, which is the direction `find_link` walks.
    pub fn build(registry: &Registry) -> Graph {
        let mut nodes: Vec<Caps> = Vec::new();

        for plugin in registry.plugins() {
            for link in plugin.declared_links() {
                let key_type = link.output.unwrap_or(link.input);
                let dest_type = link.output.map(|_| link.input);

                let node_idx = match nodes
                    .iter()
                    .position(|n| type_key(&n.track_type) == type_key(&key_type))
                {
                    Some(idx) => idx,
                    None => {
                        nodes.push(Caps {
                            track_type: key_type,
                            links: Vec::new(),
                        });
                        nodes.len() - 1
                    }
                };

                let node = &mut nodes[node_idx];
                let existing = node.links.iter_mut().find(|l| {
                    destination_key(&l.destination) == destination_key(&dest_type)
                        && l.io_flags == link.io_flags
                });

                match existing {
                    Some(l) => l.plugins.push(plugin.clone()),
                    None => node.links.push(CapsLink {
                        destination: dest_type,
                        io_flags: link.io_flags,
                        plugins: vec![plugin.clone()],
                    }),
                }
            }
        }

        Graph { nodes }
    }

    /// The unique node whose type matches `track_type` exactly (3.3's "start
    /// Caps"). Falls back to a superset search on `Disc` media bits when no
    /// exact node exists, per 4.3's relaxation rule.
    pub fn start_caps(&self, track_type: &TrackType) -> Option<&Caps> {
        if let Some(node) = self
            .nodes
            .iter()
            .find(|n| type_key(&n.track_type) == type_key(track_type))
        {
            return Some(node);
        }

        if let TrackType::Disc(media) = track_type {
            return self.nodes.iter().find(|n| match n.track_type {
                TrackType::Disc(node_media) => (node_media & *media) == *media,
                _ => false,
            });
        }

        None
    }

    pub fn nodes(&self) -> &[Caps] {
        &self.nodes
    }
}

fn type_key(t: &TrackType) -> (u8, u64) {
    match t {
        TrackType::None => (0, 0),
        TrackType::Data(f) => (1, f.bits() as u64),
        TrackType::Stream {
            audio,
            video,
            has_metadata,
        } => (
            2,
            (audio.bits() as u64) | ((video.bits() as u64) << 8) | ((*has_metadata as u64) << 16),
        ),
        TrackType::Image(f) => (3, u8::from(*f) as u64),
        TrackType::Disc(m) => (4, m.bits() as u64),
    }
}

fn destination_key(t: &Option<TrackType>) -> Option<(u8, u64)> {
    t.as_ref().map(type_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{DeclaredLink, FlagSet, Plugin};
    use crate::registry::RegistryBuilder;
    use crate::types::{BurnFlags, FsFlags, ImageFormat, MediaFlags};

    #[derive(Debug)]
    struct Iso2Bin;
    impl Plugin for Iso2Bin {
        fn name(&self) -> &str {
            "iso2bin"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Data(FsFlags::ISO),
                output: Some(TrackType::Image(ImageFormat::Bin)),
                io_flags: IoFlags::ACCEPT_FILE,
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
    struct Blank;
    impl Plugin for Blank {
        fn name(&self) -> &str {
            "blank"
        }
        fn declared_links(&self) -> Vec<DeclaredLink> {
            vec![DeclaredLink {
                input: TrackType::Disc(MediaFlags::DVD | MediaFlags::REWRITABLE),
                output: None,
                io_flags: IoFlags::ACCEPT_FILE,
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
    fn start_caps_is_keyed_by_a_links_output() {
        let registry = RegistryBuilder::new()
            .with_plugin(std::sync::Arc::new(Iso2Bin))
            .build()
            .unwrap();
        let graph = Graph::build(&registry);

        let node = graph
            .start_caps(&TrackType::Image(ImageFormat::Bin))
            .expect("node keyed by the link's output must exist");
        assert_eq!(node.links.len(), 1);
        assert_eq!(
            node.links[0].destination,
            Some(TrackType::Data(FsFlags::ISO))
        );
    }

    #[test]
    fn blanking_link_is_keyed_by_its_own_input_medium() {
        let registry = RegistryBuilder::new()
            .with_plugin(std::sync::Arc::new(Blank))
            .build()
            .unwrap();
        let graph = Graph::build(&registry);

        let media = MediaFlags::DVD | MediaFlags::REWRITABLE;
        let node = graph
            .start_caps(&TrackType::Disc(media))
            .expect("blanking link keys its own input medium");
        assert!(node.links[0].is_blanking());
    }
}
