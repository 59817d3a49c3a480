//! Capability registry (C2, §4.2) and its builder (§10.3).

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::RegistryError;
use crate::plugin::{ActiveMode, Plugin};
use crate::types::{IoFlags, MediaFlags, TrackType};

/// Per-drive quirks consulted by `update_for_drive` (4.4.7 rule 7). No file
/// format backs this: values are constructed in code, since drive
/// enumeration is out of scope (§1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveProfile {
    pub tao_only: bool,
    pub can_use_dummy_for_sao: bool,
    pub has_burnfree: bool,
}

impl Default for DriveProfile {
    fn default() -> Self {
        DriveProfile {
            tao_only: false,
            can_use_dummy_for_sao: true,
            has_burnfree: true,
        }
    }
}

/// Frozen collection of plug-in declarations. Built once via
/// [`RegistryBuilder`] and never mutated afterwards; the capability graph
/// (C3) is derived from it at construction time.
#[derive(Debug)]
pub struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
    pub drive_profile: DriveProfile,
}

impl Registry {
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    pub fn is_active(&self, plugin: &dyn Plugin, mode: ActiveMode) -> bool {
        use crate::plugin::ActiveFlags;

        let flags = plugin.active_flags();
        match mode {
            ActiveMode::EnabledOnly => flags.contains(ActiveFlags::ENABLED),
            ActiveMode::IgnoreErrors => {
                flags.contains(ActiveFlags::ENABLED)
                    || flags.intersects(ActiveFlags::MISSING_DOWNLOAD | ActiveFlags::ERROR)
            }
        }
    }

    /// Plug-ins with at least one declared link matching `(input, output,
    /// io_flags)` under compatibility rules, ordered by descending priority
    /// then ascending name (§9).
    pub fn plugins_for(
        &self,
        input: &TrackType,
        output: Option<&TrackType>,
        io_flags: IoFlags,
    ) -> Vec<Arc<dyn Plugin>> {
        let mut found: Vec<Arc<dyn Plugin>> = self
            .plugins
            .iter()
            .filter(|p| {
                p.declared_links().into_iter().any(|link| {
                    input.is_compatible(&link.input)
                        && match (&link.output, output) {
                            (None, None) => true,
                            (Some(a), Some(b)) => a.is_compatible(b) || b.is_compatible(a),
                            _ => false,
                        }
                        && link.io_flags.intersects(io_flags)
                })
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.name().cmp(b.name())));
        found
    }
}

/// Assembles a [`Registry`] from boxed plug-ins plus drive quirks, following
/// this codebase's preference for direct construction over config-file
/// parsing (§10.3).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
    drive_profile: DriveProfile,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn with_drive_profile(mut self, profile: DriveProfile) -> Self {
        self.drive_profile = profile;
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut seen = HashSet::new();
        for plugin in &self.plugins {
            if !seen.insert(plugin.name().to_string()) {
                return Err(RegistryError::DuplicateName(plugin.name().to_string()));
            }
            if plugin.declared_links().is_empty() {
                return Err(RegistryError::EmptyLink {
                    name: plugin.name().to_string(),
                });
            }
        }

        Ok(Registry {
            plugins: self.plugins,
            drive_profile: self.drive_profile,
        })
    }
}

/// Per-drive hard rejections consulted by `session_supported` step 3 (4.4.1).
/// Kept separate from [`DriveProfile`] because it gates whole flag
/// combinations rather than single flags.
pub fn drive_rejects(profile: &DriveProfile, flags: crate::types::BurnFlags) -> bool {
    use crate::types::BurnFlags;

    profile.tao_only && flags.contains(BurnFlags::DAO)
}
