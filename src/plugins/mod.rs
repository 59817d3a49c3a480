//! Reference plug-ins (§4.5, §10.3) exercising the plug-in contract end to
//! end. Not full re-implementations of any real burning backend.

pub mod blanker;
pub mod growisofs;
pub mod iso_imager;

use std::sync::Arc;

use crate::plugin::Plugin;

/// The small fixed set of reference plug-ins bundled with this crate,
/// wired together by the CLI front-end (C11) and the integration tests.
pub fn reference_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(iso_imager::IsoImager),
        Arc::new(growisofs::Growisofs::new()),
        Arc::new(blanker::Blanker),
    ]
}
