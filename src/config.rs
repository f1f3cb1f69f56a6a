//! Decode options.
//!
//! NanoScope files agree on a handful of section and parameter names, but not
//! all of them. [`DecodeOptions`] carries the names the decoder relies on, with
//! defaults matching the files written by current instrument software:
//!
//! - `scan_section` - section holding scan-wide parameters (default: `Ciao scan list`)
//! - `z_scale_key` - per-image Z calibration parameter (default: `2:Z scale`)
//! - `title_key` - per-image select parameter naming the channel (default: `2:Image Data`)
//! - `parallel` - decode images on the rayon thread pool (default: false)
//!
//! ```ignore
//! use ciao_spm::DecodeOptions;
//!
//! let options = DecodeOptions::builder().parallel(true).build();
//! ```

use bon::Builder;
use serde::Serialize;

// =============================================================================
// Default Values
// =============================================================================

/// Default scan-wide section name.
pub const DEFAULT_SCAN_SECTION: &str = "Ciao scan list";

/// Default Z scale parameter key.
pub const DEFAULT_Z_SCALE_KEY: &str = "2:Z scale";

/// Default image title parameter key.
pub const DEFAULT_TITLE_KEY: &str = "2:Image Data";

/// Per-image field holding the scan size.
pub const SCAN_SIZE_KEY: &str = "Scan Size";

/// Per-image field holding the `x:y` aspect ratio.
pub const ASPECT_RATIO_KEY: &str = "Aspect Ratio";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Builder)]
pub struct DecodeOptions {
    #[builder(into, default = DEFAULT_SCAN_SECTION.to_string())]
    pub scan_section: String,

    #[builder(into, default = DEFAULT_Z_SCALE_KEY.to_string())]
    pub z_scale_key: String,

    #[builder(into, default = DEFAULT_TITLE_KEY.to_string())]
    pub title_key: String,

    #[builder(default)]
    pub parallel: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
