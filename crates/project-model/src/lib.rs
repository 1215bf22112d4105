//! Snapreel Project Model
//!
//! Plain data contracts shared by the editor and the export engine:
//! - **Trim:** the exported `[start, end]` window with its minimum gap
//! - **Crop:** percent-based crop rectangle and the crop editor session
//! - **Background:** gradient / image / none descriptors and presets
//! - **Export:** the options snapshot and output naming rules
//! - **Session:** the current recording, passed explicitly to consumers
//!
//! State changes are pure functions over these values so the invariants can
//! be checked without any UI or media attached.

pub mod background;
pub mod crop;
pub mod export;
pub mod media;
pub mod session;
pub mod trim;

pub use background::*;
pub use crop::*;
pub use export::*;
pub use media::*;
pub use session::*;
pub use trim::*;
