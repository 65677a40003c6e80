//! Skinned scene import pipeline
//!
//! Turns an externally parsed 3-D scene into engine actors, skinned meshes,
//! a bind pose and simplified animation clips, and evaluates the skeleton
//! at runtime to feed GPU skinning.

pub mod assets;
pub mod error;
pub mod import;
pub mod logging;
pub mod math;
pub mod scene;
pub mod settings;
pub mod skinning;
pub mod source;
pub mod store;

pub use error::{ImportError, SceneError, StoreError};
pub use import::{ImportReport, ImportWarning, import_file, import_scene};
pub use logging::{LogLevel, ResultExt, send_log};
pub use settings::{AnimationFilter, ImportSettings, load_import_settings, save_import_settings};
pub use skinning::{MAX_SKIN_BONES, SkinState, SkinningEvaluator};
