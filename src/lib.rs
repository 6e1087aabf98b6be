pub mod config;
pub mod error;
pub mod generator;
pub mod html_report;
pub mod metadata;
pub mod organizer;
pub mod selection;
pub mod video_processor;

pub use config::{ConfigLoader, GeneratorConfig};
pub use error::{GenerationError, OrganizationError, ProcessingError};
pub use generator::{format_timestamped_script, generate_script, NarrationStyle, TargetAudience};
pub use metadata::{FrameRecord, SceneChange, VideoMetadata};
pub use organizer::{organize_frames, OrganizeConfig, OrganizeResponse, OrganizeResult};
pub use selection::{FrameInput, SelectedFrame};
pub use video_processor::VideoProcessor;
