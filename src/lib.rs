//! Medical image analysis through a hosted multimodal model.
//!
//! An upload is normalized to an RGB PNG, sent once to the model together with
//! a fixed five-section instruction, and the returned markdown is checked for
//! length before it is shown. The [`AnalysisModel`] trait is the seam between
//! the pipeline and the hosted service, so the whole flow can run against a
//! mock in tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod gemini;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod server;
pub mod surface;
pub mod validate;

pub use engine::{AnalysisEngine, AnalysisEngineState, EngineError, EngineResponse};
pub use error::{AnalysisError, ErrorKind};
pub use gemini::{GeminiConfig, GeminiError, GeminiModel};
pub use model::{AnalysisModel, AnalysisReply, AnalysisRequest};
pub use normalize::{PixelArray, TempImageFile, UploadedImage};
pub use pipeline::{AnalysisOutcome, OutcomeKind, analyze_medical_image};
pub use surface::{Notice, NoticeLevel, Surface, SurfaceState};
