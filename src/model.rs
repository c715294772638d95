use std::path::Path;

/// What the pipeline hands to the model for one analysis.
pub struct AnalysisRequest<'a> {
    /// Instruction text, sent verbatim.
    pub prompt: &'a str,
    /// The normalized RGB PNG to attach.
    pub image_path: &'a Path,
}

/// Raw text returned by the model, expected to be markdown.
pub struct AnalysisReply {
    pub content: String,
}

/// Trait for the multimodal model that produces the analysis.
///
/// Implementations issue one blocking call per `run` and never retry, so the
/// pipeline can rely on exactly one external call per analysis.
pub trait AnalysisModel {
    /// The error type that can be returned by the call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the analysis on the given request and returns the text or an error.
    fn run(&mut self, request: AnalysisRequest<'_>) -> Result<AnalysisReply, Self::Error>;
}
