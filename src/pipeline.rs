use crate::error::{AnalysisError, ErrorKind};
use crate::model::{AnalysisModel, AnalysisRequest};
use crate::normalize::{UploadedImage, persist_upload};
use crate::prompt::analysis_prompt;
use crate::surface::Notice;
use crate::validate::validate_response;
use serde::Serialize;
use std::path::Path;

pub const PLACEHOLDER: &str = "Upload an image and click 'Analyze Image' to begin.";
pub const UPLOAD_PROMPT: &str = "Please upload an image to begin analysis.";
pub const UPLOAD_WARNING: &str = "Please upload an image first";
pub const INVALID_FORMAT: &str = "Invalid image format";
pub const IN_PROGRESS: &str = "Analysis in progress... Please wait.";
pub const COMPLETED: &str = "Analysis completed successfully!";
pub const INCOMPLETE_WARNING: &str = "Analysis seems incomplete. Please try again.";
pub const INCOMPLETE_MESSAGE: &str = "Error: Analysis seems incomplete. Please try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Result,
    Error,
}

/// What the output column shows once a request ends.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisOutcome {
    pub kind: OutcomeKind,
    /// Markdown for the output column.
    pub markdown: String,
    /// Status messages raised while handling the request, in order.
    pub notices: Vec<Notice>,
    /// Set when `kind` is `Error`.
    pub error: Option<ErrorKind>,
}

impl AnalysisOutcome {
    pub fn success(markdown: String, mut notices: Vec<Notice>) -> Self {
        notices.push(Notice::success(COMPLETED));
        Self {
            kind: OutcomeKind::Result,
            markdown,
            notices,
            error: None,
        }
    }

    pub fn missing_input() -> Self {
        Self::from_error(&AnalysisError::MissingInput, Vec::new())
    }

    /// Maps an error to the text the user sees.
    pub fn from_error(err: &AnalysisError, mut notices: Vec<Notice>) -> Self {
        let markdown = match err {
            AnalysisError::MissingInput => {
                notices.push(Notice::warning(UPLOAD_WARNING));
                UPLOAD_PROMPT.to_string()
            }
            AnalysisError::InvalidFormat(_) => {
                notices.push(Notice::warning(INVALID_FORMAT));
                INVALID_FORMAT.to_string()
            }
            AnalysisError::IncompleteResponse { .. } => {
                notices.push(Notice::warning(INCOMPLETE_WARNING));
                INCOMPLETE_MESSAGE.to_string()
            }
            AnalysisError::Transport(_) | AnalysisError::Io(_) => {
                let message = format!("Error during analysis: {err}");
                notices.push(Notice::error(message.clone()));
                message
            }
        };
        Self {
            kind: OutcomeKind::Error,
            markdown,
            notices,
            error: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Result
    }
}

/// Handles one press of the analyze button.
///
/// The upload is normalized into a request-scoped PNG under `scratch_dir`, sent
/// to the model exactly once, and the reply checked for length. The temporary
/// file is gone by the time this returns, whatever the outcome.
pub fn analyze_medical_image<M: AnalysisModel>(
    model: &mut M,
    scratch_dir: &Path,
    image: Option<UploadedImage>,
) -> AnalysisOutcome {
    let mut notices = Vec::new();
    match run_analysis(model, scratch_dir, image, &mut notices) {
        Ok(markdown) => AnalysisOutcome::success(markdown, notices),
        Err(err) => {
            match &err {
                AnalysisError::MissingInput => log::debug!("Analyze pressed without an image"),
                AnalysisError::InvalidFormat(detail) => {
                    log::warn!("Rejected upload: {detail}")
                }
                AnalysisError::IncompleteResponse { length } => {
                    log::warn!("Model returned only {length} characters")
                }
                AnalysisError::Transport(_) | AnalysisError::Io(_) => {
                    log::error!("Analysis failed: {err}")
                }
            }
            AnalysisOutcome::from_error(&err, notices)
        }
    }
}

fn run_analysis<M: AnalysisModel>(
    model: &mut M,
    scratch_dir: &Path,
    image: Option<UploadedImage>,
    notices: &mut Vec<Notice>,
) -> Result<String, AnalysisError> {
    let image = image.ok_or(AnalysisError::MissingInput)?;
    let file = persist_upload(scratch_dir, image)?;

    notices.push(Notice::info(IN_PROGRESS));

    let prompt = analysis_prompt();
    let reply = model
        .run(AnalysisRequest {
            prompt: &prompt,
            image_path: file.path(),
        })
        .map_err(AnalysisError::transport)?;

    if let Err(e) = file.close() {
        log::warn!("Could not remove temporary image: {e}");
    }

    validate_response(reply.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnalysisReply;
    use crate::normalize::PixelArray;
    use crate::prompt::SECTION_REMINDER;
    use crate::surface::NoticeLevel;
    use image::ColorType;
    use std::path::PathBuf;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct MockError(String);

    /// Records every call and replies with a canned result.
    struct MockModel {
        reply: Result<String, String>,
        calls: usize,
        seen_paths: Vec<PathBuf>,
        seen_color: Option<ColorType>,
        seen_prompt: Option<String>,
    }

    impl MockModel {
        fn replying(text: &str) -> Self {
            Self::with(Ok(text.to_string()))
        }

        fn failing(message: &str) -> Self {
            Self::with(Err(message.to_string()))
        }

        fn with(reply: Result<String, String>) -> Self {
            Self {
                reply,
                calls: 0,
                seen_paths: Vec::new(),
                seen_color: None,
                seen_prompt: None,
            }
        }
    }

    impl AnalysisModel for MockModel {
        type Error = MockError;

        fn run(&mut self, request: AnalysisRequest<'_>) -> Result<AnalysisReply, MockError> {
            self.calls += 1;
            self.seen_paths.push(request.image_path.to_path_buf());
            self.seen_color = image::open(request.image_path).ok().map(|img| img.color());
            self.seen_prompt = Some(request.prompt.to_string());
            match &self.reply {
                Ok(content) => Ok(AnalysisReply {
                    content: content.clone(),
                }),
                Err(message) => Err(MockError(message.clone())),
            }
        }
    }

    fn zeros_10x10() -> Option<UploadedImage> {
        Some(UploadedImage::Pixels(
            PixelArray::new(10, 10, 1, vec![0; 100]).unwrap(),
        ))
    }

    #[test]
    fn short_reply_yields_incomplete_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::replying("ok");

        let outcome = analyze_medical_image(&mut model, dir.path(), zeros_10x10());

        assert_eq!(outcome.markdown, INCOMPLETE_MESSAGE);
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.error, Some(ErrorKind::IncompleteResponse));
        assert_eq!(model.calls, 1);
        assert!(!model.seen_paths[0].exists());
    }

    #[test]
    fn long_reply_is_returned_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let report = format!("## 1. Image Type\n{}\n", "x".repeat(182));
        assert_eq!(report.chars().count(), 200);
        let mut model = MockModel::replying(&report);

        let outcome = analyze_medical_image(&mut model, dir.path(), zeros_10x10());

        assert!(outcome.is_success());
        assert_eq!(outcome.markdown, report);
        let levels: Vec<NoticeLevel> = outcome.notices.iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Success]);
    }

    #[test]
    fn model_sees_rgb_file_and_full_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::replying(&"y".repeat(150));

        analyze_medical_image(&mut model, dir.path(), zeros_10x10());

        assert_eq!(model.seen_color, Some(ColorType::Rgb8));
        let prompt = model.seen_prompt.unwrap();
        assert!(prompt.ends_with(SECTION_REMINDER));
        assert!(model.seen_paths[0].starts_with(dir.path()));
        assert!(!model.seen_paths[0].exists());
    }

    #[test]
    fn missing_image_never_calls_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::replying("unused");

        let outcome = analyze_medical_image(&mut model, dir.path(), None);

        assert_eq!(outcome.markdown, UPLOAD_PROMPT);
        assert_eq!(outcome.error, Some(ErrorKind::MissingInput));
        assert_eq!(outcome.notices, vec![Notice::warning(UPLOAD_WARNING)]);
        assert_eq!(model.calls, 0);
    }

    #[test]
    fn invalid_upload_never_calls_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::replying("unused");

        let upload = Some(UploadedImage::Encoded(b"GIF? no".to_vec()));
        let outcome = analyze_medical_image(&mut model, dir.path(), upload);

        assert_eq!(outcome.markdown, INVALID_FORMAT);
        assert_eq!(outcome.error, Some(ErrorKind::InvalidFormat));
        assert_eq!(model.calls, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn model_failure_is_reported_and_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::failing("quota exceeded");

        let outcome = analyze_medical_image(&mut model, dir.path(), zeros_10x10());

        assert!(outcome.markdown.contains("quota exceeded"));
        assert_eq!(outcome.markdown, "Error during analysis: quota exceeded");
        assert_eq!(outcome.error, Some(ErrorKind::TransportFailure));
        assert_eq!(outcome.notices.last().unwrap().level, NoticeLevel::Error);
        assert_eq!(model.calls, 1);
        assert!(!model.seen_paths[0].exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_scratch_dir_is_an_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut model = MockModel::replying("unused");

        let outcome = analyze_medical_image(&mut model, &missing, zeros_10x10());

        assert_eq!(outcome.error, Some(ErrorKind::IoFailure));
        assert!(outcome.markdown.starts_with("Error during analysis: "));
        assert_eq!(model.calls, 0);
    }

    #[test]
    fn consecutive_requests_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockModel::replying(&"z".repeat(120));

        analyze_medical_image(&mut model, dir.path(), zeros_10x10());
        analyze_medical_image(&mut model, dir.path(), zeros_10x10());

        assert_eq!(model.calls, 2);
        assert_ne!(model.seen_paths[0], model.seen_paths[1]);
    }
}
