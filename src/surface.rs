use crate::normalize::UploadedImage;
use crate::pipeline::{AnalysisOutcome, OutcomeKind, PLACEHOLDER};
use serde::Serialize;

/// Severity of a transient status message shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Where the interaction surface currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    /// Nothing uploaded yet.
    Idle,
    /// An image is selected and waiting for the analyze button.
    Uploading,
    /// The analysis is running.
    Analyzing,
    /// The last analysis finished with the given kind of output.
    Displaying(OutcomeKind),
}

impl SurfaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceState::Idle => "idle",
            SurfaceState::Uploading => "uploading",
            SurfaceState::Analyzing => "analyzing",
            SurfaceState::Displaying(OutcomeKind::Result) => "displaying_result",
            SurfaceState::Displaying(OutcomeKind::Error) => "displaying_error",
        }
    }
}

/// The upload/analyze/display cycle behind the page.
///
/// There is no terminal state: a new image can be selected at any time.
#[derive(Debug)]
pub struct Surface {
    state: SurfaceState,
    image: Option<UploadedImage>,
    output: String,
    notices: Vec<Notice>,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            state: SurfaceState::Idle,
            image: None,
            output: PLACEHOLDER.to_string(),
            notices: Vec::new(),
        }
    }
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Markdown currently shown in the output column.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Selecting a file moves to `Uploading` from any state.
    pub fn select(&mut self, image: UploadedImage) {
        self.image = Some(image);
        self.state = SurfaceState::Uploading;
    }

    /// Pressing the analyze button.
    ///
    /// With an image selected the surface moves to `Analyzing` and hands the
    /// image out. Without one the state is left alone and the upload prompt is
    /// shown instead.
    pub fn click(&mut self) -> Option<UploadedImage> {
        match self.image.take() {
            Some(image) => {
                self.state = SurfaceState::Analyzing;
                self.notices.clear();
                Some(image)
            }
            None => {
                let outcome = AnalysisOutcome::missing_input();
                self.output = outcome.markdown;
                self.notices = outcome.notices;
                None
            }
        }
    }

    /// Shows a finished analysis, or an upload rejected before analysis.
    pub fn display(&mut self, outcome: AnalysisOutcome) {
        self.state = SurfaceState::Displaying(outcome.kind);
        self.output = outcome.markdown;
        self.notices.extend(outcome.notices);
    }
}
