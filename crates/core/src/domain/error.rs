use serde::Serialize;

/// 音声処理の共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_SYNTHESIS_UNAVAILABLE")]
    SynthesisUnavailable,
    #[serde(rename = "E_SYNTHESIS")]
    Synthesis,
    #[serde(rename = "E_INVALID_ARGUMENT")]
    InvalidArgument,
    #[serde(rename = "E_RECOGNITION_UNAVAILABLE")]
    RecognitionUnavailable,
    #[serde(rename = "E_RECOGNITION")]
    Recognition,
}

/// 音声マネージャーのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech synthesis not available")]
    SynthesisUnavailable,
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Speech recognition not available")]
    RecognitionUnavailable,
    #[error("Speech recognition failed: {0}")]
    Recognition(String),
}

impl SpeechError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SynthesisUnavailable => ErrorCode::SynthesisUnavailable,
            Self::Synthesis(_) => ErrorCode::Synthesis,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::RecognitionUnavailable => ErrorCode::RecognitionUnavailable,
            Self::Recognition(_) => ErrorCode::Recognition,
        }
    }

    /// 同じマネージャーで再試行して回復し得るか
    pub fn recoverable(&self) -> bool {
        matches!(self, Self::Synthesis(_) | Self::Recognition(_))
    }
}

/// イベントペイロード用のシリアライズ可能な表現
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl From<&SpeechError> for ErrorPayload {
    fn from(err: &SpeechError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            recoverable: err.recoverable(),
        }
    }
}
