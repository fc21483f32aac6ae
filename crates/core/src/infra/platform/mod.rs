//! ホストプラットフォームの音声機能（合成・認識）の抽象化
//!
//! 機能検出は `SpeechPlatform` に合成器/認識器があるかどうかで表す。
//! テストではフェイク実装を注入する。

mod noop;
#[cfg(target_os = "macos")]
pub mod say;

pub use noop::{NoopRecognizer, NoopSynthesizer};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::types::VoiceInfo;

/// プラットフォームエラー
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("Voice enumeration failed: {0}")]
    VoiceEnumeration(String),
}

impl PlatformError {
    /// 接頭辞を除いた原因メッセージ
    pub fn into_cause(self) -> String {
        match self {
            Self::NotAvailable(cause)
            | Self::Synthesis(cause)
            | Self::Recognition(cause)
            | Self::VoiceEnumeration(cause) => cause,
        }
    }
}

// ─── Synthesis ───────────────────────────────────────────────────

/// 合成リクエスト（設定のスナップショットから生成）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    /// 例: "fr-FR"
    pub locale: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// None ならプラットフォーム既定のボイス
    pub voice: Option<VoiceInfo>,
}

/// 音声合成器
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// 利用可能なボイス一覧
    async fn voices(&self) -> Result<Vec<VoiceInfo>, PlatformError>;

    /// 発話が完了するまで待機する
    async fn speak(&self, request: SynthesisRequest) -> Result<(), PlatformError>;

    fn name(&self) -> &str;
}

// ─── Recognition ─────────────────────────────────────────────────

/// 認識開始オプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognitionOptions {
    /// 連続認識 + 部分結果あり
    pub fn streaming(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            continuous: true,
            interim_results: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionAlternative {
    pub transcript: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub is_final: bool,
    pub alternatives: Vec<RecognitionAlternative>,
}

impl RecognitionResult {
    pub fn new(transcript: impl Into<String>, is_final: bool) -> Self {
        Self {
            is_final,
            alternatives: vec![RecognitionAlternative {
                transcript: transcript.into(),
                confidence: 1.0,
            }],
        }
    }
}

/// プラットフォームからの結果通知。`result_index` 以降が今回の更新分。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResultEvent {
    pub result_index: usize,
    pub results: Vec<RecognitionResult>,
}

impl RecognitionResultEvent {
    /// 更新分の第一候補を連結し (確定, 暫定) に分ける
    pub fn split_transcripts(&self) -> (String, String) {
        let mut final_text = String::new();
        let mut interim_text = String::new();
        for result in self.results.iter().skip(self.result_index) {
            let Some(best) = result.alternatives.first() else {
                continue;
            };
            if result.is_final {
                final_text.push_str(&best.transcript);
            } else {
                interim_text.push_str(&best.transcript);
            }
        }
        (final_text, interim_text)
    }
}

/// 認識セッションのイベント受け口。プラットフォームが任意のスレッドから呼ぶ。
pub trait RecognitionHandler: Send + Sync {
    fn on_result(&self, event: RecognitionResultEvent);
    fn on_error(&self, cause: String);
    /// セッション終了（stop 後、またはプラットフォーム側の終了）
    fn on_end(&self);
}

/// 音声認識器
pub trait SpeechRecognizer: Send + Sync {
    /// セッションを開始する。イベントは `handler` に届く。
    fn start(
        &self,
        options: RecognitionOptions,
        handler: Arc<dyn RecognitionHandler>,
    ) -> Result<(), PlatformError>;

    /// 停止要求（ベストエフォート、完了を待たない）
    fn stop(&self);

    fn name(&self) -> &str;
}

// ─── SpeechPlatform ──────────────────────────────────────────────

/// 注入される機能プロバイダ。None の機能は「利用不可」。
#[derive(Clone, Default)]
pub struct SpeechPlatform {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
}

impl SpeechPlatform {
    /// 何も利用できない環境
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Noop 合成器 + Noop 認識器（ヘッドレス環境・デモ用）
    pub fn noop() -> Self {
        Self::unavailable()
            .with_synthesizer(Arc::new(NoopSynthesizer::default()))
            .with_recognizer(Arc::new(NoopRecognizer::default()))
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn synthesizer(&self) -> Option<&Arc<dyn SpeechSynthesizer>> {
        self.synthesizer.as_ref()
    }

    pub fn recognizer(&self) -> Option<&Arc<dyn SpeechRecognizer>> {
        self.recognizer.as_ref()
    }
}

impl std::fmt::Debug for SpeechPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechPlatform")
            .field("synthesizer", &self.synthesizer.as_ref().map(|s| s.name().to_string()))
            .field("recognizer", &self.recognizer.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

/// ホストで利用可能なバックエンドを検出する（macOS: say コマンド）
pub fn create_speech_platform() -> SpeechPlatform {
    #[allow(unused_mut)]
    let mut platform = SpeechPlatform::unavailable();

    #[cfg(target_os = "macos")]
    {
        if say::SaySynthesizer::is_available() {
            log::info!("say synthesizer selected");
            platform = platform.with_synthesizer(Arc::new(say::SaySynthesizer::new()));
        } else {
            log::warn!("say コマンドが見つかりません。音声合成は無効です");
        }
    }

    if platform.recognizer().is_none() {
        log::info!("No native speech recognizer on this host");
    }

    platform
}
