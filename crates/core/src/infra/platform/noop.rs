use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    PlatformError, RecognitionHandler, RecognitionOptions, SpeechRecognizer, SpeechSynthesizer,
    SynthesisRequest,
};
use crate::domain::types::VoiceInfo;

/// NoopSynthesizer: 音を出さずに即座に完了するモック実装。
#[derive(Debug, Default)]
pub struct NoopSynthesizer {
    voices: Vec<VoiceInfo>,
}

impl NoopSynthesizer {
    pub fn with_voices(voices: Vec<VoiceInfo>) -> Self {
        Self { voices }
    }
}

#[async_trait]
impl SpeechSynthesizer for NoopSynthesizer {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, PlatformError> {
        Ok(self.voices.clone())
    }

    async fn speak(&self, request: SynthesisRequest) -> Result<(), PlatformError> {
        log::debug!(
            "[noop] speak {:?} ({}, voice={:?})",
            request.text,
            request.locale,
            request.voice.as_ref().map(|v| v.name.as_str())
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// NoopRecognizer: 結果を一切出さない認識器。stop で on_end を通知する。
#[derive(Default)]
pub struct NoopRecognizer {
    handler: Mutex<Option<Arc<dyn RecognitionHandler>>>,
}

impl SpeechRecognizer for NoopRecognizer {
    fn start(
        &self,
        options: RecognitionOptions,
        handler: Arc<dyn RecognitionHandler>,
    ) -> Result<(), PlatformError> {
        log::debug!("[noop] recognition started ({})", options.locale);
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn stop(&self) {
        // ロック解放後に通知する（ハンドラからの再入に備える）
        let handler = self.handler.lock().take();
        if let Some(handler) = handler {
            handler.on_end();
        }
    }

    fn name(&self) -> &str {
        "noop"
    }
}
