use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::error::{ErrorPayload, SpeechError};
use crate::domain::feedback::{CorrectionRules, FeedbackAnalyzer};
use crate::domain::session::{ActiveSession, EndReason, RecognitionSession};
use crate::domain::settings::{
    clamp_pitch, clamp_rate, clamp_volume, PartialSpeechConfig, SpeechConfig,
};
use crate::domain::types::{Capabilities, FeedbackReport, Gender, Language, TranscriptionEvent};
use crate::domain::voice::select_voice;
use crate::infra::metrics::{MetricsSummary, SpeechMetrics};
use crate::infra::platform::{
    RecognitionHandler, RecognitionOptions, RecognitionResultEvent, SpeechPlatform,
    SpeechRecognizer, SpeechSynthesizer, SynthesisRequest,
};
use crate::usecase::events::{EventHub, SpeechEvent, Subscription, SubscriptionId};

/// 認識ハンドラとマネージャーで共有する状態
struct Shared {
    config: Mutex<SpeechConfig>,
    session: Mutex<RecognitionSession>,
    events: EventHub,
    analyzer: FeedbackAnalyzer,
    metrics: SpeechMetrics,
}

/// バイリンガル (FR/EN) 音声マネージャー
///
/// 合成・認識のライフサイクル、言語/性別によるボイス選択、
/// 文字起こしのストリーミング通知、発音フィードバック生成を担う。
/// アバター（会話コンテキスト）ごとに1インスタンスを作成する。
pub struct BilingualSpeechManager {
    shared: Arc<Shared>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    capabilities: Capabilities,
    /// 重複した speak 呼び出しを FIFO で直列化する（tokio の Mutex は公平）
    speak_queue: tokio::sync::Mutex<()>,
    speaking: AtomicUsize,
}

impl BilingualSpeechManager {
    pub fn new(platform: SpeechPlatform, config: PartialSpeechConfig) -> Self {
        Self::with_correction_rules(platform, config, CorrectionRules::builtin())
    }

    pub fn with_correction_rules(
        platform: SpeechPlatform,
        config: PartialSpeechConfig,
        rules: CorrectionRules,
    ) -> Self {
        let synthesizer = platform.synthesizer().cloned();
        let recognizer = platform.recognizer().cloned();
        let capabilities = Capabilities {
            synthesis_available: synthesizer.is_some(),
            recognition_available: recognizer.is_some(),
            supported_languages: Language::ALL.to_vec(),
        };

        log::info!(
            "Speech manager ready: synthesis={} recognition={}",
            synthesizer.as_ref().map_or("unavailable", |s| s.name()),
            recognizer.as_ref().map_or("unavailable", |r| r.name()),
        );

        Self {
            shared: Arc::new(Shared {
                config: Mutex::new(SpeechConfig::from_partial(config)),
                session: Mutex::new(RecognitionSession::new()),
                events: EventHub::new(),
                analyzer: FeedbackAnalyzer::new(rules),
                metrics: SpeechMetrics::new(),
            }),
            synthesizer,
            recognizer,
            capabilities,
            speak_queue: tokio::sync::Mutex::new(()),
            speaking: AtomicUsize::new(0),
        }
    }

    // ==================== Configuration ====================

    /// 言語を変更する。稼働中のセッションには反映されず、次回の start_listening から有効。
    pub fn update_language(&self, language: Language) {
        self.shared.config.lock().language = language;
        let listening = self.shared.session.lock().is_listening();
        if listening {
            log::debug!(
                "Language set to {} while listening; applies to the next session",
                language.locale()
            );
        }
    }

    pub fn update_gender(&self, gender: Gender) {
        self.shared.config.lock().gender = gender;
    }

    /// [0.1, 2.0] にクランプして保存
    pub fn update_rate(&self, rate: f32) {
        self.shared.config.lock().rate = clamp_rate(rate);
    }

    pub fn update_pitch(&self, pitch: f32) {
        self.shared.config.lock().pitch = clamp_pitch(pitch);
    }

    pub fn update_volume(&self, volume: f32) {
        self.shared.config.lock().volume = clamp_volume(volume);
    }

    /// 現在の設定のスナップショット
    pub fn config(&self) -> SpeechConfig {
        self.shared.config.lock().clone()
    }

    // ==================== Synthesis ====================

    /// テキストを読み上げ、発話完了まで待機する。
    ///
    /// `language` を指定した場合はこの呼び出しに限り設定言語を上書きする。
    /// 重複した呼び出しは呼び出し順に1つずつ再生される。
    pub async fn speak(&self, text: &str, language: Option<Language>) -> Result<(), SpeechError> {
        let synthesizer = self
            .synthesizer
            .clone()
            .ok_or(SpeechError::SynthesisUnavailable)?;

        if text.trim().is_empty() {
            return Err(SpeechError::InvalidArgument(
                "text to speak must not be empty".into(),
            ));
        }

        let config = self.config();
        let language = language.unwrap_or(config.language);
        let _speaking = SpeakingGuard::enter(&self.speaking);

        // 順番はボイス列挙より前に確保する
        let _turn = self.speak_queue.lock().await;

        let voices = match synthesizer.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                log::warn!("Voice enumeration failed, using platform default: {e}");
                Vec::new()
            }
        };
        let voice = select_voice(&voices, language, config.gender).cloned();

        let request = SynthesisRequest {
            text: text.to_string(),
            locale: language.locale().to_string(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
            voice,
        };

        let metrics = &self.shared.metrics;
        metrics.inc_utterances_started();
        let start = Instant::now();

        match synthesizer.speak(request).await {
            Ok(()) => {
                metrics.inc_utterances_completed();
                metrics.record_speak_latency(start.elapsed().as_millis() as u64);
                Ok(())
            }
            Err(e) => {
                log::warn!("音声合成エラー: {e}");
                metrics.inc_utterances_failed();
                Err(SpeechError::Synthesis(e.into_cause()))
            }
        }
    }

    /// speak が未完了の間 true
    pub fn get_is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) > 0
    }

    // ==================== Recognition ====================

    /// 認識セッションを開始する。
    ///
    /// 認識機能がない、既にセッションが稼働中、またはプラットフォームが開始に
    /// 失敗した場合は false を返し、状態は変わらない。
    pub fn start_listening(&self) -> bool {
        let Some(recognizer) = &self.recognizer else {
            log::debug!("start_listening ignored: {}", SpeechError::RecognitionUnavailable);
            return false;
        };

        let language = self.shared.config.lock().language;
        let transition = self
            .shared
            .session
            .lock()
            .begin(language, chrono::Utc::now().to_rfc3339());
        let Some(transition) = transition else {
            return false;
        };

        let handler = Arc::new(SessionHandler {
            session_id: transition.session_id,
            shared: Arc::clone(&self.shared),
        });

        if let Err(e) = recognizer.start(RecognitionOptions::streaming(language.locale()), handler) {
            log::error!("音声認識の開始に失敗しました: {e}");
            self.shared.session.lock().abort(transition.session_id);
            return false;
        }

        self.shared.metrics.inc_sessions_started();
        log::info!(
            "Recognition session {} started ({})",
            transition.session_id,
            language.locale()
        );
        true
    }

    /// 稼働中のセッションを停止する。Idle なら何もしない。
    ///
    /// 状態は即座に Idle になる。プラットフォームの停止完了は待たない。
    pub fn stop_listening(&self) {
        let transition = self.shared.session.lock().end_active(EndReason::Stopped);
        let Some(transition) = transition else {
            return;
        };

        if let Some(recognizer) = &self.recognizer {
            recognizer.stop();
        }

        self.shared.metrics.record_session_end(EndReason::Stopped);
        log::info!("Recognition session {} stopped", transition.session_id);
        self.shared
            .events
            .broadcast(SpeechEvent::SessionEnded(EndReason::Stopped));
    }

    pub fn get_is_listening(&self) -> bool {
        self.shared.session.lock().is_listening()
    }

    /// 稼働中セッションの情報（開始時の言語・開始時刻）
    pub fn active_session(&self) -> Option<ActiveSession> {
        self.shared.session.lock().active().cloned()
    }

    // ==================== Subscriptions ====================

    /// 文字起こしコールバックを設定する（単一スロット、後から登録したものが有効）
    pub fn set_transcription_callback<F>(&self, callback: F)
    where
        F: Fn(TranscriptionEvent) + Send + Sync + 'static,
    {
        self.shared.events.set_transcription_callback(Arc::new(callback));
    }

    /// フィードバックコールバックを設定する（単一スロット、後から登録したものが有効）
    pub fn set_feedback_callback<F>(&self, callback: F)
    where
        F: Fn(FeedbackReport) + Send + Sync + 'static,
    {
        self.shared.events.set_feedback_callback(Arc::new(callback));
    }

    /// 全イベント（セッション終了・認識エラーを含む）を購読する
    pub fn subscribe(&self) -> Subscription {
        self.shared.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    // ==================== Introspection ====================

    /// 構築時の機能スナップショット
    pub fn get_capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.shared.metrics.summary()
    }
}

impl Drop for BilingualSpeechManager {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

/// 実行中の speak 数を数える。キャンセルされた future でも減算される。
struct SpeakingGuard<'a>(&'a AtomicUsize);

impl<'a> SpeakingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 1セッション分のプラットフォームイベント受け口
struct SessionHandler {
    session_id: Uuid,
    shared: Arc<Shared>,
}

impl SessionHandler {
    fn end(&self, reason: EndReason) -> bool {
        let transition = self.shared.session.lock().end(self.session_id, reason);
        if transition.is_none() {
            return false;
        }
        self.shared.metrics.record_session_end(reason);
        true
    }
}

impl RecognitionHandler for SessionHandler {
    fn on_result(&self, event: RecognitionResultEvent) {
        let accepted = self.shared.session.lock().accepts(self.session_id);
        if !accepted {
            log::debug!("Dropping result from stale session {}", self.session_id);
            return;
        }

        let (final_text, interim_text) = event.split_transcripts();
        let final_text = final_text.trim();
        let interim_text = interim_text.trim();

        if !final_text.is_empty() {
            self.shared.events.emit_transcription(TranscriptionEvent {
                text: final_text.to_string(),
                is_final: true,
            });

            // 通知と同じターンで同期的に算出する
            let language = self.shared.config.lock().language;
            let report = self.shared.analyzer.analyze(final_text, language);
            self.shared.metrics.record_final_transcript(report.accuracy);
            self.shared.events.emit_feedback(report);
        } else if !interim_text.is_empty() {
            self.shared.metrics.inc_interim_transcripts();
            self.shared.events.emit_transcription(TranscriptionEvent {
                text: interim_text.to_string(),
                is_final: false,
            });
        }
    }

    fn on_error(&self, cause: String) {
        log::error!("音声認識エラー (session {}): {cause}", self.session_id);
        if self.end(EndReason::Error) {
            let events = &self.shared.events;
            let error = SpeechError::Recognition(cause);
            events.broadcast(SpeechEvent::RecognitionFailed(ErrorPayload::from(&error)));
            events.broadcast(SpeechEvent::SessionEnded(EndReason::Error));
        }
    }

    fn on_end(&self) {
        if self.end(EndReason::PlatformEnd) {
            log::info!("Recognition session {} ended by platform", self.session_id);
            self.shared
                .events
                .broadcast(SpeechEvent::SessionEnded(EndReason::PlatformEnd));
        }
    }
}
