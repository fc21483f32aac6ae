//! 音声マネージャーの結合テスト。
//!
//! 実プラットフォームの代わりにフェイクの合成器・認識器を注入して、
//! speak / listen の一連の流れを検証する。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use speech_core::domain::error::{ErrorCode, SpeechError};
use speech_core::domain::feedback::CorrectionRules;
use speech_core::domain::session::EndReason;
use speech_core::domain::settings::PartialSpeechConfig;
use speech_core::domain::types::{
    Correction, FeedbackReport, Gender, Language, TranscriptionEvent, VoiceInfo,
};
use speech_core::infra::platform::{
    PlatformError, RecognitionHandler, RecognitionOptions, RecognitionResult,
    RecognitionResultEvent, SpeechPlatform, SpeechRecognizer, SpeechSynthesizer,
    SynthesisRequest,
};
use speech_core::usecase::events::SpeechEvent;
use speech_core::usecase::BilingualSpeechManager;

// ── フェイク合成器 ──────────────────────────────────────────────

#[derive(Default)]
struct FakeSynthesizer {
    voices: Vec<VoiceInfo>,
    voices_error: bool,
    /// 最初の voices() 呼び出しだけを遅らせる
    first_voices_delay: Option<Duration>,
    voice_lookups: AtomicUsize,
    fail_with: Option<String>,
    delay: Option<Duration>,
    /// Some の場合、notify されるまで発話が終わらない
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<SynthesisRequest>>,
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, PlatformError> {
        let call = self.voice_lookups.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(delay)) = (call, self.first_voices_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.voices_error {
            return Err(PlatformError::VoiceEnumeration("voices not loaded".into()));
        }
        Ok(self.voices.clone())
    }

    async fn speak(&self, request: SynthesisRequest) -> Result<(), PlatformError> {
        let text = request.text.clone();
        self.requests.lock().push(request);
        self.log.lock().push(format!("start:{text}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.log.lock().push(format!("end:{text}"));
        match &self.fail_with {
            Some(cause) => Err(PlatformError::Synthesis(cause.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn french_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo::new("Amelie-female", "fr-FR"),
        VoiceInfo::new("Marc-male", "fr-FR"),
    ]
}

// ── フェイク認識器 ──────────────────────────────────────────────

#[derive(Default)]
struct FakeRecognizer {
    handler: Mutex<Option<Arc<dyn RecognitionHandler>>>,
    starts: Mutex<Vec<RecognitionOptions>>,
    stops: AtomicUsize,
}

impl FakeRecognizer {
    fn handler(&self) -> Arc<dyn RecognitionHandler> {
        self.handler.lock().clone().expect("recognition was never started")
    }

    fn emit(&self, results: Vec<RecognitionResult>) {
        self.handler().on_result(RecognitionResultEvent {
            result_index: 0,
            results,
        });
    }

    fn emit_interim(&self, text: &str) {
        self.emit(vec![RecognitionResult::new(text, false)]);
    }

    fn emit_final(&self, text: &str) {
        self.emit(vec![RecognitionResult::new(text, true)]);
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn start(
        &self,
        options: RecognitionOptions,
        handler: Arc<dyn RecognitionHandler>,
    ) -> Result<(), PlatformError> {
        self.starts.lock().push(options);
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ── ヘルパー ────────────────────────────────────────────────────

fn speaking_manager(synth: Arc<FakeSynthesizer>) -> BilingualSpeechManager {
    BilingualSpeechManager::new(
        SpeechPlatform::unavailable().with_synthesizer(synth),
        PartialSpeechConfig::default(),
    )
}

struct Listening {
    manager: BilingualSpeechManager,
    recognizer: Arc<FakeRecognizer>,
    transcripts: Arc<Mutex<Vec<TranscriptionEvent>>>,
    feedback: Arc<Mutex<Vec<FeedbackReport>>>,
}

fn listening_manager(config: PartialSpeechConfig) -> Listening {
    let recognizer = Arc::new(FakeRecognizer::default());
    let manager = BilingualSpeechManager::new(
        SpeechPlatform::unavailable().with_recognizer(recognizer.clone()),
        config,
    );

    let transcripts = Arc::new(Mutex::new(Vec::new()));
    let feedback = Arc::new(Mutex::new(Vec::new()));
    let sink = transcripts.clone();
    manager.set_transcription_callback(move |e| sink.lock().push(e));
    let sink = feedback.clone();
    manager.set_feedback_callback(move |r| sink.lock().push(r));

    Listening {
        manager,
        recognizer,
        transcripts,
        feedback,
    }
}

fn drain(sub: &mut speech_core::usecase::events::Subscription) -> Vec<SpeechEvent> {
    let mut events = Vec::new();
    while let Some(ev) = sub.try_recv() {
        events.push(ev);
    }
    events
}

// ── Synthesis ───────────────────────────────────────────────────

#[tokio::test]
async fn speak_after_language_change_uses_english_locale() {
    let synth = Arc::new(FakeSynthesizer {
        voices: french_voices(),
        ..Default::default()
    });
    let m = speaking_manager(synth.clone());

    m.update_language(Language::En);
    m.speak("Hello", None).await.unwrap();

    let requests = synth.requests.lock();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.text, "Hello");
    assert_eq!(req.locale, "en-US");
    assert_eq!(req.rate, 0.9);
    assert_eq!(req.pitch, 1.0);
    assert_eq!(req.volume, 0.8);
    // en-* のボイスがないのでプラットフォーム既定
    assert!(req.voice.is_none());
}

#[tokio::test]
async fn speak_without_synthesis_fails() {
    let m = BilingualSpeechManager::new(SpeechPlatform::unavailable(), PartialSpeechConfig::default());
    m.update_language(Language::En);
    assert_eq!(m.speak("Hello", None).await, Err(SpeechError::SynthesisUnavailable));
}

#[tokio::test]
async fn voice_selection_follows_gender() {
    let synth = Arc::new(FakeSynthesizer {
        voices: french_voices(),
        ..Default::default()
    });
    let m = speaking_manager(synth.clone());

    m.speak("Bonjour", None).await.unwrap();
    m.update_gender(Gender::Male);
    m.speak("Bonjour", None).await.unwrap();

    let requests = synth.requests.lock();
    assert_eq!(requests[0].voice.as_ref().unwrap().name, "Amelie-female");
    assert_eq!(requests[1].voice.as_ref().unwrap().name, "Marc-male");
    assert_eq!(requests[1].locale, "fr-FR");
}

#[tokio::test]
async fn explicit_language_is_not_persisted() {
    let synth = Arc::new(FakeSynthesizer::default());
    let m = speaking_manager(synth.clone());

    m.speak("Good morning", Some(Language::En)).await.unwrap();
    assert_eq!(synth.requests.lock()[0].locale, "en-US");
    assert_eq!(m.config().language, Language::Fr);
}

#[tokio::test]
async fn synthesis_failure_is_reported() {
    let synth = Arc::new(FakeSynthesizer {
        fail_with: Some("audio-busy".into()),
        ..Default::default()
    });
    let m = speaking_manager(synth);

    let err = m.speak("Bonjour", None).await.unwrap_err();
    assert_eq!(err, SpeechError::Synthesis("audio-busy".into()));
    assert_eq!(err.to_string(), "Speech synthesis failed: audio-busy");
    let metrics = m.metrics();
    assert_eq!(metrics.utterances_failed, 1);
    assert_eq!(metrics.utterances_completed, 0);
    assert!(!m.get_is_speaking());
}

#[tokio::test]
async fn voice_enumeration_failure_falls_back_to_default_voice() {
    let synth = Arc::new(FakeSynthesizer {
        voices_error: true,
        ..Default::default()
    });
    let m = speaking_manager(synth.clone());

    m.speak("Bonjour", None).await.unwrap();
    assert!(synth.requests.lock()[0].voice.is_none());
}

#[tokio::test(start_paused = true)]
async fn overlapping_speak_calls_play_in_order() {
    let synth = Arc::new(FakeSynthesizer {
        delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let m = speaking_manager(synth.clone());

    let (a, b) = tokio::join!(m.speak("un", None), m.speak("deux", None));
    assert!(a.is_ok() && b.is_ok());

    assert_eq!(
        *synth.log.lock(),
        vec!["start:un", "end:un", "start:deux", "end:deux"]
    );
    assert_eq!(m.metrics().utterances_completed, 2);
}

#[tokio::test(start_paused = true)]
async fn speak_order_is_kept_when_first_voice_lookup_is_slow() {
    let synth = Arc::new(FakeSynthesizer {
        voices: french_voices(),
        first_voices_delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let m = speaking_manager(synth.clone());

    let (a, b) = tokio::join!(m.speak("un", None), m.speak("deux", None));
    assert!(a.is_ok() && b.is_ok());

    let spoken: Vec<String> = synth.requests.lock().iter().map(|r| r.text.clone()).collect();
    assert_eq!(spoken, vec!["un", "deux"]);
    assert_eq!(
        *synth.log.lock(),
        vec!["start:un", "end:un", "start:deux", "end:deux"]
    );
}

#[tokio::test]
async fn config_change_does_not_affect_inflight_speak() {
    let gate = Arc::new(Notify::new());
    let synth = Arc::new(FakeSynthesizer {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let m = Arc::new(speaking_manager(synth.clone()));

    let task = tokio::spawn({
        let m = m.clone();
        async move { m.speak("Bonjour", None).await }
    });

    // 発話開始まで待つ
    while synth.requests.lock().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(m.get_is_speaking());

    m.update_rate(2.0);
    m.update_language(Language::En);
    gate.notify_one();
    task.await.unwrap().unwrap();

    let requests = synth.requests.lock();
    let req = &requests[0];
    assert_eq!(req.rate, 0.9);
    assert_eq!(req.locale, "fr-FR");
    assert!(!m.get_is_speaking());
    assert_eq!(m.config().rate, 2.0);
}

// ── Recognition ─────────────────────────────────────────────────

#[test]
fn start_listening_configures_streaming_session() {
    let l = listening_manager(PartialSpeechConfig::default());

    assert!(l.manager.start_listening());
    assert!(l.manager.get_is_listening());
    assert_eq!(
        l.recognizer.starts.lock()[0],
        RecognitionOptions {
            locale: "fr-FR".into(),
            continuous: true,
            interim_results: true,
        }
    );

    // 2回目は false、状態も変わらない
    assert!(!l.manager.start_listening());
    assert!(l.manager.get_is_listening());
    assert_eq!(l.recognizer.starts.lock().len(), 1);
}

#[test]
fn stop_while_idle_is_noop() {
    let l = listening_manager(PartialSpeechConfig::default());
    let mut sub = l.manager.subscribe();

    l.manager.stop_listening();

    assert!(!l.manager.get_is_listening());
    assert_eq!(l.recognizer.stops.load(Ordering::SeqCst), 0);
    assert!(l.transcripts.lock().is_empty());
    assert!(drain(&mut sub).is_empty());
}

#[test]
fn interim_then_final_produces_feedback() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());

    l.recognizer.emit_interim("a bon");
    l.recognizer.emit_interim("a bonjour le");
    l.recognizer.emit_final(" a bonjour le monde ");

    let transcripts = l.transcripts.lock();
    assert_eq!(
        *transcripts,
        vec![
            TranscriptionEvent { text: "a bon".into(), is_final: false },
            TranscriptionEvent { text: "a bonjour le".into(), is_final: false },
            TranscriptionEvent { text: "a bonjour le monde".into(), is_final: true },
        ]
    );

    let feedback = l.feedback.lock();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].text, "a bonjour le monde");
    assert_eq!(feedback[0].language, Language::Fr);
    assert_eq!(feedback[0].accuracy, 50.0);
    assert!(feedback[0].corrections.is_empty());
}

#[test]
fn french_bonjour_correction() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());

    l.recognizer.emit_final("Bonjour");

    let feedback = l.feedback.lock();
    assert_eq!(
        feedback[0].corrections,
        vec![Correction {
            word: "Bonjour".into(),
            suggestion: "bonjour".into(),
            position: 0,
        }]
    );
    assert_eq!(feedback[0].accuracy, 100.0);
}

#[test]
fn custom_correction_rules_are_used() {
    let recognizer = Arc::new(FakeRecognizer::default());
    let mut rules = CorrectionRules::new();
    rules.insert(Language::En, "Paris");
    let m = BilingualSpeechManager::with_correction_rules(
        SpeechPlatform::unavailable().with_recognizer(recognizer.clone()),
        PartialSpeechConfig::default().language(Language::En),
        rules,
    );
    let mut sub = m.subscribe();

    assert!(m.start_listening());
    assert_eq!(recognizer.starts.lock()[0].locale, "en-US");
    recognizer.emit_final("I love paris");

    let report = drain(&mut sub)
        .into_iter()
        .find_map(|e| match e {
            SpeechEvent::Feedback(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(report.corrections[0].position, 2);
    assert_eq!(report.corrections[0].suggestion, "Paris");
}

#[test]
fn final_part_wins_over_interim_in_same_notification() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());

    l.recognizer.emit(vec![
        RecognitionResult::new("bonjour ", true),
        RecognitionResult::new("le mo", false),
    ]);

    let transcripts = l.transcripts.lock();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0].text, "bonjour");
    assert!(transcripts[0].is_final);
}

#[test]
fn only_results_from_result_index_are_forwarded() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());

    l.recognizer.handler().on_result(RecognitionResultEvent {
        result_index: 1,
        results: vec![
            RecognitionResult::new("déjà vu", true),
            RecognitionResult::new("merci", true),
        ],
    });

    assert_eq!(l.transcripts.lock()[0].text, "merci");
    assert_eq!(l.feedback.lock()[0].text, "merci");
}

#[test]
fn recognition_error_returns_to_idle_without_callbacks() {
    let l = listening_manager(PartialSpeechConfig::default());
    let mut sub = l.manager.subscribe();
    assert!(l.manager.start_listening());

    l.recognizer.handler().on_error("network".into());

    assert!(!l.manager.get_is_listening());
    assert!(l.transcripts.lock().is_empty());
    assert!(l.feedback.lock().is_empty());

    let events = drain(&mut sub);
    assert_eq!(events.len(), 2);
    match &events[0] {
        SpeechEvent::RecognitionFailed(payload) => {
            assert_eq!(payload.code, ErrorCode::Recognition);
            assert_eq!(payload.message, "Speech recognition failed: network");
            assert!(payload.recoverable);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events[1], SpeechEvent::SessionEnded(EndReason::Error)));

    // 自動再開はしないが、再開は可能
    assert_eq!(l.recognizer.starts.lock().len(), 1);
    assert!(l.manager.start_listening());
    assert_eq!(l.manager.metrics().recognition_errors, 1);
}

#[test]
fn platform_end_returns_to_idle_silently() {
    let l = listening_manager(PartialSpeechConfig::default());
    let mut sub = l.manager.subscribe();
    assert!(l.manager.start_listening());

    l.recognizer.handler().on_end();

    assert!(!l.manager.get_is_listening());
    assert!(l.transcripts.lock().is_empty());
    assert!(l.feedback.lock().is_empty());
    let events = drain(&mut sub);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SpeechEvent::SessionEnded(EndReason::PlatformEnd)));
}

#[test]
fn stop_listening_ends_session_once() {
    let l = listening_manager(PartialSpeechConfig::default());
    let mut sub = l.manager.subscribe();
    assert!(l.manager.start_listening());

    l.manager.stop_listening();
    assert!(!l.manager.get_is_listening());
    assert_eq!(l.recognizer.stops.load(Ordering::SeqCst), 1);

    // プラットフォームからの遅れた終了通知は重複しない
    l.recognizer.handler().on_end();
    l.manager.stop_listening();

    let events = drain(&mut sub);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SpeechEvent::SessionEnded(EndReason::Stopped)));
    let metrics = l.manager.metrics();
    assert_eq!(metrics.sessions_stopped, 1);
    assert_eq!(metrics.sessions_ended_by_platform, 0);
}

#[test]
fn late_final_result_after_stop_is_forwarded() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());
    l.recognizer.emit_interim("merci beau");
    l.manager.stop_listening();

    l.recognizer.emit_final("merci beaucoup");

    assert_eq!(l.transcripts.lock().len(), 2);
    assert_eq!(l.feedback.lock().len(), 1);
}

#[test]
fn events_from_previous_session_are_ignored() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());
    let old_handler = l.recognizer.handler();
    l.manager.stop_listening();

    assert!(l.manager.start_listening());
    old_handler.on_result(RecognitionResultEvent {
        result_index: 0,
        results: vec![RecognitionResult::new("ancien", true)],
    });
    old_handler.on_end();

    assert!(l.transcripts.lock().is_empty());
    assert!(l.manager.get_is_listening());
}

#[test]
fn language_change_applies_to_next_session() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.start_listening());

    l.manager.update_language(Language::En);
    assert!(l.manager.get_is_listening());
    assert_eq!(l.recognizer.starts.lock().len(), 1);
    assert_eq!(l.manager.active_session().unwrap().language, Language::Fr);

    l.manager.stop_listening();
    assert!(l.manager.active_session().is_none());
    assert!(l.manager.start_listening());
    assert_eq!(l.recognizer.starts.lock()[1].locale, "en-US");
    assert_eq!(l.manager.active_session().unwrap().language, Language::En);
}

#[test]
fn active_session_reports_start_time() {
    let l = listening_manager(PartialSpeechConfig::default());
    assert!(l.manager.active_session().is_none());

    let before = chrono::Utc::now();
    assert!(l.manager.start_listening());
    let session = l.manager.active_session().unwrap();
    let started_at = chrono::DateTime::parse_from_rfc3339(&session.started_at).unwrap();
    assert!(started_at >= before);
}

#[test]
fn dropping_manager_stops_live_session() {
    let l = listening_manager(PartialSpeechConfig::default());
    let recognizer = l.recognizer.clone();
    assert!(l.manager.start_listening());

    drop(l);
    assert_eq!(recognizer.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_idle_manager_does_not_stop_recognizer() {
    let l = listening_manager(PartialSpeechConfig::default());
    let recognizer = l.recognizer.clone();

    drop(l);
    assert_eq!(recognizer.stops.load(Ordering::SeqCst), 0);
}

#[test]
fn construct_from_json_config() {
    let partial =
        PartialSpeechConfig::from_json(r#"{"language":"en","gender":"male","rate":5.0}"#).unwrap();
    let m = BilingualSpeechManager::new(SpeechPlatform::noop(), partial);
    let c = m.config();
    assert_eq!(c.language, Language::En);
    assert_eq!(c.gender, Gender::Male);
    assert_eq!(c.rate, 2.0);
    assert_eq!(c.volume, 0.8);
}

#[test]
fn noop_platform_round_trip() {
    let m = BilingualSpeechManager::new(SpeechPlatform::noop(), PartialSpeechConfig::default());
    let mut sub = m.subscribe();
    assert!(m.start_listening());
    m.stop_listening();
    assert!(!m.get_is_listening());
    assert_eq!(drain(&mut sub).len(), 1);
}
