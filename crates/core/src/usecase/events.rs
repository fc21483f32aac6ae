use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::error::ErrorPayload;
use crate::domain::session::EndReason;
use crate::domain::types::{FeedbackReport, TranscriptionEvent};

/// 文字起こしコールバック（単一スロット、後勝ち）
pub type TranscriptionCallback = Arc<dyn Fn(TranscriptionEvent) + Send + Sync>;
/// フィードバックコールバック（単一スロット、後勝ち）
pub type FeedbackCallback = Arc<dyn Fn(FeedbackReport) + Send + Sync>;

/// 購読者に配信されるイベント
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    Transcription(TranscriptionEvent),
    Feedback(FeedbackReport),
    /// プラットフォームの認識エラー（セッションは Idle に戻る）
    RecognitionFailed(ErrorPayload),
    /// セッション終了。エラー時は RecognitionFailed の直後に届く。
    SessionEnded(EndReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// イベントストリームの購読ハンドル。drop すると購読解除される。
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<SpeechEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// 次のイベントを待つ。購読解除済みなら None。
    pub async fn recv(&mut self) -> Option<SpeechEvent> {
        self.rx.recv().await
    }

    /// 受信済みイベントを待たずに取り出す
    pub fn try_recv(&mut self) -> Option<SpeechEvent> {
        self.rx.try_recv().ok()
    }
}

/// コールバックと購読者リストへの配信
///
/// コールバックはロックを保持せずに呼び出すため、コールバック内から
/// マネージャーを操作してもデッドロックしない。
#[derive(Default)]
pub struct EventHub {
    transcription: Mutex<Option<TranscriptionCallback>>,
    feedback: Mutex<Option<FeedbackCallback>>,
    subscribers: Mutex<Vec<(SubscriptionId, mpsc::UnboundedSender<SpeechEvent>)>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transcription_callback(&self, callback: TranscriptionCallback) {
        *self.transcription.lock() = Some(callback);
    }

    pub fn set_feedback_callback(&self, callback: FeedbackCallback) {
        *self.feedback.lock() = Some(callback);
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push((id, tx));
        Subscription { id, rx }
    }

    /// 購読解除。存在しなければ false。
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn emit_transcription(&self, event: TranscriptionEvent) {
        let callback = self.transcription.lock().clone();
        if let Some(callback) = callback {
            callback(event.clone());
        }
        self.broadcast(SpeechEvent::Transcription(event));
    }

    pub fn emit_feedback(&self, report: FeedbackReport) {
        let callback = self.feedback.lock().clone();
        if let Some(callback) = callback {
            callback(report.clone());
        }
        self.broadcast(SpeechEvent::Feedback(report));
    }

    /// コールバックを持たないイベントは購読者にのみ届く
    pub fn broadcast(&self, event: SpeechEvent) {
        let mut subscribers = self.subscribers.lock();
        // 受信側が drop された購読者はここで掃除する
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }
}
