use serde::Serialize;
use uuid::Uuid;

use super::types::Language;

/// 認識セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
        }
    }
}

/// セッション終了の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// stop_listening() による停止
    Stopped,
    /// プラットフォーム側の終了（無音タイムアウト等）
    PlatformEnd,
    /// プラットフォームエラー
    Error,
}

/// 稼働中の認識セッション
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub session_id: Uuid,
    /// 開始時点の言語。途中で設定が変わっても変化しない。
    pub language: Language,
    pub started_at: String,
}

/// 状態遷移の記録
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub prev_state: SessionState,
    pub new_state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EndReason>,
}

/// 認識セッション管理（同時に高々1つ）
///
/// 各セッションは UUID を持ち、古いセッション宛てのプラットフォーム
/// イベントは `accepts` で弾かれる。
#[derive(Debug, Default)]
pub struct RecognitionSession {
    active: Option<ActiveSession>,
    /// 直近に開始したセッション。停止後に遅れて届く確定結果を受け付けるために保持する。
    latest: Option<Uuid>,
}

impl RecognitionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Listening
        } else {
            SessionState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Idle → Listening。既に Listening なら None。
    pub fn begin(&mut self, language: Language, now: String) -> Option<StateTransition> {
        if self.active.is_some() {
            return None;
        }
        let session_id = Uuid::new_v4();
        self.active = Some(ActiveSession {
            session_id,
            language,
            started_at: now,
        });
        self.latest = Some(session_id);
        Some(StateTransition {
            session_id,
            prev_state: SessionState::Idle,
            new_state: SessionState::Listening,
            reason: None,
        })
    }

    /// プラットフォームが開始に失敗した場合、begin を取り消す
    pub fn abort(&mut self, session_id: Uuid) {
        if self.active.as_ref().is_some_and(|s| s.session_id == session_id) {
            self.active = None;
        }
    }

    /// Listening → Idle。対象セッションが稼働中でなければ None。
    pub fn end(&mut self, session_id: Uuid, reason: EndReason) -> Option<StateTransition> {
        match &self.active {
            Some(s) if s.session_id == session_id => {
                self.active = None;
                Some(StateTransition {
                    session_id,
                    prev_state: SessionState::Listening,
                    new_state: SessionState::Idle,
                    reason: Some(reason),
                })
            }
            _ => None,
        }
    }

    /// 稼働中のセッションを停止する
    pub fn end_active(&mut self, reason: EndReason) -> Option<StateTransition> {
        let session_id = self.active.as_ref()?.session_id;
        self.end(session_id, reason)
    }

    /// 結果イベントを転送してよいか（最新セッションのもののみ）
    pub fn accepts(&self, session_id: Uuid) -> bool {
        self.latest == Some(session_id)
    }
}
