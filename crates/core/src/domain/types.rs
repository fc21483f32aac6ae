use serde::{Deserialize, Serialize};

/// 対応言語 (学習対象)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Fr,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Fr, Language::En];

    /// ISO 639-1 code, also the prefix used to match voice locales.
    pub fn code(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
        }
    }

    /// Locale handed to synthesis and recognition.
    pub fn locale(self) -> &'static str {
        match self {
            Self::Fr => "fr-FR",
            Self::En => "en-US",
        }
    }

    /// FR <-> EN
    pub fn toggled(self) -> Self {
        match self {
            Self::Fr => Self::En,
            Self::En => Self::Fr,
        }
    }

    /// `fr-FR`, `fr_CA` and `FR` all match French.
    pub fn matches_locale(self, locale: &str) -> bool {
        locale
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(self.code()))
    }
}

/// 音声の性別 (ボイス選択時のソフトな優先条件)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// プラットフォームが提供する合成ボイス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub locale: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: locale.into(),
        }
    }
}

// ─── Transcription / Feedback ────────────────────────────────────

/// 文字起こしイベント。interim は次のイベントで上書きされる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionEvent {
    pub text: String,
    pub is_final: bool,
}

/// 発音フィードバック中の単語単位の指摘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub word: String,
    pub suggestion: String,
    /// 空白区切りトークン列でのインデックス
    pub position: usize,
}

/// 確定した文字起こし1件に対するフィードバック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReport {
    pub text: String,
    pub language: Language,
    /// 0.0–100.0
    pub accuracy: f64,
    pub corrections: Vec<Correction>,
}

// ─── Capabilities ────────────────────────────────────────────────

/// 構築時に一度だけ算出される機能スナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub synthesis_available: bool,
    pub recognition_available: bool,
    pub supported_languages: Vec<Language>,
}
