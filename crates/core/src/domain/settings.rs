use serde::{Deserialize, Serialize};

use super::types::{Gender, Language};

pub const RATE_MIN: f32 = 0.1;
pub const RATE_MAX: f32 = 2.0;
pub const PITCH_MIN: f32 = 0.0;
pub const PITCH_MAX: f32 = 2.0;
pub const VOLUME_MIN: f32 = 0.0;
pub const VOLUME_MAX: f32 = 1.0;

/// 音声設定（マネージャー単位で1つ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// 認識ロケールとボイスのロケール照合に使う
    pub language: Language,
    /// ボイス選択時の優先性別
    pub gender: Gender,
    /// 読み上げ速度 [0.1, 2.0]
    pub rate: f32,
    /// ピッチ [0.0, 2.0]
    pub pitch: f32,
    /// 音量 [0.0, 1.0]
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: Language::Fr,
            gender: Gender::Female,
            rate: 0.9,
            pitch: 1.0,
            volume: 0.8,
        }
    }
}

impl SpeechConfig {
    /// 部分設定をデフォルト値の上にマージする（数値はクランプ）
    pub fn from_partial(partial: PartialSpeechConfig) -> Self {
        let mut config = Self::default();
        config.apply(partial);
        config
    }

    pub fn apply(&mut self, partial: PartialSpeechConfig) {
        if let Some(language) = partial.language {
            self.language = language;
        }
        if let Some(gender) = partial.gender {
            self.gender = gender;
        }
        if let Some(rate) = partial.rate {
            self.rate = clamp_rate(rate);
        }
        if let Some(pitch) = partial.pitch {
            self.pitch = clamp_pitch(pitch);
        }
        if let Some(volume) = partial.volume {
            self.volume = clamp_volume(volume);
        }
    }
}

/// 構築時に渡す部分設定。未指定フィールドはデフォルト値になる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialSpeechConfig {
    pub language: Option<Language>,
    pub gender: Option<Gender>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

impl PartialSpeechConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }
}

pub fn clamp_rate(rate: f32) -> f32 {
    clamp_or_min(rate, RATE_MIN, RATE_MAX)
}

pub fn clamp_pitch(pitch: f32) -> f32 {
    clamp_or_min(pitch, PITCH_MIN, PITCH_MAX)
}

pub fn clamp_volume(volume: f32) -> f32 {
    clamp_or_min(volume, VOLUME_MIN, VOLUME_MAX)
}

// NaN は下限に丸める
fn clamp_or_min(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
