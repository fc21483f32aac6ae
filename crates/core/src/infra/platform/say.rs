//! macOS の `say` コマンドを使った音声合成（macOS 専用）
//!
//! ボイス一覧は `say -v ?` の出力をパースする。
//! `say` はピッチ・音量を指定できないため、速度のみ反映する。

use async_trait::async_trait;
use tokio::process::Command;

use super::{PlatformError, SpeechSynthesizer, SynthesisRequest};
use crate::domain::types::VoiceInfo;

/// rate = 1.0 に相当する words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// `say` コマンド合成器
#[derive(Debug, Default)]
pub struct SaySynthesizer;

impl SaySynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// `say` が実行可能かチェック
    pub fn is_available() -> bool {
        std::process::Command::new("say")
            .args(["-v", "?"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SpeechSynthesizer for SaySynthesizer {
    async fn voices(&self) -> Result<Vec<VoiceInfo>, PlatformError> {
        let output = Command::new("say")
            .args(["-v", "?"])
            .output()
            .await
            .map_err(|e| PlatformError::VoiceEnumeration(e.to_string()))?;

        if !output.status.success() {
            return Err(PlatformError::VoiceEnumeration(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&self, request: SynthesisRequest) -> Result<(), PlatformError> {
        let wpm = (request.rate * BASE_WORDS_PER_MINUTE).round() as u32;

        let mut cmd = Command::new("say");
        if let Some(voice) = &request.voice {
            cmd.arg("-v").arg(&voice.name);
        }
        cmd.arg("-r").arg(wpm.to_string()).arg("--").arg(&request.text);

        let output = cmd
            .output()
            .await
            .map_err(|e| PlatformError::Synthesis(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PlatformError::Synthesis(format!(
                "say exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn name(&self) -> &str {
        "say"
    }
}

/// `Name   xx_YY    # sample` 形式の行をパースする
fn parse_voice_list(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || locale.is_empty() {
                return None;
            }
            Some(VoiceInfo::new(name, locale))
        })
        .collect()
}
