use std::collections::HashMap;

use super::types::{Correction, FeedbackReport, Language};

/// 「認識できた単語」とみなす最小文字数（これより長いトークン）
const RECOGNIZED_MIN_CHARS: usize = 2;

/// 訂正ルールテーブル: (言語, 小文字化トークン) → 正規形
///
/// トークンの小文字形がキーに一致し、かつトークン自体が正規形と異なる場合に指摘する。
#[derive(Debug, Clone, Default)]
pub struct CorrectionRules {
    rules: HashMap<(Language, String), String>,
}

impl CorrectionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// 組み込みのルールセット
    pub fn builtin() -> Self {
        let mut rules = Self::new();
        rules.insert(Language::Fr, "bonjour");
        rules
    }

    /// ルールを追加する。キーは正規形の小文字化。同じキーは上書き。
    pub fn insert(&mut self, language: Language, canonical: impl Into<String>) {
        let canonical = canonical.into();
        self.rules
            .insert((language, canonical.to_lowercase()), canonical);
    }

    pub fn extend<I, S>(&mut self, language: Language, canonicals: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for canonical in canonicals {
            self.insert(language, canonical);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// トークンに対する提案（正規形）。指摘不要なら None。
    pub fn suggest(&self, language: Language, token: &str) -> Option<&str> {
        let canonical = self.rules.get(&(language, token.to_lowercase()))?;
        (canonical != token).then_some(canonical.as_str())
    }
}

/// 発音フィードバック生成（純粋関数、I/O なし）
#[derive(Debug, Clone)]
pub struct FeedbackAnalyzer {
    rules: CorrectionRules,
}

impl Default for FeedbackAnalyzer {
    fn default() -> Self {
        Self::new(CorrectionRules::builtin())
    }
}

impl FeedbackAnalyzer {
    pub fn new(rules: CorrectionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CorrectionRules {
        &self.rules
    }

    pub fn analyze(&self, transcript: &str, language: Language) -> FeedbackReport {
        FeedbackReport {
            text: transcript.to_string(),
            language,
            accuracy: accuracy(transcript),
            corrections: self.corrections(transcript, language),
        }
    }

    pub fn corrections(&self, transcript: &str, language: Language) -> Vec<Correction> {
        transcript
            .split_whitespace()
            .enumerate()
            .filter_map(|(position, word)| {
                self.rules
                    .suggest(language, word)
                    .map(|suggestion| Correction {
                        word: word.to_string(),
                        suggestion: suggestion.to_string(),
                        position,
                    })
            })
            .collect()
    }
}

/// 簡易精度: 3文字以上のトークンの割合 (0–100)。空文字列は 0。
pub fn accuracy(transcript: &str) -> f64 {
    let mut total = 0usize;
    let mut recognized = 0usize;
    for token in transcript.split_whitespace() {
        total += 1;
        if token.chars().count() > RECOGNIZED_MIN_CHARS {
            recognized += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    (100.0 * recognized as f64 / total as f64).min(100.0)
}
