use super::types::{Gender, Language, VoiceInfo};

const FEMALE_TOKENS: &[&str] = &["female", "woman"];
const MALE_TOKENS: &[&str] = &["male", "man"];

/// ボイス名が指定の性別を示しているか（大文字小文字無視の部分一致）
///
/// "female" / "woman" は "male" / "man" を含むため、女性を示す名前は男性扱いしない。
pub fn signals_gender(name: &str, gender: Gender) -> bool {
    let lower = name.to_lowercase();
    let female = FEMALE_TOKENS.iter().any(|t| lower.contains(t));
    match gender {
        Gender::Female => female,
        Gender::Male => !female && MALE_TOKENS.iter().any(|t| lower.contains(t)),
    }
}

/// ボイス選択（決定的な2段階）
///
/// 1. ロケール一致かつ名前が性別を示す最初のボイス
/// 2. ロケール一致の最初のボイス
/// 3. 該当なしなら None（プラットフォーム既定）
pub fn select_voice(voices: &[VoiceInfo], language: Language, gender: Gender) -> Option<&VoiceInfo> {
    let mut by_locale = voices.iter().filter(|v| language.matches_locale(&v.locale));
    let fallback = by_locale.clone().next();
    by_locale
        .find(|v| signals_gender(&v.name, gender))
        .or(fallback)
}
