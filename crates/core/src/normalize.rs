use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

/// Canonicalizes free-form button labels and chat text for matching.
///
/// Emoji (Unicode "Symbol, other") are dropped first so a label like
/// `"😊 Gostei muito!"` compares equal to `"gostei muito"`. Accents are
/// removed through NFKD decomposition, everything outside
/// `[a-z0-9 \-:@.]` is discarded, and internal whitespace is collapsed.
/// Total: empty input yields an empty string.
pub fn normalize(text: &str) -> String {
    let without_symbols: String = text
        .chars()
        .filter(|ch| !matches!(ch.general_category(), GeneralCategory::OtherSymbol))
        .collect();

    let folded: String = without_symbols
        .to_lowercase()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| matches!(ch, 'a'..='z' | '0'..='9' | ' ' | '\t' | '\n' | '-' | ':' | '@' | '.'))
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
