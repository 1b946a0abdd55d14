//! Text normalisation for plates, search and sort keys

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical plate: trimmed, inner whitespace collapsed, uppercase
///
/// ```
/// use insp_historial::normalize::normalize_plate;
///
/// assert_eq!(normalize_plate(" pbx-1234 "), "PBX-1234");
/// assert_eq!(normalize_plate("gba  0012"), "GBA 0012");
/// ```
pub fn normalize_plate(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Diacritic- and case-insensitive form used for matching
///
/// NFD decomposition, combining marks dropped, lowercase, whitespace
/// collapsed.
///
/// ```
/// use insp_historial::normalize::fold_text;
///
/// assert_eq!(fold_text("Camión ÑANDÚ"), "camion nandu");
/// ```
pub fn fold_text(raw: &str) -> String {
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `needle` occurs in `haystack` after folding both; an empty needle matches
pub fn folded_contains(haystack: &str, needle: &str) -> bool {
    let needle = fold_text(needle);
    needle.is_empty() || fold_text(haystack).contains(&needle)
}
