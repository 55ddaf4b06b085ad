use once_cell::sync::Lazy;
use regex::Regex;

static COLLAPSE_WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Normalize a series title for display: underscores become spaces, dot
/// separated names (`Some.Series.Name`) are spaced out, redundant whitespace
/// and dangling separators are removed. Hyphens inside words survive.
pub fn clean_series_title(title: &str) -> String {
    let mut spaced = title.replace('_', " ");
    if !spaced.contains(' ') && spaced.matches('.').count() >= 2 {
        spaced = spaced.replace('.', " ");
    }
    collapse_whitespace(&spaced)
        .trim_matches(|ch: char| {
            ch.is_whitespace() || matches!(ch, '-' | '.' | ',' | ':' | ';' | '~')
        })
        .to_string()
}

/// Grouping key: case, whitespace and punctuation insensitive.
pub fn normalize_series_name(title: &str) -> String {
    title
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Collapse repeated whitespace sequences into single spaces while trimming ends.
pub fn collapse_whitespace(value: &str) -> String {
    COLLAPSE_WHITESPACE_REGEX
        .replace_all(value.trim(), " ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_separators_but_keeps_inner_hyphens() {
        assert_eq!(clean_series_title("  Spider-Man  - "), "Spider-Man");
        assert_eq!(clean_series_title("Some_Series__Name"), "Some Series Name");
        assert_eq!(clean_series_title("Some.Series.Name"), "Some Series Name");
        assert_eq!(clean_series_title("Dr. Stone"), "Dr. Stone");
    }

    #[test]
    fn normalization_ignores_case_space_and_punctuation() {
        assert_eq!(normalize_series_name("Kaguya-sama: Love Is War"), "kaguyasamaloveiswar");
        assert_eq!(
            normalize_series_name("kaguya sama love is war"),
            normalize_series_name("Kaguya-Sama - Love is War!")
        );
        assert_eq!(normalize_series_name("Love is War!"), normalize_series_name("Love is War"));
        assert_eq!(normalize_series_name("Fate/Zero+"), "fatezero");
        assert_eq!(normalize_series_name("鬼滅の刃"), "鬼滅の刃");
    }
}
