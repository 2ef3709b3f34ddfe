// Small string helpers shared by the verification and discovery code.

use std::sync::LazyLock;

use regex::Regex;

static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

/// Station name without provenance markers and with single spaces.
pub fn clean_station_name(name: &str) -> String {
    name.replace('*', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clean name with parenthetical text removed, for registry lookups:
/// `Radio X* (Rosario)` → `Radio X`.
pub fn registry_search_name(name: &str) -> String {
    let cleaned = clean_station_name(name);
    clean_station_name(&PARENTHETICAL_RE.replace_all(&cleaned, ""))
}

/// Truncate to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_name_drops_marker_and_spaces() {
        assert_eq!(clean_station_name("  Radio   Mitre* "), "Radio Mitre");
    }

    #[test]
    fn registry_name_drops_parenthetical() {
        assert_eq!(registry_search_name("Radio X* (Rosario)"), "Radio X");
        assert_eq!(registry_search_name("Cadena 3"), "Cadena 3");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("abc", 150), "abc");
        let long = "é".repeat(200);
        let cut = truncate_chars(&long, 150);
        assert_eq!(cut.chars().count(), 150);
        assert!(cut.ends_with("..."));
    }
}
