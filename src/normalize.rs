//! Name normalization for catalog lookups.
//!
//! Every artist/release/label lookup goes through `normalize`, which folds a
//! free-text name into two comparable forms: a display form used for
//! sort-name matching and a looser alphanumeric form used as a fallback key.

use unicode_segmentation::UnicodeSegmentation;

/// The two comparable forms produced from one raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    /// Lowercased, diacritic-folded, whitespace-collapsed form.
    pub display: String,
    /// Letters and digits only. The loosest matching key.
    pub alphanumeric: String,
}

impl SearchKey {
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}

/// Fold a raw name into its comparable forms.
///
/// Pure and infallible; empty input yields empty output.
pub fn normalize(raw: &str) -> SearchKey {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .collect::<String>();

    // unicode_words drops punctuation and collapses runs of whitespace.
    let display = folded.unicode_words().collect::<Vec<_>>().join(" ");

    let alphanumeric: String = display
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    SearchKey {
        display,
        alphanumeric,
    }
}

/// Derive a sort name from a display name ("The Kinks" -> "Kinks, The").
pub fn sort_name_for(name: &str) -> String {
    let trimmed = name.trim();
    for article in ["The ", "the ", "A ", "An "] {
        if let Some(rest) = trimmed.strip_prefix(article) {
            if !rest.is_empty() {
                return format!("{}, {}", rest, article.trim());
            }
        }
    }
    trimmed.to_string()
}

/// Map a single character onto its base Latin letter.
///
/// Covers the Latin-1 supplement and the extended-A letters that show up in
/// real tag data. Anything else passes through untouched.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' | 'ð' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        'æ' => 'a',
        'œ' => 'o',
        'ß' => 's',
        'þ' => 'p',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_key() {
        let key = normalize("");
        assert!(key.is_empty());
        assert_eq!(key.display, "");
        assert_eq!(key.alphanumeric, "");
    }

    #[test]
    fn test_case_and_whitespace_folding() {
        let key = normalize("  The   Beatles ");
        assert_eq!(key.display, "the beatles");
        assert_eq!(key.alphanumeric, "thebeatles");
    }

    #[test]
    fn test_diacritics_folded() {
        let key = normalize("Björk Guðmundsdóttir");
        assert_eq!(key.display, "bjork gudmundsdottir");
    }

    #[test]
    fn test_punctuation_stripped_in_alphanumeric() {
        let key = normalize("AC/DC");
        assert_eq!(key.alphanumeric, "acdc");
    }

    #[test]
    fn test_same_key_for_variant_spellings() {
        assert_eq!(
            normalize("Motörhead").alphanumeric,
            normalize("motorhead").alphanumeric
        );
    }

    #[test]
    fn test_sort_name_moves_leading_article() {
        assert_eq!(sort_name_for("The Kinks"), "Kinks, The");
        assert_eq!(sort_name_for("A Perfect Circle"), "Perfect Circle, A");
        assert_eq!(sort_name_for("Kraftwerk"), "Kraftwerk");
    }

    #[test]
    fn test_sort_name_bare_article_untouched() {
        assert_eq!(sort_name_for("The "), "The");
    }
}
