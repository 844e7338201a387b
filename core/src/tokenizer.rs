use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // ASCII letters/digits, or letters/digits of the Arabic block (Persian letters
    // and the extended Persian digits live there).
    static ref RE: Regex = Regex::new(r"(?:[a-z0-9]|[\x{0600}-\x{06FF}&&[\p{L}\p{N}]])+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "از","به","در","که","و","را","این","آن","برای","با","است","شد","می","ها","های","بر",
            "تا","یک","بود","نیز","کند","شود","کرده","شده","باید","گفت","دارد","وی","اما","اگر",
            "نیست","هستند","بی","تر","ترین","خود","دیگر","هم","چون","چه","پس","پیش","بین","سپس",
            "a","an","and","are","as","at","be","by","for","in","is","it","of","on","or","the","to","was","with",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Fold Arabic keyboard variants onto their Persian forms.
fn fold_persian(c: char) -> char {
    match c {
        '\u{064A}' => '\u{06CC}', // ي -> ی
        '\u{0643}' => '\u{06A9}', // ك -> ک
        other => other,
    }
}

/// Harakat, superscript alef and tatweel carry no lexical content.
fn is_ignorable(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}')
}

fn normalize(text: &str) -> String {
    text.nfkc()
        .filter(|c| !is_ignorable(*c))
        .map(fold_persian)
        .collect::<String>()
        .to_lowercase()
}

/// Tokenize text into (term, position) using NFKC normalization, lowercase and stopword removal.
///
/// Positions count every raw token, including dropped stopwords, so gaps survive.
pub fn tokenize_with_positions(text: &str) -> Vec<(String, usize)> {
    let normalized = normalize(text);
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&normalized).enumerate() {
        let token = mat.as_str();
        if is_stopword(token) { continue; }
        tokens.push((token.to_string(), pos));
    }
    tokens
}

/// Tokenize text into index terms.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_with_positions(text).into_iter().map(|(t, _)| t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Tehran, the capital!");
        assert_eq!(t, vec!["tehran".to_string(), "capital".to_string()]);
    }

    #[test]
    fn positions_keep_stopword_gaps() {
        let t = tokenize_with_positions("تهران شهر بزرگ است");
        assert_eq!(t, vec![("تهران".to_string(), 0), ("شهر".to_string(), 1), ("بزرگ".to_string(), 2)]);
    }

    #[test]
    fn arabic_variants_fold() {
        assert_eq!(tokenize("كتاب علي"), tokenize("کتاب علی"));
    }
}
