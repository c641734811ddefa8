//! Creator-defined word filter for donor names and messages

/// Replace every occurrence of a filtered word with asterisks.
///
/// Matching is ASCII case-insensitive and also hits words embedded in
/// longer ones. Each masked character becomes one `*`.
pub fn mask_filtered(text: &str, words: &[String]) -> String {
    words
        .iter()
        .filter(|w| !w.is_empty())
        .fold(text.to_string(), |masked, word| mask_word(&masked, word))
}

fn mask_word(text: &str, word: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        match rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => {
                masked.extend(std::iter::repeat('*').take(word.chars().count()));
                rest = &rest[word.len()..];
            }
            _ => {
                masked.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_masks_case_insensitively() {
        let masked = mask_filtered("Dasar BODOH kamu bodoh", &words(&["bodoh"]));
        assert_eq!(masked, "Dasar ***** kamu *****");
    }

    #[test]
    fn test_multiple_words_and_unicode() {
        let masked = mask_filtered("halo 👋 jelek, anjing!", &words(&["jelek", "anjing"]));
        assert_eq!(masked, "halo 👋 *****, ******!");
    }

    #[test]
    fn test_no_words_is_identity() {
        assert_eq!(mask_filtered("semangat", &[]), "semangat");
        assert_eq!(mask_filtered("semangat", &words(&[""])), "semangat");
    }
}
