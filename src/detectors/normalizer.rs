//! Text normalization into comparison-robust signatures.
//!
//! The normalizer is a heuristic over C-family source text, not a parser:
//!
//! 1. block and line comments are removed,
//! 2. preprocessor directive lines (with backslash continuations) are removed,
//! 3. whitespace runs collapse to one space,
//! 4. called identifiers outside the built-in allow-list become `F`,
//! 5. bare identifiers outside the reserved-word list become `I`.
//!
//! Steps 4 and 5 run as a single token scan that emits the one-character
//! placeholders directly, so a placeholder is never rewritten by a later step
//! and `normalize` is idempotent.
//!
//! String literals containing code-like text and macro-generated identifiers
//! are normalized like any other text.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::core::config::NormalizerConfig;
use crate::core::file_utils::decode_lossy;

/// Placeholder emitted for user-defined function names
pub const FUNCTION_PLACEHOLDER: &str = "F";

/// Placeholder emitted for user-defined identifiers
pub const IDENTIFIER_PLACEHOLDER: &str = "I";

static COMMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*.*?(?:\*/|\z)|//[^\n]*").expect("comment pattern is valid")
});

static DIRECTIVES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[^\S\n]*#(?:[^\n]*\\\r?\n)*[^\n]*").expect("directive pattern is valid")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static IDENTIFIERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)( ?\()?").expect("identifier pattern is valid")
});

/// Canonical text of a file or of a whole submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Wrap already-normalized text
    pub fn from_normalized(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Signature text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the signature carries no tokens
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append another signature, separated by a single space
    pub fn append(&mut self, other: &Signature) {
        if other.is_empty() {
            return;
        }
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(&other.0);
    }

    /// Tokens of the signature: identifiers, numbers and single punctuation characters
    pub fn tokens(&self) -> Vec<&str> {
        let text = self.0.as_str();
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;

        for (idx, ch) in text.char_indices() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                start.get_or_insert(idx);
                continue;
            }
            if let Some(begin) = start.take() {
                tokens.push(&text[begin..idx]);
            }
            if !ch.is_whitespace() {
                tokens.push(&text[idx..idx + ch.len_utf8()]);
            }
        }
        if let Some(begin) = start {
            tokens.push(&text[begin..]);
        }
        tokens
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signature of raw bytes plus whether decoding was lossy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBytes {
    /// The signature
    pub signature: Signature,
    /// True when undecodable bytes were substituted
    pub lossy: bool,
}

/// Converts source text into signatures
#[derive(Debug, Clone)]
pub struct Normalizer {
    reserved_words: HashSet<String>,
    builtin_functions: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl Normalizer {
    /// Build a normalizer from configured word lists
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            reserved_words: config.reserved_words.iter().cloned().collect(),
            builtin_functions: config.builtin_functions.iter().cloned().collect(),
        }
    }

    /// Normalize source text into its signature
    pub fn normalize(&self, source: &str) -> Signature {
        let text = strip_comments(source);
        let text = strip_directives(&text);
        let text = collapse_whitespace(&text);
        Signature(self.canonicalize_identifiers(&text))
    }

    /// Normalize arbitrary bytes, decoding lossily when they are not UTF-8
    pub fn normalize_bytes(&self, bytes: &[u8], origin: &str) -> NormalizedBytes {
        let decoded = decode_lossy(bytes);
        if decoded.lossy {
            warn!("Normalization decode warning: {origin} is not valid UTF-8, using lossy decode");
        }
        NormalizedBytes {
            signature: self.normalize(&decoded.text),
            lossy: decoded.lossy,
        }
    }

    /// Whether a word survives canonicalization verbatim
    pub fn is_kept(&self, name: &str) -> bool {
        self.reserved_words.contains(name) || self.builtin_functions.contains(name)
    }

    // Reserved words followed by "(" (if, while, sizeof) stay as they are.
    fn canonicalize_identifiers(&self, text: &str) -> String {
        IDENTIFIERS
            .replace_all(text, |caps: &Captures<'_>| {
                let name = &caps[1];
                match caps.get(2) {
                    _ if self.is_kept(name) => caps[0].to_string(),
                    Some(_) => format!("{FUNCTION_PLACEHOLDER}("),
                    None => IDENTIFIER_PLACEHOLDER.to_string(),
                }
            })
            .into_owned()
    }
}

fn strip_comments(text: &str) -> String {
    COMMENTS.replace_all(text, "").into_owned()
}

fn strip_directives(text: &str) -> String {
    DIRECTIVES.replace_all(text, "").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(text: &str) -> String {
        Normalizer::default().normalize(text).as_str().to_string()
    }

    #[test]
    fn test_comments_and_directives_removed() {
        let source = "#include <linux/kernel.h>\n#define MAX(a, b) \\\n    ((a) > (b) ? (a) : (b))\n/* header */\nint x; // trailing\n";
        assert_eq!(normalize(source), "int I;");
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        assert_eq!(normalize("int x; /* never closed\nint y;"), "int I;");
    }

    #[test]
    fn test_functions_and_identifiers_canonicalized() {
        let source = "static int count_items(struct list *head) { return kmalloc (sizeof(*head)); }";
        assert_eq!(
            normalize(source),
            "static int F(struct I *I) { return kmalloc (sizeof(*I)); }"
        );
    }

    #[test]
    fn test_control_flow_keywords_survive_call_syntax() {
        assert_eq!(normalize("if (ready) while(busy) spin();"), "if (I) while(I) F();");
    }

    #[test]
    fn test_whitespace_and_comments_do_not_matter() {
        let a = "int main(){return 0;}";
        let b = "int   main ( )\n{\n    /* entry */ return 0; // done\n}\n";
        assert_eq!(normalize(a), "int F(){return 0;}");
        assert_eq!(normalize(b), "int F( ) { return 0; }");
    }

    #[test]
    fn test_renaming_is_invisible() {
        let a = "int total = 0; for (i = 0; i < n; i++) total += values[i];";
        let b = "int sum = 0; for (k = 0; k < len; k++) sum += arr[k];";
        assert_eq!(normalize(a), normalize(b));
    }

    #[test]
    fn test_added_statement_is_visible() {
        let a = "int f(int a) { return a; }";
        let b = "int f(int a) { if (a) return 0; return a; }";
        assert_ne!(normalize(a), normalize(b));
    }

    #[test]
    fn test_idempotent_on_placeholders() {
        let once = normalize("void do_work(void) { int F = helper(I); FUNC_REPL = 1; }");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_carriage_return_before_directive() {
        let once = normalize("int a;\n\r#define X 1\nint b;");
        assert_eq!(once, "int I; int I;");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_bytes_is_total() {
        let normalizer = Normalizer::default();
        let result = normalizer.normalize_bytes(&[b'i', b'n', b't', b' ', 0xFF, b'x', b';'], "a.c");
        assert!(result.lossy);
        assert_eq!(result.signature.as_str(), "int \u{FFFD}I;");
    }

    #[test]
    fn test_empty_input() {
        assert!(Normalizer::default().normalize("  \n\t// only a comment\n").is_empty());
    }

    #[test]
    fn test_signature_append_and_tokens() {
        let mut whole = Signature::default();
        whole.append(&Signature::from_normalized("int I;"));
        whole.append(&Signature::default());
        whole.append(&Signature::from_normalized("F(I);"));
        assert_eq!(whole.as_str(), "int I; F(I);");
        assert_eq!(whole.tokens(), vec!["int", "I", ";", "F", "(", "I", ")", ";"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_is_idempotent(source in "[a-zA-Z_0-9 (){};=+*/#\n\t]{0,80}") {
                let normalizer = Normalizer::default();
                let once = normalizer.normalize(&source);
                let twice = normalizer.normalize(once.as_str());
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn renaming_user_identifiers_is_invisible(
                a in "[a-z][a-z0-9_]{0,6}",
                b in "[a-z][a-z0-9_]{0,6}",
            ) {
                let normalizer = Normalizer::default();
                prop_assume!(!normalizer.is_kept(&a) && !normalizer.is_kept(&b));

                let left = format!("int {a}_v = 1; {a}_fn({a}_v); while ({a}_v) {a}_v--;");
                let right = format!("int {b}_v = 1; {b}_fn({b}_v); while ({b}_v) {b}_v--;");
                prop_assert_eq!(normalizer.normalize(&left), normalizer.normalize(&right));
            }
        }
    }
}
