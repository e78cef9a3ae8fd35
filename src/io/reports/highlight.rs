//! Syntax highlighting for source pages.

use std::path::Path;

use handlebars::html_escape;
use once_cell::sync::Lazy;
use regex::Regex;

/// Turns source text into HTML markup
pub trait Highlighter: Send + Sync {
    /// Highlight `text`; the result must be safe to embed in HTML
    fn highlight(&self, text: &str, language: Option<&str>) -> String;
}

/// Language name inferred from a file extension
pub fn language_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "c" | "h" => Some("c"),
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some("cpp"),
        _ => None,
    }
}

static C_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<cm>/\*(?s:.*?)(?:\*/|\z)|//[^\n]*)",
        r#"|(?P<cp>(?m:^[ \t]*#[^\n]*))"#,
        r#"|(?P<s>"(?:\\.|[^"\\\n])*"?)"#,
        r"|(?P<sc>'(?:\\.|[^'\\\n])*'?)",
        r"|(?P<m>\b(?:0[xX][0-9a-fA-F]+|[0-9]+(?:\.[0-9]+)?)[uUlLfF]*\b)",
        r"|(?P<id>[A-Za-z_][A-Za-z0-9_]*)",
        r"|(?P<o>[-+*/%=<>!&|^~?:]+)",
        r"|(?P<p>[(){}\[\];,.])",
    ))
    .expect("C token pattern is valid")
});

const C_KEYWORDS: &[&str] = &[
    "break", "case", "continue", "default", "do", "else", "enum", "extern", "for", "goto", "if",
    "inline", "register", "return", "sizeof", "static", "struct", "switch", "typedef", "union",
    "volatile", "while", "const", "class", "namespace", "new", "delete", "template", "public",
    "private", "protected",
];

const C_TYPES: &[&str] = &[
    "auto", "bool", "char", "double", "float", "int", "long", "short", "signed", "unsigned",
    "void", "size_t",
];

/// Lexical highlighter for C-family sources using Pygments-style classes
#[derive(Debug, Clone, Copy, Default)]
pub struct CLexerHighlighter;

impl CLexerHighlighter {
    fn class_for_identifier(word: &str, next: &str) -> &'static str {
        if C_KEYWORDS.contains(&word) {
            "k"
        } else if C_TYPES.contains(&word) {
            "kt"
        } else if next.trim_start().starts_with('(') {
            "nf"
        } else {
            "n"
        }
    }

    fn highlight_c(text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 2);
        let mut last = 0;

        for caps in C_TOKENS.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&html_escape(&text[last..whole.start()]));
            last = whole.end();

            let class = ["cm", "cp", "s", "sc", "m", "o", "p"]
                .into_iter()
                .find(|name| caps.name(name).is_some())
                .unwrap_or_else(|| Self::class_for_identifier(whole.as_str(), &text[last..]));
            push_span(&mut out, class, whole.as_str());
        }

        out.push_str(&html_escape(&text[last..]));
        out
    }
}

fn push_span(out: &mut String, class: &str, token: &str) {
    // Multi-line tokens are split so each line stays self-contained.
    for (i, piece) in token.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !piece.is_empty() {
            out.push_str("<span class=\"");
            out.push_str(class);
            out.push_str("\">");
            out.push_str(&html_escape(piece));
            out.push_str("</span>");
        }
    }
}

impl Highlighter for CLexerHighlighter {
    fn highlight(&self, text: &str, language: Option<&str>) -> String {
        match language {
            Some("c") | Some("cpp") => Self::highlight_c(text),
            _ => html_escape(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(language_for(Path::new("kernel/sched.C")), Some("c"));
        assert_eq!(language_for(Path::new("x.hpp")), Some("cpp"));
        assert_eq!(language_for(Path::new("Makefile")), None);
    }

    #[test]
    fn test_keywords_types_and_functions() {
        let markup = CLexerHighlighter.highlight("int main(void) { return 0; }", Some("c"));
        assert!(markup.starts_with("<span class=\"kt\">int</span> <span class=\"nf\">main</span>"));
        assert!(markup.contains("<span class=\"k\">return</span>"));
        assert!(markup.contains("<span class=\"m\">0</span>"));
    }

    #[test]
    fn test_markup_is_escaped() {
        let markup = CLexerHighlighter.highlight("#include <stdio.h>\nchar *s = \"<b>\";", Some("c"));
        assert!(markup.contains("<span class=\"cp\">#include &lt;stdio.h&gt;</span>"));
        assert!(markup.contains("&quot;&lt;b&gt;&quot;"));
        assert!(!markup.contains("<b>"));
    }

    #[test]
    fn test_multiline_comment_keeps_line_structure() {
        let source = "/* one\ntwo */ int x;";
        let markup = CLexerHighlighter.highlight(source, Some("c"));
        assert_eq!(markup.lines().count(), source.lines().count());
        assert!(markup.starts_with("<span class=\"cm\">/* one</span>\n<span class=\"cm\">two */</span>"));
    }

    #[test]
    fn test_unknown_language_is_plain_escaped_text() {
        assert_eq!(CLexerHighlighter.highlight("a < b", None), "a &lt; b");
    }
}
