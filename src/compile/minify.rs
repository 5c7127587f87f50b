//! Bundle minification.
//!
//! Strips comments and collapses whitespace. A gap is kept only where
//! removing it would change how the code tokenizes, and line breaks are
//! kept where automatic semicolon insertion depends on them.

use super::lexer::{is_word_char, tokenize, Token, TokenKind};
use super::CompileError;
use std::path::Path;

/// Keywords whose operand may not follow a line break.
const RESTRICTED_KEYWORDS: &[&str] = &["return", "break", "continue", "throw", "yield"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

fn last_char(token: &Token<'_>) -> Option<char> {
    token.text.chars().next_back()
}

fn first_char(token: &Token<'_>) -> Option<char> {
    token.text.chars().next()
}

fn needs_space(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let (Some(a), Some(b)) = (last_char(prev), first_char(next)) else {
        return false;
    };
    if is_word_char(a) && is_word_char(b) {
        return true;
    }
    if (a == '+' && b == '+') || (a == '-' && b == '-') || (a == '/' && matches!(b, '/' | '*')) {
        return true;
    }
    // `1 .toString()` must not become `1.toString()`
    prev.kind == TokenKind::Word && prev.text.chars().all(|c| c.is_ascii_digit()) && b == '.'
}

fn ends_expression(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Word | TokenKind::Str | TokenKind::Template | TokenKind::Regex => true,
        TokenKind::Punct => token.is_punct(')') || token.is_punct(']') || token.is_punct('}'),
        _ => false,
    }
}

/// Whether `token` can only continue the expression before it, so a line
/// break in front of it never ends a statement.
fn continues_expression(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Punct && ".([,;)]}?:=*/%<>&|^".contains(token.text)
}

fn keep_newline(prev: &Token<'_>, next: &Token<'_>) -> bool {
    if prev.kind == TokenKind::Word && RESTRICTED_KEYWORDS.contains(&prev.text) {
        return true;
    }
    if next.is_punct('+') || next.is_punct('-') || prev.is_punct('+') || prev.is_punct('-') {
        return true;
    }
    ends_expression(prev) && !continues_expression(next)
}

/// Minify script text.
///
/// `file` is only used to locate tokenizer errors.
pub fn minify(file: &Path, text: &str) -> Result<String, CompileError> {
    let tokens = tokenize(text)
        .map_err(|e| CompileError::with_location(file, e.line, e.column, e.message))?;

    let mut out = String::with_capacity(text.len());
    let mut prev: Option<Token<'_>> = None;
    let mut gap = Gap::None;

    for token in tokens {
        match token.kind {
            TokenKind::Whitespace { newline } => {
                gap = gap.max(if newline { Gap::Newline } else { Gap::Space });
            }
            TokenKind::LineComment => gap = gap.max(Gap::Space),
            TokenKind::BlockComment => {
                gap = gap.max(if token.text.contains('\n') { Gap::Newline } else { Gap::Space });
            }
            _ => {
                if let Some(p) = &prev {
                    match gap {
                        Gap::None => {}
                        Gap::Newline if keep_newline(p, &token) => out.push('\n'),
                        Gap::Space | Gap::Newline => {
                            if needs_space(p, &token) {
                                out.push(' ');
                            }
                        }
                    }
                }
                out.push_str(token.text);
                prev = Some(token);
                gap = Gap::None;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min(src: &str) -> String {
        minify(Path::new("bundle.js"), src).unwrap()
    }

    #[test]
    fn test_strips_comments_and_whitespace() {
        assert_eq!(min("var a = 1;\n\n// note\nvar b = 2;\n"), "var a=1;var b=2;");
    }

    #[test]
    fn test_keeps_strings_intact() {
        assert_eq!(min("var s = 'a  b // c';  /* gone */"), "var s='a  b // c';");
    }

    #[test]
    fn test_block_comment_separates_words() {
        assert_eq!(min("typeof/* x */a"), "typeof a");
    }

    #[test]
    fn test_newline_kept_for_asi() {
        assert_eq!(min("a = b\nc = d\n"), "a=b\nc=d");
        assert_eq!(min("function f() {\n  return\n  x;\n}"), "function f(){return\nx;}");
    }

    #[test]
    fn test_newline_dropped_after_semicolon_and_brace() {
        assert_eq!(min("f();\n(function() {\n})();\n"), "f();(function(){})();");
    }

    #[test]
    fn test_newline_kept_before_unary_operator() {
        assert_eq!(
            min("var ok = check()\n!function() { go(); }()\n"),
            "var ok=check()\n!function(){go();}()"
        );
        assert_eq!(min("f()\n!g()"), "f()\n!g()");
        assert_eq!(min("a\n~b"), "a\n~b");
    }

    #[test]
    fn test_newline_kept_before_block() {
        assert_eq!(min("f()\n{ g() }"), "f()\n{g()}");
    }

    #[test]
    fn test_newline_dropped_before_continuation() {
        assert_eq!(min("promise\n  .then(done)\n  .catch(fail);"), "promise.then(done).catch(fail);");
        assert_eq!(min("var a = [\n  1,\n  2\n];"), "var a=[1,2];");
        assert_eq!(min("x = a\n  ? b\n  : c;"), "x=a?b:c;");
    }

    #[test]
    fn test_increment_not_merged() {
        assert_eq!(min("x = a + +b"), "x=a+ +b");
        assert_eq!(min("a\n++b"), "a\n++b");
    }

    #[test]
    fn test_regex_literal_preserved() {
        assert_eq!(min("if (/a  b/i .test(s)) { }"), "if(/a  b/i.test(s)){}");
    }

    #[test]
    fn test_division_after_postfix_update() {
        assert_eq!(min("var half = n++ / 2;"), "var half=n++/2;");
    }

    #[test]
    fn test_number_member_access() {
        assert_eq!(min("1 .toString()"), "1 .toString()");
    }

    #[test]
    fn test_minify_template_cache_module() {
        let src = "angular.module(\"templates\").run([\"$templateCache\", function($templateCache) {\n$templateCache.put(\"/a\", \"<p>  x</p>\");\n}]);";
        assert_eq!(
            min(src),
            "angular.module(\"templates\").run([\"$templateCache\",function($templateCache){$templateCache.put(\"/a\",\"<p>  x</p>\");}]);"
        );
    }

    #[test]
    fn test_minify_error_has_location() {
        let err = minify(Path::new("dist/p.js"), "a;\n'open").unwrap_err();
        assert_eq!(err.file, Path::new("dist/p.js"));
        assert_eq!((err.line, err.column), (Some(2), Some(1)));
    }
}
