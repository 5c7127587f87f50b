//! Lightweight script tokenizer.
//!
//! Splits script text into tokens that are just precise enough for
//! structural validation and whitespace/comment stripping: words,
//! single-character punctuation, string/template/regex literals,
//! comments and whitespace. It does not build an AST.

use std::fmt;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of whitespace; `newline` is set if it contains a line break
    Whitespace { newline: bool },
    /// `// ...` up to (not including) the line break
    LineComment,
    /// `/* ... */`
    BlockComment,
    /// Single- or double-quoted string literal
    Str,
    /// Backtick template literal
    Template,
    /// Regular expression literal including flags
    Regex,
    /// Identifier, keyword or number
    Word,
    /// Any other single character
    Punct,
}

/// A token borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// 1-indexed line of the first character
    pub line: usize,
    /// 1-indexed column of the first character
    pub column: usize,
}

impl Token<'_> {
    /// Whether the token carries meaning (not whitespace or a comment).
    pub fn is_significant(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Whitespace { .. } | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Whether the token is the given punctuation character.
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.starts_with(c)
    }
}

/// Tokenizer failure with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for LexError {}

/// Keywords after which a `/` starts a regular expression.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Check if a character can be part of an identifier or number.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().collect(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|&(i, _)| i).unwrap_or(self.src.len())
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> LexError {
        LexError { line, column, message: message.into() }
    }

    fn scan_quoted(&mut self, quote: char, line: usize, column: usize) -> Result<(), LexError> {
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('\n') | None => {
                    return Err(self.error(line, column, "unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn scan_template(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('`') => return Ok(()),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    self.scan_substitution(line, column)?;
                }
                Some(_) => {}
                None => return Err(self.error(line, column, "unterminated template literal")),
            }
        }
    }

    /// Skip a `${ ... }` substitution, honouring nested braces and strings.
    fn scan_substitution(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        let mut depth = 1usize;
        while depth > 0 {
            let (l, c) = (self.line, self.column);
            match self.peek() {
                Some('{') => {
                    depth += 1;
                    self.bump();
                }
                Some('}') => {
                    depth -= 1;
                    self.bump();
                }
                Some(q @ ('"' | '\'')) => self.scan_quoted(q, l, c)?,
                Some('`') => self.scan_template(l, c)?,
                Some(_) => {
                    self.bump();
                }
                None => return Err(self.error(line, column, "unterminated template literal")),
            }
        }
        Ok(())
    }

    fn scan_regex(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some('\n') | None => {
                    return Err(self.error(line, column, "unterminated regular expression"));
                }
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_word_char) {
            self.bump();
        }
        Ok(())
    }

    fn scan_block_comment(&mut self, line: usize, column: usize) -> Result<(), LexError> {
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.error(line, column, "unterminated block comment")),
            }
        }
    }
}

/// Whether `token` can end an operand, so a following `/` divides.
fn ends_operand(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Word => !REGEX_PREFIX_KEYWORDS.contains(&token.text),
        TokenKind::Str | TokenKind::Template | TokenKind::Regex => true,
        TokenKind::Punct => matches!(token.text, ")" | "]" | "}"),
        _ => false,
    }
}

/// Decide whether a `/` begins a regular expression literal.
///
/// `significant` holds the indices of the non-trivia tokens seen so far.
fn regex_allowed(tokens: &[Token<'_>], significant: &[usize]) -> bool {
    let Some((&last, rest)) = significant.split_last() else {
        return true;
    };
    let prev = &tokens[last];
    match prev.kind {
        TokenKind::Punct if prev.text == "+" || prev.text == "-" => !is_postfix_update(tokens, rest, last),
        TokenKind::Punct => "(,=:[!&|?{};*%<>~^".contains(prev.text),
        TokenKind::Word => REGEX_PREFIX_KEYWORDS.contains(&prev.text),
        _ => false,
    }
}

/// Whether the sign at `last` closes a postfix `++`/`--` (`n++ / 2`).
fn is_postfix_update(tokens: &[Token<'_>], earlier: &[usize], last: usize) -> bool {
    let [.., operand, sign] = earlier else {
        return false;
    };
    *sign + 1 == last
        && tokens[*sign].text == tokens[last].text
        && ends_operand(&tokens[*operand])
}

/// Tokenize script source text.
///
/// Concatenating the `text` of every returned token reproduces the input.
pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut lexer = Lexer::new(src);
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut significant: Vec<usize> = Vec::new();

    while let Some(c) = lexer.peek() {
        let start = lexer.offset();
        let (line, column) = (lexer.line, lexer.column);

        let kind = if c.is_whitespace() {
            let mut newline = false;
            while let Some(w) = lexer.peek().filter(|w| w.is_whitespace()) {
                newline |= w == '\n';
                lexer.bump();
            }
            TokenKind::Whitespace { newline }
        } else if c == '/' && lexer.peek_at(1) == Some('/') {
            while lexer.peek().is_some_and(|ch| ch != '\n') {
                lexer.bump();
            }
            TokenKind::LineComment
        } else if c == '/' && lexer.peek_at(1) == Some('*') {
            lexer.scan_block_comment(line, column)?;
            TokenKind::BlockComment
        } else if c == '/' && regex_allowed(&tokens, &significant) {
            lexer.scan_regex(line, column)?;
            TokenKind::Regex
        } else if c == '"' || c == '\'' {
            lexer.scan_quoted(c, line, column)?;
            TokenKind::Str
        } else if c == '`' {
            lexer.scan_template(line, column)?;
            TokenKind::Template
        } else if is_word_char(c) {
            while lexer.peek().is_some_and(is_word_char) {
                lexer.bump();
            }
            TokenKind::Word
        } else {
            lexer.bump();
            TokenKind::Punct
        };

        let token = Token { kind, text: &src[start..lexer.offset()], line, column };
        if token.is_significant() {
            significant.push(tokens.len());
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_roundtrips_text() {
        let src = "var a = 'x'; // note\n/* block */ b(/re+/g, `t ${a}`);";
        let joined: String = tokenize(src).unwrap().iter().map(|t| t.text).collect();
        assert_eq!(joined, src);
    }

    #[test]
    fn test_tokenize_words_and_punct() {
        assert_eq!(
            kinds("a.b"),
            vec![TokenKind::Word, TokenKind::Punct, TokenKind::Word]
        );
    }

    #[test]
    fn test_division_vs_regex() {
        let toks = tokenize("x = a / b / c").unwrap();
        assert!(toks.iter().all(|t| t.kind != TokenKind::Regex));

        let toks = tokenize("x = /ab+c/i.test(s)").unwrap();
        let regex = toks.iter().find(|t| t.kind == TokenKind::Regex).unwrap();
        assert_eq!(regex.text, "/ab+c/i");
    }

    #[test]
    fn test_division_after_postfix_update() {
        for src in ["var half = n++ / 2;", "i-- / 2", "a[i]++ /b/ c"] {
            let toks = tokenize(src).unwrap();
            assert!(toks.iter().all(|t| t.kind != TokenKind::Regex), "{src}");
        }
    }

    #[test]
    fn test_regex_after_binary_plus() {
        let toks = tokenize("s = a + /x+/.source").unwrap();
        let regex = toks.iter().find(|t| t.kind == TokenKind::Regex).unwrap();
        assert_eq!(regex.text, "/x+/");

        let toks = tokenize("s = a + + /x/.source.length").unwrap();
        assert!(toks.iter().any(|t| t.kind == TokenKind::Regex));
    }

    #[test]
    fn test_regex_after_return_keyword() {
        let toks = tokenize("return /[/]x/;").unwrap();
        let regex = toks.iter().find(|t| t.kind == TokenKind::Regex).unwrap();
        assert_eq!(regex.text, "/[/]x/");
    }

    #[test]
    fn test_template_with_nested_substitution() {
        let toks = tokenize("`a ${ {b: '}'}.b } c`").unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Template);
    }

    #[test]
    fn test_whitespace_newline_flag() {
        assert_eq!(kinds("a \n b")[1], TokenKind::Whitespace { newline: true });
        assert_eq!(kinds("a  b")[1], TokenKind::Whitespace { newline: false });
    }

    #[test]
    fn test_unterminated_string_location() {
        let err = tokenize("a = 1;\nb = 'oops\n").unwrap_err();
        assert_eq!((err.line, err.column), (2, 5));
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = tokenize("/* never closed").unwrap_err();
        assert_eq!((err.line, err.column), (1, 1));
        assert!(err.message.contains("comment"));
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let toks = tokenize(r#""say \"hi\"""#).unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Str);
    }
}
