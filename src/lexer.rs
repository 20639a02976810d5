use crate::token::{Position, Token, TokenKind, is_keyword};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Default,
    Template,
    Substitution,
}

/// Infallible scanner: malformed input surfaces as `Invalid` tokens that the
/// parser reports with position, so lexing itself never errors.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    mode: Mode,
    keep_all_eol: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            input: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            mode: Mode::Default,
            keep_all_eol: false,
        }
    }

    /// While enabled, every `;` yields its own EOL token instead of being
    /// coalesced with neighbouring terminators. The parser wraps `for`
    /// headers in this mode so `for (;;)` keeps both separators.
    pub fn toggle_keep_eol(&mut self) {
        self.keep_all_eol = !self.keep_all_eol;
    }

    /// Drops back to default scanning after a parse failure so resync does
    /// not resume inside a template or substitution.
    pub fn reset(&mut self) {
        self.mode = Mode::Default;
        self.keep_all_eol = false;
    }

    pub fn scan(&mut self) -> Token {
        match self.mode {
            Mode::Template => self.scan_template(),
            Mode::Substitution => self.scan_substitution(),
            Mode::Default => self.scan_default(),
        }
    }

    fn scan_default(&mut self) -> Token {
        self.skip_spaces();

        let pos = self.position();
        let Some(ch) = self.peek() else {
            return Token::bare(TokenKind::Eof, pos);
        };

        if is_eol(ch) {
            return self.scan_eol(pos);
        }

        let token = match ch {
            '/' if self.peek_at(1) == Some('/') => self.scan_comment(pos),
            '#' if self.peek_at(1) == Some('!') => self.scan_comment(pos),
            '\'' | '"' => self.scan_string(pos),
            '`' => {
                self.advance();
                self.mode = Mode::Template;
                Token::bare(TokenKind::Template, pos)
            }
            c if is_letter(c) => self.scan_ident(pos),
            c if c.is_ascii_digit() => self.scan_number(pos),
            _ => self.scan_punct(pos),
        };

        if token.kind.can_skip_blanks() {
            self.skip_blanks();
        }
        self.discard_newline_before_closer();
        token
    }

    fn scan_template(&mut self) -> Token {
        let pos = self.position();
        match self.peek() {
            None => Token::bare(TokenKind::Eof, pos),
            Some('$') if self.peek_at(1) == Some('{') => {
                self.advance();
                self.advance();
                self.mode = Mode::Substitution;
                Token::bare(TokenKind::BegSub, pos)
            }
            Some('`') => {
                self.advance();
                self.mode = Mode::Default;
                Token::bare(TokenKind::Template, pos)
            }
            Some(_) => {
                let mut literal = String::new();
                while let Some(c) = self.peek() {
                    if c == '`' || (c == '$' && self.peek_at(1) == Some('{')) {
                        break;
                    }
                    literal.push(c);
                    self.advance();
                }
                Token::new(TokenKind::Str, literal, pos)
            }
        }
    }

    fn scan_substitution(&mut self) -> Token {
        self.skip_spaces();
        let pos = self.position();
        if self.peek() == Some('}') {
            self.advance();
            self.mode = Mode::Template;
            return Token::bare(TokenKind::EndSub, pos);
        }
        self.scan_default()
    }

    fn scan_eol(&mut self, pos: Position) -> Token {
        if self.keep_all_eol && self.peek() == Some(';') {
            self.advance();
            return Token::bare(TokenKind::Eol, pos);
        }
        while let Some(c) = self.peek() {
            if is_eol(c) || c == ' ' || c == '\t' {
                self.advance();
            } else {
                break;
            }
        }
        Token::bare(TokenKind::Eol, pos)
    }

    fn scan_comment(&mut self, pos: Position) -> Token {
        self.advance();
        self.advance();
        self.skip_spaces();
        let mut literal = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            literal.push(c);
            self.advance();
        }
        Token::new(TokenKind::Comment, literal, pos)
    }

    fn scan_string(&mut self, pos: Position) -> Token {
        let quote = self.peek().unwrap_or('"');
        self.advance();

        let mut kind = TokenKind::Str;
        let mut literal = String::new();
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    kind = TokenKind::Invalid;
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.scan_escape() {
                        Some(c) => literal.push(c),
                        None => kind = TokenKind::Invalid,
                    }
                }
                Some(c) => {
                    literal.push(c);
                    self.advance();
                }
            }
        }
        Token::new(kind, literal, pos)
    }

    fn scan_escape(&mut self) -> Option<char> {
        let marker = self.peek()?;
        self.advance();
        let escaped = match marker {
            '0' => '\0',
            '\'' => '\'',
            '"' => '"',
            '\\' => '\\',
            'n' => '\n',
            'r' => '\r',
            'v' => '\u{b}',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'x' => return self.scan_unicode_escape(2),
            'u' => return self.scan_unicode_escape(4),
            _ => return None,
        };
        Some(escaped)
    }

    fn scan_unicode_escape(&mut self, digits: usize) -> Option<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let digit = self.peek()?.to_digit(16)?;
            value = value * 16 + digit;
            self.advance();
        }
        char::from_u32(value)
    }

    fn scan_ident(&mut self, pos: Position) -> Token {
        let mut literal = String::new();
        while let Some(c) = self.peek() {
            if is_letter(c) || c.is_ascii_digit() {
                literal.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = if literal == "true" || literal == "false" {
            TokenKind::Boolean
        } else if is_keyword(&literal) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        Token::new(kind, literal, pos)
    }

    fn scan_number(&mut self, pos: Position) -> Token {
        let mut kind = TokenKind::Number;
        let mut literal = String::new();

        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some(radix @ ('b' | 'o' | 'x')) => {
                    literal.push('0');
                    literal.push(radix);
                    self.advance();
                    self.advance();
                    let accept: fn(char) -> bool = match radix {
                        'b' => |c| c == '0' || c == '1',
                        'o' => |c| ('0'..='7').contains(&c),
                        _ => |c| c.is_ascii_hexdigit(),
                    };
                    if !self.scan_digits(&mut literal, accept) {
                        kind = TokenKind::Invalid;
                    }
                    return Token::new(kind, literal, pos);
                }
                _ => {
                    let mut zeros = 0;
                    while self.peek() == Some('0') {
                        literal.push('0');
                        self.advance();
                        zeros += 1;
                    }
                    if zeros > 1 {
                        kind = TokenKind::Invalid;
                    }
                }
            }
        }

        if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            if !self.scan_digits(&mut literal, |c| c.is_ascii_digit()) {
                kind = TokenKind::Invalid;
            }
        }
        if self.peek() == Some('.') {
            literal.push('.');
            self.advance();
            if !self.scan_digits(&mut literal, |c| c.is_ascii_digit()) {
                kind = TokenKind::Invalid;
            }
        }
        Token::new(kind, literal, pos)
    }

    /// Accumulates digits, allowing `_` separators between them. Returns
    /// false when a separator is not followed by a digit.
    fn scan_digits(&mut self, literal: &mut String, accept: fn(char) -> bool) -> bool {
        let mut valid = true;
        let mut seen = false;
        while let Some(c) = self.peek() {
            if accept(c) {
                literal.push(c);
                self.advance();
                seen = true;
            } else if c == '_' && seen {
                self.advance();
                if !matches!(self.peek(), Some(next) if accept(next)) {
                    valid = false;
                    break;
                }
            } else {
                break;
            }
        }
        valid && seen
    }

    fn scan_punct(&mut self, pos: Position) -> Token {
        let ch = self.peek().unwrap_or('\0');
        self.advance();
        let kind = match ch {
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Spread
                } else {
                    TokenKind::Dot
                }
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '{' => TokenKind::Lbrace,
            '}' => TokenKind::Rbrace,
            '(' => TokenKind::Lparen,
            ')' => TokenKind::Rparen,
            '[' => TokenKind::Lsquare,
            ']' => TokenKind::Rsquare,
            '+' => {
                if self.eat('=') {
                    TokenKind::AddAssign
                } else if self.eat('+') {
                    TokenKind::Increment
                } else {
                    TokenKind::Add
                }
            }
            '-' => {
                if self.eat('=') {
                    TokenKind::SubAssign
                } else if self.eat('-') {
                    TokenKind::Decrement
                } else {
                    TokenKind::Sub
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        TokenKind::PowAssign
                    } else {
                        TokenKind::Pow
                    }
                } else if self.eat('=') {
                    TokenKind::MulAssign
                } else {
                    TokenKind::Mul
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::DivAssign
                } else {
                    TokenKind::Div
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::ModAssign
                } else {
                    TokenKind::Mod
                }
            }
            '&' => {
                if self.eat('&') {
                    if self.eat('=') {
                        TokenKind::AndAssign
                    } else {
                        TokenKind::And
                    }
                } else if self.eat('=') {
                    TokenKind::BandAssign
                } else {
                    TokenKind::Band
                }
            }
            '|' => {
                if self.eat('|') {
                    if self.eat('=') {
                        TokenKind::OrAssign
                    } else {
                        TokenKind::Or
                    }
                } else if self.eat('=') {
                    TokenKind::BorAssign
                } else {
                    TokenKind::Bor
                }
            }
            '~' => {
                if self.eat('=') {
                    TokenKind::BnotAssign
                } else {
                    TokenKind::Bnot
                }
            }
            '^' => {
                if self.eat('=') {
                    TokenKind::BxorAssign
                } else {
                    TokenKind::Bxor
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::Seq
                    } else {
                        TokenKind::Eq
                    }
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        TokenKind::Sne
                    } else {
                        TokenKind::Ne
                    }
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else if self.eat('<') {
                    if self.eat('=') {
                        TokenKind::LshiftAssign
                    } else {
                        TokenKind::Lshift
                    }
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else if self.eat('>') {
                    if self.eat('=') {
                        TokenKind::RshiftAssign
                    } else {
                        TokenKind::Rshift
                    }
                } else {
                    TokenKind::Gt
                }
            }
            '?' => {
                if self.eat('?') {
                    if self.eat('=') {
                        TokenKind::NullishAssign
                    } else {
                        TokenKind::Nullish
                    }
                } else if self.eat('.') {
                    TokenKind::Optional
                } else {
                    TokenKind::Question
                }
            }
            _ => return Token::new(TokenKind::Invalid, ch.to_string(), pos),
        };
        Token::bare(kind, pos)
    }

    /// Newlines directly before a closing delimiter do not terminate a
    /// statement, so `[1,\n2\n]` parses as one literal.
    fn discard_newline_before_closer(&mut self) {
        if !matches!(self.peek(), Some('\n' | '\r')) {
            return;
        }
        let saved = (self.pos, self.line, self.column);
        self.skip_blanks();
        if !matches!(self.peek(), Some(')' | '}' | ']')) {
            (self.pos, self.line, self.column) = saved;
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.advance();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.scan();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_eol(c: char) -> bool {
    c == '\n' || c == '\r' || c == ';'
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_simple_statement() {
        let tokens = tokenize("let x = 1 + 2\n");
        let expected = vec![
            (TokenKind::Keyword, "let"),
            (TokenKind::Ident, "x"),
            (TokenKind::Assign, ""),
            (TokenKind::Number, "1"),
            (TokenKind::Add, ""),
            (TokenKind::Number, "2"),
            (TokenKind::Eol, ""),
            (TokenKind::Eof, ""),
        ];
        let actual = tokens
            .iter()
            .map(|t| (t.kind, t.literal.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn semicolon_and_newline_coalesce_into_one_eol() {
        assert_eq!(
            kinds("1;\n\n2"),
            vec![
                TokenKind::Number,
                TokenKind::Eol,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn keep_eol_mode_emits_each_semicolon() {
        let mut lexer = Lexer::new(";;");
        lexer.toggle_keep_eol();
        assert_eq!(lexer.scan().kind, TokenKind::Eol);
        assert_eq!(lexer.scan().kind, TokenKind::Eol);
        assert_eq!(lexer.scan().kind, TokenKind::Eof);
    }

    #[test]
    fn newlines_continue_after_opening_delimiters() {
        let source = indoc! {"
            f(
                1,
                2
            )
        "};
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Ident,
                TokenKind::Lparen,
                TokenKind::Number,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::Rparen,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_escapes() {
        let tokens = tokenize(r#""a\tb\n\x41B""#);
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].literal, "a\tb\nAB");
    }

    #[test]
    fn unterminated_string_is_invalid() {
        let tokens = tokenize("\"abc\n");
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn unknown_escape_is_invalid() {
        let tokens = tokenize(r#""a\q""#);
        assert_eq!(tokens[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn scans_number_forms() {
        for (source, literal) in [
            ("42", "42"),
            ("3.25", "3.25"),
            ("0xFF", "0xFF"),
            ("0b1010", "0b1010"),
            ("0o17", "0o17"),
            ("1_000_000", "1000000"),
        ] {
            let tokens = tokenize(source);
            assert_eq!(tokens[0].kind, TokenKind::Number, "{source}");
            assert_eq!(tokens[0].literal, literal, "{source}");
        }
    }

    #[test]
    fn rejects_double_leading_zero() {
        assert_eq!(tokenize("007")[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn rejects_trailing_digit_separator() {
        assert_eq!(tokenize("1_")[0].kind, TokenKind::Invalid);
    }

    #[test]
    fn scans_compound_operators() {
        assert_eq!(
            kinds("a ** b ?? c?.d ... => === !== <<="),
            vec![
                TokenKind::Ident,
                TokenKind::Pow,
                TokenKind::Ident,
                TokenKind::Nullish,
                TokenKind::Ident,
                TokenKind::Optional,
                TokenKind::Ident,
                TokenKind::Spread,
                TokenKind::Arrow,
                TokenKind::Seq,
                TokenKind::Sne,
                TokenKind::LshiftAssign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_template_with_substitution() {
        let tokens = tokenize("`hi ${name}!`");
        let expected = vec![
            (TokenKind::Template, ""),
            (TokenKind::Str, "hi "),
            (TokenKind::BegSub, ""),
            (TokenKind::Ident, "name"),
            (TokenKind::EndSub, ""),
            (TokenKind::Str, "!"),
            (TokenKind::Template, ""),
            (TokenKind::Eof, ""),
        ];
        let actual = tokens
            .iter()
            .map(|t| (t.kind, t.literal.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn scans_comments_without_eating_the_newline() {
        let source = indoc! {"
            let x = 1 // trailing note
            x
        "};
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Keyword,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Comment,
                TokenKind::Eol,
                TokenKind::Ident,
                TokenKind::Eol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_hashbang_as_comment() {
        let tokens = tokenize("#!/usr/bin/env minijs\n1");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].literal, "/usr/bin/env minijs");
    }

    #[test]
    fn strips_byte_order_mark() {
        let tokens = tokenize("\u{feff}1");
        assert_eq!(tokens[0].kind, TokenKind::Number);
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = tokenize("a\nbb cc");
        assert_eq!(tokens[0].pos, Position { line: 1, column: 1 });
        let cc = tokens
            .iter()
            .find(|t| t.literal == "cc")
            .expect("cc token present");
        assert_eq!(cc.pos, Position { line: 2, column: 4 });
    }
}
