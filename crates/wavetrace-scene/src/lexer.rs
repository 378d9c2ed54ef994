use crate::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────

/// A numeric token, kept as source text until the parser knows which type
/// (count, size, float) the grammar expects at this position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'s> {
    pub text: &'s str,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub col: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, col: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token<'s>>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            // skip `//` line comments
            if self.src[self.pos..].starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'s>>, ParseError> {
        self.skip_whitespace_and_comments();

        let Some(ch) = self.peek() else { return Ok(None) };
        let (line, col) = (self.line, self.col);

        if !(ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.')) {
            return Err(ParseError::new(format!("unexpected character {:?}", ch), line, col));
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if !c.is_whitespace() && c != '/') {
            self.advance();
        }

        Ok(Some(Token { text: &self.src[start..self.pos], line, col }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<&str> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_on_any_whitespace() {
        assert_eq!(texts("1 2\n3\t4.5  -6"), ["1", "2", "3", "4.5", "-6"]);
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(texts("// header\n8 8 // size\n2"), ["8", "8", "2"]);
    }

    #[test]
    fn tracks_line_and_column() {
        let toks = Lexer::new("1 2\n  3").tokenize().unwrap();
        assert_eq!((toks[2].line, toks[2].col), (2, 3));
    }

    #[test]
    fn rejects_words() {
        let err = Lexer::new("4 four").tokenize().unwrap_err();
        assert_eq!((err.line, err.col), (1, 3));
    }
}
