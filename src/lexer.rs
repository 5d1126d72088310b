use std::{fmt, io::BufRead};

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Def => write!(f, "'def'"),
            Token::Extern => write!(f, "'extern'"),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Number(value) => write!(f, "number {}", value),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(
        &[
            r"^(?:(?P<space>\s+)",
            r"(?P<comment>#[^\n\r]*)",
            r"(?P<ident>[A-Za-z][A-Za-z0-9]*)",
            r"(?P<number>[0-9.]+)",
            r"(?s:(?P<char>.)))",
        ]
        .join("|")
    )
    .unwrap();
}

/// Parse numeric text the way `strtod` would: take the longest prefix that is
/// a valid decimal, so `1.2.3` reads as `1.2` and a bare `.` as `0`.
pub fn parse_number(text: &str) -> f64 {
    let end = text
        .char_indices()
        .filter(|&(_, c)| c == '.')
        .nth(1)
        .map_or(text.len(), |(i, _)| i);

    text[..end].parse().unwrap_or(0.0)
}

/// Lazily turns a character stream into tokens, pulling one line from the
/// reader whenever the buffered one runs out.
pub struct Lexer<R> {
    reader: R,
    buf: Vec<u8>,
    line: String,
    pos: usize,
    done: bool,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Lexer {
            reader,
            buf: Vec::new(),
            line: String::new(),
            pos: 0,
            done: false,
        }
    }

    // invalid utf-8 is replaced with U+FFFD, which lexes as a plain char
    fn fill_line(&mut self) -> bool {
        self.buf.clear();
        self.line.clear();
        self.pos = 0;

        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => false,
            Ok(n) => {
                tracing::trace!(bytes = n, "lexer read line");
                self.line.push_str(&String::from_utf8_lossy(&self.buf));
                true
            }
            Err(err) => {
                tracing::error!("failed to read input: {}", err);
                false
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            if self.done {
                return Token::Eof;
            }

            if self.pos >= self.line.len() && !self.fill_line() {
                self.done = true;
                continue;
            }

            let rest = &self.line[self.pos..];
            let cap = match TOKEN_RE.captures(rest) {
                Some(cap) => cap,
                None => {
                    self.pos = self.line.len();
                    continue;
                }
            };
            self.pos += cap[0].len();

            if cap.name("space").is_some() || cap.name("comment").is_some() {
                continue;
            }

            return if let Some(ident) = cap.name("ident") {
                match ident.as_str() {
                    "def" => Token::Def,
                    "extern" => Token::Extern,
                    name => Token::Ident(name.to_string()),
                }
            } else if let Some(number) = cap.name("number") {
                Token::Number(parse_number(number.as_str()))
            } else if let Some(c) = cap.name("char").and_then(|m| m.as_str().chars().next()) {
                Token::Char(c)
            } else {
                continue;
            };
        }
    }
}

impl<R: BufRead> Iterator for Lexer<R> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.next_token() {
            Token::Eof => None,
            tok => Some(tok),
        }
    }
}

/// Lex a whole string up to (but not including) the end of input.
pub fn lex(input: &str) -> Vec<Token> {
    Lexer::new(input.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lex_works() {
        let tokenized = vec![
            Token::Def,
            Token::Ident("add".to_string()),
            Token::Char('('),
            Token::Ident("x".to_string()),
            Token::Ident("y2".to_string()),
            Token::Char(')'),
            Token::Ident("x".to_string()),
            Token::Char('+'),
            Token::Number(1.5),
            Token::Char(';'),
        ];
        assert_eq!(lex("def add(x y2)\n\tx + 1.5;"), tokenized);
    }

    #[test]
    fn keywords_need_exact_text() {
        assert_eq!(
            lex("extern externs define"),
            vec![
                Token::Extern,
                Token::Ident("externs".to_string()),
                Token::Ident("define".to_string()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(lex("1 # comment\n+2"), lex("1\n+2"));
        assert_eq!(lex("# only a comment"), vec![]);
        assert_eq!(lex("#a\n#b\nx"), vec![Token::Ident("x".to_string())]);
    }

    #[test]
    fn numbers_are_permissive() {
        assert_eq!(lex("1.2.3"), vec![Token::Number(1.2)]);
        assert_eq!(lex(".5"), vec![Token::Number(0.5)]);
        assert_eq!(lex("4."), vec![Token::Number(4.0)]);
        assert_eq!(lex("."), vec![Token::Number(0.0)]);
    }

    #[test]
    fn number_stops_at_letters() {
        assert_eq!(
            lex("2x"),
            vec![Token::Number(2.0), Token::Ident("x".to_string())]
        );
    }

    #[test]
    fn invalid_utf8_does_not_end_input() {
        let tokens: Vec<Token> = Lexer::new(&b"1 + 2\n\xff\n3 + 4\n"[..]).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.0),
                Token::Char('+'),
                Token::Number(2.0),
                Token::Char('\u{FFFD}'),
                Token::Number(3.0),
                Token::Char('+'),
                Token::Number(4.0),
            ]
        );
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("a".as_bytes());
        assert_eq!(lexer.next_token(), Token::Ident("a".to_string()));
        assert_eq!(lexer.next_token(), Token::Eof);
        assert_eq!(lexer.next_token(), Token::Eof);
    }

    #[test]
    fn tokens_span_reads() {
        let mut lexer = Lexer::new("foo(\n1,\n  2)".as_bytes());
        assert_eq!(lexer.next_token(), Token::Ident("foo".to_string()));
        assert_eq!(lexer.next_token(), Token::Char('('));
        assert_eq!(lexer.next_token(), Token::Number(1.0));
        assert_eq!(lexer.next_token(), Token::Char(','));
        assert_eq!(lexer.next_token(), Token::Number(2.0));
        assert_eq!(lexer.next_token(), Token::Char(')'));
        assert_eq!(lexer.next_token(), Token::Eof);
    }
}
