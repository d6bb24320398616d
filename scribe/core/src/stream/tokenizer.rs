//! Incremental Tokenizer
//!
//! Reads structural JSON tokens from a byte stream that is still arriving.
//! Bytes are pulled from a [`ChunkSource`] only when the current buffer
//! cannot complete the next token, so a token is returned only once all of
//! its bytes are present.
//!
//! Separators (`,` and `:`) and whitespace are consumed implicitly; the
//! tokenizer tracks the container stack to know which of them is legal
//! next. Consumed bytes are dropped from the buffer unless a raw value is
//! being recorded, which keeps memory at roughly one element.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::error::DecodeError;
use super::relay::RelayReader;
use crate::backend::TransportError;

/// Consumed bytes are only discarded once this many have piled up, unless
/// the whole buffer has been consumed
const COMPACT_THRESHOLD: usize = 4096;

/// A source of byte chunks for the tokenizer
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the stream has ended normally
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

#[async_trait]
impl ChunkSource for RelayReader {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.read().await
    }
}

#[async_trait]
impl ChunkSource for VecDeque<Vec<u8>> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.pop_front())
    }
}

/// One structural JSON token
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// A string in object-key position, unescaped
    Key(String),
    /// A string value, unescaped
    String(String),
    /// A number, as written
    Number(String),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
    /// The input ended
    End,
}

impl Token {
    /// The token's category
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::ObjectStart => TokenKind::ObjectStart,
            Self::ObjectEnd => TokenKind::ObjectEnd,
            Self::ArrayStart => TokenKind::ArrayStart,
            Self::ArrayEnd => TokenKind::ArrayEnd,
            Self::Key(_) => TokenKind::Key,
            Self::String(_) => TokenKind::String,
            Self::Number(_) => TokenKind::Number,
            Self::Bool(_) => TokenKind::Bool,
            Self::Null => TokenKind::Null,
            Self::End => TokenKind::End,
        }
    }
}

/// Category of a [`Token`], as reported by [`Tokenizer::peek_kind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// `{`
    ObjectStart,
    /// `}`
    ObjectEnd,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// Object key
    Key,
    /// String value
    String,
    /// Number
    Number,
    /// Boolean
    Bool,
    /// `null`
    Null,
    /// End of input
    End,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ObjectStart => "'{'",
            Self::ObjectEnd => "'}'",
            Self::ArrayStart => "'['",
            Self::ArrayEnd => "']'",
            Self::Key => "object key",
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Null => "null",
            Self::End => "end of input",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ObjectState {
    /// Just opened: key or `}`
    KeyOrEnd,
    /// After a comma: key
    Key,
    /// After a key: `:`
    Colon,
    /// After a colon: value
    Value,
    /// After a value: `,` or `}`
    CommaOrEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArrayState {
    /// Just opened: value or `]`
    ValueOrEnd,
    /// After a comma: value
    Value,
    /// After a value: `,` or `]`
    CommaOrEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Frame {
    Object(ObjectState),
    Array(ArrayState),
}

fn is_value_start(b: u8) -> bool {
    matches!(b, b'{' | b'[' | b'"' | b't' | b'f' | b'n' | b'-' | b'0'..=b'9')
}

fn is_number_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

/// Lazy JSON tokenizer over a growing byte stream
pub struct Tokenizer<S> {
    source: S,
    buf: Vec<u8>,
    /// Next unread byte in `buf`
    pos: usize,
    /// Absolute stream offset of `buf[0]`
    base: usize,
    /// Start of the raw value being recorded; bytes from here on are kept
    mark: Option<usize>,
    stack: Vec<Frame>,
    /// The top-level value has been read completely
    top_done: bool,
    eof: bool,
}

impl<S: ChunkSource> Tokenizer<S> {
    /// Create a tokenizer over the given source
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: Vec::new(),
            pos: 0,
            base: 0,
            mark: None,
            stack: Vec::new(),
            top_done: false,
            eof: false,
        }
    }

    /// Absolute byte offset of the next unread byte
    #[must_use]
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Mutable access to the underlying source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Report the category of the next token without consuming it
    ///
    /// # Errors
    ///
    /// Returns a syntax error if the next token is not legal here, or the
    /// transport error that ended the stream.
    pub async fn peek_kind(&mut self) -> Result<TokenKind, DecodeError> {
        Ok(match self.prepare().await? {
            None => TokenKind::End,
            Some(b) => self.kind_of(b),
        })
    }

    /// Consume and return the next token
    ///
    /// Returns [`Token::End`] once the input is exhausted; whether that is
    /// acceptable is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns a syntax error for malformed input, [`DecodeError::Truncated`]
    /// if the input ends inside a token, or the transport error that ended
    /// the stream.
    pub async fn read_token(&mut self) -> Result<Token, DecodeError> {
        let Some(b) = self.prepare().await? else {
            return Ok(Token::End);
        };

        let token = match b {
            b'{' => {
                self.pos += 1;
                self.stack.push(Frame::Object(ObjectState::KeyOrEnd));
                Token::ObjectStart
            }
            b'[' => {
                self.pos += 1;
                self.stack.push(Frame::Array(ArrayState::ValueOrEnd));
                Token::ArrayStart
            }
            b'}' | b']' => {
                self.pos += 1;
                self.stack.pop();
                self.end_value();
                if b == b'}' {
                    Token::ObjectEnd
                } else {
                    Token::ArrayEnd
                }
            }
            b'"' => {
                let at_key = self.at_key();
                let text = self.read_string().await?;
                if at_key {
                    self.set_top(Frame::Object(ObjectState::Colon));
                    Token::Key(text)
                } else {
                    self.end_value();
                    Token::String(text)
                }
            }
            b't' => {
                self.read_literal(b"true").await?;
                self.end_value();
                Token::Bool(true)
            }
            b'f' => {
                self.read_literal(b"false").await?;
                self.end_value();
                Token::Bool(false)
            }
            b'n' => {
                self.read_literal(b"null").await?;
                self.end_value();
                Token::Null
            }
            _ => {
                let number = self.read_number().await?;
                self.end_value();
                Token::Number(number)
            }
        };
        Ok(token)
    }

    /// Consume one complete value and return its raw bytes
    ///
    /// The value is validated token by token as it arrives; only its own
    /// bytes are retained until it closes.
    ///
    /// # Errors
    ///
    /// Same as [`read_token`](Self::read_token); ending before the value
    /// closes is [`DecodeError::Truncated`].
    pub async fn read_raw_value(&mut self) -> Result<Vec<u8>, DecodeError> {
        let Some(b) = self.prepare().await? else {
            return Err(self.truncated());
        };
        if self.at_key() || !is_value_start(b) {
            return Err(self.syntax("expected a value"));
        }

        let depth = self.stack.len();
        self.mark = Some(self.pos);
        let outcome = self.skip_value(depth).await;
        let start = self.mark.take();
        outcome?;

        match start {
            Some(start) => Ok(self.buf[start..self.pos].to_vec()),
            None => Err(self.syntax("raw value start lost")),
        }
    }

    async fn skip_value(&mut self, depth: usize) -> Result<(), DecodeError> {
        loop {
            if self.read_token().await? == Token::End {
                return Err(self.truncated());
            }
            if self.stack.len() == depth {
                return Ok(());
            }
        }
    }

    /// Skip whitespace and separators up to the start of the next token.
    ///
    /// Returns the token's first byte, or `None` at end of input.
    async fn prepare(&mut self) -> Result<Option<u8>, DecodeError> {
        self.compact();
        loop {
            let Some(b) = self.peek_byte().await? else {
                return Ok(None);
            };

            match self.stack.last().copied() {
                Some(Frame::Object(ObjectState::Colon)) => {
                    if b != b':' {
                        return Err(self.syntax("expected ':' after object key"));
                    }
                    self.pos += 1;
                    self.set_top(Frame::Object(ObjectState::Value));
                }
                Some(Frame::Object(ObjectState::CommaOrEnd)) => match b {
                    b',' => {
                        self.pos += 1;
                        self.set_top(Frame::Object(ObjectState::Key));
                    }
                    b'}' => return Ok(Some(b)),
                    _ => return Err(self.syntax("expected ',' or '}' after object value")),
                },
                Some(Frame::Array(ArrayState::CommaOrEnd)) => match b {
                    b',' => {
                        self.pos += 1;
                        self.set_top(Frame::Array(ArrayState::Value));
                    }
                    b']' => return Ok(Some(b)),
                    _ => return Err(self.syntax("expected ',' or ']' after array element")),
                },
                Some(Frame::Object(ObjectState::KeyOrEnd)) => {
                    if b == b'"' || b == b'}' {
                        return Ok(Some(b));
                    }
                    return Err(self.syntax("expected object key or '}'"));
                }
                Some(Frame::Object(ObjectState::Key)) => {
                    if b == b'"' {
                        return Ok(Some(b));
                    }
                    return Err(self.syntax("expected object key"));
                }
                Some(Frame::Array(ArrayState::ValueOrEnd)) if b == b']' => return Ok(Some(b)),
                None if self.top_done => {
                    return Err(self.syntax("unexpected data after top-level value"));
                }
                _ => {
                    if is_value_start(b) {
                        return Ok(Some(b));
                    }
                    return Err(self.syntax(format!("invalid character {:?}", char::from(b))));
                }
            }
        }
    }

    fn kind_of(&self, b: u8) -> TokenKind {
        match b {
            b'{' => TokenKind::ObjectStart,
            b'}' => TokenKind::ObjectEnd,
            b'[' => TokenKind::ArrayStart,
            b']' => TokenKind::ArrayEnd,
            b'"' if self.at_key() => TokenKind::Key,
            b'"' => TokenKind::String,
            b't' | b'f' => TokenKind::Bool,
            b'n' => TokenKind::Null,
            _ => TokenKind::Number,
        }
    }

    fn at_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Object(ObjectState::KeyOrEnd | ObjectState::Key))
        )
    }

    fn set_top(&mut self, frame: Frame) {
        if let Some(top) = self.stack.last_mut() {
            *top = frame;
        }
    }

    /// A value just finished in the current container
    fn end_value(&mut self) {
        match self.stack.last_mut() {
            Some(Frame::Object(state)) => *state = ObjectState::CommaOrEnd,
            Some(Frame::Array(state)) => *state = ArrayState::CommaOrEnd,
            None => self.top_done = true,
        }
    }

    /// Next non-whitespace byte, pulling more input as needed
    async fn peek_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        loop {
            while let Some(&b) = self.buf.get(self.pos) {
                if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                    return Ok(Some(b));
                }
                self.pos += 1;
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Append the next non-empty chunk; `false` at end of input
    async fn fill(&mut self) -> Result<bool, DecodeError> {
        while !self.eof {
            match self.source.next_chunk().await? {
                Some(chunk) if chunk.is_empty() => {}
                Some(chunk) => {
                    self.buf.extend_from_slice(&chunk);
                    return Ok(true);
                }
                None => self.eof = true,
            }
        }
        Ok(false)
    }

    /// Drop consumed bytes that no recorded value needs.
    ///
    /// Only called between tokens, never while a token scan holds indices
    /// into `buf`.
    fn compact(&mut self) {
        let keep_from = self.mark.unwrap_or(self.pos);
        if keep_from == 0 || (keep_from < self.buf.len() && keep_from < COMPACT_THRESHOLD) {
            return;
        }
        self.buf.drain(..keep_from);
        self.base += keep_from;
        self.pos -= keep_from;
        if let Some(mark) = self.mark.as_mut() {
            *mark -= keep_from;
        }
    }

    async fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let mut i = start + 1;
        loop {
            let Some(&b) = self.buf.get(i) else {
                if !self.fill().await? {
                    return Err(self.truncated());
                }
                continue;
            };
            match b {
                b'\\' => i += 2,
                b'"' => break,
                _ => i += 1,
            }
        }

        let text = serde_json::from_slice::<String>(&self.buf[start..=i]).map_err(|e| {
            DecodeError::Syntax {
                offset: self.base + start,
                reason: e.to_string(),
            }
        })?;
        self.pos = i + 1;
        Ok(text)
    }

    async fn read_number(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let mut i = start;
        let mut at_eof = false;
        loop {
            match self.buf.get(i) {
                Some(&b) if is_number_byte(b) => i += 1,
                Some(_) => break,
                None => {
                    if !self.fill().await? {
                        at_eof = true;
                        break;
                    }
                }
            }
        }

        let raw = &self.buf[start..i];
        if let Err(e) = serde_json::from_slice::<serde_json::Number>(raw) {
            // `1.` or `-` cut off by the end of input
            if at_eof && e.is_eof() {
                return Err(self.truncated());
            }
            return Err(DecodeError::Syntax {
                offset: self.base + start,
                reason: e.to_string(),
            });
        }
        let number = String::from_utf8_lossy(raw).into_owned();
        self.pos = i;
        Ok(number)
    }

    async fn read_literal(&mut self, literal: &'static [u8]) -> Result<(), DecodeError> {
        while self.buf.len() - self.pos < literal.len() {
            if !self.fill().await? {
                if literal.starts_with(&self.buf[self.pos..]) {
                    return Err(self.truncated());
                }
                break;
            }
        }
        if !self.buf[self.pos..].starts_with(literal) {
            return Err(self.syntax(format!(
                "invalid literal, expected {}",
                String::from_utf8_lossy(literal)
            )));
        }
        self.pos += literal.len();
        Ok(())
    }

    fn syntax(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Syntax {
            offset: self.offset(),
            reason: reason.into(),
        }
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::Truncated {
            offset: self.base + self.buf.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokenizer(chunks: &[&str]) -> Tokenizer<VecDeque<Vec<u8>>> {
        Tokenizer::new(chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    fn bytewise(text: &str) -> Tokenizer<VecDeque<Vec<u8>>> {
        Tokenizer::new(text.bytes().map(|b| vec![b]).collect())
    }

    async fn all_tokens<S: ChunkSource>(tok: &mut Tokenizer<S>) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = tok.read_token().await.unwrap();
            if token == Token::End {
                return tokens;
            }
            tokens.push(token);
        }
    }

    #[tokio::test]
    async fn test_tokens_from_single_byte_chunks() {
        let mut tok = bytewise(r#"{"parts": [{"type":"x", "n": -1.5e3, "b": true, "z": null, "f": false}]}"#);

        assert_eq!(
            all_tokens(&mut tok).await,
            vec![
                Token::ObjectStart,
                Token::Key("parts".into()),
                Token::ArrayStart,
                Token::ObjectStart,
                Token::Key("type".into()),
                Token::String("x".into()),
                Token::Key("n".into()),
                Token::Number("-1.5e3".into()),
                Token::Key("b".into()),
                Token::Bool(true),
                Token::Key("z".into()),
                Token::Null,
                Token::Key("f".into()),
                Token::Bool(false),
                Token::ObjectEnd,
                Token::ArrayEnd,
                Token::ObjectEnd,
            ]
        );
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let mut tok = tokenizer(&["[", " 1 ", ",", "\"a\"]"]);

        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::ArrayStart);
        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::ArrayStart);
        assert_eq!(tok.read_token().await.unwrap(), Token::ArrayStart);

        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::Number);
        assert_eq!(tok.read_token().await.unwrap(), Token::Number("1".into()));

        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::String);
        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::String);
        assert_eq!(tok.read_token().await.unwrap(), Token::String("a".into()));

        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::ArrayEnd);
        assert_eq!(tok.read_token().await.unwrap(), Token::ArrayEnd);
        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::End);
    }

    #[tokio::test]
    async fn test_peek_reports_key_position() {
        let mut tok = tokenizer(&[r#"{"k": "v"}"#]);
        tok.read_token().await.unwrap();
        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::Key);
        tok.read_token().await.unwrap();
        assert_eq!(tok.peek_kind().await.unwrap(), TokenKind::String);
    }

    #[tokio::test]
    async fn test_escapes_split_across_chunks() {
        let mut tok = tokenizer(&[r#"["a\"#, r#""b\u00"#, r#"e9\n", "\ud83d"#, r#"\ude00"]"#]);
        assert_eq!(
            all_tokens(&mut tok).await,
            vec![
                Token::ArrayStart,
                Token::String("a\"b\u{e9}\n".into()),
                Token::String("\u{1f600}".into()),
                Token::ArrayEnd,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_escape_is_syntax_error() {
        let mut tok = tokenizer(&[r#"["ok", "\q"]"#]);
        tok.read_token().await.unwrap();
        tok.read_token().await.unwrap();
        let err = tok.read_token().await.unwrap_err();
        assert!(
            matches!(err, DecodeError::Syntax { offset: 7, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_truncated_string() {
        let mut tok = tokenizer(&["[\"unterminated"]);
        tok.read_token().await.unwrap();
        let err = tok.read_token().await.unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { offset: 14 }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_truncated_literal() {
        let mut tok = tokenizer(&["[tr"]);
        tok.read_token().await.unwrap();
        assert!(matches!(
            tok.read_token().await.unwrap_err(),
            DecodeError::Truncated { .. }
        ));
    }

    #[tokio::test]
    async fn test_truncated_number() {
        for chunks in [&["[1", "."][..], &["[-"], &["[2.5e"]] {
            let mut tok = tokenizer(chunks);
            tok.read_token().await.unwrap();
            let err = tok.read_token().await.unwrap_err();
            assert!(matches!(err, DecodeError::Truncated { .. }), "{chunks:?}: got {err:?}");
        }

        let mut tok = tokenizer(&["[1.", "]"]);
        tok.read_token().await.unwrap();
        assert!(matches!(
            tok.read_token().await.unwrap_err(),
            DecodeError::Syntax { offset: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_literal() {
        let mut tok = tokenizer(&["[trux]"]);
        tok.read_token().await.unwrap();
        assert!(matches!(
            tok.read_token().await.unwrap_err(),
            DecodeError::Syntax { offset: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let cases = [
            ("[1,]", "trailing comma"),
            ("{\"a\" 1}", "missing colon"),
            ("{\"a\":1 \"b\":2}", "missing comma"),
            ("{1:2}", "non-string key"),
            ("[1 2]", "missing array comma"),
            ("[}", "mismatched close"),
            ("[01]", "leading zero"),
            ("[@]", "invalid character"),
        ];
        for (input, label) in cases {
            let mut tok = tokenizer(&[input]);
            let mut result = Ok(Token::Null);
            for _ in 0..8 {
                result = tok.read_token().await;
                if result.is_err() {
                    break;
                }
            }
            assert!(
                matches!(result, Err(DecodeError::Syntax { .. })),
                "{label}: expected syntax error, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_trailing_data_after_top_level() {
        let mut tok = tokenizer(&["{} {}"]);
        assert_eq!(tok.read_token().await.unwrap(), Token::ObjectStart);
        assert_eq!(tok.read_token().await.unwrap(), Token::ObjectEnd);
        assert!(matches!(
            tok.peek_kind().await.unwrap_err(),
            DecodeError::Syntax { offset: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_number_at_end_of_input() {
        let mut tok = tokenizer(&["4", "2"]);
        assert_eq!(tok.read_token().await.unwrap(), Token::Number("42".into()));
        assert_eq!(tok.read_token().await.unwrap(), Token::End);
    }

    #[tokio::test]
    async fn test_raw_value_spans_chunks() {
        let mut tok = tokenizer(&["[{\"type\":", " \"commentary\", \"text\"", ": \"hi\"}", ", 7]"]);
        tok.read_token().await.unwrap();

        let raw = tok.read_raw_value().await.unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            "{\"type\": \"commentary\", \"text\": \"hi\"}"
        );

        assert_eq!(tok.read_raw_value().await.unwrap(), b"7".to_vec());
        assert_eq!(tok.read_token().await.unwrap(), Token::ArrayEnd);
    }

    #[tokio::test]
    async fn test_raw_value_truncated() {
        let mut tok = tokenizer(&["[{\"type\":\"commentary\",\"text\":\"hi\""]);
        tok.read_token().await.unwrap();
        assert!(matches!(
            tok.read_raw_value().await.unwrap_err(),
            DecodeError::Truncated { offset: 33 }
        ));
    }

    #[tokio::test]
    async fn test_raw_value_rejects_close() {
        let mut tok = tokenizer(&["[]"]);
        tok.read_token().await.unwrap();
        assert!(matches!(
            tok.read_raw_value().await.unwrap_err(),
            DecodeError::Syntax { .. }
        ));
    }

    #[tokio::test]
    async fn test_consumed_bytes_are_released() {
        let element = format!("{{\"text\":\"{}\"}}", "x".repeat(1000));
        let elements = vec![element.clone(); 40];
        let mut chunks = vec!["[".to_string()];
        for (i, e) in elements.iter().enumerate() {
            chunks.push(if i == 0 { e.clone() } else { format!(",{e}") });
        }
        chunks.push("]".to_string());
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let mut tok = tokenizer(&chunk_refs);

        tok.read_token().await.unwrap();
        for _ in 0..40 {
            let raw = tok.read_raw_value().await.unwrap();
            assert_eq!(raw, element.as_bytes());
            assert!(
                tok.buf.len() < COMPACT_THRESHOLD + 2 * element.len(),
                "buffer grew to {}",
                tok.buf.len()
            );
        }
        assert_eq!(tok.read_token().await.unwrap(), Token::ArrayEnd);
        assert_eq!(tok.offset(), chunks.iter().map(String::len).sum::<usize>());
    }

    struct FailingSource {
        chunks: VecDeque<Vec<u8>>,
    }

    #[async_trait]
    impl ChunkSource for FailingSource {
        async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            match self.chunks.pop_front() {
                Some(chunk) => Ok(Some(chunk)),
                None => Err(TransportError::DeadlineExceeded),
            }
        }
    }

    #[tokio::test]
    async fn test_transport_error_surfaces() {
        let mut tok = Tokenizer::new(FailingSource {
            chunks: VecDeque::from([b"[1".to_vec()]),
        });
        assert_eq!(tok.read_token().await.unwrap(), Token::ArrayStart);
        assert!(matches!(
            tok.read_token().await.unwrap_err(),
            DecodeError::Transport(TransportError::DeadlineExceeded)
        ));
    }
}
