//! Buffered, seekable source stream and tokenizer for QuasiLang.
//!
//! The reader pulls bytes either from a file (in fixed-size chunks) or from
//! an in-memory string, tracks `(offset, line, column)`, and produces tokens
//! on demand via [`Reader::next_token`].  [`Reader::jump_to_position`] rewinds
//! the stream to any previously observed position, which is what makes lazy
//! re-parsing of collapsed subtrees possible.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info};

use crate::error::{QuasiError, Result};
use crate::token::{Position, Token, TokenKind};

/// Default chunk size for file-backed readers.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Tokenizer over a file or an in-memory buffer.
#[derive(Debug)]
pub struct Reader {
    file: Option<File>,
    filename: String,
    buffer: Vec<u8>,
    max_buffer_size: usize,
    file_offset: u64,
    buffer_position: usize,
    line: u32,
    column: u32,
    /// Set when a newline was consumed; the next advance lands on column 0.
    fresh_line: bool,
    /// File-backed only: the last chunk has been read from disk.
    eof: bool,
}

impl Reader {
    /// Open a file-backed reader with the default chunk size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Open a file-backed reader reading `buffer_size` bytes at a time.
    pub fn with_buffer_size<P: AsRef<Path>>(path: P, buffer_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file: File = File::open(path)?;

        info!(
            "opening {} with {}-byte buffer",
            path.display(),
            buffer_size
        );

        let mut reader = Self {
            file: Some(file),
            filename: path.display().to_string(),
            buffer: Vec::new(),
            max_buffer_size: buffer_size,
            file_offset: 0,
            buffer_position: 0,
            line: 0,
            column: 0,
            fresh_line: false,
            eof: false,
        };
        reader.reload_buffer()?;

        Ok(reader)
    }

    /// Build an in-memory reader over `data`.
    pub fn from_string<S: Into<String>>(data: S) -> Self {
        let buffer: Vec<u8> = data.into().into_bytes();

        info!("in-memory reader over {} bytes", buffer.len());

        Self {
            file: None,
            filename: "<memory>".to_string(),
            max_buffer_size: buffer.len(),
            buffer,
            file_offset: 0,
            buffer_position: 0,
            line: 0,
            column: 0,
            fresh_line: false,
            eof: false,
        }
    }

    /// Current position of the next unread byte.
    #[inline]
    pub fn get_position(&self) -> Position {
        Position {
            offset: self.file_offset + self.buffer_position as u64,
            line: self.line,
            column: self.column,
        }
    }

    /// Seek so that all subsequent reads resume at `pos`.
    pub fn jump_to_position(&mut self, pos: Position) -> Result<()> {
        debug!("jump to <{}> (offset {})", pos, pos.offset);

        match self.file.as_mut() {
            None => {
                let target = pos.offset as usize;
                if target > self.buffer.len() {
                    return Err(self.error("position is out of range"));
                }
                self.buffer_position = target;
            }

            Some(file) => {
                file.seek(SeekFrom::Start(pos.offset))?;
                self.eof = false;
                self.reload_buffer()?;
            }
        }

        self.line = pos.line;
        self.column = pos.column;
        self.fresh_line = false;

        Ok(())
    }

    /// Fail loudly with the current position.
    ///
    /// Used by parsers to abort processing while preserving diagnostics.  A
    /// file-backed reader that has already consumed its last chunk stays
    /// silent.
    pub fn interrupt(&self) -> Result<()> {
        if self.file.is_some() && self.eof {
            return Ok(());
        }
        Err(self.error("interrupted"))
    }

    /// Read the next token from the input stream.
    ///
    /// At end of input this returns (and keeps returning) a token of kind
    /// [`TokenKind::Eof`] carrying the final position.
    pub fn next_token(&mut self) -> Result<Token> {
        let pos: Position = self.get_position();

        if !self.is_valid() {
            debug!("token stream exhausted at <{}>", pos);

            return Ok(Token::new(TokenKind::Eof, pos, String::new()));
        }

        let current: u8 = self.peek_char();

        let (kind, word) = match current {
            b'(' | b'[' | b'{' => (
                TokenKind::OpenBracket,
                (self.get_char()? as char).to_string(),
            ),

            b')' | b']' | b'}' => (
                TokenKind::CloseBracket,
                (self.get_char()? as char).to_string(),
            ),

            b',' | b';' | b':' => (
                TokenKind::Separator,
                (self.get_char()? as char).to_string(),
            ),

            b'/' => {
                let mut bytes: Vec<u8> = vec![self.get_char()?];
                if self.is_valid() && matches!(self.peek_char(), b'/' | b'*') {
                    self.read_comment(&mut bytes)?;
                    (TokenKind::Comment, String::from_utf8(bytes)?)
                } else {
                    (TokenKind::SpecialCharacter, "/".to_string())
                }
            }

            b'A'..=b'Z' | b'a'..=b'z' | b'_' => (TokenKind::Keyword, self.read_keyword()?),

            b'0'..=b'9' => self.read_number()?,

            b'"' | b'\'' => (TokenKind::String, self.read_string()?),

            c if c.is_ascii_whitespace() => (TokenKind::Whitespace, self.read_whitespace()?),

            _ => (
                TokenKind::SpecialCharacter,
                (self.get_char()? as char).to_string(),
            ),
        };

        Ok(Token::new(kind, pos, word))
    }

    #[inline]
    fn is_valid(&self) -> bool {
        !self.buffer.is_empty() && self.buffer_position < self.buffer.len()
    }

    #[inline]
    fn peek_char(&self) -> u8 {
        self.buffer[self.buffer_position]
    }

    #[inline]
    fn get_char(&mut self) -> Result<u8> {
        let current: u8 = self.peek_char();
        self.advance_char()?;
        Ok(current)
    }

    #[inline]
    fn advance_char(&mut self) -> Result<()> {
        debug_assert!(!self.buffer.is_empty());

        self.buffer_position += 1;
        if self.fresh_line {
            self.column = 0;
            self.fresh_line = false;
        } else {
            self.column += 1;
        }
        if self.buffer_position >= self.buffer.len() {
            self.reload_buffer()?;
        }

        Ok(())
    }

    fn reload_buffer(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        if self.eof {
            return Ok(());
        }

        self.file_offset = file.stream_position()?;
        self.buffer.resize(self.max_buffer_size, 0);

        let mut total: usize = 0;
        while total < self.max_buffer_size {
            let got: usize = file.read(&mut self.buffer[total..])?;
            if got == 0 {
                self.eof = true;
                break;
            }
            total += got;
        }
        self.buffer.truncate(total);
        self.buffer_position = 0;

        debug!(
            "reloaded {} bytes from {} at offset {}",
            total, self.filename, self.file_offset
        );

        Ok(())
    }

    fn read_whitespace(&mut self) -> Result<String> {
        let mut word = String::new();

        while self.is_valid() && self.peek_char().is_ascii_whitespace() {
            if self.peek_char() == b'\n' {
                self.line += 1;
                self.fresh_line = true;
            }
            word.push(self.get_char()? as char);
        }

        Ok(word)
    }

    fn read_keyword(&mut self) -> Result<String> {
        let mut word = String::new();

        loop {
            word.push(self.get_char()? as char);
            if !self.is_valid() {
                break;
            }
            let next: u8 = self.peek_char();
            if !next.is_ascii_alphanumeric() && next != b'_' {
                break;
            }
        }

        Ok(word)
    }

    fn read_comment(&mut self, bytes: &mut Vec<u8>) -> Result<()> {
        debug_assert_eq!(bytes.len(), 1);

        bytes.push(self.get_char()?);
        let multiline: bool = bytes.last() == Some(&b'*');

        while self.is_valid() {
            let current: u8 = self.get_char()?;
            if multiline && current == b'/' && bytes.last() == Some(&b'*') && bytes.len() > 2 {
                bytes.push(current);
                return Ok(());
            }
            bytes.push(current);
            if current == b'\n' {
                self.line += 1;
                if multiline {
                    self.fresh_line = true;
                } else {
                    self.column = 0;
                    self.fresh_line = false;
                    break;
                }
            }
        }

        if multiline {
            return Err(self.error("missing closing comment delimiter"));
        }

        Ok(())
    }

    fn read_string(&mut self) -> Result<String> {
        let mut bytes: Vec<u8> = Vec::new();
        let quote: u8 = self.get_char()?;
        let mut escaped = false;

        while self.is_valid() {
            let current: u8 = self.peek_char();

            if escaped {
                match current {
                    b'"' => bytes.push(b'"'),

                    b'\'' => bytes.push(b'\''),

                    b'\\' => bytes.push(b'\\'),

                    b'/' => bytes.push(b'/'),

                    b'b' => bytes.push(0x08),

                    b'f' => bytes.push(0x0C),

                    b'n' => bytes.push(b'\n'),

                    b'r' => bytes.push(b'\r'),

                    b't' => bytes.push(b'\t'),

                    b'u' => {
                        let mut value: u32 = 0;
                        for _ in 0..4 {
                            self.advance_char()?;
                            let digit = if self.is_valid() {
                                (self.peek_char() as char).to_digit(16)
                            } else {
                                None
                            };
                            let Some(digit) = digit else {
                                return Err(self.error("invalid Unicode escape"));
                            };
                            value = value * 16 + digit;
                        }
                        // Surrogate halves are not scalar values; reject them
                        // rather than emit ill-formed UTF-8.
                        let Some(decoded) = char::from_u32(value) else {
                            return Err(self.error("invalid Unicode escape"));
                        };
                        let mut utf8 = [0u8; 4];
                        bytes.extend_from_slice(decoded.encode_utf8(&mut utf8).as_bytes());
                    }

                    _ => return Err(self.error("invalid escape sequence")),
                }
                escaped = false;
            } else if current == b'\\' {
                escaped = true;
            } else if current == quote {
                break;
            } else {
                bytes.push(current);
            }

            self.advance_char()?;
        }

        if !self.is_valid() || self.peek_char() != quote {
            return Err(self.error("missing closing quote"));
        }
        self.advance_char()?;

        Ok(String::from_utf8(bytes)?)
    }

    fn read_number(&mut self) -> Result<(TokenKind, String)> {
        let mut word = String::new();
        let mut is_float = false;

        if self.is_valid() && self.peek_char() == b'0' {
            word.push(self.get_char()? as char);
            if self.is_valid() && self.peek_char().is_ascii_digit() {
                return Err(self.error("leading zeros not allowed"));
            }
        } else if self.is_valid() && self.peek_char().is_ascii_digit() {
            loop {
                word.push(self.get_char()? as char);
                if !self.is_valid() || !self.peek_char().is_ascii_digit() {
                    break;
                }
            }
        } else {
            return Err(self.error("expected digit"));
        }

        if self.is_valid() && self.peek_char() == b'.' {
            is_float = true;
            word.push(self.get_char()? as char);
            if !self.is_valid() || !self.peek_char().is_ascii_digit() {
                return Err(self.error("digit expected after decimal"));
            }
            while self.is_valid() && self.peek_char().is_ascii_digit() {
                word.push(self.get_char()? as char);
            }
        }

        if self.is_valid() && matches!(self.peek_char(), b'e' | b'E') {
            is_float = true;
            word.push(self.get_char()? as char);
            if self.is_valid() && matches!(self.peek_char(), b'+' | b'-') {
                word.push(self.get_char()? as char);
            }
            if !self.is_valid() || !self.peek_char().is_ascii_digit() {
                return Err(self.error("digit expected after exponent"));
            }
            while self.is_valid() && self.peek_char().is_ascii_digit() {
                word.push(self.get_char()? as char);
            }
        }

        let kind = if is_float {
            TokenKind::Floating
        } else {
            TokenKind::Integer
        };

        Ok((kind, word))
    }

    fn error(&self, message: &str) -> QuasiError {
        let mut message: String = message.to_string();

        if cfg!(debug_assertions) {
            if self.is_valid() {
                let current: u8 = self.peek_char();
                message.push_str(&format!(
                    "; character '{}' (byte {}) at line {}, column {}",
                    current as char,
                    current,
                    self.line + 1,
                    self.column + 1
                ));
            } else {
                message.push_str(&format!(
                    "; line {}, column {} exceeds available input",
                    self.line + 1,
                    self.column + 1
                ));
            }
            let from: usize = self.buffer_position.saturating_sub(32);
            let to: usize = (self.buffer_position + 32).min(self.buffer.len());
            message.push_str(&format!(
                " in {}; buffer: {:?}",
                self.filename,
                String::from_utf8_lossy(&self.buffer[from..to])
            ));
        }

        QuasiError::lex(message, self.get_position())
    }
}
