//! Splits text buffers into lines, and lines into whitespace-separated words.
use crate::error::{vec_with_capacity, Error, Result};

#[inline]
fn is_whitespace(c: u8) -> bool {
  c == b' ' || c == b'\t'
}

/// A line terminator is `\n`, or a `\r` that is not the first half of `\r\n`.
#[inline]
fn is_line_ending(buf: &[u8], i: usize) -> bool {
  match buf[i] {
    b'\n' => true,
    b'\r' => buf.get(i + 1) != Some(&b'\n'),
    _ => false,
  }
}

/// Location of one logical line inside a buffer. The terminator, and a `\r`
/// preceding it, are not part of the span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSpan {
  /// Byte offset of the first character of the line.
  pub offset: usize,
  /// Length of the line in bytes.
  pub len: usize,
}

impl LineSpan {
  fn between(buf: &[u8], start: usize, end: usize) -> LineSpan {
    let end = if end > start && buf[end - 1] == b'\r' {
      end - 1
    } else {
      end
    };
    LineSpan {
      offset: start,
      len: end - start,
    }
  }

  /// The bytes of this line within the buffer it was split from.
  pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
    &buf[self.offset..self.offset + self.len]
  }
}

/// Splits `buf` into lines. A final line without a terminator is still
/// returned. Fails with [`Error::EmptyInput`] when there is nothing to split.
pub fn split_lines(buf: &[u8]) -> Result<Vec<LineSpan>> {
  let endings = (0..buf.len()).filter(|&i| is_line_ending(buf, i)).count();
  let last_end = (0..buf.len())
    .rev()
    .find(|&i| is_line_ending(buf, i))
    .map_or(0, |i| i + 1);
  let trailing = last_end < buf.len();

  let num_lines = endings + trailing as usize;
  if num_lines == 0 {
    return Err(Error::EmptyInput);
  }

  let mut lines = vec_with_capacity(num_lines)?;
  let mut start = 0;
  for i in 0..buf.len() {
    if is_line_ending(buf, i) {
      lines.push(LineSpan::between(buf, start, i));
      start = i + 1;
    }
  }
  if trailing {
    lines.push(LineSpan::between(buf, start, buf.len()));
  }

  Ok(lines)
}

/// Walks the words of a single line.
#[derive(Clone)]
pub(crate) struct Lexer<'a> {
  bytes: &'a [u8],
  read_pos: usize,
}

impl<'a> Lexer<'a> {
  pub(crate) fn new(line: &'a [u8]) -> Lexer<'a> {
    Lexer {
      bytes: line,
      read_pos: 0,
    }
  }

  /// Looks at the next character the lexer is pointing to.
  fn peek(&self) -> Option<&u8> {
    self.bytes.get(self.read_pos)
  }

  /// Advance past characters until the given condition is true.
  ///
  /// Returns whether or not any of the input was skipped.
  ///
  /// Postcondition: Either the end of the input was reached or
  /// `is_true` returns false for the currently peekable character.
  fn skip_while<F: Fn(u8) -> bool>(&mut self, is_true: F) -> bool {
    let start = self.read_pos;

    while let Some(&c) = self.peek() {
      if !is_true(c) {
        break;
      }
      self.read_pos += 1;
    }

    debug_assert!(self.peek().map(|&c| !is_true(c)).unwrap_or(true));

    self.read_pos != start
  }

  /// Advance past characters until the given condition is true.
  fn skip_unless<F: Fn(u8) -> bool>(&mut self, is_false: F) -> bool {
    self.skip_while(|c| !is_false(c))
  }

  pub(crate) fn skip_whitespace(&mut self) -> bool {
    self.skip_while(is_whitespace)
  }

  /// Whether the line, from the current position on, holds only whitespace.
  pub(crate) fn is_blank(&self) -> bool {
    self.bytes[self.read_pos..].iter().all(|&c| is_whitespace(c))
  }

  /// Whether the first non-blank character is a `#`.
  pub(crate) fn is_comment(&mut self) -> bool {
    self.skip_whitespace();
    self.peek() == Some(&b'#')
  }

  /// Gets the next word in the line.
  pub(crate) fn next_word(&mut self) -> Option<&'a [u8]> {
    self.skip_whitespace();

    let start = self.read_pos;
    if self.skip_unless(is_whitespace) {
      Some(&self.bytes[start..self.read_pos])
    } else {
      None
    }
  }

  /// Everything left on the line, without surrounding whitespace. Names and
  /// texture paths may contain spaces, so they are taken whole.
  pub(crate) fn rest(&mut self) -> &'a [u8] {
    self.skip_whitespace();

    let rest = &self.bytes[self.read_pos..];
    let end = rest
      .iter()
      .rposition(|&c| !is_whitespace(c))
      .map_or(0, |i| i + 1);
    self.read_pos = self.bytes.len();
    &rest[..end]
  }

  /// Like [`Lexer::rest`], decoded as text.
  pub(crate) fn rest_string(&mut self) -> String {
    String::from_utf8_lossy(self.rest()).into_owned()
  }

  /// Parses the next word as a float. Missing or malformed words give `0`.
  pub(crate) fn next_f32(&mut self) -> f32 {
    self.next_word().map(parse_f32).unwrap_or(0.)
  }

  /// Parses the next word as an integer. Missing or malformed words give `0`.
  pub(crate) fn next_i32(&mut self) -> i32 {
    self.next_word().map(parse_i32).unwrap_or(0)
  }
}

pub(crate) fn parse_f32(word: &[u8]) -> f32 {
  lexical::parse(word).unwrap_or_else(|_| {
    log::trace!("malformed float {:?}", String::from_utf8_lossy(word));
    0.
  })
}

pub(crate) fn parse_i32(word: &[u8]) -> i32 {
  lexical::parse(word).unwrap_or_else(|_| {
    log::trace!("malformed integer {:?}", String::from_utf8_lossy(word));
    0
  })
}

#[test]
fn test_split_lines() {
  let buf = b"v 1 2 3\r\nvn 0 1 0\n\nf 1 2 3";
  let lines = split_lines(buf).unwrap();
  let text: Vec<&[u8]> = lines.iter().map(|l| l.slice(buf)).collect();
  assert_eq!(
    text,
    vec![&b"v 1 2 3"[..], &b"vn 0 1 0"[..], &b""[..], &b"f 1 2 3"[..]]
  );
}

#[test]
fn test_split_lines_trailing_terminator() {
  let buf = b"a\nb\n";
  let lines = split_lines(buf).unwrap();
  assert_eq!(lines.len(), 2);
  assert_eq!(lines[1], LineSpan { offset: 2, len: 1 });
}

#[test]
fn test_split_lines_bare_carriage_return() {
  let buf = b"a\rb\r\nc\r";
  let lines = split_lines(buf).unwrap();
  let text: Vec<&[u8]> = lines.iter().map(|l| l.slice(buf)).collect();
  assert_eq!(text, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
}

#[test]
fn test_split_lines_empty() {
  assert!(matches!(split_lines(b""), Err(Error::EmptyInput)));
}

#[test]
fn test_next_word() {
  let mut l = Lexer::new(b"  hello wor\tld   this# is ");
  assert_eq!(l.next_word(), Some(&b"hello"[..]));
  assert_eq!(l.next_word(), Some(&b"wor"[..]));
  assert_eq!(l.next_word(), Some(&b"ld"[..]));
  assert_eq!(l.next_word(), Some(&b"this#"[..]));
  assert_eq!(l.next_word(), Some(&b"is"[..]));
  assert_eq!(l.next_word(), None);
  assert!(l.is_blank());
}

#[test]
fn test_rest_keeps_inner_spaces() {
  let mut l = Lexer::new(b"map_Kd   -s 1 1 1 my texture.png \t");
  assert_eq!(l.next_word(), Some(&b"map_Kd"[..]));
  assert_eq!(l.rest(), &b"-s 1 1 1 my texture.png"[..]);
  assert_eq!(l.next_word(), None);
}

#[test]
fn test_numbers_are_best_effort() {
  let mut l = Lexer::new(b"1.5 nope -3");
  assert_eq!(l.next_f32(), 1.5);
  assert_eq!(l.next_f32(), 0.);
  assert_eq!(l.next_i32(), -3);
  assert_eq!(l.next_i32(), 0);
}
