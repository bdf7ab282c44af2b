// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Auto-increment key templates
//!
//! A key such as `item0005` advances its last run of digits on each playback
//! repeat while keeping the original zero padding: `item0005`, `item0006`, ...

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_till1,
    character::complete::digit1,
    combinator::map,
    multi::many0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Digits(&'a str),
}

impl<'a> Segment<'a> {
    fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(s) | Segment::Digits(s) => *s,
        }
    }
}

fn parse_segment(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        map(digit1, Segment::Digits),
        map(take_till1(|c: char| c.is_ascii_digit()), Segment::Text),
    ))
    .parse(input)
}

fn parse_segments(input: &str) -> IResult<&str, Vec<Segment<'_>>> {
    many0(parse_segment).parse(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate<'a> {
    pub prefix: &'a str,
    pub value: u64,
    pub width: usize,
    pub suffix: &'a str,
}

impl KeyTemplate<'_> {
    pub fn render(&self, offset: u64) -> Option<String> {
        let value = self.value.checked_add(offset)?;
        Some(format!(
            "{}{:0width$}{}",
            self.prefix,
            value,
            self.suffix,
            width = self.width
        ))
    }
}

/// Splits `key` around its last numeric run. Returns `None` when the key has
/// no digits or the run does not fit in a `u64`.
pub fn parse_template(key: &str) -> Option<KeyTemplate<'_>> {
    let (_, segments) = parse_segments(key).ok()?;

    let mut start = 0;
    let mut last = None;
    for segment in &segments {
        let len = segment.as_str().len();
        if let Segment::Digits(digits) = segment {
            last = Some((start, *digits));
        }
        start += len;
    }

    let (start, digits) = last?;
    Some(KeyTemplate {
        prefix: &key[..start],
        value: digits.parse().ok()?,
        width: digits.len(),
        suffix: &key[start + digits.len()..],
    })
}

/// Key to dispatch on the 1-indexed `repeat` iteration.
pub fn resolve_key(key: &str, auto_increment: bool, repeat: u32) -> String {
    if !auto_increment {
        return key.to_string();
    }
    let offset = u64::from(repeat.saturating_sub(1));
    parse_template(key)
        .and_then(|template| template.render(offset))
        .unwrap_or_else(|| key.to_string())
}
