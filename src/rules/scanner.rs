//! Low-level DSL scanning
//!
//! All positions are byte offsets into the normalised text. Braces, brackets
//! and keywords are ASCII, so scanning bytes never splits a UTF-8 sequence at
//! a position we slice on.

use std::ops::Range;

/// Decode the character references used when rules are embedded in HTML,
/// unify line endings and blank out `/* ... */` comments.
///
/// Comments are replaced by spaces with their newlines kept, so line numbers
/// computed on the result match the original text. Returns the line of an
/// unterminated comment, if any; everything after its opener is dropped.
///
/// A `/*` inside a `path:` header is part of the glob (`/vod/**`), not a
/// comment opener.
pub fn normalize(raw: &str) -> (String, Option<usize>) {
    let text = raw
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();
    let mut unterminated = None;

    while let Some(open) = rest.find("/*") {
        let before = &rest[..open];
        let line_prefix = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].to_string(),
            None => format!("{}{}", &out[out.rfind('\n').map_or(0, |i| i + 1)..], before),
        };
        if in_path_header(&line_prefix) {
            out.push_str(&rest[..open + 2]);
            rest = &rest[open + 2..];
            continue;
        }
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("*/") {
            Some(close) => {
                blank_out(&mut out, &rest[open..open + 2 + close + 2]);
                rest = &after[close + 2..];
            }
            None => {
                unterminated = Some(line_of(&out, out.len()));
                blank_out(&mut out, &rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    (out, unterminated)
}

/// Whether a line prefix ends inside a `path:` header, i.e. after the colon
/// and before the block's `{`.
fn in_path_header(line_prefix: &str) -> bool {
    let lower = line_prefix.to_ascii_lowercase();
    lower.match_indices("path").any(|(kw, _)| {
        let bounded = lower[..kw]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_ascii_whitespace() || matches!(c, '{' | '}' | ';'));
        let header = lower[kw + 4..].trim_start_matches([' ', '\t']).strip_prefix(':');
        bounded && header.is_some_and(|h| !h.contains(['{', '}']))
    })
}

fn blank_out(out: &mut String, comment: &str) {
    for c in comment.chars() {
        out.push(if c == '\n' { '\n' } else { ' ' });
    }
}

/// 1-based line number of a byte offset
pub fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// A `keyword: header { body } [trailer]` construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub header: Range<usize>,
    pub body: Range<usize>,
    /// Option groups directly after the closing brace
    pub trailer: Range<usize>,
    pub end: usize,
}

/// A keyword whose block could not be delimited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub start: usize,
    pub reason: &'static str,
}

#[derive(Debug, Default)]
pub struct Scan {
    pub blocks: Vec<Block>,
    pub malformed: Vec<Malformed>,
}

/// Find every `keyword:` block at brace depth 0 within `range`.
///
/// The header runs from the colon to the first `{` on the same line and the
/// body is bounded by depth counting. A block whose brace never closes is
/// reported and scanning resumes right after its `{`, so blocks nested in it
/// can still be recovered.
pub fn scan_blocks(text: &str, range: Range<usize>, keyword: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut scan = Scan::default();
    let mut depth = 0usize;
    let mut i = range.start;

    while i < range.end {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                if let Some(colon) = keyword_at(bytes, i, range.start, range.end, keyword) {
                    let Some(open) = header_end(bytes, colon + 1, range.end) else {
                        scan.malformed.push(Malformed {
                            start: i,
                            reason: "expected `{` on the same line",
                        });
                        i = colon + 1;
                        continue;
                    };
                    match matching_brace(bytes, open, range.end) {
                        Some(close) => {
                            let trailer = option_run(bytes, close + 1, range.end);
                            let end = trailer.end;
                            scan.blocks.push(Block {
                                start: i,
                                header: colon + 1..open,
                                body: open + 1..close,
                                trailer,
                                end,
                            });
                            i = end;
                        }
                        None => {
                            scan.malformed.push(Malformed {
                                start: i,
                                reason: "unmatched `{`",
                            });
                            i = open + 1;
                        }
                    }
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    scan
}

/// Position of the colon if `keyword:` starts at `i` on a word boundary.
fn keyword_at(bytes: &[u8], i: usize, start: usize, end: usize, keyword: &str) -> Option<usize> {
    let kw = keyword.as_bytes();
    if i + kw.len() > end || !bytes[i..i + kw.len()].eq_ignore_ascii_case(kw) {
        return None;
    }
    if i > start && !matches!(bytes[i - 1], b' ' | b'\t' | b'\n' | b'{' | b'}' | b';') {
        return None;
    }
    let mut j = i + kw.len();
    while j < end && matches!(bytes[j], b' ' | b'\t') {
        j += 1;
    }
    (j < end && bytes[j] == b':').then_some(j)
}

fn header_end(bytes: &[u8], from: usize, end: usize) -> Option<usize> {
    for (offset, b) in bytes[from..end].iter().enumerate() {
        match b {
            b'{' => return Some(from + offset),
            b'}' | b'\n' => return None,
            _ => {}
        }
    }
    None
}

/// Closing brace for the `{` at `open`, counting nesting depth.
pub fn matching_brace(bytes: &[u8], open: usize, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, b) in bytes[open..end].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extent of consecutive `[...]` groups (whitespace allowed between) starting at `from`.
fn option_run(bytes: &[u8], from: usize, end: usize) -> Range<usize> {
    let mut i = from;
    let mut last = from;
    loop {
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= end || bytes[i] != b'[' {
            return from..last;
        }
        match bytes[i..end].iter().position(|b| *b == b']') {
            Some(close) => {
                i += close + 1;
                last = i;
            }
            None => return from..last,
        }
    }
}

/// Contents of each `[...]` group in `s`, in order.
pub fn option_groups(s: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else { break };
        groups.push(after[..close].trim());
        rest = &after[close + 1..];
    }
    groups
}

/// Split a field line's right-hand side into selector and option groups.
///
/// Options are the trailing run of bracket groups that is separated from the
/// selector by whitespace; brackets glued to the selector (`img[data-src]`)
/// belong to the selector.
pub fn split_field_rhs(rhs: &str) -> (&str, Vec<&str>) {
    let s = rhs.trim_end();
    let bytes = s.as_bytes();
    let mut cursor = s.len();
    let mut split = s.len();

    while cursor > 0 && bytes[cursor - 1] == b']' {
        let Some(open) = matching_open_bracket(bytes, cursor - 1) else {
            break;
        };
        if open == 0 || bytes[open - 1].is_ascii_whitespace() {
            split = open;
        }
        cursor = open;
        while cursor > 0 && bytes[cursor - 1].is_ascii_whitespace() {
            cursor -= 1;
        }
    }

    (s[..split].trim(), option_groups(&s[split..]))
}

fn matching_open_bracket(bytes: &[u8], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match bytes[i] {
            b']' => depth += 1,
            b'[' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Lines inside `range` minus the `holes`, with their starting offsets.
pub fn lines_excluding<'a>(
    text: &'a str,
    range: Range<usize>,
    holes: &[Range<usize>],
) -> Vec<(usize, &'a str)> {
    let mut segments = Vec::new();
    let mut cursor = range.start;
    let mut sorted: Vec<&Range<usize>> = holes.iter().collect();
    sorted.sort_by_key(|h| h.start);
    for hole in sorted {
        if hole.start > cursor {
            segments.push(cursor..hole.start);
        }
        cursor = cursor.max(hole.end);
    }
    if cursor < range.end {
        segments.push(cursor..range.end);
    }

    let mut lines = Vec::new();
    for segment in segments {
        let mut offset = segment.start;
        for line in text[segment].split('\n') {
            lines.push((offset, line));
            offset += line.len() + 1;
        }
    }
    lines
}
