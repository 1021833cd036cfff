//! Streaming HTML Filter Engine
//!
//! CRITICAL: Rewrites each chunk IN PLACE in a single left-to-right pass.
//! The write cursor never passes the read cursor, so no output buffer is
//! allocated. Output must not depend on where the network split the
//! document: a tag or attribute name that straddles a chunk boundary is
//! withheld in the carryover buffer and spliced in front of the next chunk,
//! where scanning resumes right after it.
//!
//! Per chunk the engine:
//! - Drops denied tags (and the content of denied non-void tags up to the
//!   matching closing tag)
//! - Drops denied attributes together with their values
//! - Collapses runs of whitespace and drops bytes outside 0x20..=0x7C,
//!   except inside `<pre>`
//! - Optionally remaps the result to the internal encoding
//!
//! This is not an HTML parser. Malformed input degrades to partially
//! filtered output; there is no error path.

use log::debug;
use std::sync::Arc;

use super::encoding::convert_to_internal;
use super::rules::FilterRules;
use crate::streaming::{Carryover, Stop};

/// Tags that never have content to skip, with or without a trailing `/`
const VOID_TAGS: &[&str] = &["!doctype", "meta", "link", "img", "br", "html", "/html", "!--"];

/// Upper bound on `" />"` collapses after a single dispatch
const MAX_SLASH_TRIMS: usize = 5;

/// Comment sniffing stops once the token holds `<!--` plus one byte
const COMMENT_SNIFF_LEN: usize = 5;

/// Scan context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Document text between tags
    Text,
    /// Reading a tag name after `<`
    TagName,
    /// Reading an attribute name inside a kept tag
    AttrName,
    /// Skipping spaces between `=` and an attribute value
    FindAttrValStop,
    /// Reading an attribute value
    AttrVal,
    /// Discarding the rest of a suppressed tag up to its `>`
    SkipToTagEnd,
}

/// Outcome of handling a stop byte
enum Step {
    /// Still inside the same token; no trailing cleanup
    Pending,
    /// The mode settled
    Settled,
}

/// Read/write positions for one chunk
struct Cursor {
    /// Next output position
    dest: usize,
    /// Output position where the current token began
    start: Option<usize>,
}

impl Cursor {
    /// Bytes written since the token began. Without a token start there is
    /// nothing to measure, which reads as longer than any sniffed prefix.
    fn token_len(&self) -> usize {
        self.start.map_or(usize::MAX, |start| self.dest.saturating_sub(start))
    }

    /// Discard everything written since the token began
    fn rollback(&mut self) {
        if let Some(start) = self.start.take() {
            self.dest = start;
        }
    }

    fn write(&mut self, buf: &mut [u8], byte: u8) {
        buf[self.dest] = byte;
        self.dest += 1;
    }
}

/// Per-document streaming HTML filter
pub struct HtmlFilter {
    rules: Arc<FilterRules>,
    carryover: Carryover,

    mode: Mode,
    stop: Stop,
    /// Closing tag (`/name`) that ends the current suppressed region
    skip_tag: String,
    tag: String,
    attr: String,
    skip_char: bool,
    in_pre: bool,
    self_closing_tag: bool,
    /// Last text byte written, used to collapse spaces
    prev_char: u8,
    /// Last byte emitted by an earlier chunk of this document
    last_emitted: Option<u8>,
    /// Bytes emitted by earlier chunks of this document
    emitted: usize,
    filter_attributes: bool,
}

impl HtmlFilter {
    /// Create an engine with no rules and the given carryover capacity
    pub fn new(carryover_capacity: usize) -> Self {
        Self::with_rules(Arc::new(FilterRules::default()), carryover_capacity)
    }

    /// Create an engine sharing an already parsed rule set
    pub fn with_rules(rules: Arc<FilterRules>, carryover_capacity: usize) -> Self {
        let mut filter = Self {
            rules,
            carryover: Carryover::new(carryover_capacity),
            mode: Mode::Text,
            stop: Stop::TEXT,
            skip_tag: String::new(),
            tag: String::new(),
            attr: String::new(),
            skip_char: false,
            in_pre: false,
            self_closing_tag: false,
            prev_char: b' ',
            last_emitted: None,
            emitted: 0,
            filter_attributes: false,
        };
        filter.reset_state();
        filter
    }

    /// Parse `spec` and install it as the active rule set.
    /// Returns true if any tag or attribute rule was configured.
    pub fn set_filter(&mut self, spec: &str) -> bool {
        let mut rules = FilterRules::default();
        let any = rules.set_filter(spec);
        self.rules = Arc::new(rules);
        any
    }

    /// Current scan context
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of bytes withheld for the next chunk
    pub fn pending_carryover(&self) -> usize {
        self.carryover.len()
    }

    /// Start a new document. Must be called before its first chunk.
    ///
    /// The carryover is left alone; use [`HtmlFilter::discard_carryover`]
    /// when switching to an unrelated stream.
    pub fn reset_state(&mut self) {
        self.mode = Mode::Text;
        self.stop = Stop::TEXT;
        self.prev_char = b' ';
        self.last_emitted = None;
        self.emitted = 0;
        self.skip_tag.clear();
        self.tag.clear();
        self.attr.clear();
        self.skip_char = false;
        self.in_pre = false;
        self.self_closing_tag = false;
        self.filter_attributes = self.rules.filters_attributes();
    }

    /// Drop any withheld token bytes. Returns how many were dropped.
    pub fn discard_carryover(&mut self) -> usize {
        self.carryover.clear()
    }

    /// Filter one chunk in place and return its new length.
    ///
    /// Bytes withheld from the previous chunk are spliced in front of
    /// `buffer` first, and the tail of an unfinished tag or attribute name is
    /// withheld from this one. `buffer` is truncated to the returned length.
    /// An empty chunk is a no-op.
    pub fn filter_chunk(&mut self, buffer: &mut Vec<u8>) -> usize {
        if buffer.is_empty() {
            return 0;
        }

        let mut cur = Cursor { dest: 0, start: None };
        if !self.carryover.is_empty() {
            cur.dest = self.carryover.prepend_to(buffer);
            cur.start = Some(0);
        } else if matches!(self.mode, Mode::TagName | Mode::AttrName) {
            cur.start = Some(0);
        }

        let buf = buffer.as_mut_slice();
        for i in cur.dest..buf.len() {
            let mut c = buf[i];

            if !self.in_pre && matches!(c, 0x0C | b'\n' | 0x08) {
                c = b' ';
            }

            if !self.skip_char && (self.in_pre || self.is_emittable(c, buf, cur.dest)) {
                cur.write(buf, c);
                if self.mode == Mode::Text && c != b'<' && c != b'>' {
                    self.prev_char = c;
                }
            }

            if !self.stop.matches(c) {
                continue;
            }

            if let Step::Settled = self.on_stop_byte(buf, c, &mut cur) {
                if self.mode != Mode::AttrVal {
                    trim_self_closing_space(buf, &mut cur.dest, self.emitted);
                }
            }
        }

        if let Some(start) = cur.start {
            if self.carryover.is_enabled() && matches!(self.mode, Mode::TagName | Mode::AttrName) {
                self.carryover.store(&buf[start..cur.dest]);
                cur.dest = start;
            }
        }

        if cur.dest > 0 {
            self.last_emitted = Some(buf[cur.dest - 1]);
        }
        self.emitted += cur.dest;

        buffer.truncate(cur.dest);
        if self.rules.converts_to_internal_encoding() {
            convert_to_internal(buffer);
        }
        cur.dest
    }

    /// Printable and not a redundant space
    #[inline]
    fn is_emittable(&self, c: u8, buf: &[u8], dest: usize) -> bool {
        if !(0x20..=0x7C).contains(&c) {
            return false;
        }
        if c != b' ' || self.prev_char != b' ' {
            return true;
        }
        // Inside markup a space is kept unless it follows a space or `>`,
        // including one that went out with an earlier chunk
        let prev = if dest > 0 {
            Some(buf[dest - 1])
        } else {
            self.last_emitted
        };
        self.mode != Mode::Text && !matches!(prev, Some(b' ' | b'>'))
    }

    fn on_stop_byte(&mut self, buf: &mut [u8], mut c: u8, cur: &mut Cursor) -> Step {
        let after_slash = self.stop == Stop::Any;

        if let Stop::Comment(expected) = self.stop {
            if cur.token_len() < COMMENT_SNIFF_LEN {
                if c == expected {
                    self.stop = Stop::Comment(b'-');
                    return Step::Pending;
                }
                self.stop = Stop::Either(b'>', b' ');
                if c != b'>' && c != b' ' {
                    return Step::Pending;
                }
            } else {
                // `<!--` matched: end the name here so it reads as the tag `!--`
                c = b' ';
            }
        }

        self.stop = Stop::TEXT;

        match self.mode {
            Mode::Text => {
                self.mode = Mode::TagName;
                self.stop = Stop::Comment(b'!');

                // A suppressed `<` still opens a tag that may end the suppression
                if self.skip_char {
                    cur.write(buf, c);
                }
                self.skip_char = false;
                cur.start = Some(cur.dest.saturating_sub(1));
            }
            Mode::TagName => self.finish_tag_name(buf, c, cur),
            Mode::SkipToTagEnd => {
                if !self.self_closing_tag {
                    if c == b'/' {
                        self.stop = Stop::Any;
                        return Step::Pending;
                    }
                    if after_slash {
                        if c == b'>' {
                            self.self_closing_tag = true;
                        } else {
                            self.stop = Stop::Either(b'>', b'/');
                            return Step::Pending;
                        }
                    }
                }

                if !self.self_closing_tag && self.skip_tag.is_empty() {
                    self.set_skip_tag();
                }
                self.skip_char = !self.skip_tag.is_empty();
                self.mode = Mode::Text;
            }
            Mode::AttrName => {
                let start = cur.start.unwrap_or(0);
                if c == b'=' && cur.dest > start + 1 {
                    self.attr.clear();
                    self.attr.extend(
                        buf[start..cur.dest - 1]
                            .trim_ascii()
                            .iter()
                            .map(|&b| char::from(b.to_ascii_lowercase())),
                    );

                    if !self.rules.attr_permitted(&self.attr) {
                        debug!("HtmlFilter: removing attribute {}", self.attr);
                        cur.rollback();
                        self.skip_char = true;
                    }

                    self.mode = Mode::FindAttrValStop;
                    self.stop = Stop::Any;
                } else {
                    self.mode = Mode::Text;
                }
            }
            Mode::FindAttrValStop => match c {
                b' ' => {
                    self.stop = Stop::Any;
                    return Step::Pending;
                }
                b'>' => self.finish_attr_value(buf, c, cur),
                _ => {
                    self.mode = Mode::AttrVal;
                    let quote = if c == b'"' || c == b'\'' { c } else { b' ' };
                    self.stop = Stop::Either(quote, b'>');
                }
            },
            Mode::AttrVal => self.finish_attr_value(buf, c, cur),
        }

        Step::Settled
    }

    fn finish_tag_name(&mut self, buf: &[u8], c: u8, cur: &mut Cursor) {
        // The token is `<name` followed by its terminator
        let start = cur.start.unwrap_or(0);
        let end = cur.dest.saturating_sub(1);
        let name_start = (start + 1).min(end);
        self.tag.clear();
        self.tag.extend(
            buf[name_start..end]
                .iter()
                .map(|&b| char::from(b.to_ascii_lowercase())),
        );

        self.in_pre = self.tag == "pre";

        if !self.skip_tag.is_empty() {
            if self.skip_tag == self.tag {
                self.skip_tag.clear();
                self.skip_char = false;
                self.self_closing_tag = true;
            } else {
                self.skip_char = true;
            }

            // Nothing inside a suppressed region is written
            cur.rollback();

            if c == b' ' {
                self.mode = Mode::SkipToTagEnd;
                self.skip_char = true;
                self.stop = Stop::Either(b'>', b'/');
            } else {
                self.mode = Mode::Text;
            }
            return;
        }

        if self.tag.is_empty() {
            return;
        }

        self.self_closing_tag = false;
        if self.tag.ends_with('/') {
            self.tag.pop();
            self.self_closing_tag = true;
        }

        if !self.rules.tag_permitted(&self.tag) {
            debug!("HtmlFilter: removing tag <{}>", self.tag);
            cur.rollback();

            // A denied closing tag has no content to skip; skipping up to
            // `//name` would hide the rest of the document
            if self.tag.starts_with('/') || VOID_TAGS.contains(&self.tag.as_str()) {
                self.self_closing_tag = true;
            }

            if c == b' ' {
                // Not at `>` yet: find the end, watching for `/>`
                self.mode = Mode::SkipToTagEnd;
                self.skip_char = true;
                self.stop = if self.self_closing_tag {
                    Stop::Byte(b'>')
                } else {
                    Stop::Either(b'>', b'/')
                };
            } else {
                self.mode = Mode::Text;
                if !self.self_closing_tag {
                    self.set_skip_tag();
                }
                self.skip_char = !self.self_closing_tag;
            }
        } else if self.filter_attributes && c == b' ' {
            self.mode = Mode::AttrName;
            self.stop = Stop::Either(b'=', b'>');
            cur.start = Some(cur.dest.saturating_sub(1));
        } else {
            self.mode = Mode::Text;
        }
    }

    fn finish_attr_value(&mut self, buf: &mut [u8], c: u8, cur: &mut Cursor) {
        let skipped = self.skip_char;
        if skipped {
            self.skip_char = false;
            // The tag's `>` was dropped along with the value
            if c == b'>' {
                cur.write(buf, c);
            }
        }

        if c != b'>' {
            self.mode = Mode::AttrName;
            self.stop = Stop::Either(b'=', b'>');
            // A space ending an unquoted value belongs to the next name, so a
            // trailing `" />"` is withheld as one token
            let space_written = !skipped && cur.dest > 0 && buf[cur.dest - 1] == b' ';
            cur.start = Some(if c == b' ' && space_written {
                cur.dest - 1
            } else {
                cur.dest
            });
        } else {
            self.mode = Mode::Text;
        }
    }

    fn set_skip_tag(&mut self) {
        self.skip_tag.clear();
        self.skip_tag.push('/');
        self.skip_tag.push_str(&self.tag);
    }
}

/// Collapse `" />"` at the end of the output to `"/>"`.
///
/// `emitted` counts document bytes already sent with earlier chunks, so the
/// pattern must not open the document whatever the chunking.
fn trim_self_closing_space(buf: &mut [u8], dest: &mut usize, emitted: usize) {
    for _ in 0..MAX_SLASH_TRIMS {
        if *dest >= 3 && emitted + *dest > 3 && &buf[*dest - 3..*dest] == b" />" {
            buf[*dest - 3] = b'/';
            buf[*dest - 2] = b'>';
            *dest -= 1;
        } else {
            break;
        }
    }
}
