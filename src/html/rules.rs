//! Tag and Attribute Rules
//!
//! Parses the compact directive string that decides which tags and
//! attributes survive filtering:
//!
//! ```text
//! dt=script,style;da=onclick;encoding=internal
//! ```
//!
//! | Directive  | Effect                                   |
//! |------------|------------------------------------------|
//! | `dt`       | deny tags (`html` also denies `/html`)   |
//! | `da`       | deny attributes                          |
//! | `at`       | allow only these tags                    |
//! | `aa`       | allow only these attributes              |
//! | `encoding` | `internal` remaps output bytes           |
//!
//! Names and values are case-insensitive. Unknown directives are ignored.

use log::debug;
use std::collections::HashSet;

/// Parsed tag/attribute allow and deny sets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterRules {
    tags_denied: HashSet<String>,
    tags_allowed: HashSet<String>,
    attrs_denied: HashSet<String>,
    attrs_allowed: HashSet<String>,
    convert_to_internal_encoding: bool,
}

impl FilterRules {
    /// Parse a directive string into a fresh rule set
    pub fn parse(spec: &str) -> Self {
        let mut rules = Self::default();
        rules.set_filter(spec);
        rules
    }

    /// Replace the current rules with those in `spec`.
    ///
    /// Returns true if at least one tag or attribute rule was configured. An
    /// encoding-only spec returns false.
    pub fn set_filter(&mut self, spec: &str) -> bool {
        self.tags_denied.clear();
        self.tags_allowed.clear();
        self.attrs_denied.clear();
        self.attrs_allowed.clear();
        self.convert_to_internal_encoding = false;

        for directive in spec.split(';') {
            let Some((name, values)) = directive.split_once('=') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }

            for value in values.split(',') {
                let value = value.trim().to_ascii_lowercase();
                if value.is_empty() {
                    continue;
                }
                debug!("HtmlFilter: directive {}:{}", name, value);

                match name.as_str() {
                    "dt" => {
                        // <html> and </html> are removed as a pair
                        if value == "html" {
                            self.tags_denied.insert("/html".to_string());
                        }
                        self.tags_denied.insert(value);
                    }
                    "da" => {
                        self.attrs_denied.insert(value);
                    }
                    "at" => {
                        self.tags_allowed.insert(value);
                    }
                    "aa" => {
                        self.attrs_allowed.insert(value);
                    }
                    "encoding" if value == "internal" => {
                        self.convert_to_internal_encoding = true;
                    }
                    _ => {}
                }
            }
        }

        let filter_count = self.filter_count();
        debug!("HtmlFilter: filter count is {}", filter_count);
        if self.convert_to_internal_encoding {
            debug!("HtmlFilter: converting response to internal encoding");
        }

        filter_count > 0
    }

    /// Total number of tag and attribute rules
    pub fn filter_count(&self) -> usize {
        self.tags_denied.len()
            + self.tags_allowed.len()
            + self.attrs_denied.len()
            + self.attrs_allowed.len()
    }

    /// Whether any attribute rule is configured
    pub fn filters_attributes(&self) -> bool {
        !self.attrs_allowed.is_empty() || !self.attrs_denied.is_empty()
    }

    /// Whether output is remapped to the internal encoding
    pub fn converts_to_internal_encoding(&self) -> bool {
        self.convert_to_internal_encoding
    }

    /// Whether running the engine changes anything at all
    pub fn is_active(&self) -> bool {
        self.filter_count() > 0 || self.convert_to_internal_encoding
    }

    /// Check a lower-cased tag name, with a leading `/` for closing tags.
    ///
    /// Deny rules match the name literally. Allow rules match closing tags by
    /// the name they close, so `at=p` keeps both `<p>` and `</p>`.
    pub fn tag_permitted(&self, tag: &str) -> bool {
        if self.tags_denied.contains(tag) {
            return false;
        }
        if self.tags_allowed.is_empty() {
            return true;
        }
        // Not a literal `/name` lookup: an allowed element keeps its closing tag
        let name = tag.strip_prefix('/').unwrap_or(tag);
        self.tags_allowed.contains(name)
    }

    /// Check a lower-cased attribute name
    pub fn attr_permitted(&self, attr: &str) -> bool {
        if self.attrs_denied.contains(attr) {
            return false;
        }
        self.attrs_allowed.is_empty() || self.attrs_allowed.contains(attr)
    }
}
