// src/ops/identifier.rs

use crate::error::{IiifError, Result};
use crate::geometry::ScaleConstraint;
use std::fmt;

pub const DEFAULT_DELIMITER: &str = ";";

/// Source identifier plus the page and scale constraint a URI may encode
/// alongside it, e.g. `folio.tif;3;1:2`.
///
/// Page numbers are 1-based; page 1 and a 1:1 constraint are the defaults
/// and are omitted from the serialized form.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MetaIdentifier {
    identifier: String,
    page_number: Option<u32>,
    scale_constraint: Option<ScaleConstraint>,
}

impl MetaIdentifier {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            page_number: None,
            scale_constraint: None,
        }
    }

    pub fn with_page_number(mut self, page: u32) -> Result<Self> {
        if page == 0 {
            return Err(IiifError::invalid_argument(
                "page number",
                "0",
                "page numbers start at 1",
            ));
        }
        self.page_number = Some(page);
        Ok(self)
    }

    pub fn with_scale_constraint(mut self, sc: ScaleConstraint) -> Self {
        self.scale_constraint = Some(sc);
        self
    }

    /// Decodes a percent-encoded URI path segment.
    ///
    /// Components are peeled off the right: a trailing `n:d` is a scale
    /// constraint, then a trailing integer is a page number. Anything else
    /// belongs to the identifier, so identifiers may contain the delimiter.
    pub fn from_uri(segment: &str, delimiter: &str) -> Result<Self> {
        let decoded = percent_decode(segment)?;
        Self::parse(&decoded, delimiter)
    }

    pub fn parse(value: &str, delimiter: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(IiifError::invalid_argument(
                "identifier",
                "",
                "must not be empty",
            ));
        }
        if delimiter.is_empty() {
            return Ok(Self::new(value));
        }

        let mut parts: Vec<&str> = value.split(delimiter).collect();
        let mut meta = Self::default();

        if parts.len() > 1 {
            if let Some(last) = parts.last() {
                if is_ratio(last) {
                    meta.scale_constraint = Some(ScaleConstraint::parse(last)?);
                    parts.pop();
                }
            }
        }
        if parts.len() > 1 {
            if let Some(last) = parts.last() {
                if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
                    let page: u32 = last.parse().map_err(|_| {
                        IiifError::invalid_argument(
                            "page number",
                            last.to_string(),
                            "is not a valid page number",
                        )
                    })?;
                    meta = meta.with_page_number(page)?;
                    parts.pop();
                }
            }
        }

        meta.identifier = parts.join(delimiter);
        if meta.identifier.is_empty() {
            return Err(IiifError::invalid_argument(
                "identifier",
                value.to_string(),
                "must not be empty",
            ));
        }
        Ok(meta)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    /// Zero-based page index for decoders.
    pub fn page_index(&self) -> usize {
        self.page_number.map(|p| p as usize - 1).unwrap_or(0)
    }

    pub fn scale_constraint(&self) -> ScaleConstraint {
        self.scale_constraint.unwrap_or_default()
    }

    /// Serializes with `delimiter`, omitting default components.
    pub fn to_uri_string(&self, delimiter: &str) -> String {
        let mut out = self.identifier.clone();
        if let Some(page) = self.page_number.filter(|p| *p > 1) {
            out.push_str(delimiter);
            out.push_str(&page.to_string());
        }
        if let Some(sc) = self.scale_constraint.filter(|sc| sc.has_effect()) {
            out.push_str(delimiter);
            out.push_str(&sc.to_string());
        }
        out
    }
}

impl fmt::Display for MetaIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_string(DEFAULT_DELIMITER))
    }
}

fn is_ratio(s: &str) -> bool {
    match s.split_once(':') {
        Some((n, d)) => {
            !n.is_empty()
                && !d.is_empty()
                && n.bytes().all(|b| b.is_ascii_digit())
                && d.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// `%XX` decoding of a URI path segment. `+` is left alone since it is
/// literal in paths.
pub fn percent_decode(segment: &str) -> Result<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(b) => {
                    out.push(b);
                    i += 3;
                    continue;
                }
                None => {
                    return Err(IiifError::invalid_argument(
                        "identifier",
                        segment.to_string(),
                        "contains a malformed percent escape",
                    ))
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|_| {
        IiifError::invalid_argument(
            "identifier",
            segment.to_string(),
            "is not valid UTF-8 after percent decoding",
        )
    })
}
