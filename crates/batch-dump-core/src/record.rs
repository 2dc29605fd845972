//! Per-sample record assembly.
//!
//! A record is one tab-separated line:
//!
//! ```text
//! <line_id_prefix>\t<header>:v1:v2...\t<header>:v1...[\t<line_id_suffix>]
//! ```
//!
//! The header is `name:count` by default, or the part of the name before
//! its first `.` in the short-header layout.

use std::borrow::Cow;

use crate::format::format_range;
use crate::tensor::TensorData;

/// A line identifier split into the record key and deferred metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineId<'a> {
    pub prefix: &'a str,
    pub suffix: Option<&'a str>,
}

impl<'a> LineId<'a> {
    /// Split at the first space when line ids carry extension metadata.
    ///
    /// ```
    /// use batch_dump_core::record::LineId;
    ///
    /// let id = LineId::split("ins_7 day=3 src=a", true);
    /// assert_eq!(id.prefix, "ins_7");
    /// assert_eq!(id.suffix, Some("day=3 src=a"));
    ///
    /// let id = LineId::split("ins_7 day=3", false);
    /// assert_eq!(id.prefix, "ins_7 day=3");
    /// assert_eq!(id.suffix, None);
    /// ```
    pub fn split(line_id: &'a str, have_extend_info: bool) -> Self {
        if have_extend_info {
            if let Some((prefix, suffix)) = line_id.split_once(' ') {
                return Self {
                    prefix,
                    suffix: Some(suffix),
                };
            }
        }
        Self {
            prefix: line_id,
            suffix: None,
        }
    }
}

/// Header written before a field's values.
pub fn field_header(name: &str, count: i64, short_header: bool) -> Cow<'_, str> {
    if short_header {
        match name.split_once('.') {
            Some((head, _)) => Cow::Borrowed(head),
            None => Cow::Borrowed(name),
        }
    } else {
        Cow::Owned(format!("{}:{}", name, count))
    }
}

/// Text of one sample's record, built field by field.
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    text: String,
    fields: usize,
}

impl RecordBuffer {
    pub fn new(seed: &str) -> Self {
        Self {
            text: seed.to_string(),
            fields: 0,
        }
    }

    /// Append `\t<header>` and the values in `[start, end)`.
    pub fn push_field(
        &mut self,
        name: &str,
        data: &TensorData,
        start: i64,
        end: i64,
        short_header: bool,
    ) {
        self.text.push('\t');
        self.text
            .push_str(&field_header(name, end - start, short_header));
        format_range(data, start, end, &mut self.text);
        self.fields += 1;
    }

    pub fn field_count(&self) -> usize {
        self.fields
    }

    /// Finished line, or `None` when no field was appended.
    pub fn finish(mut self, suffix: Option<&str>) -> Option<String> {
        if self.fields == 0 {
            return None;
        }
        if let Some(suffix) = suffix {
            self.text.push('\t');
            self.text.push_str(suffix);
        }
        Some(self.text)
    }
}
