//! Version 3 source maps for bundles.
//!
//! Mappings are statement level: one segment per emitted top-level
//! statement, pointing at the statement's start in its module.

use serde::Serialize;

const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append the base64 VLQ encoding of `value` to `out`.
pub fn vlq_encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & 0x1f;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0x20;
        }
        out.push(B64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// One mapping segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    pub gen_line: u32,
    pub gen_col: u32,
    pub source: u32,
    pub src_line: u32,
    pub src_col: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

/// Collects sources and segments, then renders the map as JSON.
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<String>,
    segments: Vec<Segment>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its index.
    pub fn add_source(&mut self, path: &str, content: &str) -> u32 {
        let idx = self.sources.len() as u32;
        self.sources.push(path.to_string());
        self.sources_content.push(content.to_string());
        idx
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The `mappings` field.
    #[must_use]
    pub fn mappings(&self) -> String {
        let mut sorted = self.segments.clone();
        sorted.sort_unstable();

        let mut out = String::new();
        let mut line = 0;
        let mut prev_col: i64 = 0;
        let mut prev_source: i64 = 0;
        let mut prev_src_line: i64 = 0;
        let mut prev_src_col: i64 = 0;
        let mut first_on_line = true;

        for segment in &sorted {
            while line < segment.gen_line {
                out.push(';');
                line += 1;
                prev_col = 0;
                first_on_line = true;
            }
            if !first_on_line {
                out.push(',');
            }
            first_on_line = false;

            vlq_encode(i64::from(segment.gen_col) - prev_col, &mut out);
            vlq_encode(i64::from(segment.source) - prev_source, &mut out);
            vlq_encode(i64::from(segment.src_line) - prev_src_line, &mut out);
            vlq_encode(i64::from(segment.src_col) - prev_src_col, &mut out);

            prev_col = i64::from(segment.gen_col);
            prev_source = i64::from(segment.source);
            prev_src_line = i64::from(segment.src_line);
            prev_src_col = i64::from(segment.src_col);
        }
        out
    }

    /// Render the map for the bundle named `file`.
    pub fn generate(&self, file: &str) -> serde_json::Result<String> {
        serde_json::to_string(&RawSourceMap {
            version: 3,
            file,
            sources: &self.sources,
            sources_content: &self.sources_content,
            names: [],
            mappings: self.mappings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut out = String::new();
        vlq_encode(value, &mut out);
        out
    }

    #[test]
    fn test_vlq_encode() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-16), "hB");
    }

    #[test]
    fn test_mappings_skip_lines_and_join_segments() {
        let mut builder = SourceMapBuilder::new();
        let a = builder.add_source("a.js", "a();\nb();");
        builder.add_segment(Segment {
            gen_line: 0,
            gen_col: 0,
            source: a,
            src_line: 0,
            src_col: 0,
        });
        builder.add_segment(Segment {
            gen_line: 0,
            gen_col: 4,
            source: a,
            src_line: 1,
            src_col: 0,
        });
        builder.add_segment(Segment {
            gen_line: 2,
            gen_col: 2,
            source: a,
            src_line: 1,
            src_col: 2,
        });
        assert_eq!(builder.mappings(), "AAAA,IACA;;EAAE");
    }

    #[test]
    fn test_generate_json() {
        let mut builder = SourceMapBuilder::new();
        let idx = builder.add_source("src/\"q\".js", "let a = 1;");
        builder.add_segment(Segment {
            gen_line: 0,
            gen_col: 0,
            source: idx,
            src_line: 0,
            src_col: 0,
        });
        let json = builder.generate("out.js").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["file"], "out.js");
        assert_eq!(value["sources"][0], "src/\"q\".js");
        assert_eq!(value["sourcesContent"][0], "let a = 1;");
        assert_eq!(value["mappings"], "AAAA");
        assert!(value["names"].as_array().unwrap().is_empty());
    }
}
