//! `---`-delimited metadata blocks at the top of Markdown files.

use anyhow::Context as _;
use serde::de::DeserializeOwned;

const DELIMITER: &str = "---";
const BOM: char = '\u{feff}';

/// Split a leading front-matter block into `(metadata, body)`.
///
/// Returns `None` unless the first line is `---` and a later line closes the
/// block. The metadata excludes both delimiter lines; the body starts right
/// after the closing one.
pub fn split_front_matter(contents: &str) -> Option<(&str, &str)> {
    let text = contents.strip_prefix(BOM).unwrap_or(contents);
    let mut lines = text.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end() != DELIMITER || !first.ends_with('\n') {
        return None;
    }

    let meta_start = first.len();
    let mut offset = meta_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&text[meta_start..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

/// Remove leading front matter. Text without a complete block comes back untouched.
///
/// Back-to-back blocks are all removed so that stripping an already stripped
/// text is a no-op.
pub fn strip_front_matter(contents: &str) -> &str {
    let mut body = contents;
    while let Some((_, rest)) = split_front_matter(body) {
        body = rest;
    }
    body
}

/// Decode the first front-matter block, if any, as YAML.
pub fn parse_front_matter<T: DeserializeOwned>(contents: &str) -> anyhow::Result<Option<T>> {
    let Some((meta, _)) = split_front_matter(contents) else {
        return Ok(None);
    };
    if meta.trim().is_empty() {
        return Ok(None);
    }
    let parsed = serde_yaml::from_str(meta).context("deserialize front matter")?;
    Ok(Some(parsed))
}
