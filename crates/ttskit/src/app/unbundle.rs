//! Recovery of include structure from bundled marker comments.
//!
//! The inverse of [`bundle`](crate::app::bundle): marker-delimited regions
//! are either collapsed back into a single include directive (root recovery)
//! or extracted, at every nesting depth, into a flat name-to-content map of
//! the original module sources.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::domain::errors::UnbundleError;

const BORDER_OPEN: &str = "<!-- include ";
const BORDER_CLOSE: &str = " -->";

/// Result of a full unbundle pass: the root document with its outermost
/// regions collapsed back to directives, plus every included module keyed by
/// the include name recorded in its markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbundledXml {
    pub root: String,
    pub modules: BTreeMap<String, String>,
}

/// A marker-delimited span of bundled text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    /// Include name recorded in both markers.
    name: String,
    /// First byte of the opening marker.
    start: usize,
    /// One past the last byte of the closing marker.
    end: usize,
    /// Indentation of the line carrying the opening marker.
    indent: String,
    /// Raw text between the markers, still indented and still bundled.
    inner: String,
}

/// Collapse every outermost bundled region back to its include directive.
///
/// Text without markers is returned unchanged, so the function is idempotent
/// on already-unbundled input. Markers without an identical closing twin are
/// left alone.
pub fn unbundle_root(bundled: &str) -> String {
    let regions = find_regions(bundled);
    if regions.is_empty() {
        return bundled.to_string();
    }

    let mut result = String::with_capacity(bundled.len());
    let mut cursor = 0;
    for region in &regions {
        result.push_str(&bundled[cursor..region.start]);
        let _ = write!(result, "<Include src=\"{}\" />", region.name);
        cursor = region.end;
    }
    result.push_str(&bundled[cursor..]);
    result
}

/// Collapse the root document and recursively extract every bundled module,
/// de-indented back to its original source form.
///
/// Two regions may share a name only when they carry identical content;
/// anything else is a conflict and fails the call rather than silently
/// keeping one of the versions.
pub fn unbundle(bundled: &str) -> Result<UnbundledXml, UnbundleError> {
    let mut modules = BTreeMap::new();
    collect_modules(bundled, &mut modules)?;

    Ok(UnbundledXml {
        root: unbundle_root(bundled),
        modules,
    })
}

fn collect_modules(
    text: &str,
    modules: &mut BTreeMap<String, String>,
) -> Result<(), UnbundleError> {
    for region in find_regions(text) {
        let content = module_content(&region);
        match modules.get(&region.name) {
            Some(existing) if existing != &content => {
                return Err(UnbundleError::ConflictingInclude { name: region.name });
            }
            Some(_) => {}
            None => {
                modules.insert(region.name.clone(), content);
            }
        }

        // Nested regions are located in the raw inner text, where their
        // compound indentation is still intact.
        collect_modules(&region.inner, modules)?;
    }
    Ok(())
}

/// Recover a region's original module source: strip the line breaks the
/// bundler added around the content, remove the region's indentation from
/// every line that carries it, and collapse direct nested regions back to
/// directives.
fn module_content(region: &Region) -> String {
    let mut inner = region.inner.as_str();

    if let Some(stripped) = inner.strip_prefix("\r\n") {
        inner = stripped;
    } else if let Some(stripped) = inner.strip_prefix('\n') {
        inner = stripped;
    }

    if !region.indent.is_empty()
        && let Some(stripped) = inner.strip_suffix(region.indent.as_str())
    {
        inner = stripped;
    }
    if let Some(stripped) = inner.strip_suffix("\r\n") {
        inner = stripped;
    } else if let Some(stripped) = inner.strip_suffix('\n') {
        inner = stripped;
    }

    let deindented = if region.indent.is_empty() {
        inner.to_string()
    } else {
        inner
            .split('\n')
            .map(|line| line.strip_prefix(region.indent.as_str()).unwrap_or(line))
            .collect::<Vec<_>>()
            .join("\n")
    };

    unbundle_root(&deindented)
}

/// Find every outermost region, scanning left to right. Regions never
/// overlap; scanning resumes after each closing marker, so nested markers
/// are swallowed by their enclosing region.
fn find_regions(text: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(BORDER_OPEN) {
        let open_start = cursor + found;
        let after_open = open_start + BORDER_OPEN.len();

        let Some(name_len) = text[after_open..].find(BORDER_CLOSE) else {
            break;
        };
        let name = &text[after_open..after_open + name_len];
        if name.contains('\n') {
            cursor = after_open;
            continue;
        }

        let border = &text[open_start..after_open + name_len + BORDER_CLOSE.len()];
        let open_end = open_start + border.len();

        match text[open_end..].find(border) {
            Some(close_offset) => {
                let close_start = open_end + close_offset;
                let end = close_start + border.len();
                regions.push(Region {
                    name: name.to_string(),
                    start: open_start,
                    end,
                    indent: line_indent(text, open_start),
                    inner: text[open_end..close_start].to_string(),
                });
                cursor = end;
            }
            None => {
                // Unmatched marker; leave it alone and keep scanning.
                cursor = open_end;
            }
        }
    }

    regions
}

/// Whitespace between the start of the marker's line and the marker itself.
/// A marker preceded by anything but indentation has no indent of its own.
fn line_indent(text: &str, marker_start: usize) -> String {
    let line_start = text[..marker_start]
        .rfind('\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let prefix = &text[line_start..marker_start];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix.to_string()
    } else {
        String::new()
    }
}
