//! Recursive `<Include src="..."/>` resolution for XML UI payloads.
//!
//! Bundling inlines every include directive, wrapping the inlined content in
//! matched marker comments so the transformation can be reversed later. The
//! scanner is hand-written; the grammar is small enough that offsets and
//! byte comparisons beat a regex dependency.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::errors::BundleError;

/// Extension appended to include references that lack it.
const INCLUDE_EXTENSION: &str = ".xml";

/// A located include target: the file itself plus the directory it lives in.
/// The directory becomes the highest-priority root when resolving the file's
/// own includes, so sibling references inside a subfolder stay local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub path: PathBuf,
    pub directory: PathBuf,
}

/// Resolve an include reference against the given search roots.
///
/// The reference is lowercased and gets [`INCLUDE_EXTENSION`] appended when
/// missing. An absolute reference that exists wins outright; otherwise roots
/// are consulted in order and the first existing match is returned. There is
/// no partial matching.
pub fn locate_include(reference: &str, roots: &[PathBuf]) -> Result<Located, BundleError> {
    let mut direct = reference.to_string();
    if !direct.to_lowercase().ends_with(INCLUDE_EXTENSION) {
        direct.push_str(INCLUDE_EXTENSION);
    }
    let direct = Path::new(&direct);
    if direct.is_absolute() && direct.exists() {
        return Ok(Located {
            path: direct.to_path_buf(),
            directory: direct.parent().map(Path::to_path_buf).unwrap_or_default(),
        });
    }

    let file_name = normalize_reference(reference);
    for root in roots {
        let candidate = root.join(&file_name);
        if candidate.exists() {
            let directory = candidate
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone());
            return Ok(Located {
                path: candidate,
                directory,
            });
        }
    }

    Err(BundleError::UnresolvedInclude(file_name))
}

fn normalize_reference(reference: &str) -> String {
    let mut name = reference.to_lowercase();
    if !name.ends_with(INCLUDE_EXTENSION) {
        name.push_str(INCLUDE_EXTENSION);
    }
    name
}

/// Inline every include directive in `xml`, searching `roots` in order.
///
/// Inlined content keeps the directive's indentation on every non-blank line
/// and is wrapped in `<!-- include NAME -->` markers carrying the reference
/// exactly as spelled in the source. A file that is still being resolved on
/// the current branch is a cycle and fails the whole call.
pub fn bundle(xml: &str, roots: &[PathBuf]) -> Result<String, BundleError> {
    resolve(xml, roots, &mut Vec::new())
}

fn resolve(
    xml: &str,
    roots: &[PathBuf],
    resolving: &mut Vec<PathBuf>,
) -> Result<String, BundleError> {
    let mut resolved = xml.to_string();

    // Rescan from the top after every splice; the insertion shifts every
    // offset behind it.
    while let Some(directive) = find_directive(&resolved) {
        let inlined = read_include(&directive.src, roots, resolving)?;
        let indented = indent_block(&inlined, &directive.indent);
        resolved.replace_range(directive.start..directive.end, &indented);
    }

    Ok(resolved)
}

fn read_include(
    src: &str,
    roots: &[PathBuf],
    resolving: &mut Vec<PathBuf>,
) -> Result<String, BundleError> {
    let located = locate_include(src, roots)?;
    let canonical = located
        .path
        .canonicalize()
        .unwrap_or_else(|_| located.path.clone());

    if resolving.contains(&canonical) {
        return Err(BundleError::Cycle {
            path: located.path.clone(),
        });
    }

    let content = fs::read_to_string(&located.path).map_err(|source| BundleError::Io {
        path: located.path.clone(),
        source,
    })?;

    tracing::debug!(path = %located.path.display(), "inlining include");

    let mut nested_roots = Vec::with_capacity(roots.len() + 1);
    nested_roots.push(located.directory.clone());
    nested_roots.extend(roots.iter().cloned());

    resolving.push(canonical);
    let nested = resolve(&content, &nested_roots, resolving);
    resolving.pop();

    let border = format!("<!-- include {src} -->");
    Ok(format!("{border}\n{}\n{border}", nested?))
}

/// Prefix every non-blank line of `block` with `indent`. Blank lines (a bare
/// `\r` counts as blank) stay untouched so no trailing whitespace appears.
fn indent_block(block: &str, indent: &str) -> String {
    if indent.is_empty() {
        return block.to_string();
    }

    block
        .split('\n')
        .map(|line| {
            if line.trim_end_matches('\r').is_empty() {
                line.to_string()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A matched include directive: the byte span it occupies (indentation
/// included), its leading indentation, and the `src` value as spelled.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    start: usize,
    end: usize,
    indent: String,
    src: String,
}

/// Find the first include directive, scanning line by line from the top.
/// Directives are only recognized at the start of a line after optional
/// indentation; the match ends at the closing `/>`.
fn find_directive(text: &str) -> Option<Directive> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(directive) = match_directive_line(line, offset) {
            return Some(directive);
        }
        offset += line.len();
    }
    None
}

fn match_directive_line(line: &str, line_start: usize) -> Option<Directive> {
    let bytes = line.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    let indent_end = pos;

    if !eat_ci(bytes, &mut pos, b"<include") {
        return None;
    }
    if eat_spaces(bytes, &mut pos) == 0 {
        return None;
    }
    if !eat_ci(bytes, &mut pos, b"src") {
        return None;
    }
    eat_spaces(bytes, &mut pos);
    if pos >= bytes.len() || bytes[pos] != b'=' {
        return None;
    }
    pos += 1;
    eat_spaces(bytes, &mut pos);

    let quote = *bytes.get(pos)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    pos += 1;

    let value_start = pos;
    while pos < bytes.len() && bytes[pos] != quote {
        pos += 1;
    }
    if pos >= bytes.len() || pos == value_start {
        return None;
    }
    let value_end = pos;
    pos += 1;

    eat_spaces(bytes, &mut pos);
    if !eat_ci(bytes, &mut pos, b"/>") {
        return None;
    }

    Some(Directive {
        start: line_start,
        end: line_start + pos,
        indent: line[..indent_end].to_string(),
        src: line[value_start..value_end].to_string(),
    })
}

fn eat_ci(bytes: &[u8], pos: &mut usize, token: &[u8]) -> bool {
    let end = *pos + token.len();
    if bytes.len() >= end && bytes[*pos..end].eq_ignore_ascii_case(token) {
        *pos = end;
        true
    } else {
        false
    }
}

fn eat_spaces(bytes: &[u8], pos: &mut usize) -> usize {
    let before = *pos;
    while *pos < bytes.len() && (bytes[*pos] == b' ' || bytes[*pos] == b'\t') {
        *pos += 1;
    }
    *pos - before
}
