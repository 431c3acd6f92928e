//! Localization resources (`.properties` files).
//!
//! Views, dashboards and reports each ship per-locale property files. On
//! export they are merged into one shared file per locale under the
//! category's `resources/` directory; on import each archive carries only
//! the entries whose key belongs to it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

/// Append every regular file in `src_dir` to the same-named file in `dest_dir`.
///
/// A newline is appended after a source whose last byte is not `\n`, so two
/// merged files are never glued onto one line. Empty sources add nothing.
///
/// Nothing here is fatal: a missing source is a no-op, and unreadable
/// sources, unwritable destinations or per-file failures are logged and
/// skipped.
pub fn merge_resources(src_dir: &Path, dest_dir: &Path) {
    if !src_dir.exists() {
        return;
    }

    let entries = match fs::read_dir(src_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Cannot copy content of directory \"{}\" to \"{}\": source is not readable ({e}). Skipping dir.",
                src_dir.display(),
                dest_dir.display()
            );
            return;
        }
    };

    if let Err(e) = fs::create_dir_all(dest_dir) {
        warn!(
            "Cannot copy content of directory \"{}\" to \"{}\": destination cannot be created ({e}). Skipping dir.",
            src_dir.display(),
            dest_dir.display()
        );
        return;
    }

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let dest_file = dest_dir.join(entry.file_name());
        if let Err(e) = append_file(&path, &dest_file) {
            warn!(
                "Error merging content of \"{}\" to \"{}\": {e}; continuing with other resource files",
                path.display(),
                dest_file.display()
            );
        } else {
            debug!(src = %path.display(), dest = %dest_file.display(), "Merged resource file");
        }
    }
}

fn append_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    let bytes = fs::read(src)?;
    let mut out = OpenOptions::new().create(true).append(true).open(dest)?;
    out.write_all(&bytes)?;
    if bytes.last().is_some_and(|b| *b != b'\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Keep only the property entries whose key starts with `prefix`.
///
/// Entries are copied verbatim, continuation lines included. Comments and
/// blank lines are dropped. Every kept entry ends in `\n`; nothing matching
/// yields an empty string.
#[must_use]
pub fn filter_properties(content: &str, prefix: &str) -> String {
    let mut out = String::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut entry = vec![line];
        let mut current = line;
        while continues(current) {
            match lines.next() {
                Some(next) => {
                    entry.push(next);
                    current = next;
                }
                None => break,
            }
        }

        if parse_key(trimmed).starts_with(prefix) {
            for physical in entry {
                out.push_str(physical);
                out.push('\n');
            }
        }
    }

    out
}

/// [`filter_properties`] on raw file bytes.
///
/// Valid UTF-8 is filtered as text. Anything else is read as ISO-8859-1,
/// the default encoding of `.properties` files. Kept lines come out byte
/// for byte in both cases.
#[must_use]
pub fn filter_properties_bytes(content: &[u8], prefix: &str) -> Vec<u8> {
    if let Ok(text) = std::str::from_utf8(content) {
        return filter_properties(text, prefix).into_bytes();
    }

    let text: String = content.iter().copied().map(char::from).collect();
    filter_properties(&text, prefix)
        .chars()
        .map(|c| u8::try_from(c).unwrap_or(b'?'))
        .collect()
}

/// A line continues when it ends in an odd number of backslashes.
fn continues(line: &str) -> bool {
    line.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Unescaped key of a logical line whose leading whitespace is already stripped.
fn parse_key(line: &str) -> String {
    let mut key = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('t') => key.push('\t'),
                Some('n') => key.push('\n'),
                Some('r') => key.push('\r'),
                Some('f') => key.push('\u{c}'),
                Some(other) => key.push(other),
                None => break,
            },
            '=' | ':' | ' ' | '\t' | '\u{c}' => break,
            other => key.push(other),
        }
    }

    key
}
