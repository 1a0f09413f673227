use std::path::PathBuf;

use patchwise_core::{DiffEntry, DiffHunk, DiffLine, FileStatus, LineKind, ReviewerError};

/// Parse a unified diff string (as produced by `git diff`) into [`DiffEntry`] values.
///
/// Handles new, deleted, renamed and binary files; binary files are skipped.
///
/// # Errors
///
/// Returns [`ReviewerError::Config`] if a hunk header is malformed, since the
/// diff file is user input.
///
/// # Examples
///
/// ```
/// use patchwise_difflens::parser::parse_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,2 +1,3 @@\n\
///              fn main() {\n\
///             +    println!(\"hello\");\n\
///              }\n";
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks[0].lines.len(), 3);
/// assert_eq!(files[0].hunks[0].lines[1].new_line, Some(2));
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<DiffEntry>, ReviewerError> {
    let mut files: Vec<DiffEntry> = Vec::new();
    let mut current: Option<FileHeader> = None;
    let mut hunks = HunkBuilder::default();
    let mut is_binary = false;

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            if let Some(header) = current.take() {
                if !is_binary {
                    files.push(header.finish(hunks.finish()));
                }
            }
            hunks = HunkBuilder::default();
            is_binary = false;
            current = Some(FileHeader::default());
            continue;
        }

        // Patches without a "diff --git" line start directly at the "---" header.
        if line.starts_with("--- ") && current.is_none() {
            current = Some(FileHeader::default());
        }

        let Some(header) = current.as_mut() else {
            continue;
        };

        if !header.seen_hunk {
            if line.starts_with("Binary files ") && line.ends_with(" differ") {
                is_binary = true;
                continue;
            }
            if line.starts_with("new file mode") {
                header.status = FileStatus::Added;
                continue;
            }
            if line.starts_with("deleted file mode") {
                header.status = FileStatus::Removed;
                continue;
            }
            if let Some(from) = line.strip_prefix("rename from ") {
                header.status = FileStatus::Renamed;
                header.old_path = Some(PathBuf::from(from));
                continue;
            }
            if let Some(to) = line.strip_prefix("rename to ") {
                header.status = FileStatus::Renamed;
                header.new_path = Some(PathBuf::from(to));
                continue;
            }
            if line.starts_with("index ") || line.starts_with("similarity index") {
                continue;
            }
            if let Some(path) = line.strip_prefix("--- ") {
                match parse_path(path) {
                    Some(p) => header.old_path = Some(p),
                    None => header.status = FileStatus::Added,
                }
                continue;
            }
            if let Some(path) = line.strip_prefix("+++ ") {
                match parse_path(path) {
                    Some(p) => header.new_path = Some(p),
                    None => header.status = FileStatus::Removed,
                }
                continue;
            }
        }

        if line.starts_with("@@") {
            header.seen_hunk = true;
        }
        hunks.push_line(line).map_err(ReviewerError::Config)?;
    }

    if let Some(header) = current.take() {
        if !is_binary {
            files.push(header.finish(hunks.finish()));
        }
    }

    Ok(files)
}

/// Parse the `patch` field GitHub returns for one file: hunks without file headers.
///
/// # Errors
///
/// Returns [`ReviewerError::Vcs`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use patchwise_difflens::parser::parse_patch;
///
/// let hunks = parse_patch("@@ -10,2 +10,3 @@ fn f()\n a\n+b\n c").unwrap();
/// assert_eq!(hunks.len(), 1);
/// assert_eq!(hunks[0].lines[1].new_line, Some(11));
/// ```
pub fn parse_patch(patch: &str) -> Result<Vec<DiffHunk>, ReviewerError> {
    let mut hunks = HunkBuilder::default();
    for line in patch.lines() {
        hunks.push_line(line).map_err(ReviewerError::Vcs)?;
    }
    Ok(hunks.finish())
}

#[derive(Default)]
struct FileHeader {
    old_path: Option<PathBuf>,
    new_path: Option<PathBuf>,
    status: FileStatus,
    seen_hunk: bool,
}

impl FileHeader {
    fn finish(self, hunks: Vec<DiffHunk>) -> DiffEntry {
        let path = match (&self.new_path, &self.old_path) {
            (Some(p), _) => p.clone(),
            (None, Some(p)) => p.clone(),
            (None, None) => PathBuf::new(),
        };
        let previous_path = match self.status {
            FileStatus::Renamed => self.old_path.filter(|old| *old != path),
            _ => None,
        };
        DiffEntry {
            path,
            previous_path,
            status: self.status,
            hunks,
        }
    }
}

/// Accumulates hunks line by line, numbering each record.
#[derive(Default)]
struct HunkBuilder {
    done: Vec<DiffHunk>,
    current: Option<DiffHunk>,
    next_old: u32,
    next_new: u32,
}

impl HunkBuilder {
    fn push_line(&mut self, line: &str) -> Result<(), String> {
        if line.starts_with("@@") {
            self.flush();
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            self.next_old = old_start;
            self.next_new = new_start;
            self.current = Some(DiffHunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                lines: Vec::new(),
            });
            return Ok(());
        }

        let Some(hunk) = self.current.as_mut() else {
            return Ok(());
        };
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            return Ok(());
        }

        let mut chars = line.chars();
        // GitHub strips the leading space of empty context lines.
        let marker = chars.next().unwrap_or(' ');
        let Some(kind) = LineKind::from_marker(marker) else {
            return Ok(());
        };
        let content = chars.as_str().to_string();

        let overflow = || {
            format!(
                "invalid hunk header: {} (line numbers overflow)",
                hunk.header()
            )
        };
        let (old_line, new_line) = match kind {
            LineKind::Added => (None, Some(advance(&mut self.next_new).ok_or_else(overflow)?)),
            LineKind::Removed => (Some(advance(&mut self.next_old).ok_or_else(overflow)?), None),
            LineKind::Context => (
                Some(advance(&mut self.next_old).ok_or_else(overflow)?),
                Some(advance(&mut self.next_new).ok_or_else(overflow)?),
            ),
        };
        hunk.lines.push(DiffLine {
            kind,
            old_line,
            new_line,
            content,
        });
        Ok(())
    }

    fn flush(&mut self) {
        if let Some(h) = self.current.take() {
            self.done.push(h);
        }
    }

    fn finish(mut self) -> Vec<DiffHunk> {
        self.flush();
        self.done
    }
}

/// Return the current line number and step past it.
fn advance(counter: &mut u32) -> Option<u32> {
    let current = *counter;
    *counter = current.checked_add(1)?;
    Some(current)
}

fn parse_path(raw: &str) -> Option<PathBuf> {
    // Drop the trailing tab + timestamp some tools append.
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return None;
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    Some(PathBuf::from(stripped))
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), String> {
    let invalid = || format!("invalid hunk header: {line}");
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(invalid)?;

    let mut parts = inner.split(' ');
    let (Some(old), Some(new), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let old = old.strip_prefix('-').ok_or_else(invalid)?;
    let new = new.strip_prefix('+').ok_or_else(invalid)?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), String> {
    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| format!("invalid range number in: {context}"))
    };
    match range.split_once(',') {
        Some((start, count)) => Ok((number(start)?, number(count)?)),
        None => Ok((number(range)?, 1)),
    }
}
