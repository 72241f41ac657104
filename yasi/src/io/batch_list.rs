//! The batch list file: read once, annotated in place, written atomically.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::entry::{BatchLine, annotate_line, parse_line};
use crate::core::types::EntryStatus;

/// In-memory copy of a batch list that preserves untouched lines byte for byte.
#[derive(Debug, Clone)]
pub struct BatchList {
    path: PathBuf,
    lines: Vec<String>,
    line_ending: &'static str,
    trailing_newline: bool,
}

impl BatchList {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read batch list {}", path.display()))?;
        let line_ending = if contents.contains("\r\n") { "\r\n" } else { "\n" };
        Ok(Self {
            path: path.to_path_buf(),
            lines: contents.lines().map(str::to_string).collect(),
            line_ending,
            trailing_newline: contents.ends_with('\n'),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn parse(&self, index: usize) -> Option<BatchLine> {
        self.line(index).map(parse_line)
    }

    /// Prefix line `index` with the marker for `status`.
    ///
    /// Only pending entries are annotated; anything else is left alone.
    pub fn annotate(&mut self, index: usize, status: EntryStatus) -> Result<()> {
        let line = self
            .lines
            .get_mut(index)
            .ok_or_else(|| anyhow!("batch list has no line {}", index + 1))?;
        match parse_line(line) {
            BatchLine::Entry(entry) if entry.status == EntryStatus::Pending => {
                *line = annotate_line(line, status);
                debug!(line = index + 1, ?status, "batch line annotated");
                Ok(())
            }
            _ => Err(anyhow!(
                "batch list line {} is not a pending entry",
                index + 1
            )),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.line_ending);
        if self.trailing_newline {
            out.push_str(self.line_ending);
        }
        out
    }

    /// Atomically write the list back (temp file + rename).
    pub fn save(&self) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "batch".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);
        fs::write(&tmp_path, self.render())
            .with_context(|| format!("write temp batch list {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace batch list {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_and_save_preserves_other_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("games.txt");
        fs::write(&path, "# queue\n220 r2\n\n# DONE 620 t5\n400 r1\n").expect("write");

        let mut list = BatchList::load(&path).expect("load");
        list.annotate(1, EntryStatus::Done).expect("annotate");
        list.annotate(4, EntryStatus::Failed).expect("annotate");
        list.save().expect("save");

        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "# queue\n# DONE 220 r2\n\n# DONE 620 t5\n# FAIL 400 r1\n"
        );
    }

    #[test]
    fn keeps_crlf_and_missing_trailing_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("games.txt");
        fs::write(&path, "220 r2\r\n400 r1").expect("write");

        let mut list = BatchList::load(&path).expect("load");
        list.annotate(0, EntryStatus::Done).expect("annotate");
        list.save().expect("save");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "# DONE 220 r2\r\n400 r1"
        );
    }

    #[test]
    fn refuses_to_annotate_non_pending_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("games.txt");
        fs::write(&path, "# DONE 620 t5\n# note\n").expect("write");

        let mut list = BatchList::load(&path).expect("load");
        assert!(list.annotate(0, EntryStatus::Failed).is_err());
        assert!(list.annotate(1, EntryStatus::Done).is_err());
        assert!(list.annotate(7, EntryStatus::Done).is_err());
        assert_eq!(list.line(0), Some("# DONE 620 t5"));
    }
}
