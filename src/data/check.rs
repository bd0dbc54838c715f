//! Table validation ahead of conversion.

use super::loader::{read_table, SampleFile, TableFormat};
use crate::error::Result;
use log::{info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A table that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of checking a set of tables.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub n_checked: usize,
    pub issues: Vec<FileIssue>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Files from `files` that passed, in their original order.
    pub fn passing(&self, files: &[SampleFile]) -> Vec<SampleFile> {
        files
            .iter()
            .filter(|f| !self.issues.iter().any(|issue| issue.path == f.path))
            .cloned()
            .collect()
    }

    /// Write `path <tab> message` for every failing table.
    pub fn write_error_list<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "file\terror")?;
        for issue in &self.issues {
            writeln!(writer, "{}\t{}", issue.path.display(), issue.message)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Table Check")?;
        writeln!(f, "  Checked: {}", self.n_checked)?;
        writeln!(f, "  Passed:  {}", self.n_checked - self.issues.len())?;
        writeln!(f, "  Failed:  {}", self.issues.len())?;
        Ok(())
    }
}

/// Read every table and collect the ones that fail to parse or are empty.
pub fn check_files(files: &[SampleFile], format: &TableFormat) -> CheckReport {
    let mut issues: Vec<FileIssue> = files
        .par_iter()
        .filter_map(|file| {
            let message = match read_table(&file.path, format) {
                Ok(records) if records.is_empty() => "no data rows".to_string(),
                Ok(_) => return None,
                Err(e) => e.to_string(),
            };
            Some(FileIssue {
                path: file.path.clone(),
                message,
            })
        })
        .collect();
    issues.sort_by(|a, b| a.path.cmp(&b.path));

    for issue in &issues {
        warn!("{}: {}", issue.path.display(), issue.message);
    }
    info!(
        "Checked {} tables, {} with errors",
        files.len(),
        issues.len()
    );

    CheckReport {
        n_checked: files.len(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_file(dir: &Path, name: &str, content: &str) -> SampleFile {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        SampleFile {
            path,
            biome: "root-Environmental".to_string(),
        }
    }

    #[test]
    fn test_check_flags_bad_tables() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            sample_file(dir.path(), "good.tsv", "h\n1\t3\tRoot;A\n"),
            sample_file(dir.path(), "nan.tsv", "h\n1\tabc\tRoot;A\n"),
            sample_file(dir.path(), "empty.tsv", "h\n"),
        ];

        let report = check_files(&files, &TableFormat::default());
        assert_eq!(report.n_checked, 3);
        assert_eq!(report.issues.len(), 2);
        assert!(!report.is_clean());

        let passing = report.passing(&files);
        assert_eq!(passing.len(), 1);
        assert!(passing[0].path.ends_with("good.tsv"));

        let out = dir.path().join("error_files.tsv");
        report.write_error_list(&out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("no data rows"));
        assert!(text.contains("Invalid abundance value 'abc'"));
    }

    #[test]
    fn test_clean_report() {
        let dir = TempDir::new().unwrap();
        let files = vec![sample_file(dir.path(), "a.tsv", "h\n1\t3\tRoot;A\n")];
        let report = check_files(&files, &TableFormat::default());
        assert!(report.is_clean());
        assert!(report.to_string().contains("Passed:  1"));
    }
}
