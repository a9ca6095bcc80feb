//! The knowledge-base ZIP packager: a boundary-only format transform over
//! the Merge Engine's consolidated artifacts, served whole for download
//! rather than parsed or indexed further.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::KbError;

/// The consolidated artifacts a knowledge base is built from, named
/// relative to the merge engine's output directory.
const ARTIFACTS: [&str; 7] = [
    "consolidated_table_metadata.csv",
    "consolidated_columns_metadata.csv",
    "consolidated_joining_conditions.csv",
    "consolidated_definitions.csv",
    "consolidated_filter_conditions.txt",
    "conflicts_report.json",
    "merged_metadata.json",
];

/// Builds a ZIP archive of every consolidated artifact present in
/// `merged_dir` and writes it atomically to `output_path`. An artifact
/// that doesn't exist (e.g. a run with no joining conditions extracted)
/// is skipped rather than failing the whole build; a build where none of
/// the artifacts exist is an error, since that means merge hasn't run.
pub fn build(merged_dir: &Path, output_path: &Path) -> Result<()> {
    let mut included = 0usize;
    let mut buffer = Vec::new();
    {
        let mut writer = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for name in ARTIFACTS {
            let path = merged_dir.join(name);
            let content = match std::fs::read(&path) {
                Ok(content) => content,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    warn!(artifact = name, "kb: merged artifact missing, omitting from knowledge-base archive");
                    continue;
                }
                Err(error) => return Err(KbError::ReadArtifact { path: path.clone(), source: error }.into()),
            };
            writer.start_file(name, options).with_context(|| format!("starting zip entry {name}"))?;
            writer.write_all(&content).with_context(|| format!("writing zip entry {name}"))?;
            included += 1;
        }

        writer.finish().context("finalizing knowledge-base zip")?;
    }

    if included == 0 {
        return Err(KbError::NoArtifacts.into());
    }

    dm_core::write_bytes_atomic(output_path, &buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn builds_a_zip_containing_every_present_artifact() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let merged_dir = tempdir.path().join("merged_metadata");
        seed(&merged_dir.join("consolidated_table_metadata.csv"), "table_name\n");
        seed(&merged_dir.join("conflicts_report.json"), "[]");

        let output_path = tempdir.path().join("knowledge_base.zip");
        build(&merged_dir, &output_path).expect("build");

        let archive_bytes = std::fs::read(&output_path).expect("read zip");
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_bytes)).expect("open zip");
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("conflicts_report.json").expect("entry present");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).expect("read entry");
        assert_eq!(contents, "[]");
    }

    #[test]
    fn missing_artifacts_are_skipped_not_fatal() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let merged_dir = tempdir.path().join("merged_metadata");
        seed(&merged_dir.join("merged_metadata.json"), "{}");

        let output_path = tempdir.path().join("knowledge_base.zip");
        build(&merged_dir, &output_path).expect("build");
        assert!(output_path.exists());
    }

    #[test]
    fn empty_merged_dir_is_an_error() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let merged_dir = tempdir.path().join("merged_metadata");
        std::fs::create_dir_all(&merged_dir).unwrap();

        let output_path = tempdir.path().join("knowledge_base.zip");
        assert!(build(&merged_dir, &output_path).is_err());
    }
}
