//! Archive extraction
//!
//! Unpacks a downloaded artifact archive (zip format) into a destination
//! directory, recreating the archive's internal directory structure and
//! preserving recorded file modes. A single unreadable or unwritable entry
//! is logged and skipped; the rest of the archive is still extracted.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Zip archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract all entries of a zip archive into `dest`
    ///
    /// Directory entries are materialized even when empty. File entries are
    /// created (or truncated) with the entry's recorded unix mode when one is
    /// present. Entries whose names would escape `dest` are skipped.
    ///
    /// Returns the number of file entries written. Per-entry failures do not
    /// abort extraction; partial extraction is a possible terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Archive`] if the input is not a
    /// readable zip archive at all.
    pub fn extract<R: Read + Seek>(reader: R, dest: &Path) -> Result<usize> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut extracted = 0usize;

        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(index, error = %e, "failed to read archive entry, skipping");
                    continue;
                }
            };

            // Zip-slip guard: reject names that escape the destination
            let relative = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!(name = %entry.name(), "skipping entry with unsafe path");
                    continue;
                }
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                debug!(path = %target.display(), "creating directory");
                if let Err(e) = std::fs::create_dir_all(&target) {
                    warn!(path = %target.display(), error = %e, "failed to create directory, skipping");
                }
                continue;
            }

            if let Some(parent) = target.parent()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "failed to create parent directory, skipping entry");
                continue;
            }

            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(mode);
            }

            let mut outfile = match options.open(&target) {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %target.display(), error = %e, "failed to open destination file, skipping entry");
                    continue;
                }
            };

            if let Err(e) = std::io::copy(&mut entry, &mut outfile) {
                warn!(path = %target.display(), error = %e, "failed to write entry content, skipping entry");
                continue;
            }

            debug!(path = %target.display(), "entry unpacked");
            extracted += 1;
        }

        info!(extracted, dest = %dest.display(), "archive extracted");
        Ok(extracted)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    /// Build an in-memory zip with a nested tree, an empty directory, and
    /// files carrying distinct permission bits.
    fn sample_archive() -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        writer
            .add_directory("empty-dir/", FileOptions::default())
            .unwrap();

        writer
            .start_file(
                "bin/run.sh",
                FileOptions::default().unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(b"#!/bin/sh\necho run\n").unwrap();

        writer
            .start_file(
                "docs/nested/readme.txt",
                FileOptions::default().unix_permissions(0o644),
            )
            .unwrap();
        writer.write_all(b"hello artifact").unwrap();

        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn extracts_nested_tree_with_modes() {
        let dest = tempfile::tempdir().unwrap();

        let count = ArchiveExtractor::extract(sample_archive(), dest.path()).unwrap();
        assert_eq!(count, 2);

        assert!(dest.path().join("empty-dir").is_dir());
        assert_eq!(
            std::fs::read(dest.path().join("docs/nested/readme.txt")).unwrap(),
            b"hello artifact"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dest.path().join("bin/run.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn overwrites_existing_files() {
        let dest = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dest.path().join("docs/nested")).unwrap();
        std::fs::write(
            dest.path().join("docs/nested/readme.txt"),
            b"stale content that is much longer than the replacement",
        )
        .unwrap();

        ArchiveExtractor::extract(sample_archive(), dest.path()).unwrap();

        assert_eq!(
            std::fs::read(dest.path().join("docs/nested/readme.txt")).unwrap(),
            b"hello artifact"
        );
    }

    #[test]
    fn unsafe_paths_are_skipped_not_fatal() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("../escape.txt", FileOptions::default())
            .unwrap();
        writer.write_all(b"nope").unwrap();
        writer
            .start_file("safe.txt", FileOptions::default())
            .unwrap();
        writer.write_all(b"ok").unwrap();
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);

        let dest = tempfile::tempdir().unwrap();
        let count = ArchiveExtractor::extract(cursor, dest.path()).unwrap();

        assert_eq!(count, 1);
        assert!(dest.path().join("safe.txt").is_file());
        assert!(!dest.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn garbage_input_is_an_archive_error() {
        let dest = tempfile::tempdir().unwrap();
        let err =
            ArchiveExtractor::extract(Cursor::new(b"definitely not a zip".to_vec()), dest.path())
                .unwrap_err();
        assert!(matches!(err, crate::error::Error::Archive(_)));
    }
}
