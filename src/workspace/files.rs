use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Settings;

/// Candidate documents under `root`, in file-name order, capped at
/// `settings.max_files`. Directories named in `settings.skip_dirs` are not
/// descended into.
pub fn list_files(root: &Path, settings: &Settings) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| settings.is_skipped_dir(name))
        })
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| settings.has_candidate_extension(entry.path()))
        .take(settings.max_files)
        .map(|entry| entry.into_path())
        .collect()
}
