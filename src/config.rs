use std::path::{Path, PathBuf};

use anyhow::anyhow;
use config::{Config, File, FileFormat};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Extensions (without the dot) picked up by the workspace bootstrap
    pub file_extensions: Vec<String>,
    /// Upper bound on files indexed at bootstrap
    pub max_files: usize,
    /// Directory names never descended into
    pub skip_dirs: Vec<String>,
    /// Directory of `<key>.nt` vocabulary dumps; empty disables the file provider
    pub vocabulary_dir: String,
    pub diagnostics: bool,
    pub unknown_term_diagnostics: bool,
    pub unused_prefix_diagnostics: bool,
    pub completion_limit: usize,
    pub hover: bool,
}

const DEFAULT_EXTENSIONS: [&str; 5] = ["ttl", "trig", "n3", "nt", "turtle"];

const DEFAULT_SKIP_DIRS: [&str; 9] = [
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "build",
    "dist",
    ".venv",
    "__pycache__",
];

impl Settings {
    /// Layered settings: user file, workspace `.terrapin` file, then the
    /// client's `initializationOptions` on top.
    pub fn new(
        root_dir: &Path,
        initialization_options: Option<&serde_json::Value>,
    ) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/terrapin/settings");
        let mut builder = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.terrapin",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("file_extensions", DEFAULT_EXTENSIONS.to_vec())?
            .set_default("max_files", 2000_i64)?
            .set_default("skip_dirs", DEFAULT_SKIP_DIRS.to_vec())?
            .set_default("vocabulary_dir", "")?
            .set_default("diagnostics", true)?
            .set_default("unknown_term_diagnostics", true)?
            .set_default("unused_prefix_diagnostics", true)?
            .set_default("completion_limit", 200_i64)?
            .set_default("hover", true)?;

        if let Some(options) = initialization_options.filter(|it| it.is_object()) {
            builder = builder.add_source(File::from_str(&options.to_string(), FileFormat::Json));
        }

        let settings = builder
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }

    /// The vocabulary directory, tilde-expanded; `None` when unset.
    pub fn vocabulary_path(&self) -> Option<PathBuf> {
        if self.vocabulary_dir.trim().is_empty() {
            return None;
        }

        Some(PathBuf::from(
            shellexpand::tilde(self.vocabulary_dir.trim()).into_owned(),
        ))
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|dir| dir == name)
    }

    pub fn has_candidate_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.file_extensions
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            file_extensions: DEFAULT_EXTENSIONS.iter().map(|it| it.to_string()).collect(),
            max_files: 2000,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|it| it.to_string()).collect(),
            vocabulary_dir: "".to_string(),
            diagnostics: true,
            unknown_term_diagnostics: true,
            unused_prefix_diagnostics: true,
            completion_limit: 200,
            hover: true,
        }
    }
}
