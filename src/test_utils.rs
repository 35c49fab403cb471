//! Shared test utilities for terrapin.
//!
//! This module provides common helpers used across multiple test modules.
//! It is only compiled when running tests.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tempfile::TempDir;
use tokio::sync::Semaphore;
use tower_lsp::async_trait;

use crate::config::Settings;
use crate::vocab::{Object, Triple, VocabularyData, VocabularyError, VocabularyProvider};
use crate::workspace::WorkspaceIndex;

/// Creates a temporary workspace directory for testing.
///
/// Returns a tuple of (TempDir, PathBuf) where:
/// - TempDir: The temp directory handle (must be kept alive for the test duration)
/// - PathBuf: The path to the workspace subdirectory
///
/// Temp directories can live under hidden paths such as `/tmp/.tmpXXXXX`, so
/// the files go into a plain `workspace` subdirectory.
///
/// # Example
///
/// ```ignore
/// use crate::test_utils::create_test_workspace_dir;
///
/// let (_temp_dir, dir) = create_test_workspace_dir();
/// std::fs::write(dir.join("people.ttl"), "ex:Bob a foaf:Person .").unwrap();
/// ```
pub fn create_test_workspace_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let dir = temp_dir.path().join("workspace");
    fs::create_dir(&dir).expect("Failed to create workspace subdirectory");
    (temp_dir, dir)
}

/// Creates a bootstrapped index over a temporary workspace.
///
/// * `setup_fn` - A closure that receives the workspace directory path and can
///   create files before the workspace is indexed.
pub fn create_test_workspace<F>(setup_fn: F) -> (TempDir, PathBuf, WorkspaceIndex)
where
    F: FnOnce(&PathBuf),
{
    let (temp_dir, dir) = create_test_workspace_dir();
    setup_fn(&dir);
    let mut index = WorkspaceIndex::new(&Settings::default(), &dir);
    index.index_workspace();
    (temp_dir, dir, index)
}

/// In-memory provider that counts fetches. A gated provider holds every
/// fetch until [`MockVocabularyProvider::release`] is called.
pub struct MockVocabularyProvider {
    data: HashMap<String, VocabularyData>,
    gate: Option<Semaphore>,
    /// Keys that wait on the gate; every key when `None`
    gated_keys: Option<HashSet<String>>,
    pub calls: AtomicUsize,
    /// Fail the next fetch with a provider error
    pub fail_next: AtomicBool,
}

impl MockVocabularyProvider {
    pub fn new<'a>(data: impl IntoIterator<Item = (&'a str, VocabularyData)>) -> Self {
        MockVocabularyProvider {
            data: data
                .into_iter()
                .map(|(key, data)| (key.to_string(), data))
                .collect(),
            gate: None,
            gated_keys: None,
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn gated<'a>(data: impl IntoIterator<Item = (&'a str, VocabularyData)>) -> Self {
        MockVocabularyProvider {
            gate: Some(Semaphore::new(0)),
            ..MockVocabularyProvider::new(data)
        }
    }

    /// Like [`gated`](Self::gated), but only fetches of `keys` are held.
    pub fn gated_keys<'a>(
        data: impl IntoIterator<Item = (&'a str, VocabularyData)>,
        keys: &[&str],
    ) -> Self {
        MockVocabularyProvider {
            gated_keys: Some(keys.iter().map(|key| key.to_string()).collect()),
            ..MockVocabularyProvider::gated(data)
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }
}

#[async_trait]
impl VocabularyProvider for MockVocabularyProvider {
    async fn fetch(&self, key: &str) -> Result<Option<VocabularyData>, VocabularyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let held = self
            .gated_keys
            .as_ref()
            .map_or(true, |keys| keys.contains(key));
        if let (Some(gate), true) = (&self.gate, held) {
            let _permit = gate.acquire().await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(VocabularyError::Provider("injected failure".to_string()));
        }

        Ok(self.data.get(key).cloned())
    }
}

/// A small FOAF vocabulary: `Person` (class), `knows` and `name` (properties).
pub fn foaf_data() -> VocabularyData {
    vocabulary_data(
        "http://xmlns.com/foaf/0.1/",
        &[
            ("Person", true, "A person."),
            ("knows", false, "A person known by this person."),
            ("name", false, "A name for some thing."),
        ],
    )
}

/// Builds provider data from (local name, is class, comment) rows.
pub fn vocabulary_data(namespace: &str, terms: &[(&str, bool, &str)]) -> VocabularyData {
    let triples = terms
        .iter()
        .flat_map(|(local, is_class, comment)| {
            let subject = format!("{namespace}{local}");
            let kind = if *is_class {
                "http://www.w3.org/2000/01/rdf-schema#Class"
            } else {
                "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property"
            };
            [
                Triple {
                    subject: subject.clone(),
                    predicate: "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
                    object: Object::Iri(kind.to_string()),
                },
                Triple {
                    subject,
                    predicate: "http://www.w3.org/2000/01/rdf-schema#comment".to_string(),
                    object: Object::Literal(comment.to_string()),
                },
            ]
        })
        .collect();

    VocabularyData {
        namespace: namespace.to_string(),
        triples,
    }
}
