//! The vocabulary cache.
//!
//! Vocabularies are loaded lazily from a [`VocabularyProvider`] and kept for
//! the life of the process. Each key moves through
//! `Unloaded → Loading → Cached`; a failed load puts the key back to
//! `Unloaded` so the next request retries. While a key is `Loading` every
//! caller awaits the same shared future, so one key is fetched at most once at
//! a time. Inside a tokio runtime each load is also driven by its own task, so
//! it completes even after every waiter has been dropped.

mod provider;
mod vocabulary;

pub use provider::{parse_ntriples, FileVocabularyProvider, NoVocabularies, VocabularyProvider};
pub use vocabulary::{Term, TermKind, Vocabulary};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::Settings;
use crate::extract::{NamespaceMap, WELL_KNOWN_NAMESPACES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Iri(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

/// What a provider hands back for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyData {
    pub namespace: String,
    pub triples: Vec<Triple>,
}

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} contains no triples")]
    Empty(PathBuf),
    #[error("cannot determine the namespace of vocabulary '{0}'")]
    NoNamespace(String),
    #[error("{0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabState {
    Unloaded,
    Loading,
    Cached,
    /// The provider does not know the key
    Unavailable,
}

type LoadFuture = Shared<BoxFuture<'static, Option<Arc<Vocabulary>>>>;

enum Entry {
    Loading(LoadFuture),
    Cached(Arc<Vocabulary>),
    Unavailable,
}

type Entries = Mutex<HashMap<String, Entry>>;

/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct VocabularyCache {
    provider: Arc<dyn VocabularyProvider>,
    entries: Arc<Entries>,
}

impl std::fmt::Debug for VocabularyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VocabularyCache")
            .field("keys", &self.entries.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VocabularyCache {
    pub fn new(provider: Arc<dyn VocabularyProvider>) -> VocabularyCache {
        VocabularyCache {
            provider,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// File-backed cache when `vocabulary_dir` is set, an empty one otherwise.
    pub fn from_settings(settings: &Settings) -> VocabularyCache {
        match settings.vocabulary_path() {
            Some(dir) => {
                tracing::info!("loading vocabularies from {}", dir.display());
                VocabularyCache::new(Arc::new(FileVocabularyProvider::new(&dir)))
            }
            None => VocabularyCache::new(Arc::new(NoVocabularies)),
        }
    }

    /// Already-cached vocabulary; never starts a load.
    pub fn get(&self, key: &str) -> Option<Arc<Vocabulary>> {
        match self.entries.lock().get(key) {
            Some(Entry::Cached(vocabulary)) => Some(vocabulary.clone()),
            _ => None,
        }
    }

    pub fn state(&self, key: &str) -> VocabState {
        match self.entries.lock().get(key) {
            None => VocabState::Unloaded,
            Some(Entry::Loading(_)) => VocabState::Loading,
            Some(Entry::Cached(_)) => VocabState::Cached,
            Some(Entry::Unavailable) => VocabState::Unavailable,
        }
    }

    /// Cached vocabulary for a document's binding. A vocabulary cached under
    /// the key but describing another namespace is not returned.
    pub fn get_bound(&self, key: &VocabularyKey) -> Option<Arc<Vocabulary>> {
        self.get(&key.key).filter(|vocabulary| vocabulary.serves(&key.namespace))
    }

    /// Load the vocabulary, attaching to a load already in flight for the key.
    /// `None` when the key is unknown or the load failed.
    pub async fn load(&self, key: &str) -> Option<Arc<Vocabulary>> {
        let future = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(Entry::Cached(vocabulary)) => return Some(vocabulary.clone()),
                Some(Entry::Unavailable) => return None,
                Some(Entry::Loading(future)) => future.clone(),
                None => self.start(&mut entries, key),
            }
        };

        future.await
    }

    /// [`load`](Self::load) for a document's binding; see [`get_bound`](Self::get_bound).
    pub async fn load_bound(&self, key: &VocabularyKey) -> Option<Arc<Vocabulary>> {
        self.load(&key.key)
            .await
            .filter(|vocabulary| vocabulary.serves(&key.namespace))
    }

    /// Record a new in-flight load and, inside a runtime, spawn a task that
    /// drives it to completion.
    fn start(&self, entries: &mut HashMap<String, Entry>, key: &str) -> LoadFuture {
        let future = self.fetch(key);
        entries.insert(key.to_string(), Entry::Loading(future.clone()));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(future.clone());
            }
            Err(_) => tracing::trace!("no runtime to drive vocabulary '{key}'"),
        }

        future
    }

    fn fetch(&self, key: &str) -> LoadFuture {
        let provider = self.provider.clone();
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let key = key.to_string();

        async move {
            tracing::debug!("loading vocabulary '{key}'");
            let result = provider.fetch(&key).await;

            let (entry, vocabulary) = match result {
                Ok(Some(data)) => {
                    let vocabulary = Arc::new(Vocabulary::from_data(&key, &data));
                    tracing::info!(
                        "loaded vocabulary '{key}' ({} terms)",
                        vocabulary.terms.len()
                    );
                    (Some(Entry::Cached(vocabulary.clone())), Some(vocabulary))
                }
                Ok(None) => {
                    tracing::debug!("no vocabulary available for '{key}'");
                    (Some(Entry::Unavailable), None)
                }
                Err(err) => {
                    tracing::warn!("failed to load vocabulary '{key}': {err}");
                    (None, None)
                }
            };

            if let Some(entries) = entries.upgrade() {
                let mut entries = entries.lock();
                match entry {
                    Some(entry) => entries.insert(key, entry),
                    None => entries.remove(&key),
                };
            }

            vocabulary
        }
        .boxed()
        .shared()
    }

    /// Start a background load if the key is not cached. Needs a tokio
    /// runtime; without one this does nothing.
    pub fn prefetch(&self, key: &str) {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::trace!("no runtime to prefetch vocabulary '{key}'");
            return;
        }

        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            let _ = self.start(&mut entries, key);
        }
    }

    /// Every cached vocabulary, ordered by key.
    pub fn cached(&self) -> Vec<Arc<Vocabulary>> {
        let mut vocabularies: Vec<_> = self
            .entries
            .lock()
            .values()
            .filter_map(|entry| match entry {
                Entry::Cached(vocabulary) => Some(vocabulary.clone()),
                _ => None,
            })
            .collect();
        vocabularies.sort_by(|a, b| a.key.cmp(&b.key));
        vocabularies
    }

    pub fn find_by_namespace(&self, namespace: &str) -> Option<Arc<Vocabulary>> {
        self.cached()
            .into_iter()
            .find(|vocabulary| vocabulary.namespace == namespace)
    }
}

/// Which vocabulary a document prefix refers to, and the namespace the
/// document binds that prefix to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyKey {
    pub key: String,
    pub namespace: String,
}

/// The vocabulary key for a prefix as a document uses it. A prefix bound to a
/// well-known namespace maps to that namespace's conventional key, so
/// `@prefix f: <http://xmlns.com/foaf/0.1/>` still finds `foaf`. Any other
/// binding falls back to the prefix itself, and the namespace travels along
/// so a vocabulary cached under that key is only used when it matches.
/// `None` when the prefix is not bound at all.
pub fn vocabulary_key(prefix: &str, namespace_map: &NamespaceMap) -> Option<VocabularyKey> {
    let namespace = namespace_map.get(prefix)?;

    let key = WELL_KNOWN_NAMESPACES
        .iter()
        .find(|(_, iri)| *iri == namespace)
        .map(|(known, _)| known.to_string())
        .unwrap_or_else(|| prefix.to_string());

    Some(VocabularyKey {
        key,
        namespace: namespace.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use futures::FutureExt;

    use super::*;
    use crate::test_utils::{foaf_data, vocabulary_data, MockVocabularyProvider};

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let provider = Arc::new(MockVocabularyProvider::gated([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider.clone());

        let loads = futures::future::join_all((0..8).map(|_| cache.load("foaf")));
        let release = async {
            tokio::task::yield_now().await;
            assert_eq!(cache.state("foaf"), VocabState::Loading);
            provider.release();
        };
        let (results, ()) = tokio::join!(loads, release);

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|it| it.is_some()));
        assert_eq!(cache.state("foaf"), VocabState::Cached);

        // later requests are served from the cache
        cache.load("foaf").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retryable() {
        let provider = Arc::new(MockVocabularyProvider::new([("foaf", foaf_data())]));
        provider.fail_next.store(true, Ordering::SeqCst);
        let cache = VocabularyCache::new(provider.clone());

        assert!(cache.load("foaf").await.is_none());
        assert_eq!(cache.state("foaf"), VocabState::Unloaded);

        assert!(cache.load("foaf").await.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_is_remembered() {
        let provider = Arc::new(MockVocabularyProvider::new([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider.clone());

        assert!(cache.load("nope").await.is_none());
        assert!(cache.load("nope").await.is_none());

        assert_eq!(cache.state("nope"), VocabState::Unavailable);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefetch_populates_in_background() {
        let provider = Arc::new(MockVocabularyProvider::new([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider);

        assert!(cache.get("foaf").is_none());
        cache.prefetch("foaf");
        for _ in 0..10 {
            if cache.get("foaf").is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let foaf = cache.get("foaf").expect("prefetched");
        assert!(foaf.contains("Person"));
        assert_eq!(
            cache.find_by_namespace("http://xmlns.com/foaf/0.1/").map(|v| v.key.clone()),
            Some("foaf".to_string())
        );
        assert_eq!(cache.cached().len(), 1);
    }

    #[test]
    fn test_prefetch_without_runtime_is_a_no_op() {
        let cache = VocabularyCache::new(Arc::new(NoVocabularies));

        cache.prefetch("foaf");

        assert_eq!(cache.state("foaf"), VocabState::Unloaded);
    }

    #[test]
    fn test_vocabulary_key_follows_namespace() {
        let mut map = NamespaceMap::with_defaults();
        map.insert("f", "http://xmlns.com/foaf/0.1/");
        map.insert("ex", "http://example.org/");
        let key_of = |prefix: &str| vocabulary_key(prefix, &map).map(|it| it.key);

        assert_eq!(key_of("f").as_deref(), Some("foaf"));
        assert_eq!(key_of("foaf").as_deref(), Some("foaf"));
        assert_eq!(key_of("ex").as_deref(), Some("ex"));
        assert_eq!(key_of("missing"), None);
        assert_eq!(
            vocabulary_key("ex", &map).map(|it| it.namespace).as_deref(),
            Some("http://example.org/")
        );
    }

    #[tokio::test]
    async fn test_bound_lookup_checks_namespace() {
        let cache = VocabularyCache::new(Arc::new(MockVocabularyProvider::new([(
            "foaf",
            foaf_data(),
        )])));
        let mut map = NamespaceMap::with_defaults();
        let real = vocabulary_key("foaf", &map).unwrap();
        map.insert("foaf", "http://example.org/myfoaf/");
        let rebound = vocabulary_key("foaf", &map).unwrap();
        assert_eq!(rebound.key, "foaf");

        assert!(cache.get_bound(&real).is_none(), "not loaded yet");
        assert!(cache.load_bound(&rebound).await.is_none());
        assert!(cache.get_bound(&rebound).is_none());
        assert!(cache.get_bound(&real).is_some());
        assert!(cache.load_bound(&real).await.is_some());
    }

    async fn settle(cache: &VocabularyCache, key: &str) -> VocabState {
        for _ in 0..20 {
            if cache.state(key) != VocabState::Loading {
                break;
            }
            tokio::task::yield_now().await;
        }
        cache.state(key)
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_stall_the_load() {
        let provider = Arc::new(MockVocabularyProvider::gated([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider.clone());

        // the only waiter gives up before the fetch finishes
        assert!(cache.load("foaf").now_or_never().is_none());
        assert_eq!(cache.state("foaf"), VocabState::Loading);

        provider.release();

        assert_eq!(settle(&cache, "foaf").await, VocabState::Cached);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_request_attaches_to_load_in_flight() {
        let provider = Arc::new(MockVocabularyProvider::gated([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider.clone());

        assert!(cache.load("foaf").now_or_never().is_none());
        // background paths see the load and leave it alone
        cache.prefetch("foaf");

        let load = cache.load("foaf");
        let release = async {
            tokio::task::yield_now().await;
            provider.release();
        };
        let (vocabulary, ()) = tokio::join!(load, release);

        assert!(vocabulary.is_some_and(|it| it.contains("Person")));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hung_fetch_does_not_block_other_vocabularies() {
        let schema = vocabulary_data("http://schema.org/", &[("Person", true, "A person.")]);
        let provider = Arc::new(MockVocabularyProvider::gated_keys(
            [("foaf", foaf_data()), ("schema", schema)],
            &["foaf"],
        ));
        let cache = VocabularyCache::new(provider.clone());

        cache.prefetch("foaf");
        assert_eq!(cache.state("foaf"), VocabState::Loading);

        assert!(cache.load("schema").await.is_some());
        assert_eq!(cache.state("foaf"), VocabState::Loading);

        provider.release();
        assert_eq!(settle(&cache, "foaf").await, VocabState::Cached);
    }
}
