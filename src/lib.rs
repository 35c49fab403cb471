//! terrapin: editor tooling for Turtle and other RDF text formats
//!
//! This crate is the engine behind the `terrapin` language server. It keeps a
//! cross-document symbol table for a workspace of `.ttl`/`.trig`/`.n3` files
//! up to date under streaming edits, and answers editor requests from it.
//!
//! # Overview
//!
//! - **Workspace Index**: prefixes, subjects and prefixed-name symbols of every
//!   document, replaced atomically per document on each edit
//! - **Completion**: ranked candidates blending local declarations, workspace
//!   subjects and vocabulary terms loaded on demand
//! - **Navigation**: go-to-definition, references and validated rename
//! - **Diagnostics**: a line scan for missing terminators and prefix misuse
//!
//! # Architecture
//!
//! - [`extract`]: document text → [`extract::DocumentFacts`], structured with a
//!   line heuristic fallback
//! - [`workspace`]: the [`workspace::WorkspaceIndex`] and file discovery
//! - [`vocab`]: the single-flight [`vocab::VocabularyCache`] and its providers
//! - [`completion`], [`gotodef`], [`references`], [`rename`], [`diagnostics`],
//!   [`hover`], [`symbol`]: request handlers over the index
//! - [`config`]: layered [`config::Settings`]
//!
//! # Usage
//!
//! ```ignore
//! use terrapin::config::Settings;
//! use terrapin::workspace::WorkspaceIndex;
//!
//! let mut index = WorkspaceIndex::new(&Settings::default(), &root);
//! index.index_workspace();
//! let subjects = index.collect_global_subjects(Some("ex"));
//! ```

// Core modules - extraction and the index
pub mod extract;
pub mod vocab;
pub mod workspace;

// LSP feature modules
pub mod completion;
pub mod diagnostics;
pub mod gotodef;
pub mod hover;
pub mod references;
pub mod rename;
pub mod symbol;

// Configuration
pub mod config;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
