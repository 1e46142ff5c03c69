//! Migration discovery
//!
//! The runner never loads code by name. A [`MigrationLocator`] lists the
//! migration files known for each namespace and binds a class name to a
//! factory; [`MigrationRegistry`] is the explicit registration table most
//! applications use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::unit::Migration;

/// Factory producing a fresh instance of a migration
pub type MigrationFactory = Arc<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

/// Discovery collaborator consumed by the runner
pub trait MigrationLocator: Send + Sync {
    /// Every namespace that may contain migrations
    fn namespaces(&self) -> Vec<String>;

    /// Migration file handles in a namespace
    fn list_files(&self, namespace: &str) -> Vec<PathBuf>;

    /// Class implementing the migration at `path`
    fn class_name(&self, path: &Path) -> Option<String>;

    /// Instantiate a class, `None` when nothing is bound to it
    fn instantiate(&self, class: &str) -> Option<Box<dyn Migration>>;
}

#[derive(Clone)]
struct RegisteredFile {
    namespace: String,
    path: PathBuf,
    class: Option<String>,
}

/// Registration table binding migration files to their implementations
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    namespaces: Vec<String>,
    files: Vec<RegisteredFile>,
    factories: HashMap<String, MigrationFactory>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration file together with its implementation
    pub fn register<F, M>(
        &mut self,
        namespace: &str,
        path: impl Into<PathBuf>,
        class: &str,
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Migration + 'static,
    {
        self.declare(namespace, path, class);
        self.factories.insert(
            class.to_string(),
            Arc::new(move || Box::new(factory()) as Box<dyn Migration>),
        );
        self
    }

    /// Declare a file whose class has no implementation bound yet
    pub fn declare(&mut self, namespace: &str, path: impl Into<PathBuf>, class: &str) -> &mut Self {
        self.add_entry(namespace, path.into(), Some(class.to_string()));
        self
    }

    /// Declare a file that resolves to no class at all
    pub fn add_file(&mut self, namespace: &str, path: impl Into<PathBuf>) -> &mut Self {
        self.add_entry(namespace, path.into(), None);
        self
    }

    /// Forget a file; its class binding is kept
    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref();
        self.files.retain(|f| f.path != path);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn add_entry(&mut self, namespace: &str, path: PathBuf, class: Option<String>) {
        if !self.namespaces.iter().any(|ns| ns == namespace) {
            self.namespaces.push(namespace.to_string());
        }
        self.files.retain(|f| f.path != path);
        self.files.push(RegisteredFile {
            namespace: namespace.to_string(),
            path,
            class,
        });
    }
}

impl MigrationLocator for MigrationRegistry {
    fn namespaces(&self) -> Vec<String> {
        self.namespaces.clone()
    }

    fn list_files(&self, namespace: &str) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.namespace == namespace)
            .map(|f| f.path.clone())
            .collect()
    }

    fn class_name(&self, path: &Path) -> Option<String> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .and_then(|f| f.class.clone())
    }

    fn instantiate(&self, class: &str) -> Option<Box<dyn Migration>> {
        self.factories.get(class).map(|factory| factory())
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("namespaces", &self.namespaces)
            .field("files", &self.files.len())
            .field("classes", &self.factories.len())
            .finish()
    }
}
