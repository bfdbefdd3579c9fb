//! Cross-pass metadata registry.
//!
//! Generation passes run independently and may produce the same test more than once, for
//! example when a generic test is reached both explicitly and through inheritance. The
//! [`MetadataRegistry`] merges their results:
//!
//! - records are keyed by their structural [`RecordKey`], never by rendered text
//! - [`MetadataRegistry::register`] is last-write-wins, so registering the same record again
//!   is a no-op in effect
//! - passes do not register directly at load time; they enqueue a [`RegistrationCallback`]
//!   and [`MetadataRegistry::initialize_all`] runs every pending callback exactly once
//!
//! The map is a [`DashMap`], so rayon workers may register concurrently and in any order.
//!
//! # Examples
//!
//! ```rust,ignore
//! let registry = MetadataRegistry::new();
//! registry.enqueue(Box::new(move |registry| {
//!     for record in records {
//!         registry.register(record.key.clone(), record);
//!     }
//! }));
//! assert_eq!(registry.initialize_all(), 1);
//! ```

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, OnceLock,
};

use dashmap::DashMap;

use crate::synth::{RecordKey, TestMetadataRecord};

/// A deferred registration, run once by [`MetadataRegistry::initialize_all`]
pub type RegistrationCallback = Box<dyn FnOnce(&MetadataRegistry) + Send>;

static GLOBAL: OnceLock<MetadataRegistry> = OnceLock::new();

/// Concurrent, append-only collection of synthesized records
#[derive(Default)]
pub struct MetadataRegistry {
    records: DashMap<RecordKey, Arc<TestMetadataRecord>>,
    pending: Mutex<Vec<RegistrationCallback>>,
    initialized: AtomicUsize,
}

impl MetadataRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        MetadataRegistry::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static MetadataRegistry {
        GLOBAL.get_or_init(MetadataRegistry::new)
    }

    /// Registers `record` under `key`, replacing and returning any previous record
    pub fn register(
        &self,
        key: RecordKey,
        record: impl Into<Arc<TestMetadataRecord>>,
    ) -> Option<Arc<TestMetadataRecord>> {
        self.records.insert(key, record.into())
    }

    /// Looks up a record
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<Arc<TestMetadataRecord>> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// All records, ordered by test identity
    #[must_use]
    pub fn all(&self) -> Vec<Arc<TestMetadataRecord>> {
        let mut all: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.identity.id.cmp(&b.identity.id));
        all
    }

    /// Number of distinct records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing was registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Queues a registration callback
    pub fn enqueue(&self, callback: RegistrationCallback) {
        let mut pending = lock!(self.pending);
        pending.push(callback);
    }

    /// Number of callbacks waiting for [`MetadataRegistry::initialize_all`]
    #[must_use]
    pub fn pending(&self) -> usize {
        lock!(self.pending).len()
    }

    /// Runs every queued callback once and returns how many ran.
    ///
    /// Callbacks queued while this runs are picked up in the same call.
    pub fn initialize_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut *lock!(self.pending));
            if batch.is_empty() {
                break;
            }
            for callback in batch {
                callback(self);
                ran += 1;
            }
        }
        self.initialized.fetch_add(ran, Ordering::AcqRel);
        ran
    }

    /// Total callbacks run over the registry's lifetime
    #[must_use]
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{DataSourceAnalyzer, GenericInstantiationResolver, TestDiscovery},
        config::GeneratorOptions,
        diagnostics::Diagnostics,
        model::{MethodBuilder, ProgramBuilder},
        synth::MetadataSynthesizer,
        test::attributes,
    };
    use rayon::prelude::*;

    fn sample_records() -> Vec<TestMetadataRecord> {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("First").attribute(attrs.test()))
            .method(MethodBuilder::new("Second").attribute(attrs.test()))
            .build()
            .unwrap();
        let model = program.finish();
        let options = GeneratorOptions::sequential();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let generics = GenericInstantiationResolver::new(&model, &datasources, "Demo.Tests", 5);
        let candidates = TestDiscovery::new(&model, &generics, "Demo.Tests").discover();
        let diagnostics = Diagnostics::new();
        MetadataSynthesizer::new(&model, &options, "Demo.Tests", &datasources, &diagnostics)
            .synthesize_all(&candidates)
            .records
    }

    #[test]
    fn test_register_last_write_wins() {
        let registry = MetadataRegistry::new();
        let records = sample_records();
        assert!(registry
            .register(records[0].key.clone(), records[0].clone())
            .is_none());
        let previous = registry.register(records[0].key.clone(), records[0].clone());
        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_initialize_runs_once() {
        let registry = MetadataRegistry::new();
        let records = sample_records();
        for _ in 0..2 {
            let batch = records.clone();
            registry.enqueue(Box::new(move |registry| {
                for record in batch {
                    registry.register(record.key.clone(), record);
                }
            }));
        }
        assert_eq!(registry.pending(), 2);
        assert_eq!(registry.initialize_all(), 2);
        assert_eq!(registry.initialize_all(), 0);
        assert_eq!(registry.initialized(), 2);
        assert_eq!(registry.len(), 2);

        let names: Vec<String> = registry
            .all()
            .iter()
            .map(|record| record.method_name.clone())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = MetadataRegistry::new();
        let records = sample_records();
        (0..64).into_par_iter().for_each(|i| {
            let record = &records[i % records.len()];
            registry.register(record.key.clone(), record.clone());
        });
        assert_eq!(registry.len(), records.len());
    }
}
