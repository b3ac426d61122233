use std::{collections::HashMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocatorWindow, Error, GeneratorConfig, IdReservation, InMemorySequenceSource,
    PooledAllocator, Result, SequenceSource,
    mutex::{RwLock, read_lock, write_lock},
};

/// Process-wide allocator state: one [`PooledAllocator`] per generator name,
/// all drawing from a single [`SequenceSource`].
///
/// Both insert paths receive the same registry handle, so a bulk statement
/// and a single-row insert on the same generator always go through the same
/// critical section. The map itself is only locked to look an allocator up;
/// reservations on different generators never contend.
///
/// # Example
///
/// ```
/// use ferroseq::{GeneratorConfig, GeneratorRegistry};
///
/// let registry = GeneratorRegistry::in_memory([
///     GeneratorConfig::builder("dummy_seq").increment_size(5).build().unwrap(),
/// ])
/// .unwrap();
///
/// assert_eq!(registry.next_id("dummy_seq").unwrap(), 1);
/// assert_eq!(registry.next_id("dummy_seq").unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct GeneratorRegistry<S> {
    source: S,
    allocators: RwLock<HashMap<String, Arc<PooledAllocator>>>,
}

impl<S: SequenceSource> GeneratorRegistry<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            allocators: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Registers a generator with an empty window.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` does not validate
    /// - [`Error::DuplicateGenerator`] if the name is taken
    pub fn register(&self, config: GeneratorConfig) -> Result<Arc<PooledAllocator>> {
        let name = config.generator_name().to_owned();
        let allocator = Arc::new(PooledAllocator::new(config)?);

        let mut allocators = write_lock!(self.allocators);
        if allocators.contains_key(&name) {
            return Err(Error::DuplicateGenerator(name));
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            generator = %name,
            sequence = allocator.config().sequence_name(),
            increment_size = allocator.config().increment_size(),
            optimizer = %allocator.config().optimizer(),
            "registered generator"
        );
        allocators.insert(name, Arc::clone(&allocator));
        Ok(allocator)
    }

    /// The shared allocator behind `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGenerator`] if nothing is registered under
    /// that name.
    pub fn allocator(&self, generator: &str) -> Result<Arc<PooledAllocator>> {
        let allocators = read_lock!(self.allocators);
        allocators
            .get(generator)
            .cloned()
            .ok_or_else(|| Error::UnknownGenerator(generator.to_owned()))
    }

    /// Reserves `count` consecutive ids from `generator`.
    ///
    /// # Errors
    ///
    /// See [`PooledAllocator::reserve`], plus
    /// [`Error::UnknownGenerator`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn reserve(&self, generator: &str, count: i64) -> Result<IdReservation> {
        if count < 1 {
            return Err(Error::InvalidCount { count });
        }
        self.allocator(generator)?.reserve(&self.source, count)
    }

    /// Reserves a single id.
    ///
    /// # Errors
    ///
    /// See [`Self::reserve`].
    pub fn next_id(&self, generator: &str) -> Result<i64> {
        self.reserve(generator, 1).map(|r| r.first_id())
    }

    /// Snapshot of the cached window of `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGenerator`] for unregistered names.
    pub fn window(&self, generator: &str) -> Result<Option<AllocatorWindow>> {
        self.allocator(generator)?.window()
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownGenerator`] for unregistered names.
    pub fn config(&self, generator: &str) -> Result<GeneratorConfig> {
        Ok(self.allocator(generator)?.config().clone())
    }

    /// Drops the cached window of `generator`; see
    /// [`PooledAllocator::reset`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGenerator`] for unregistered names.
    pub fn reset(&self, generator: &str) -> Result<()> {
        self.allocator(generator)?.reset()
    }

    /// Registered generator names, sorted.
    ///
    /// # Errors
    ///
    /// Fails only if the lock is poisoned.
    pub fn generators(&self) -> Result<Vec<String>> {
        let allocators = read_lock!(self.allocators);
        let mut names: Vec<_> = allocators.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

impl GeneratorRegistry<InMemorySequenceSource> {
    /// A registry over a fresh [`InMemorySequenceSource`], creating each
    /// generator's sequence before registering it.
    ///
    /// # Errors
    ///
    /// See [`InMemorySequenceSource::create_sequence`] and
    /// [`Self::register`].
    pub fn in_memory(configs: impl IntoIterator<Item = GeneratorConfig>) -> Result<Self> {
        let registry = Self::new(InMemorySequenceSource::default());
        for config in configs {
            registry.register_with_sequence(config)?;
        }
        Ok(registry)
    }

    /// Creates the sequence `config` needs, then registers it.
    ///
    /// # Errors
    ///
    /// See [`Self::in_memory`].
    pub fn register_with_sequence(&self, config: GeneratorConfig) -> Result<Arc<PooledAllocator>> {
        config.validate()?;
        self.source.create_sequence(&config.sequence_definition())?;
        self.register(config)
    }
}
