use crate::{Error, OptimizerKind, Result, SequenceDefinition};

/// Immutable definition of one logical id generator.
///
/// Created once at bootstrap and never mutated. Several generators may draw
/// from the same database sequence, but each keeps its own window.
///
/// # Example
///
/// ```
/// use ferroseq::{GeneratorConfig, OptimizerKind};
///
/// let config = GeneratorConfig::builder("dummy_seq")
///     .increment_size(5)
///     .optimizer(OptimizerKind::Pooled)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.sequence_name(), "dummy_seq");
/// assert_eq!(config.sequence_definition().increment_by, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    generator_name: String,
    sequence_name: String,
    increment_size: i64,
    initial_value: i64,
    optimizer: OptimizerKind,
}

impl GeneratorConfig {
    /// Block size used when none is configured.
    pub const DEFAULT_INCREMENT_SIZE: i64 = 50;

    /// Starts a builder for a generator whose sequence shares its name.
    pub fn builder(generator_name: impl Into<String>) -> GeneratorConfigBuilder {
        let generator_name = generator_name.into();
        GeneratorConfigBuilder {
            sequence_name: generator_name.clone(),
            generator_name,
            increment_size: Self::DEFAULT_INCREMENT_SIZE,
            initial_value: 1,
            optimizer: OptimizerKind::default(),
        }
    }

    pub fn generator_name(&self) -> &str {
        &self.generator_name
    }

    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }

    pub const fn increment_size(&self) -> i64 {
        self.increment_size
    }

    pub const fn initial_value(&self) -> i64 {
        self.initial_value
    }

    pub const fn optimizer(&self) -> OptimizerKind {
        self.optimizer
    }

    /// The database sequence this generator expects to exist.
    pub fn sequence_definition(&self) -> SequenceDefinition {
        SequenceDefinition {
            name: self.sequence_name.clone(),
            initial_value: self.initial_value,
            increment_by: self.optimizer.sequence_increment(self.increment_size),
        }
    }

    /// Checks the definition. Deserialized configs skip the builder, so the
    /// registry calls this again on registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for empty names, a non-positive
    /// increment size or an initial value below 1.
    pub fn validate(&self) -> Result<()> {
        if self.generator_name.trim().is_empty() {
            return Err(invalid("generator name must not be empty"));
        }
        if self.sequence_name.trim().is_empty() {
            return Err(invalid("sequence name must not be empty"));
        }
        if self.increment_size < 1 {
            return Err(invalid(format!(
                "increment size of `{}` must be at least 1, got {}",
                self.generator_name, self.increment_size
            )));
        }
        if self.initial_value < 1 {
            return Err(invalid(format!(
                "initial value of `{}` must be at least 1, got {}",
                self.generator_name, self.initial_value
            )));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        reason: reason.into(),
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct GeneratorConfigBuilder {
    generator_name: String,
    sequence_name: String,
    increment_size: i64,
    initial_value: i64,
    optimizer: OptimizerKind,
}

impl GeneratorConfigBuilder {
    pub fn sequence_name(mut self, sequence_name: impl Into<String>) -> Self {
        self.sequence_name = sequence_name.into();
        self
    }

    pub fn increment_size(mut self, increment_size: i64) -> Self {
        self.increment_size = increment_size;
        self
    }

    pub fn initial_value(mut self, initial_value: i64) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// # Errors
    ///
    /// See [`GeneratorConfig::validate`].
    pub fn build(self) -> Result<GeneratorConfig> {
        let config = GeneratorConfig {
            generator_name: self.generator_name,
            sequence_name: self.sequence_name,
            increment_size: self.increment_size,
            initial_value: self.initial_value,
            optimizer: self.optimizer,
        };
        config.validate()?;
        Ok(config)
    }
}
