use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ferroseq::{Dialect, GeneratorConfig, OptimizerKind};

/// Runtime configuration for the `ferroseq-cli` binary.
///
/// Every generator setting can come from CLI arguments or environment
/// variables (a `.env` file is loaded first). Alternatively a JSON file with
/// a list of generator definitions replaces the single generator built from
/// `--generator`, `--increment-size` and `--optimizer`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ferroseq-cli",
    version,
    about = "Replays and stress-tests pooled id allocation"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Name of the generator (and of its backing sequence).
    ///
    /// Environment variable: `GENERATOR`
    #[arg(long, env = "GENERATOR", default_value_t = String::from("dummy_seq"), global = true)]
    pub generator: String,

    /// Ids reserved per sequence round trip.
    ///
    /// Environment variable: `INCREMENT_SIZE`
    #[arg(long, env = "INCREMENT_SIZE", default_value_t = 5, global = true)]
    pub increment_size: i64,

    /// How raw sequence values are expanded into blocks: `none`, `pooled`,
    /// `pooled-lo` or `hilo`.
    ///
    /// Environment variable: `OPTIMIZER`
    #[arg(long, env = "OPTIMIZER", default_value_t = OptimizerKind::Pooled, global = true)]
    pub optimizer: OptimizerKind,

    /// JSON file holding a list of generator definitions. Overrides the
    /// single-generator settings above.
    ///
    /// Environment variable: `GENERATORS_FILE`
    #[arg(long, env = "GENERATORS_FILE", global = true)]
    pub generators_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Nine single inserts, one bulk copy of the table, then more single
    /// inserts; prints every id and the SQL the bulk copy renders to.
    Scenario {
        /// SQL flavour the bulk statement is rendered for.
        ///
        /// Environment variable: `DIALECT`
        #[arg(long, env = "DIALECT", default_value_t = Dialect::PostgreSql)]
        dialect: Dialect,
    },
    /// Concurrent single-row and bulk inserts, checked for duplicate ids.
    Stress {
        /// Worker threads. Defaults to the number of logical cores.
        ///
        /// Environment variable: `THREADS`
        #[arg(long, env = "THREADS")]
        threads: Option<usize>,

        /// Insert operations each thread performs.
        ///
        /// Environment variable: `OPS_PER_THREAD`
        #[arg(long, env = "OPS_PER_THREAD", default_value_t = 10_000)]
        ops_per_thread: usize,

        /// Operations grouped into one transaction.
        ///
        /// Environment variable: `OPS_PER_TRANSACTION`
        #[arg(long, env = "OPS_PER_TRANSACTION", default_value_t = 16)]
        ops_per_transaction: usize,

        /// Rows each bulk insert-from-select copies.
        ///
        /// Environment variable: `BULK_ROWS`
        #[arg(long, env = "BULK_ROWS", default_value_t = 64)]
        bulk_rows: usize,

        /// Probability that an operation is a bulk insert instead of a
        /// single-row insert.
        ///
        /// Environment variable: `BULK_RATIO`
        #[arg(long, env = "BULK_RATIO", default_value_t = 0.05)]
        bulk_ratio: f64,
    },
}

#[derive(Debug, Clone)]
pub enum RunConfig {
    Scenario(ScenarioConfig),
    Stress(StressConfig),
}

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub generator: GeneratorConfig,
    pub dialect: Dialect,
}

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub generators: Vec<GeneratorConfig>,
    pub threads: usize,
    pub ops_per_thread: usize,
    pub ops_per_transaction: usize,
    pub bulk_rows: usize,
    pub bulk_ratio: f64,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let generators = match &args.generators_file {
            Some(path) => load_generators(path)?,
            None => vec![
                GeneratorConfig::builder(&args.generator)
                    .increment_size(args.increment_size)
                    .optimizer(args.optimizer)
                    .build()?,
            ],
        };

        match args.command {
            Command::Scenario { dialect } => {
                let Some(generator) = generators.into_iter().next() else {
                    bail!("the scenario needs at least one generator");
                };
                Ok(Self::Scenario(ScenarioConfig { generator, dialect }))
            }
            Command::Stress {
                threads,
                ops_per_thread,
                ops_per_transaction,
                bulk_rows,
                bulk_ratio,
            } => {
                let threads = threads.unwrap_or_else(num_cpus::get);
                if threads == 0 {
                    bail!("THREADS must be greater than 0");
                }
                if ops_per_thread == 0 {
                    bail!("OPS_PER_THREAD must be greater than 0");
                }
                if ops_per_transaction == 0 {
                    bail!("OPS_PER_TRANSACTION must be greater than 0");
                }
                if bulk_rows < 2 {
                    bail!("BULK_ROWS ({bulk_rows}) must be at least 2");
                }
                if !(0.0..=1.0).contains(&bulk_ratio) {
                    bail!("BULK_RATIO ({bulk_ratio}) must be within [0, 1]");
                }
                if generators.is_empty() {
                    bail!("the stress run needs at least one generator");
                }

                Ok(Self::Stress(StressConfig {
                    generators,
                    threads,
                    ops_per_thread,
                    ops_per_transaction,
                    bulk_rows,
                    bulk_ratio,
                }))
            }
        }
    }
}

fn load_generators(path: &PathBuf) -> anyhow::Result<Vec<GeneratorConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    let generators: Vec<GeneratorConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a list of generators", path.display()))?;
    for generator in &generators {
        generator.validate()?;
    }
    Ok(generators)
}
