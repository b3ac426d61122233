use std::{
    collections::{BTreeMap, HashSet},
    thread::scope,
    time::Instant,
};

use anyhow::{anyhow, bail};
use ferroseq::{
    BulkInsertStrategy, Database, GeneratorRegistry, InMemorySequenceSource, IncrementalInsert,
    InsertSelect, Row, TableSchema,
};
use rand::Rng;

use crate::config::{ScenarioConfig, StressConfig};

pub fn scenario(config: &ScenarioConfig) -> anyhow::Result<()> {
    let generator = config.generator.generator_name();
    let registry = GeneratorRegistry::in_memory([config.generator.clone()])?;
    let db = Database::new();
    db.create_table(TableSchema::new("dummy", "id", ["name"])?)?;

    let single = IncrementalInsert::new(&registry, "dummy", generator);
    let bulk = BulkInsertStrategy::new(&registry, generator);

    let first = db.in_transaction(|tx| {
        (1..=9)
            .map(|i| single.persist(tx, [format!("d{i}")]))
            .collect::<ferroseq::Result<Vec<_>>>()
    })?;
    println!("single inserts: {first:?}");
    print_window(&registry, generator)?;

    let copy = InsertSelect::copy("dummy", "dummy", ["name"]);
    let plan = db.in_transaction(|tx| {
        let plan = bulk.plan(tx, &copy)?;
        plan.clone().execute(tx)?;
        Ok(plan)
    })?;
    if let Some(reservation) = plan.reservation() {
        println!("bulk insert: {reservation} ({} rows)", plan.row_count());
    }
    if let Some(sql) = plan.to_sql(config.dialect)? {
        println!("  {sql}");
    }
    print_window(&registry, generator)?;

    let last = db.in_transaction(|tx| {
        (10..=12)
            .map(|i| single.persist(tx, [format!("d{i}")]))
            .collect::<ferroseq::Result<Vec<_>>>()
    })?;
    println!("single inserts: {last:?}");
    print_window(&registry, generator)?;

    let bulk_ids = plan.ids();
    let mut seen = HashSet::new();
    for id in first.iter().chain(&bulk_ids).chain(&last) {
        if !seen.insert(*id) {
            bail!("id {id} was handed out twice");
        }
    }

    let stored = db.ids("dummy")?;
    println!(
        "stored {} rows with {} sequence round trips",
        stored.len(),
        registry.source().round_trips()
    );
    if let (Some(min), Some(max)) = (stored.first(), stored.last()) {
        let gaps = (max - min + 1) - stored.len() as i64;
        println!("gaps between {min} and {max}: {gaps}");
    }
    Ok(())
}

fn print_window(
    registry: &GeneratorRegistry<InMemorySequenceSource>,
    generator: &str,
) -> anyhow::Result<()> {
    match registry.window(generator)? {
        Some(window) => println!("  window: {window} ({} cached)", window.remaining()),
        None => println!("  window: empty"),
    }
    Ok(())
}

/// One generator and the table it fills.
struct Target {
    table: String,
    generator: String,
    sequence: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    single_rows: usize,
    bulk_rows: usize,
    bulk_statements: usize,
    transactions: usize,
}

pub fn stress(config: &StressConfig) -> anyhow::Result<()> {
    let registry = GeneratorRegistry::in_memory(config.generators.iter().cloned())?;
    let db = Database::new();

    db.create_table(TableSchema::new("staging", "id", ["payload"])?)?;
    db.in_transaction(|tx| {
        for i in 0..config.bulk_rows {
            tx.insert("staging", Row::new(i as i64, [format!("p{i}")]))?;
        }
        Ok(())
    })?;

    let mut targets = Vec::with_capacity(config.generators.len());
    for (i, generator) in config.generators.iter().enumerate() {
        let table = format!("events_{i}");
        db.create_table(TableSchema::new(&table, "id", ["payload"])?)?;
        targets.push(Target {
            table,
            generator: generator.generator_name().to_owned(),
            sequence: generator.sequence_name().to_owned(),
        });
    }

    #[cfg(feature = "tracing")]
    tracing::info!(
        threads = config.threads,
        ops_per_thread = config.ops_per_thread,
        generators = targets.len(),
        "starting stress run"
    );

    let started = Instant::now();
    let results = scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|_| s.spawn(|| worker(config, &registry, &db, &targets)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| anyhow!("worker thread panicked"))?)
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    let elapsed = started.elapsed();

    let totals = results.iter().fold(WorkerStats::default(), |acc, s| WorkerStats {
        single_rows: acc.single_rows + s.single_rows,
        bulk_rows: acc.bulk_rows + s.bulk_rows,
        bulk_statements: acc.bulk_statements + s.bulk_statements,
        transactions: acc.transactions + s.transactions,
    });

    // Generators sharing a sequence must not overlap either.
    let mut per_sequence: BTreeMap<&str, HashSet<i64>> = BTreeMap::new();
    let mut stored = 0;
    for target in &targets {
        let seen = per_sequence.entry(target.sequence.as_str()).or_default();
        for id in db.ids(&target.table)? {
            if !seen.insert(id) {
                bail!("id {id} of sequence `{}` was stored twice", target.sequence);
            }
            stored += 1;
        }
    }

    let expected = totals.single_rows + totals.bulk_rows;
    if stored != expected {
        bail!("expected {expected} stored rows, found {stored}");
    }

    println!(
        "{stored} rows ({} single, {} via {} bulk statements) in {} transactions over {:?}",
        totals.single_rows,
        totals.bulk_rows,
        totals.bulk_statements,
        totals.transactions,
        elapsed
    );
    println!(
        "{:.0} rows/s, {} sequence round trips, no duplicate ids",
        stored as f64 / elapsed.as_secs_f64(),
        registry.source().round_trips()
    );
    for target in &targets {
        if let Some(window) = registry.window(&target.generator)? {
            println!("  {}: window {window}", target.generator);
        }
    }
    Ok(())
}

fn worker(
    config: &StressConfig,
    registry: &GeneratorRegistry<InMemorySequenceSource>,
    db: &Database,
    targets: &[Target],
) -> anyhow::Result<WorkerStats> {
    let paths: Vec<_> = targets
        .iter()
        .map(|target| {
            (
                IncrementalInsert::new(registry, &target.table, &target.generator),
                BulkInsertStrategy::new(registry, &target.generator),
                InsertSelect::copy(&target.table, "staging", ["payload"]),
            )
        })
        .collect();

    let mut rng = rand::rng();
    let mut stats = WorkerStats::default();
    let mut remaining = config.ops_per_thread;

    while remaining > 0 {
        let batch = remaining.min(config.ops_per_transaction);
        remaining -= batch;

        db.in_transaction(|tx| {
            for _ in 0..batch {
                let (single, bulk, copy) = &paths[rng.random_range(0..paths.len())];
                if rng.random_bool(config.bulk_ratio) {
                    stats.bulk_rows += bulk.insert_select(tx, copy)?;
                    stats.bulk_statements += 1;
                } else {
                    single.persist(tx, ["payload"])?;
                    stats.single_rows += 1;
                }
            }
            Ok(())
        })?;
        stats.transactions += 1;
    }

    Ok(stats)
}
