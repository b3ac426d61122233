use std::{collections::HashSet, thread::scope};

use crate::{
    BulkInsertStrategy, Database, Dialect, Error, GeneratorConfig, GeneratorRegistry,
    IdReservation, InMemorySequenceSource, IncrementalInsert, InsertSelect, OptimizerKind, Result,
    Row, TableSchema, Transaction,
};

fn registry(optimizer: OptimizerKind, increment_size: i64) -> GeneratorRegistry<InMemorySequenceSource> {
    GeneratorRegistry::in_memory([GeneratorConfig::builder("dummy_seq")
        .increment_size(increment_size)
        .optimizer(optimizer)
        .build()
        .unwrap()])
    .unwrap()
}

fn dummy_db() -> Database {
    let db = Database::new();
    db.create_table(TableSchema::new("dummy", "id", ["name"]).unwrap())
        .unwrap();
    db
}

fn staging_db() -> Database {
    let db = Database::new();
    db.create_table(TableSchema::new("staging", "id", ["title", "body"]).unwrap())
        .unwrap();
    db.create_table(TableSchema::new("archive", "aid", ["headline", "text"]).unwrap())
        .unwrap();
    db
}

fn archive_statement() -> InsertSelect {
    InsertSelect {
        target_table: "archive".to_owned(),
        target_columns: vec!["headline".to_owned(), "text".to_owned()],
        source_table: "staging".to_owned(),
        source_columns: vec!["title".to_owned(), "body".to_owned()],
    }
}

/// The "current max id + 1" shortcut a bulk statement must not use.
fn insert_select_from_max_id(tx: &mut Transaction<'_>, table: &str) -> Result<Vec<i64>> {
    let rows = tx.select(table)?;
    let start = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;
    let mut ids = Vec::with_capacity(rows.len());
    for (offset, row) in (0_i64..).zip(rows) {
        tx.insert(table, Row::new(start + offset, row.values))?;
        ids.push(start + offset);
    }
    Ok(ids)
}

fn run_mixed_inserts_never_collide(optimizer: OptimizerKind, increment_size: i64) {
    const SINGLE_THREADS: usize = 4;
    const BULK_THREADS: usize = 2;
    const SINGLE_ROWS: usize = 200;
    const BULK_STATEMENTS: usize = 20;

    let registry = registry(optimizer, increment_size);
    let db = staging_db();
    db.create_table(TableSchema::new("events", "id", ["title", "body"]).unwrap())
        .unwrap();
    db.in_transaction(|tx| {
        for i in 1..=7 {
            tx.insert("staging", Row::new(i, [format!("t{i}"), format!("b{i}")]))?;
        }
        Ok(())
    })
    .unwrap();

    let single = IncrementalInsert::new(&registry, "events", "dummy_seq");
    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");
    let statement = InsertSelect::copy("events", "staging", ["title", "body"]);

    scope(|s| {
        for t in 0..SINGLE_THREADS {
            let single = &single;
            let db = &db;
            s.spawn(move || {
                for chunk in 0..SINGLE_ROWS / 10 {
                    db.in_transaction(|tx| {
                        for i in 0..10 {
                            single.persist(tx, [format!("s{t}-{chunk}-{i}"), String::new()])?;
                        }
                        Ok(())
                    })
                    .unwrap();
                }
            });
        }
        for _ in 0..BULK_THREADS {
            s.spawn(|| {
                for _ in 0..BULK_STATEMENTS {
                    let written = db
                        .in_transaction(|tx| bulk.insert_select(tx, &statement))
                        .unwrap();
                    assert_eq!(written, 7);
                }
            });
        }
    });

    let ids = db.ids("events").unwrap();
    assert_eq!(
        ids.len(),
        SINGLE_THREADS * SINGLE_ROWS + BULK_THREADS * BULK_STATEMENTS * 7
    );
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn bulk_insert_does_not_collide_with_the_cached_window() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = dummy_db();
    let single = IncrementalInsert::new(&registry, "dummy", "dummy_seq");
    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");

    let first = db
        .in_transaction(|tx| {
            (1..=9)
                .map(|i| single.persist(tx, [format!("d{i}")]))
                .collect::<Result<Vec<_>>>()
        })
        .unwrap();
    assert_eq!(first, (1..=9).collect::<Vec<_>>());

    let copy = InsertSelect::copy("dummy", "dummy", ["name"]);
    let plan = db
        .in_transaction(|tx| {
            let plan = bulk.plan(tx, &copy)?;
            plan.clone().execute(tx)?;
            Ok(plan)
        })
        .unwrap();
    assert_eq!(plan.reservation(), Some(IdReservation::new(12, 9)));
    assert_eq!(plan.ids(), (12..=20).collect::<Vec<_>>());
    assert_eq!(plan.rows()[0].values, vec!["d1"]);
    assert_eq!(plan.rows()[8].values, vec!["d9"]);

    let last = db
        .in_transaction(|tx| {
            Ok(vec![
                single.persist(tx, ["d10"])?,
                single.persist(tx, ["d11"])?,
                single.persist(tx, ["d22"])?,
            ])
        })
        .unwrap();
    assert_eq!(last, vec![10, 11, 22]);

    let expected: Vec<i64> = (1..=20).chain([22]).collect();
    assert_eq!(db.ids("dummy").unwrap(), expected);
    assert_eq!(registry.source().round_trips(), 6);
}

#[test]
fn max_id_shortcut_collides_with_the_cached_window() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = dummy_db();
    let single = IncrementalInsert::new(&registry, "dummy", "dummy_seq");

    db.in_transaction(|tx| {
        for i in 1..=9 {
            single.persist(tx, [format!("d{i}")])?;
        }
        Ok(())
    })
    .unwrap();

    let shortcut = db
        .in_transaction(|tx| insert_select_from_max_id(tx, "dummy"))
        .unwrap();
    assert_eq!(shortcut, (10..=18).collect::<Vec<_>>());

    // 10 was already promised by the window
    let result = db.in_transaction(|tx| single.persist(tx, ["d10"]));
    assert_eq!(
        result,
        Err(Error::DuplicateKey {
            table: "dummy".to_owned(),
            id: 10
        })
    );
}

#[test]
fn plan_renders_the_reserved_range_per_dialect() {
    let registry = GeneratorRegistry::in_memory([GeneratorConfig::builder("dummy_seq")
        .increment_size(10)
        .initial_value(100)
        .optimizer(OptimizerKind::PooledLo)
        .build()
        .unwrap()])
    .unwrap();
    let db = staging_db();
    db.in_transaction(|tx| {
        for i in 1..=3 {
            tx.insert("staging", Row::new(i, [format!("t{i}"), format!("b{i}")]))?;
        }
        Ok(())
    })
    .unwrap();

    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");
    let tx = db.begin();
    let plan = bulk.plan(&tx, &archive_statement()).unwrap();
    assert_eq!(plan.reservation(), Some(IdReservation::new(100, 3)));

    assert_eq!(
        plan.to_sql(Dialect::PostgreSql).unwrap().unwrap(),
        "with source_rows (c1, c2, rn) as (select title, body, row_number() over (order by id) \
         from staging) insert into archive (aid, headline, text) \
         select 100 + rn - 1, c1, c2 from source_rows"
    );
    assert_eq!(
        plan.to_sql(Dialect::Db2).unwrap().unwrap(),
        "insert into archive (aid, headline, text) with source_rows (c1, c2, rn) as \
         (select title, body, row_number() over (order by id) from staging) \
         select 100 + rn - 1, c1, c2 from source_rows"
    );
}

#[test]
fn ids_follow_source_key_order() {
    let registry = registry(OptimizerKind::PooledLo, 10);
    let db = staging_db();
    db.in_transaction(|tx| {
        for i in [30, 10, 20] {
            tx.insert("staging", Row::new(i, [format!("t{i}"), format!("b{i}")]))?;
        }
        Ok(())
    })
    .unwrap();

    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");
    let reversed = InsertSelect {
        target_columns: vec!["text".to_owned(), "headline".to_owned()],
        source_columns: vec!["body".to_owned(), "title".to_owned()],
        ..archive_statement()
    };
    let written = db
        .in_transaction(|tx| bulk.insert_select(tx, &reversed))
        .unwrap();
    assert_eq!(written, 3);

    assert_eq!(
        db.rows("archive").unwrap(),
        vec![
            Row::new(1, ["t10", "b10"]),
            Row::new(2, ["t20", "b20"]),
            Row::new(3, ["t30", "b30"]),
        ]
    );
}

#[test]
fn empty_select_reserves_nothing() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = staging_db();
    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");

    let tx = db.begin();
    let plan = bulk.plan(&tx, &archive_statement()).unwrap();
    assert_eq!(plan.reservation(), None);
    assert_eq!(plan.row_count(), 0);
    assert_eq!(plan.to_sql(Dialect::PostgreSql).unwrap(), None);
    drop(tx);

    let written = db
        .in_transaction(|tx| bulk.insert_select(tx, &archive_statement()))
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(registry.source().round_trips(), 0);
    assert_eq!(registry.window("dummy_seq").unwrap(), None);
}

#[test]
fn rolled_back_ids_are_not_reused() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = dummy_db();
    let single = IncrementalInsert::new(&registry, "dummy", "dummy_seq");

    let failed: Result<()> = db.in_transaction(|tx| {
        for i in 1..=3 {
            single.persist(tx, [format!("d{i}")])?;
        }
        single.persist(tx, ["too", "many"])?;
        Ok(())
    });
    assert!(matches!(failed, Err(Error::ColumnMismatch { .. })));
    assert!(db.ids("dummy").unwrap().is_empty());

    // 1..=3 were handed out and rolled back; the rejected row took nothing
    let id = db.in_transaction(|tx| single.persist(tx, ["d4"])).unwrap();
    assert_eq!(id, 4);
}

#[test]
fn rejected_rows_consume_no_id() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = dummy_db();
    let single = IncrementalInsert::new(&registry, "dummy", "dummy_seq");
    let missing = IncrementalInsert::new(&registry, "missing", "dummy_seq");

    let mut tx = db.begin();
    assert_eq!(
        missing.persist(&mut tx, ["d1"]),
        Err(Error::UnknownTable("missing".to_owned()))
    );
    assert_eq!(
        single.persist(&mut tx, ["too", "many"]),
        Err(Error::ColumnMismatch {
            table: "dummy".to_owned(),
            expected: 1,
            actual: 2,
        })
    );
    assert_eq!(registry.source().round_trips(), 0);
    assert_eq!(registry.window("dummy_seq").unwrap(), None);

    assert_eq!(single.persist(&mut tx, ["d1"]).unwrap(), 1);
    tx.commit().unwrap();
    assert_eq!(db.ids("dummy").unwrap(), vec![1]);
}

#[test]
fn statement_errors_are_reported_before_reserving() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = staging_db();
    let bulk = BulkInsertStrategy::new(&registry, "dummy_seq");
    let tx = db.begin();

    let unknown_column = InsertSelect {
        source_columns: vec!["title".to_owned(), "summary".to_owned()],
        ..archive_statement()
    };
    assert_eq!(
        bulk.plan(&tx, &unknown_column).unwrap_err(),
        Error::UnknownColumn {
            table: "staging".to_owned(),
            column: "summary".to_owned()
        }
    );

    let short = InsertSelect {
        source_columns: vec!["title".to_owned()],
        ..archive_statement()
    };
    assert!(matches!(
        bulk.plan(&tx, &short),
        Err(Error::ColumnMismatch { .. })
    ));

    let twice = InsertSelect {
        target_columns: vec!["headline".to_owned(), "headline".to_owned()],
        ..archive_statement()
    };
    assert!(matches!(
        bulk.plan(&tx, &twice),
        Err(Error::InvalidConfig { .. })
    ));

    let missing = InsertSelect {
        source_table: "nowhere".to_owned(),
        ..archive_statement()
    };
    assert_eq!(
        bulk.plan(&tx, &missing).unwrap_err(),
        Error::UnknownTable("nowhere".to_owned())
    );

    assert_eq!(registry.source().round_trips(), 0);
}

#[test]
fn unknown_generator_fails_the_bulk_statement() {
    let registry = registry(OptimizerKind::Pooled, 5);
    let db = staging_db();
    db.in_transaction(|tx| tx.insert("staging", Row::new(1, ["t", "b"])))
        .unwrap();

    let bulk = BulkInsertStrategy::new(&registry, "other_seq");
    let result = db.in_transaction(|tx| bulk.insert_select(tx, &archive_statement()));
    assert_eq!(result, Err(Error::UnknownGenerator("other_seq".to_owned())));
    assert!(db.ids("archive").unwrap().is_empty());
}

#[test]
fn concurrent_commit_of_the_same_key_fails_as_a_whole() {
    let db = dummy_db();
    let mut first = db.begin();
    let mut second = db.begin();

    first.insert("dummy", Row::new(1, ["a"])).unwrap();
    second.insert("dummy", Row::new(2, ["b"])).unwrap();
    second.insert("dummy", Row::new(1, ["c"])).unwrap();

    assert_eq!(first.commit().unwrap(), 1);
    assert_eq!(
        second.commit(),
        Err(Error::DuplicateKey {
            table: "dummy".to_owned(),
            id: 1
        })
    );
    assert_eq!(db.rows("dummy").unwrap(), vec![Row::new(1, ["a"])]);
}

#[test]
fn pooled_mixed_inserts_never_collide() {
    run_mixed_inserts_never_collide(OptimizerKind::Pooled, 5);
}

#[test]
fn pooled_lo_mixed_inserts_never_collide() {
    run_mixed_inserts_never_collide(OptimizerKind::PooledLo, 8);
}

#[test]
fn hilo_mixed_inserts_never_collide() {
    run_mixed_inserts_never_collide(OptimizerKind::Hilo, 3);
}

#[test]
fn none_mixed_inserts_never_collide() {
    run_mixed_inserts_never_collide(OptimizerKind::None, 1);
}
