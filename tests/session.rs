//! End-to-end behavior of the interactive session over an in-memory store.

use lsql::{
    error::{Error, Result},
    interrupt::Interrupt,
    shell::{
        Reply, Session,
        clause::{coerce, tokenize},
        mutation::Confirm,
    },
    sql::{
        engine::ViewEngine,
        schema::{Column, Table},
        types::{DataType, Value},
    },
    storage::MemoryEngine,
    store::{KvStore, TableHandle, TableStore},
};

type TestSession = Session<KvStore<MemoryEngine>, ViewEngine>;

/// Answers every confirmation with the same text
struct Answer(&'static str);

impl Confirm for Answer {
    fn ask(&mut self, _warning: &str, _question: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn orders_store() -> Result<KvStore<MemoryEngine>> {
    let store = KvStore::new(MemoryEngine::new());
    store.create_table(Table {
        name: "orders".into(),
        columns: vec![
            Column::new("id", DataType::Integer, false),
            Column::new("customer", DataType::String, true),
            Column::new("amount", DataType::Float, true),
        ],
    })?;
    let rows = (1..=10)
        .map(|id| {
            let amount = if id == 3 || id == 7 { -(id as f64) } else { id as f64 * 10.0 };
            vec![
                Value::Integer(id),
                Value::String(format!("c{}", id % 3)),
                Value::Float(amount),
            ]
        })
        .collect();
    store.open_table("orders")?.insert(rows)?;

    store.create_table(Table {
        name: "customers".into(),
        columns: vec![
            Column::new("name", DataType::String, false),
            Column::new("city", DataType::String, true),
        ],
    })?;
    store.open_table("customers")?.insert(vec![
        vec![Value::String("c0".into()), Value::String("Oslo".into())],
        vec![Value::String("c1".into()), Value::String("Lima".into())],
        vec![Value::String("c2".into()), Value::Null],
    ])?;
    Ok(store)
}

fn start(store: KvStore<MemoryEngine>) -> Result<TestSession> {
    let interrupt = Interrupt::new();
    Session::start(store, ViewEngine::new(interrupt.clone()), interrupt)
}

fn query(session: &mut TestSession, sql: &str) -> Result<(Vec<Vec<Value>>, bool)> {
    match session.handle_line(sql, &mut Answer("no"))? {
        Reply::Rows(outcome) => Ok((outcome.rows.rows, outcome.retried)),
        other => panic!("expected rows, got {:?}", other),
    }
}

#[test]
fn delete_reports_store_counts() -> Result<()> {
    let mut session = start(orders_store()?)?;
    match session.handle_line(".delete orders where amount < 0", &mut Answer("no"))? {
        Reply::Deleted(report) => {
            assert_eq!(report.deleted, 2);
            assert_eq!(report.rows_before, 10);
            assert_eq!(report.rows_after, 8);
        }
        other => panic!("unexpected {:?}", other),
    }

    // the view follows the store without a retry
    let (rows, retried) = query(&mut session, "select count(*) from orders")?;
    assert_eq!(rows, vec![vec![Value::Integer(8)]]);
    assert!(!retried);
    Ok(())
}

#[test]
fn malformed_update_changes_nothing() -> Result<()> {
    let store = orders_store()?;
    let mut session = start(store.clone())?;
    let before = store.open_table("orders")?.scan(Some("id = 1"), None)?;

    for line in [
        ".update orders customer id=1",
        ".update orders customer='x',,amount=1 id=1",
        ".update orders amount=1=2 id=1",
        // assignments without a separating comma
        ".update orders customer='Jane' amount=30 where id=1",
    ] {
        assert!(
            matches!(
                session.handle_line(line, &mut Answer("no")),
                Err(Error::MalformedClause(_))
            ),
            "{}",
            line
        );
    }
    assert!(matches!(
        session.handle_line(".update orders amount='lots' where id = 1", &mut Answer("no")),
        Err(Error::StoreOperationFailed { operation: "update", .. })
    ));
    assert!(matches!(
        session.handle_line(".update invoices amount=1 id=1", &mut Answer("no")),
        Err(Error::TableNotFound(_))
    ));

    assert_eq!(store.open_table("orders")?.scan(Some("id = 1"), None)?, before);
    assert!(session.is_running());
    Ok(())
}

#[test]
fn declined_drop_keeps_table() -> Result<()> {
    let store = orders_store()?;
    let mut session = start(store.clone())?;

    for answer in ["no", "", "y", "yes please"] {
        assert_eq!(session.handle_line(".drop orders", &mut Answer(answer))?, Reply::Cancelled);
    }
    assert!(store.list_tables()?.contains(&"orders".to_string()));
    assert_eq!(
        query(&mut session, "select count(*) from orders")?.0,
        vec![vec![Value::Integer(10)]]
    );

    assert_eq!(
        session.handle_line(".drop orders", &mut Answer(" Yes\n"))?,
        Reply::Dropped("orders".into())
    );
    assert_eq!(store.list_tables()?, vec!["customers"]);
    assert!(matches!(
        session.handle_line("select * from orders", &mut Answer("no")),
        Err(Error::QueryFailed(m)) if m.contains("does not exist")
    ));
    Ok(())
}

#[test]
fn refresh_is_idempotent() -> Result<()> {
    let mut session = start(orders_store()?)?;
    let sql = "select o.customer, c.city, sum(o.amount) as total from orders o \
               left join customers c on o.customer = c.name \
               group by o.customer, c.city order by o.customer";
    let (expected, _) = query(&mut session, sql)?;
    assert_eq!(expected.len(), 3);

    for _ in 0..2 {
        match session.handle_line(".refresh", &mut Answer("no"))? {
            Reply::Refreshed(report) => {
                assert_eq!(report.refreshed, vec!["customers", "orders"]);
                assert!(report.failed.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.table_names(), vec!["customers", "orders"]);
        assert_eq!(query(&mut session, sql)?, (expected.clone(), false));
    }
    Ok(())
}

#[test]
fn external_changes_are_recovered_once() -> Result<()> {
    let store = orders_store()?;
    let mut session = start(store.clone())?;

    // another writer changes the table behind the session's view
    store.open_table("orders")?.delete("customer = 'c1'")?;
    let (rows, retried) = query(&mut session, "select count(*) from orders")?;
    assert!(retried);
    assert_eq!(rows, vec![vec![Value::Integer(6)]]);

    // once refreshed, the next query runs first time
    let (_, retried) = query(&mut session, "select count(*) from orders")?;
    assert!(!retried);

    // a table dropped and recreated elsewhere is drift too
    store.drop_table("customers")?;
    store.create_table(Table {
        name: "customers".into(),
        columns: vec![Column::new("name", DataType::String, false)],
    })?;
    let (rows, retried) = query(&mut session, "select * from customers")?;
    assert!(retried);
    assert!(rows.is_empty());
    Ok(())
}

#[test]
fn clause_properties() -> Result<()> {
    let clause = "name='Smith, John', note=\"a=b\", age=41, ratio=0.5, ok=TRUE, gone=none";
    let pairs = tokenize(clause)?;
    assert_eq!(pairs.len(), 6);
    assert_eq!(pairs[0], ("name".to_string(), "'Smith, John'".to_string()));

    let values: Vec<Value> = pairs.iter().map(|(_, raw)| coerce(raw)).collect();
    assert_eq!(
        values,
        vec![
            Value::String("Smith, John".into()),
            Value::String("a=b".into()),
            Value::Integer(41),
            Value::Float(0.5),
            Value::Boolean(true),
            Value::Null,
        ]
    );

    // coercion is total
    for raw in ["", "'", "\"", "1.", ".", "-", "1e3", "9999999999999999999999", "ünï"] {
        let _ = coerce(raw);
    }
    Ok(())
}
