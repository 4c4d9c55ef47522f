//! Execution entry points driven against an in-memory database.

use std::sync::Mutex;
use std::time::Duration;

use sqkit::{
    Accumulator, Database, DbConfig, Dialect, ExecMode, Field, InstrumentedDb, Record, SqError,
    SqResult, Value, assign, delete_from, insert_into, select, update,
};

sqkit::table! {
    struct Users("users") {
        user_id: Number,
        displayname: String,
        active: Boolean,
    }
}

sqkit::table! {
    struct Pages("pages") {
        page_id: Number,
        title: String,
    }
}

sqkit::table! {
    struct Tags("tags") {
        page_id: Number,
        name: String,
    }
}

/// Records every statement and answers with canned rows.
struct FakeDb {
    dialect: Dialect,
    rows: Vec<Record>,
    affected: u64,
    fail: bool,
    delay: Option<Duration>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeDb {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            rows: Vec::new(),
            affected: 0,
            fail: false,
            delay: None,
            log: Mutex::new(Vec::new()),
        }
    }

    fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    async fn record(&self, sql: &str, args: &[Value]) -> SqResult<()> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), args.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SqError::UniqueViolation("users_pkey: duplicate key".into()));
        }
        Ok(())
    }
}

impl Database for FakeDb {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(&self, sql: &str, args: &[Value]) -> SqResult<Vec<Record>> {
        self.record(sql, args).await?;
        Ok(self.rows.clone())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> SqResult<u64> {
        self.record(sql, args).await?;
        Ok(self.affected)
    }
}

#[tokio::test]
async fn fetch_all_reads_by_descriptor() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Postgres).with_rows(vec![
        vec![Value::Int(1), Value::from("alice")],
        vec![Value::Int(2), Value::from("bob")],
    ]);

    let got = select([&u.user_id, &u.displayname])
        .from(&u)
        .where_([u.active.eq(true)])
        .fetch_all(&db, |row| {
            // read out of order on purpose
            let name = row.string(&u.displayname)?;
            Ok((row.int64(&u.user_id)?, name))
        })
        .await
        .unwrap();

    assert_eq!(got, vec![(1, "alice".to_string()), (2, "bob".to_string())]);
    let statements = db.statements();
    assert_eq!(
        statements[0].0,
        "SELECT u.user_id, u.displayname FROM users AS u WHERE u.active = $1"
    );
    assert_eq!(statements[0].1, vec![Value::Bool(true)]);
}

#[tokio::test]
async fn empty_projection_is_registered_from_mapper() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Sqlite).with_rows(vec![vec![Value::Int(7), Value::from("eve")]]);

    let mut seen = Vec::new();
    let n = select(Vec::<Field>::new())
        .from(&u)
        .fetch_each(&db, |row| {
            let id = row.int64(&u.user_id)?;
            let name = row.string(&u.displayname)?;
            if !row.is_registering() {
                seen.push((id, name));
            }
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(n, 1);
    assert_eq!(seen, vec![(7, "eve".to_string())]);
    assert_eq!(
        db.statements()[0].0,
        "SELECT u.user_id, u.displayname FROM users AS u"
    );
}

#[tokio::test]
async fn mapper_reading_nothing_is_a_render_error() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Sqlite);
    let err = select(Vec::<Field>::new())
        .from(&u)
        .fetch_all(&db, |_row| Ok(()))
        .await
        .unwrap_err();
    assert!(err.is_render());
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn fetch_one_and_fetch_opt_on_empty_result() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Sqlite);
    let q = select([&u.user_id]).from(&u);

    let err = q
        .fetch_one(&db, |row| row.int64(&u.user_id))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("SELECT users"));

    let none = q.fetch_opt(&db, |row| row.int64(&u.user_id)).await.unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn decode_error_surfaces_from_mapper() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Sqlite).with_rows(vec![vec![Value::Null]]);
    let err = select([&u.user_id])
        .from(&u)
        .fetch_one(&db, |row| row.int64(&u.user_id))
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::Decode { ref column, .. } if column == "u.user_id"));
}

#[tokio::test]
async fn exists_wraps_the_query() {
    let u = Users::new("u");
    let db = FakeDb::new(Dialect::Sqlite).with_rows(vec![vec![Value::Int(1)]]);
    let found = select(Vec::<Field>::new())
        .from(&u)
        .where_([u.active.eq(true)])
        .exists(&db)
        .await
        .unwrap();
    assert!(found);
    assert_eq!(
        db.statements()[0].0,
        "SELECT EXISTS (SELECT 1 FROM users AS u WHERE u.active = ?)"
    );
}

#[tokio::test]
async fn exec_reports_rows_affected() {
    let u = Users::new("");
    let mut db = FakeDb::new(Dialect::Sqlite);
    db.affected = 3;

    let res = update(&u)
        .set([assign(&u.active, false)])
        .where_([u.user_id.lt(10)])
        .exec(&db, ExecMode::RowsAffected)
        .await
        .unwrap();
    assert_eq!(res.rows_affected, Some(3));
    assert_eq!(res.last_insert_id, None);

    let res = delete_from(&u)
        .where_([u.active.eq(false)])
        .exec(&db, ExecMode::NoResult)
        .await
        .unwrap();
    assert_eq!(res, Default::default());
    assert_eq!(db.statements().len(), 2);
}

#[tokio::test]
async fn last_insert_id_on_postgres_needs_returning() {
    let u = Users::new("");
    let db = FakeDb::new(Dialect::Postgres).with_rows(vec![vec![Value::Int(42)]]);

    let insert = insert_into(&u).valuesx(|col| {
        col.set_string(&u.displayname, "alice");
    });
    let err = insert
        .exec(&db, ExecMode::LastInsertId)
        .await
        .unwrap_err();
    assert!(matches!(err, SqError::Validation(_)));
    assert!(db.statements().is_empty());

    let res = insert
        .returning([&u.user_id])
        .exec(&db, ExecMode::LastInsertId)
        .await
        .unwrap();
    assert_eq!(res.last_insert_id, Some(42));
    assert_eq!(
        db.statements()[0].0,
        "INSERT INTO users (displayname) VALUES ($1) RETURNING user_id"
    );
}

#[tokio::test]
async fn database_errors_carry_statement_and_call_site() {
    let u = Users::new("");
    let mut db = FakeDb::new(Dialect::Sqlite);
    db.fail = true;

    let err = insert_into(&u)
        .columns([&u.user_id])
        .values([1])
        .exec(&db, ExecMode::NoResult)
        .await
        .unwrap_err();

    assert!(err.is_unique_violation());
    match &err {
        SqError::Execute {
            statement, site, ..
        } => {
            assert_eq!(statement.to_string(), "INSERT users");
            assert!(site.file().ends_with("execution.rs"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // argument values never appear in the message
    assert!(!err.to_string().contains("VALUES"));
}

#[tokio::test]
async fn render_errors_are_not_sent() {
    let u = Users::new("");
    let db = FakeDb::new(Dialect::Sqlite);
    let err = delete_from(&u)
        .exec(&db, ExecMode::RowsAffected)
        .await
        .unwrap_err();
    assert!(err.is_render());
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn returning_rows_are_mapped() {
    let u = Users::new("");
    let db = FakeDb::new(Dialect::Postgres).with_rows(vec![vec![Value::Int(5)], vec![Value::Int(6)]]);
    let ids = update(&u)
        .set([assign(&u.active, false)])
        .where_([u.active.eq(true)])
        .fetch_all(&db, |row| row.int64(&u.user_id))
        .await
        .unwrap();
    assert_eq!(ids, vec![5, 6]);
    assert_eq!(
        db.statements()[0].0,
        "UPDATE users SET active = $1 WHERE users.active = $2 RETURNING user_id"
    );
}

#[derive(Debug, PartialEq)]
struct Page {
    id: i64,
    title: String,
    tags: Vec<String>,
}

#[tokio::test]
async fn join_rows_accumulate_into_groups() {
    let p = Pages::new("p");
    let t = Tags::new("t");
    let db = FakeDb::new(Dialect::Sqlite).with_rows(vec![
        vec![Value::Int(1), Value::from("Intro"), Value::from("rust")],
        vec![Value::Int(1), Value::from("Intro"), Value::from("sql")],
        vec![Value::Int(2), Value::from("Empty"), Value::Null],
    ]);

    let mut pages = Vec::new();
    let mut acc = Accumulator::new(|page: Page| pages.push(page));
    select(Vec::<Field>::new())
        .from(&p)
        .left_join(&t, [t.page_id.eq(&p.page_id)])
        .order_by([&p.page_id])
        .fetch_each(&db, |row| {
            let id = row.int64(&p.page_id)?;
            let title = row.string(&p.title)?;
            let tag = row.nullable_string(&t.name)?;
            acc.accumulate(
                row,
                id,
                || Page {
                    id,
                    title,
                    tags: Vec::new(),
                },
                |page| page.tags.extend(tag),
            )
        })
        .await
        .unwrap();
    acc.finish();

    assert_eq!(
        db.statements()[0].0,
        "SELECT p.page_id, p.title, t.name FROM pages AS p LEFT JOIN tags AS t \
         ON t.page_id = p.page_id ORDER BY p.page_id"
    );
    assert_eq!(
        pages,
        vec![
            Page {
                id: 1,
                title: "Intro".into(),
                tags: vec!["rust".into(), "sql".into()],
            },
            Page {
                id: 2,
                title: "Empty".into(),
                tags: vec![],
            },
        ]
    );
}

#[tokio::test]
async fn instrumented_db_times_out() {
    let u = Users::new("u");
    let mut inner = FakeDb::new(Dialect::Sqlite);
    inner.delay = Some(Duration::from_millis(500));
    let db = InstrumentedDb::new(inner)
        .with_config(DbConfig::new().with_query_timeout(Duration::from_millis(20)));

    let err = select([&u.user_id])
        .from(&u)
        .fetch_all(&db, |row| row.int64(&u.user_id))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn instrumented_db_forwards_results() {
    let u = Users::new("u");
    let inner = FakeDb::new(Dialect::MySql).with_rows(vec![vec![Value::Int(9)]]);
    let db = InstrumentedDb::new(inner).with_config(
        DbConfig::new()
            .with_slow_query_threshold(Duration::from_secs(10))
            .log_params(true),
    );

    let ids = select([&u.user_id])
        .from(&u)
        .where_([u.user_id.eq(9)])
        .fetch_all(&db, |row| row.int64(&u.user_id))
        .await
        .unwrap();
    assert_eq!(ids, vec![9]);
    assert_eq!(db.dialect(), Dialect::MySql);
    assert_eq!(
        db.inner().statements()[0].0,
        "SELECT u.user_id FROM users AS u WHERE u.user_id = ?"
    );
}
