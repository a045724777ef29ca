//! NEXTVAL / CURRVAL through sessions.

use std::{collections::HashSet, sync::Arc, thread};

use anyhow::Result;
use common::{Config, CurrvalPolicy, DbError, Mode, ObjectKind};
use database::{Database, QueryResult, Session};
use pretty_assertions::assert_eq;
use types::{SqlType, Value};

fn setup() -> Result<Arc<Database>> {
    let db = Database::in_memory(Config::default())?;
    db.session().execute(
        "CREATE SCHEMA app;
         CREATE SEQUENCE app.orders INCREMENT BY 10 START WITH 100;
         CREATE SEQUENCE myseq;",
    )?;
    Ok(db)
}

fn scalar(session: &mut Session, sql: &str) -> Result<Value> {
    match session.execute(sql)? {
        QueryResult::Rows { rows, .. } => Ok(rows[0].values[0].clone()),
        other => anyhow::bail!("expected rows, got {other:?}"),
    }
}

fn db_error(err: anyhow::Error) -> DbError {
    match err.downcast::<DbError>() {
        Ok(err) => err,
        Err(other) => panic!("expected DbError, got {other:?}"),
    }
}

#[test]
fn nextval_then_currval_in_same_session() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('APP', 'ORDERS')")?, Value::Int(100));
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('APP', 'ORDERS')")?, Value::Int(100));
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('APP', 'ORDERS')")?, Value::Int(110));
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('APP', 'ORDERS')")?, Value::Int(110));
    Ok(())
}

#[test]
fn current_values_are_private_to_a_session() -> Result<()> {
    let db = setup()?;
    let mut first = db.session();
    let mut second = db.session();

    scalar(&mut first, "SELECT NEXTVAL('app.orders')")?;
    let err = db_error(second.execute("SELECT CURRVAL('app.orders')").unwrap_err());
    assert!(matches!(err, DbError::CurrentValueUndefined(ref name) if name == "APP.ORDERS"));

    assert_eq!(scalar(&mut second, "SELECT NEXTVAL('app.orders')")?, Value::Int(110));
    assert_eq!(scalar(&mut first, "SELECT CURRVAL('app.orders')")?, Value::Int(100));
    assert_eq!(scalar(&mut second, "SELECT CURRVAL('app.orders')")?, Value::Int(110));
    Ok(())
}

#[test]
fn unqualified_names_resolve_in_current_schema() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('myseq')")?, Value::Int(1));

    session.execute("SET search_path = app")?;
    assert_eq!(session.current_schema(), "APP");
    let err = db_error(session.execute("SELECT NEXTVAL('myseq')").unwrap_err());
    assert!(matches!(
        err,
        DbError::ObjectNotFound { kind: ObjectKind::Sequence, ref name } if name == "MYSEQ"
    ));

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('public.myseq')")?, Value::Int(2));
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('orders')")?, Value::Int(100));
    Ok(())
}

#[test]
fn names_fall_back_to_upper_case() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();
    session.execute(r#"CREATE SEQUENCE "Mixed" START WITH 7"#)?;

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('App', 'Orders')")?, Value::Int(100));
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('public', 'Mixed')")?, Value::Int(7));

    let err = db_error(session.execute("SELECT NEXTVAL('public', 'mixed')").unwrap_err());
    assert_eq!(err.to_string(), "sequence \"MIXED\" not found");

    let err = db_error(session.execute("SELECT NEXTVAL('nowhere', 'x')").unwrap_err());
    assert!(matches!(
        err,
        DbError::ObjectNotFound { kind: ObjectKind::Schema, ref name } if name == "NOWHERE"
    ));
    Ok(())
}

#[test]
fn malformed_dynamic_name_is_a_syntax_error() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    for name in ["1+1", "42", "a.b.c.d", "myseq extra"] {
        let err = db_error(
            session
                .execute(&format!("SELECT NEXTVAL('{name}')"))
                .unwrap_err(),
        );
        assert!(matches!(err, DbError::Syntax(ref sql) if sql == name), "{name}: {err}");
    }

    // Nothing was allocated by the failed calls.
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('myseq')")?, Value::Int(1));
    Ok(())
}

#[test]
fn select_names_its_columns() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    let result = session.execute("SELECT NEXTVAL('myseq') AS id, CURRVAL('myseq')")?;
    let QueryResult::Rows { schema, rows } = result else {
        panic!("expected rows");
    };
    assert_eq!(schema, vec!["ID".to_string(), "CURRVAL('myseq')".to_string()]);
    assert_eq!(rows[0].values, vec![Value::Int(1), Value::Int(1)]);
    Ok(())
}

#[test]
fn each_nextval_call_allocates() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    let result = session.execute("SELECT NEXTVAL('myseq'), NEXTVAL('myseq')")?;
    let QueryResult::Rows { rows, .. } = result else {
        panic!("expected rows");
    };
    assert_eq!(rows[0].values, vec![Value::Int(1), Value::Int(2)]);
    Ok(())
}

#[test]
fn repeated_evaluation_allocates_every_time() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();
    let expr = parser::parse_expression("NEXTVAL('myseq')")?;

    assert_eq!(session.evaluate(expr.clone())?, Value::Int(1));
    assert_eq!(session.evaluate(expr.clone())?, Value::Int(2));

    let both = parser::parse_expression("NEXTVAL('myseq') < NEXTVAL('myseq')")?;
    assert_eq!(session.evaluate(both)?, Value::Bool(true));
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('myseq')")?, Value::Int(4));

    let catalog = db.catalog().read();
    let sequence = catalog.schema("PUBLIC")?.sequence("MYSEQ")?;
    assert_eq!(sequence.current_value(), 4);
    Ok(())
}

#[test]
fn three_part_name_uses_its_table_qualifier() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('x.app.orders')")?, Value::Int(100));
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('APP', 'ORDERS')")?, Value::Int(100));
    Ok(())
}

#[test]
fn decimal_sequences_mode() -> Result<()> {
    let config = Config::builder().mode(Mode::oracle()).build();
    let db = Database::in_memory(config)?;
    let mut session = db.session();
    session.execute("CREATE SEQUENCE s")?;

    let expected = Value::Int(1).convert_to(&SqlType::numeric_bigint())?;
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('s')")?, expected);

    session.set_mode(Mode::regular());
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('s')")?, Value::Int(1));
    Ok(())
}

#[test]
fn currval_policy_generator_value() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();
    session.set_mode(
        Mode::builder()
            .name("LEGACY".to_string())
            .currval_policy(CurrvalPolicy::GeneratorValue)
            .build(),
    );

    assert_eq!(scalar(&mut session, "SELECT CURRVAL('app.orders')")?, Value::Int(90));

    let mut other = db.session();
    scalar(&mut other, "SELECT NEXTVAL('app.orders')")?;
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('app.orders')")?, Value::Int(100));
    Ok(())
}

#[test]
fn bounded_sequences_exhaust_or_cycle() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();
    session.execute(
        "CREATE SEQUENCE small MAXVALUE 2;
         CREATE SEQUENCE ring MINVALUE 1 MAXVALUE 2 CYCLE;",
    )?;

    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('small')")?, Value::Int(1));
    assert_eq!(scalar(&mut session, "SELECT NEXTVAL('small')")?, Value::Int(2));
    let err = db_error(session.execute("SELECT NEXTVAL('small')").unwrap_err());
    assert!(matches!(err, DbError::SequenceExhausted(_)));
    assert_eq!(scalar(&mut session, "SELECT CURRVAL('small')")?, Value::Int(2));

    let ring: Vec<Value> = (0..3)
        .map(|_| scalar(&mut session, "SELECT NEXTVAL('ring')"))
        .collect::<Result<_>>()?;
    assert_eq!(ring, vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
    Ok(())
}

#[test]
fn ddl_if_exists_variants() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();

    session.execute("CREATE SCHEMA IF NOT EXISTS app")?;
    session.execute("CREATE SEQUENCE IF NOT EXISTS app.orders")?;
    assert!(session.execute("CREATE SEQUENCE app.orders").is_err());
    assert!(session.execute("DROP SCHEMA app").is_err());

    session.execute("DROP SEQUENCE app.orders")?;
    session.execute("DROP SEQUENCE IF EXISTS app.orders")?;
    let err = db_error(session.execute("SELECT NEXTVAL('app.orders')").unwrap_err());
    assert!(matches!(err, DbError::ObjectNotFound { kind: ObjectKind::Sequence, .. }));

    session.execute("DROP SCHEMA app; DROP SCHEMA IF EXISTS app")?;
    assert!(session.set_schema("app").is_err());
    Ok(())
}

#[test]
fn recreated_sequence_forgets_session_value() -> Result<()> {
    let db = setup()?;
    let mut session = db.session();
    scalar(&mut session, "SELECT NEXTVAL('myseq')")?;

    session.execute("DROP SEQUENCE myseq; CREATE SEQUENCE myseq")?;
    let err = db_error(session.execute("SELECT CURRVAL('myseq')").unwrap_err());
    assert!(matches!(err, DbError::CurrentValueUndefined(_)));
    Ok(())
}

#[test]
fn concurrent_sessions_never_share_a_value() -> Result<()> {
    const THREADS: usize = 8;
    const CALLS: usize = 200;

    let db = setup()?;
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || -> Result<Vec<i64>> {
                let mut session = db.session();
                let mut seen = Vec::with_capacity(CALLS);
                for _ in 0..CALLS {
                    match scalar(&mut session, "SELECT NEXTVAL('myseq')")? {
                        Value::Int(v) => seen.push(v),
                        other => anyhow::bail!("unexpected value {other:?}"),
                    }
                    let current = scalar(&mut session, "SELECT CURRVAL('myseq')")?;
                    assert_eq!(current, Value::Int(*seen.last().unwrap_or(&0)));
                }
                Ok(seen)
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let seen = handle.join().expect("worker panicked")?;
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "per-session order");
        for value in seen {
            assert!(all.insert(value), "value {value} handed out twice");
        }
    }
    let expected: HashSet<i64> = (1..=(THREADS * CALLS) as i64).collect();
    assert_eq!(all, expected);
    Ok(())
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn interleaved_sessions_stay_consistent(
            picks in proptest::collection::vec(any::<bool>(), 1..30),
        ) {
            let db = setup().unwrap();
            let mut sessions = [db.session(), db.session()];
            let mut last = [None, None];
            let mut previous = 0;

            for pick in picks {
                let idx = usize::from(pick);
                let value = scalar(&mut sessions[idx], "SELECT NEXTVAL('myseq')").unwrap();
                let Value::Int(v) = value else {
                    panic!("unexpected value {value:?}");
                };
                prop_assert!(v > previous);
                previous = v;
                last[idx] = Some(v);

                for (session, recorded) in sessions.iter_mut().zip(last) {
                    let current = session.execute("SELECT CURRVAL('myseq')");
                    match recorded {
                        Some(v) => prop_assert_eq!(
                            current.unwrap(),
                            QueryResult::Rows {
                                schema: vec!["CURRVAL('myseq')".to_string()],
                                rows: vec![common::Row::new(vec![Value::Int(v)])],
                            }
                        ),
                        None => prop_assert!(current.is_err()),
                    }
                }
            }
        }
    }
}
