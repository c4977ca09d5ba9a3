//! Template compilation and dialect rendering through the public API.

use rowforge::paging::SqlParts;
use rowforge::{
    AnsiDialect, Arg, Dialect, NamedArgs, OrmError, PostgresDialect, Sql, Value, args,
    compile_sql, named, sql,
};

#[test]
fn fragments_compile_then_render_for_postgres() -> Result<(), OrmError> {
    let mut query = sql("SELECT * FROM orders", args![]);
    query
        .append("WHERE status IN (@0)", args![vec!["new", "paid"]])
        .append("WHERE total > @min AND total < @max", args![named! { min: 10, max: 99 }])
        .append("ORDER BY created_at DESC", args![]);
    let compiled = query.compile()?;

    assert_eq!(
        compiled.sql(),
        "SELECT * FROM orders\nWHERE status IN (@0,@1)\nAND total > @2 AND total < @3\nORDER BY created_at DESC"
    );
    assert_eq!(
        compiled.args(),
        [
            Value::from("new"),
            Value::from("paid"),
            Value::Int(10),
            Value::Int(99)
        ]
    );

    let rendered = PostgresDialect.render(compiled.sql());
    assert_eq!(
        rendered,
        "SELECT * FROM orders\nWHERE status IN ($1,$2)\nAND total > $3 AND total < $4\nORDER BY created_at DESC"
    );
    Ok(())
}

#[test]
fn native_variables_survive_rendering() -> Result<(), OrmError> {
    let compiled = compile_sql([("SELECT @@ROWCOUNT, @0, '@1' AS lit", args![5])])?;
    assert_eq!(compiled.sql(), "SELECT @@ROWCOUNT, @0, '@1' AS lit");

    let rendered = PostgresDialect.render(compiled.sql());
    assert_eq!(rendered, "SELECT @ROWCOUNT, $1, '@1' AS lit");
    assert_eq!(AnsiDialect.render(compiled.sql()), "SELECT @ROWCOUNT, @0, '@1' AS lit");
    Ok(())
}

#[test]
fn named_bag_from_serde() -> Result<(), OrmError> {
    #[derive(serde::Serialize)]
    struct Filter {
        city: String,
        tags: Vec<String>,
    }

    let bag = NamedArgs::from_serialize(&Filter {
        city: "Oslo".into(),
        tags: vec!["a".into(), "b".into()],
    })?;
    let compiled = compile_sql([("WHERE city = @City AND tag IN (@tags)", vec![Arg::from(bag)])])?;
    assert_eq!(compiled.sql(), "WHERE city = @0 AND tag IN (@1,@2)");
    assert_eq!(compiled.args()[0], Value::from("Oslo"));
    Ok(())
}

#[test]
fn builder_compiles_clauses() -> Result<(), OrmError> {
    let mut query = Sql::new();
    query
        .select(&["o.id", "c.name"])
        .from_(&["orders o"])
        .inner_join("customers c")
        .on("c.id = o.customer_id", args![])
        .where_("o.total > @0", args![100])
        .where_("c.region = @0", args!["EU"])
        .order_by(&["o.id"]);
    let compiled = query.compile()?;

    assert_eq!(
        compiled.sql(),
        "SELECT o.id, c.name\nFROM orders o\nINNER JOIN customers c\nON c.id = o.customer_id\nWHERE (o.total > @0)\nAND (c.region = @1)\nORDER BY o.id"
    );
    Ok(())
}

#[test]
fn compile_errors() {
    let err = compile_sql([("WHERE a = @3", args![1])]).unwrap_err();
    assert!(matches!(err, OrmError::PlaceholderIndexOutOfRange { index: 3, count: 1 }));

    let err = compile_sql([("WHERE a = @nope", args![named! { yes: 1 }])]).unwrap_err();
    match err {
        OrmError::UnknownArgumentName { name } => assert_eq!(name, "nope"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn paging_wraps_compiled_sql() -> Result<(), OrmError> {
    let compiled = compile_sql([(
        "SELECT id, name FROM users WHERE age > @0 ORDER BY name",
        args![18],
    )])?;
    let parts = SqlParts::split(compiled.sql())?;
    assert_eq!(parts.count_sql(), "SELECT COUNT(*) FROM users WHERE age > @0");

    let mut args = compiled.args().to_vec();
    let paged = PostgresDialect.build_paged_query(20, 10, &parts, &mut args);
    assert_eq!(
        PostgresDialect.render(&paged),
        "SELECT id, name FROM users WHERE age > $1 ORDER BY name\nLIMIT $2 OFFSET $3"
    );
    assert_eq!(args, [Value::Int(18), Value::Int(10), Value::Int(20)]);
    Ok(())
}
