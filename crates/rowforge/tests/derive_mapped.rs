//! Derived types materialized from in-memory rows.

use rowforge::row::shape;
use rowforge::{
    AutoLink, FactoryScope, Mapped, MappedEnum, OneToMany, OrmError, PostgresDialect, Rows,
    Value, default_mapper, materialize, materialize_multi, schema_registry, to_named_args, write,
};

#[derive(Debug, Clone, Copy, PartialEq, Default, MappedEnum)]
enum Status {
    #[default]
    Draft,
    Published,
    #[orm(rename = "gone")]
    Archived,
}

#[derive(Debug, Default, Mapped)]
#[orm(table = "authors")]
struct Author {
    id: i64,
    name: String,
    #[orm(relation)]
    posts: Vec<Post>,
}

#[derive(Debug, Default, Mapped)]
#[orm(table = "posts", auto_increment)]
struct Post {
    id: i64,
    #[orm(column = "author_id")]
    author: i64,
    title: String,
    status: Status,
    body: Option<String>,
    #[orm(result)]
    comment_count: i64,
    #[orm(ignore)]
    cached: bool,
}

#[derive(Debug, Mapped)]
#[orm(no_default)]
struct Opaque {
    id: i64,
}

fn scope(name: &str) -> FactoryScope {
    FactoryScope::new("derive_mapped", name)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn materializes_derived_struct() -> Result<(), OrmError> {
    let rows = Rows::new(
        shape(["ID", "Title", "status", "author_id", "body", "unrelated"]),
        vec![
            vec![Value::Int(1), text("Hello"), text("published"), Value::Int(7), Value::Null, Value::Int(0)],
            vec![Value::Int(2), text("Bye"), text("GONE"), Value::Int(7), text("text"), Value::Int(0)],
        ],
    );

    let posts: Vec<Post> =
        materialize(rows, &default_mapper(), &scope("posts"))?.collect::<Result<_, _>>()?;

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, 1);
    assert_eq!(posts[0].title, "Hello");
    assert_eq!(posts[0].status, Status::Published);
    assert_eq!(posts[0].author, 7);
    assert_eq!(posts[0].body, None);
    assert_eq!(posts[1].status, Status::Archived);
    assert_eq!(posts[1].body.as_deref(), Some("text"));
    assert!(!posts[1].cached);
    Ok(())
}

#[test]
fn enum_by_ordinal_and_unknown_name() {
    let rows = Rows::new(
        shape(["id", "status"]),
        vec![vec![Value::Int(1), Value::Int(1)], vec![Value::Int(2), text("Deleted")]],
    );
    let mut iter = materialize::<Post, _>(rows, &default_mapper(), &scope("enum")).unwrap();

    assert_eq!(iter.next().unwrap().unwrap().status, Status::Published);
    let err = iter.next().unwrap().unwrap_err();
    match err {
        OrmError::EnumValueNotFound { value, enum_name } => {
            assert_eq!(value, "Deleted");
            assert_eq!(enum_name, "Status");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(iter.next().is_none());
}

#[test]
fn no_default_types_are_rejected_before_reading() {
    let rows = Rows::new(shape(["id"]), vec![vec![Value::Int(1)]]);
    let err = materialize::<Opaque, _>(rows, &default_mapper(), &scope("opaque"))
        .err()
        .unwrap();
    assert!(matches!(err, OrmError::UnconstructibleType { .. }));
}

#[test]
fn derived_description() {
    let schema = schema_registry().schema_for::<Post>(&default_mapper());
    assert_eq!(schema.table().table_name, "posts");
    assert_eq!(schema.table().primary_key, ["id"]);
    assert!(schema.table().auto_increment);
    assert!(schema.column("comment_count").unwrap().result_column);
    assert!(schema.column("cached").is_none());
    assert_eq!(schema.column("AUTHOR_ID").unwrap().member, "author");

    let authors = schema_registry().schema_for::<Author>(&default_mapper());
    assert_eq!(authors.column_count(), 2);
    assert_eq!(authors.relations().len(), 1);
}

#[test]
fn links_joined_rows_into_parents() -> Result<(), OrmError> {
    let joined = || {
        Rows::new(
            shape(["id", "name", "id", "author_id", "title"]),
            vec![
                vec![Value::Int(1), text("Ann"), Value::Int(10), Value::Int(1), text("a")],
                vec![Value::Int(1), text("Ann"), Value::Int(11), Value::Int(1), text("b")],
                vec![Value::Int(2), text("Bo"), Value::Int(12), Value::Int(2), text("c")],
            ],
        )
    };

    let linked: Vec<Author> = materialize_multi::<(Author, Post), _, _>(
        joined(),
        &default_mapper(),
        &scope("linked"),
        AutoLink::new(),
    )?
    .collect::<Result<_, _>>()?;
    assert_eq!(linked.len(), 3);
    assert_eq!(linked[0].posts.len(), 1);
    assert_eq!(linked[1].posts[0].id, 11);

    let grouped: Vec<Author> = materialize_multi::<(Author, Post), _, _>(
        joined(),
        &default_mapper(),
        &scope("grouped"),
        OneToMany::new(|a: &Author| a.id, |a: &mut Author, p: Post| a.posts.push(p)),
    )?
    .collect::<Result<_, _>>()?;
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].name, "Ann");
    let titles: Vec<&str> = grouped[0].posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["a", "b"]);
    assert_eq!(grouped[1].posts.len(), 1);
    Ok(())
}

#[test]
fn write_statements_from_derived_type() -> Result<(), OrmError> {
    let schema = schema_registry().schema_for::<Post>(&default_mapper());
    let post = Post {
        id: 5,
        author: 7,
        title: "t".into(),
        status: Status::Archived,
        ..Default::default()
    };

    let (insert, returning) = write::insert(&PostgresDialect, &schema, &post)?;
    assert!(returning);
    assert_eq!(
        insert.sql(),
        r#"INSERT INTO "posts" ("author_id", "title", "status", "body") VALUES (@0, @1, @2, @3) RETURNING "id""#
    );
    assert_eq!(insert.args()[2], text("gone"));

    let update = write::update(&PostgresDialect, &schema, &post)?;
    assert!(update.sql().ends_with(r#"WHERE "id" = @4"#));
    assert_eq!(update.args()[4], Value::Int(5));

    let delete = write::delete(&PostgresDialect, &schema, &post)?;
    assert_eq!(delete.sql(), r#"DELETE FROM "posts" WHERE "id" = @0"#);
    Ok(())
}

#[test]
fn members_become_named_args() {
    let post = Post {
        title: "x".into(),
        ..Default::default()
    };
    let bag = to_named_args(&post);
    assert!(bag.get("title").is_some());
    assert!(bag.get("status").is_some());
    assert!(bag.get("cached").is_none());
}
