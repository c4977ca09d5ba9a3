use super::*;
use crate::error::OrmError;
use crate::fetch::{materialize, materialize_multi};
use crate::row::{Row, Rows, shape};
use crate::schema::{
    ColumnDescriptor, DefaultMapper, EnumInfo, Mapper, RelationDescriptor, SchemaRegistry,
    TypeDescription, ValueKind,
};
use crate::value::{FromValue, Value};
use std::any::Any;

const SHADE: EnumInfo = EnumInfo {
    name: "Shade",
    variants: &["Light", "Dark"],
};

#[derive(Debug, Default, PartialEq)]
struct Parent {
    id: i64,
    name: String,
    shade: i64,
    children: Vec<Child>,
}

impl Mapped for Parent {
    fn describe() -> TypeDescription {
        TypeDescription::new("Parent")
            .column(ColumnDescriptor::of::<i64>("id", 0))
            .column(ColumnDescriptor::of::<String>("name", 1))
            .column(ColumnDescriptor::new("shade", 2, ValueKind::Enum(SHADE), false))
            .relation(RelationDescriptor::many::<Child>("children", 0))
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }

    fn set_member(&mut self, member_index: usize, value: Value) -> OrmResult<()> {
        match member_index {
            0 => self.id = i64::from_value(value)?,
            1 => self.name = String::from_value(value)?,
            2 => self.shade = i64::from_value(value)?,
            _ => {}
        }
        Ok(())
    }

    fn get_member(&self, member_index: usize) -> Value {
        match member_index {
            0 => Value::Int(self.id),
            1 => Value::Text(self.name.clone()),
            2 => Value::Int(self.shade),
            _ => Value::Null,
        }
    }

    fn attach(&mut self, relation_index: usize, child: Box<dyn Any + Send>) -> bool {
        match (relation_index, child.downcast::<Child>()) {
            (0, Ok(child)) => {
                self.children.push(*child);
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone)]
struct Child {
    id: i64,
    parent_id: i64,
    title: Option<String>,
}

impl Mapped for Child {
    fn describe() -> TypeDescription {
        TypeDescription::new("Child")
            .column(ColumnDescriptor::of::<i64>("id", 0))
            .column(ColumnDescriptor::of::<i64>("parent_id", 1))
            .column(ColumnDescriptor::of::<Option<String>>("title", 2))
    }

    fn construct() -> Option<Self> {
        Some(Self::default())
    }

    fn set_member(&mut self, member_index: usize, value: Value) -> OrmResult<()> {
        match member_index {
            0 => self.id = i64::from_value(value)?,
            1 => self.parent_id = i64::from_value(value)?,
            2 => self.title = Option::<String>::from_value(value)?,
            _ => {}
        }
        Ok(())
    }

    fn get_member(&self, member_index: usize) -> Value {
        match member_index {
            0 => Value::Int(self.id),
            1 => Value::Int(self.parent_id),
            2 => self.title.clone().into(),
            _ => Value::Null,
        }
    }
}

/// Has no blank state.
struct Handle;

impl Mapped for Handle {
    fn describe() -> TypeDescription {
        TypeDescription::new("Handle")
            .column(ColumnDescriptor::of::<i64>("id", 0))
            .constructible(false)
    }

    fn construct() -> Option<Self> {
        None
    }

    fn set_member(&mut self, _member_index: usize, _value: Value) -> OrmResult<()> {
        Ok(())
    }

    fn get_member(&self, _member_index: usize) -> Value {
        Value::Null
    }
}

fn mapper() -> Arc<dyn Mapper> {
    Arc::new(DefaultMapper)
}

fn schema_of<T: Mapped>(registry: &SchemaRegistry, mapper: &Arc<dyn Mapper>) -> Arc<TypeSchema> {
    registry.schema_for::<T>(mapper)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

#[test]
fn binds_columns_case_insensitively() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Parent>(&registry, &mapper());
    let cols = shape(["ID", "Name", "unknown"]);
    let factory = RowFactory::<Parent>::compile(&cols, &schema, 0, cols.len()).unwrap();

    let row = Row::new(cols.clone(), vec![Value::Int(7), text("ann"), text("ignored")]);
    let parent = factory.build(&row).unwrap();
    assert_eq!(parent.id, 7);
    assert_eq!(parent.name, "ann");
    assert_eq!(factory.bound_columns().count(), 2);
}

#[test]
fn coerces_and_defaults_nulls() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id", "parent_id", "title"]);
    let factory = RowFactory::<Child>::compile(&cols, &schema, 0, 3).unwrap();

    let row = Row::new(cols.clone(), vec![text("12"), Value::Null, Value::Null]);
    let child = factory.build(&row).unwrap();
    assert_eq!(
        child,
        Child {
            id: 12,
            parent_id: 0,
            title: None
        }
    );
}

#[test]
fn decode_errors_name_the_column() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id", "parent_id"]);
    let factory = RowFactory::<Child>::compile(&cols, &schema, 0, 2).unwrap();

    let row = Row::new(cols.clone(), vec![Value::Int(1), text("abc")]);
    match factory.build(&row) {
        Err(OrmError::Decode { column, .. }) => assert_eq!(column, "parent_id"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn enum_columns_resolve_by_name() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Parent>(&registry, &mapper());
    let cols = shape(["shade"]);
    let factory = RowFactory::<Parent>::compile(&cols, &schema, 0, 1).unwrap();

    let dark = factory.build(&Row::new(cols.clone(), vec![text("dark")])).unwrap();
    assert_eq!(dark.shade, 1);

    match factory.build(&Row::new(cols.clone(), vec![text("Purple")])) {
        Err(OrmError::EnumValueNotFound { value, enum_name }) => {
            assert_eq!(value, "Purple");
            assert_eq!(enum_name, "Shade");
        }
        other => panic!("expected enum error, got {other:?}"),
    }
}

#[test]
fn from_storage_replaces_coercion() {
    let registry = SchemaRegistry::new();
    let m: Arc<dyn Mapper> = Arc::new(crate::schema::ConventionMapper::new().from_storage(
        "Parent",
        "name",
        |v| Ok(Value::Text(format!("<{v}>"))),
    ));
    let schema = schema_of::<Parent>(&registry, &m);
    let cols = shape(["name"]);
    let factory = RowFactory::<Parent>::compile(&cols, &schema, 0, 1).unwrap();

    // An integer would coerce to "5"; the converter sees the raw value instead.
    let parent = factory.build(&Row::new(cols.clone(), vec![Value::Int(5)])).unwrap();
    assert_eq!(parent.name, "<5>");
}

#[test]
fn unconstructible_type_fails_at_compile() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Handle>(&registry, &mapper());
    let cols = shape(["id"]);
    let err = RowFactory::<Handle>::compile(&cols, &schema, 0, 1).unwrap_err();
    assert!(matches!(err, OrmError::UnconstructibleType { type_name } if type_name == "Handle"));
}

#[test]
fn rejects_schema_of_another_type() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id"]);
    assert!(RowFactory::<Parent>::compile(&cols, &schema, 0, 1).is_err());
}

#[test]
fn factory_reads_only_its_range() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id", "id", "title"]);
    let factory = RowFactory::<Child>::compile(&cols, &schema, 1, 2).unwrap();

    let row = Row::new(cols.clone(), vec![Value::Int(1), Value::Int(2), text("t")]);
    let child = factory.build(&row).unwrap();
    assert_eq!(child.id, 2);
    assert_eq!(child.title.as_deref(), Some("t"));
}

#[test]
fn cache_keeps_one_entry_per_key() {
    let cache = FactoryCache::new();
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id", "title"]);
    let key = |offset| FactoryKey {
        connection: "".into(),
        sql: "SELECT id, title FROM child".into(),
        shape: cols.clone(),
        types: vec![TypeId::of::<Child>()],
        schemas: vec![schema.id()],
        offset,
        count: 2 - offset,
    };

    let compile = |offset| RowFactory::<Child>::compile(&cols, &schema, offset, 2 - offset);
    let a = cache.get_or_compile(key(0), || compile(0)).unwrap();
    let b = cache
        .get_or_compile(key(0), || -> OrmResult<RowFactory<Child>> {
            panic!("cached factory should be reused")
        })
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);

    cache.get_or_compile(key(1), || compile(1)).unwrap();
    assert_eq!(cache.len(), 2);

    cache.flush();
    assert!(cache.is_empty());
    let c = cache.get_or_compile(key(0), || compile(0)).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn cache_races_settle_on_one_entry() {
    let cache = Arc::new(FactoryCache::new());
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id"]);
    let key = FactoryKey {
        connection: "".into(),
        sql: "q".into(),
        shape: cols.clone(),
        types: vec![TypeId::of::<Child>()],
        schemas: vec![schema.id()],
        offset: 0,
        count: 1,
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let key = key.clone();
            let schema = schema.clone();
            let cols = cols.clone();
            std::thread::spawn(move || {
                cache
                    .get_or_compile(key, || RowFactory::<Child>::compile(&cols, &schema, 0, 1))
                    .map(|_| ())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(cache.len(), 1);
    let first = cache.get::<RowFactory<Child>>(&key).unwrap();
    let second = cache.get::<RowFactory<Child>>(&key).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn global_cache_entry_points() {
    let registry = SchemaRegistry::new();
    let schema = schema_of::<Child>(&registry, &mapper());
    let cols = shape(["id", "parent_id", "global_cache_entry_points"]);

    let a = get_row_factory::<Child>(&cols, &schema, 0, 3).unwrap();
    let b = get_row_factory::<Child>(&cols, &schema, 0, 3).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let scoped = get_row_factory_in::<Child>(&FactoryScope::new("replica", ""), &cols, &schema, 0, 3)
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &scoped));
}

#[test]
fn splits_joined_columns_by_schema() {
    let registry = SchemaRegistry::new();
    let m = mapper();
    let schemas = vec![
        schema_of::<Parent>(&registry, &m),
        schema_of::<Child>(&registry, &m),
    ];

    let cols = shape(["id", "name", "id", "parent_id", "title"]);
    assert_eq!(split_columns(&cols, &schemas), vec![0..2, 2..5]);

    // A column foreign to the first schema starts the next group.
    let cols = shape(["id", "parent_id", "title"]);
    assert_eq!(split_columns(&cols, &schemas), vec![0..1, 1..3]);
}

#[test]
fn split_stops_at_schema_width() {
    let registry = SchemaRegistry::new();
    let m = mapper();
    let schemas = vec![
        schema_of::<Child>(&registry, &m),
        schema_of::<Child>(&registry, &m),
    ];
    let cols = shape(["id", "parent_id", "title", "title"]);
    assert_eq!(split_columns(&cols, &schemas), vec![0..3, 3..4]);
}

fn joined_rows() -> Rows {
    Rows::new(
        shape(["id", "name", "shade", "id", "parent_id", "title"]),
        vec![
            vec![Value::Int(1), text("a"), text("Light"), Value::Int(10), Value::Int(1), text("x")],
            vec![Value::Int(1), text("a"), text("Light"), Value::Int(11), Value::Int(1), text("y")],
            vec![Value::Int(2), text("b"), text("Dark"), Value::Int(12), Value::Int(2), Value::Null],
        ],
    )
}

#[test]
fn auto_link_attaches_child_to_parent() {
    let scope = FactoryScope::new("", "auto_link_attaches_child_to_parent");
    let parents: Vec<Parent> =
        materialize_multi::<(Parent, Child), _, _>(joined_rows(), &mapper(), &scope, AutoLink::new())
            .unwrap()
            .collect::<OrmResult<_>>()
            .unwrap();

    assert_eq!(parents.len(), 3);
    assert_eq!(parents[0].children.len(), 1);
    assert_eq!(parents[0].children[0].id, 10);
    assert_eq!(parents[2].shade, 1);
    assert_eq!(parents[2].children[0].title, None);
}

#[test]
fn auto_link_drops_child_without_relation_member() {
    let registry = SchemaRegistry::new();
    let m = mapper();
    let schemas = vec![
        schema_of::<Child>(&registry, &m),
        schema_of::<Parent>(&registry, &m),
    ];
    let plan = LinkPlan::infer(&schemas);
    assert_eq!(plan.link(1), None);

    let child = Child {
        id: 3,
        ..Child::default()
    };
    let root = plan.apply((child.clone(), Parent::default())).unwrap();
    assert_eq!(root, child);
}

#[test]
fn link_plan_searches_nearest_parent_first() {
    let registry = SchemaRegistry::new();
    let m = mapper();
    let schemas = vec![
        schema_of::<Parent>(&registry, &m),
        schema_of::<Parent>(&registry, &m),
        schema_of::<Child>(&registry, &m),
    ];
    let plan = LinkPlan::infer(&schemas);
    assert_eq!(plan.link(1), None);
    assert_eq!(
        plan.link(2),
        Some(Link {
            parent: 1,
            relation_index: 0
        })
    );
}

#[test]
fn one_to_many_groups_consecutive_rows() {
    let scope = FactoryScope::new("", "one_to_many_groups_consecutive_rows");
    let combiner = OneToMany::new(|p: &Parent| p.id, |p: &mut Parent, c: Child| p.children.push(c));
    let parents: Vec<Parent> =
        materialize_multi::<(Parent, Child), _, _>(joined_rows(), &mapper(), &scope, combiner)
            .unwrap()
            .collect::<OrmResult<_>>()
            .unwrap();

    assert_eq!(parents.len(), 2);
    let ids: Vec<i64> = parents[0].children.iter().map(|c| c.id).collect();
    assert_eq!(ids, [10, 11]);
    assert_eq!(parents[1].children.len(), 1);
}

#[test]
fn relate_flushes_on_finish() {
    let scope = FactoryScope::new("", "relate_flushes_on_finish");
    let mut count = 0;
    let combiner = relate(move |row: Option<(Parent, Child)>| match row {
        Some(_) => {
            count += 1;
            None
        }
        None => Some(count),
    });
    let out: Vec<i32> = materialize_multi::<(Parent, Child), _, _>(joined_rows(), &mapper(), &scope, combiner)
        .unwrap()
        .collect::<OrmResult<_>>()
        .unwrap();
    assert_eq!(out, [3]);
}

#[test]
fn fn_combiner_maps_each_row() {
    let scope = FactoryScope::new("", "fn_combiner_maps_each_row");
    let pairs: Vec<(i64, i64)> = materialize_multi::<(Parent, Child), _, _>(
        joined_rows(),
        &mapper(),
        &scope,
        combine(|(p, c): (Parent, Child)| (p.id, c.id)),
    )
    .unwrap()
    .collect::<OrmResult<_>>()
    .unwrap();
    assert_eq!(pairs, [(1, 10), (1, 11), (2, 12)]);
}

#[test]
fn materialize_stops_after_error() {
    let scope = FactoryScope::new("", "materialize_stops_after_error");
    let rows = Rows::new(
        shape(["id"]),
        vec![vec![Value::Int(1)], vec![text("bad")], vec![Value::Int(3)]],
    );
    let results: Vec<OrmResult<Child>> = materialize::<Child, _>(rows, &mapper(), &scope)
        .unwrap()
        .collect();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().id, 1);
    assert!(results[1].is_err());
}

#[test]
fn materialize_reports_unconstructible_before_reading() {
    let scope = FactoryScope::new("", "materialize_reports_unconstructible_before_reading");
    let rows = Rows::new(shape(["id"]), vec![vec![Value::Int(1)]]);
    assert!(matches!(
        materialize::<Handle, _>(rows, &mapper(), &scope),
        Err(OrmError::UnconstructibleType { .. })
    ));
}
