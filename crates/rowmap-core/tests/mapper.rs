//! Materialization tests over in-memory and instrumented row sequences.

use rowmap_core::{
    member, sql_enum, DynamicBag, Entity, MapError, Mapper, MemberDescriptor, MemoryRow,
    MemoryRows, ObjectType, Record, RowSequence, SchemaRegistry, TargetType, Value, ValueKind,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

sql_enum! {
    pub enum DayOfWeek: i32 {
        Sunday = 0,
        Monday = 1,
        Tuesday = 2,
        Wednesday = 3,
        Thursday = 4,
        Friday = 5,
        Saturday = 6,
    }
}

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i32,
    name: String,
}

impl Entity for User {
    fn members() -> Vec<MemberDescriptor<Self>> {
        vec![
            member!(User, id: TargetType::Int32),
            member!(User, name: TargetType::String),
        ]
    }
}

static TAGS: ObjectType = ObjectType {
    name: "Tags",
    kind: ValueKind::Array,
    construct: Some(|| Value::Array(Vec::new())),
};

#[derive(Debug, Default, PartialEq)]
struct Task {
    id: i64,
    title: Option<String>,
    note: String,
    due_day: DayOfWeek,
    priority: Option<u8>,
    done: bool,
    tags: Vec<Value>,
}

impl Entity for Task {
    fn members() -> Vec<MemberDescriptor<Self>> {
        vec![
            member!(Task, id: TargetType::Int64),
            member!(Task, title: TargetType::String).nullable(),
            member!(Task, note: TargetType::String),
            member!(Task, due_day: DayOfWeek::target()).column("due"),
            member!(Task, priority: TargetType::UInt8.nullable()),
            member!(Task, done: TargetType::Bool).column("is_done"),
            member!(Task, tags: TargetType::Object(&TAGS)),
        ]
    }
}

/// Row sequence that records when it is closed.
struct TrackedRows {
    rows: Vec<Result<MemoryRow, MapError>>,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl TrackedRows {
    fn new(rows: Vec<Result<MemoryRow, MapError>>) -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicBool::new(false));
        let close_calls = Arc::new(AtomicUsize::new(0));
        let mut rows = rows;
        rows.reverse();
        (
            Self {
                rows,
                closed: Arc::clone(&closed),
                close_calls: Arc::clone(&close_calls),
            },
            closed,
            close_calls,
        )
    }
}

impl RowSequence for TrackedRows {
    type Row = MemoryRow;

    fn next_row(&mut self) -> Option<Result<MemoryRow, MapError>> {
        if self.is_closed() {
            return None;
        }
        self.rows.pop()
    }

    fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn user_row(id: i32, name: &str) -> MemoryRow {
    MemoryRow::new().column("id", id).column("name", name)
}

#[test]
fn test_extra_columns_are_ignored() {
    let row = MemoryRow::new()
        .column("id", 1i32)
        .column("name", "Ada")
        .column("extra_col", "ignored");

    let user: User = Mapper::new().create_instance(&row).unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "Ada".to_string()
        }
    );
}

#[test]
fn test_null_policy_per_member() {
    let row = MemoryRow::new()
        .column("id", 9i64)
        .column("title", Value::Null)
        .column("note", Value::Null)
        .column("due", Value::Null)
        .column("priority", Value::Null)
        .column("is_done", Value::Null)
        .column("tags", Value::Null);

    let task: Task = Mapper::new().create_instance(&row).unwrap();
    assert_eq!(task.id, 9);
    assert_eq!(task.title, None);
    assert_eq!(task.note, "");
    assert_eq!(task.due_day, DayOfWeek::Sunday);
    assert_eq!(task.priority, None);
    assert!(!task.done);
    // Non-nullable reference member gets a default-constructed value
    assert_eq!(task.tags, Vec::<Value>::new());
}

#[test]
fn test_coercion_through_members() {
    let row = MemoryRow::new()
        .column("id", "42")
        .column("title", "Write tests")
        .column("due", "friday")
        .column("priority", 3i32)
        .column("is_done", 1i16)
        .column("tags", Value::Array(vec![Value::from("a")]));

    let task: Task = Mapper::new().create_instance(&row).unwrap();
    assert_eq!(task.id, 42);
    assert_eq!(task.title.as_deref(), Some("Write tests"));
    assert_eq!(task.due_day, DayOfWeek::Friday);
    assert_eq!(task.priority, Some(3));
    assert!(task.done);
    assert_eq!(task.tags, vec![Value::from("a")]);
}

#[test]
fn test_out_of_range_enum_survives() {
    let row = MemoryRow::new().column("due", 12i32);
    let task: Task = Mapper::new().create_instance(&row).unwrap();
    assert_eq!(task.due_day, DayOfWeek(12));
}

#[test]
fn test_round_trip_through_getters() {
    let mapper = Mapper::new();
    let row = MemoryRow::new()
        .column("id", 5i64)
        .column("title", "Plan")
        .column("note", "n")
        .column("due", 2i32)
        .column("priority", Value::Null)
        .column("is_done", true)
        .column("tags", Value::Array(Vec::new()));

    let task: Task = mapper.create_instance(&row).unwrap();
    let schema = mapper.registry().schema::<Task>();
    let read_back = schema.read(&task);

    let expected = mapper.create_dynamic(&row).unwrap();
    let coerced: DynamicBag = expected
        .into_iter()
        .map(|(column, value)| {
            let member = schema.get(&column).unwrap();
            let value =
                rowmap_core::change_type(value, member.target(), member.is_nullable()).unwrap();
            (column, value)
        })
        .collect();
    assert_eq!(read_back, coerced);
}

#[test]
fn test_conversion_error_propagates() {
    let row = MemoryRow::new().column("id", 1i32).column("due", "someday");
    let err = Mapper::new().create_instance::<Task, _>(&row).unwrap_err();
    assert!(matches!(err, MapError::InvalidArgument { .. }));
}

#[test]
fn test_create_instances_in_order() {
    let rows = MemoryRows::new(vec![user_row(1, "a"), user_row(2, "b"), user_row(3, "c")]);
    let users: Vec<User> = Mapper::new()
        .create_instances::<User, _>(rows)
        .collect::<Result<_, _>>()
        .unwrap();

    let ids: Vec<_> = users.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_empty_sequence_yields_nothing_and_closes() {
    let (rows, closed, _) = TrackedRows::new(Vec::new());
    let mut instances = Mapper::new().create_instances::<User, _>(rows);

    assert!(instances.next().is_none());
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn test_early_drop_closes() {
    let (rows, closed, close_calls) =
        TrackedRows::new(vec![Ok(user_row(1, "a")), Ok(user_row(2, "b"))]);
    {
        let mut instances = Mapper::new().create_instances::<User, _>(rows);
        assert_eq!(instances.next().unwrap().unwrap().id, 1);
        assert!(!closed.load(Ordering::SeqCst));
    }
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(close_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_source_error_closes_and_fuses() {
    let (rows, closed, close_calls) = TrackedRows::new(vec![
        Ok(user_row(1, "a")),
        Err(MapError::Source("connection reset".to_string())),
        Ok(user_row(3, "c")),
    ]);
    let mut instances = Mapper::new().create_dynamics(rows);

    assert!(instances.next().unwrap().is_ok());
    assert_eq!(
        instances.next().unwrap().unwrap_err(),
        MapError::Source("connection reset".to_string())
    );
    assert!(closed.load(Ordering::SeqCst));
    assert!(instances.next().is_none());

    drop(instances);
    assert_eq!(close_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_mappers_share_registry() {
    let registry = Arc::new(SchemaRegistry::new());
    let first = Mapper::with_registry(Arc::clone(&registry));
    let second = first.clone();

    let _: User = first.create_instance(&user_row(1, "a")).unwrap();
    let _: User = second.create_instance(&user_row(2, "b")).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.contains::<User>());

    let schema = registry.schema::<User>();
    let columns: Vec<_> = schema.columns().collect();
    assert_eq!(columns, vec!["id", "name"]);
}

#[test]
fn test_record_is_null() {
    let row = user_row(1, "a").column("missing", Value::Null);
    assert!(!row.is_null(0).unwrap());
    assert!(row.is_null(2).unwrap());
}
