//! Entity materialization.

use crate::error::MapError;
use crate::row::{Record, RowSequence};
use crate::schema::{Entity, SchemaRegistry};
use crate::values::DynamicBag;
use std::iter::FusedIterator;
use std::sync::Arc;
use tracing::debug;

/// Output shape requested from [`Mapper::materialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Typed,
    Dynamic,
}

/// A materialized row.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized<T> {
    Typed(T),
    Dynamic(DynamicBag),
}

impl<T> Materialized<T> {
    pub fn typed(self) -> Option<T> {
        match self {
            Self::Typed(entity) => Some(entity),
            Self::Dynamic(_) => None,
        }
    }

    pub fn dynamic(self) -> Option<DynamicBag> {
        match self {
            Self::Typed(_) => None,
            Self::Dynamic(bag) => Some(bag),
        }
    }
}

/// Maps rows to entity instances or dynamic bags.
///
/// Cloning a mapper shares its schema registry.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    registry: Arc<SchemaRegistry>,
}

impl Mapper {
    /// A mapper with its own empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Copy the columns of `record` into a bag, keeping the first value of
    /// each column name.
    pub fn create_dynamic<R: Record + ?Sized>(&self, record: &R) -> Result<DynamicBag, MapError> {
        let mut bag = DynamicBag::with_capacity(record.field_count());
        for index in 0..record.field_count() {
            let name = record.name(index);
            if bag.contains_key(name) {
                continue;
            }
            bag.insert(name.to_string(), record.value(index)?);
        }
        Ok(bag)
    }

    pub fn create_dynamic_from_map(&self, map: &DynamicBag) -> DynamicBag {
        map.clone()
    }

    pub fn create_instance<T: Entity, R: Record + ?Sized>(&self, record: &R) -> Result<T, MapError> {
        let bag = self.create_dynamic(record)?;
        self.create_instance_from_map(&bag)
    }

    /// Default-construct a `T` and assign every key that names a writable
    /// member. Keys without a member are ignored.
    pub fn create_instance_from_map<T: Entity>(&self, map: &DynamicBag) -> Result<T, MapError> {
        let schema = self.registry.schema::<T>();
        let mut instance = T::default();
        for (key, value) in map {
            if let Some(member) = schema.get(key) {
                member.set(&mut instance, value.clone())?;
            }
        }
        Ok(instance)
    }

    pub fn materialize<T: Entity, R: Record + ?Sized>(
        &self,
        record: &R,
        shape: Shape,
    ) -> Result<Materialized<T>, MapError> {
        match shape {
            Shape::Typed => self.create_instance(record).map(Materialized::Typed),
            Shape::Dynamic => self.create_dynamic(record).map(Materialized::Dynamic),
        }
    }

    /// Lazily materialize each row of `rows` as a `T`.
    pub fn create_instances<T: Entity, S: RowSequence>(&self, rows: S) -> Instances<T, S> {
        Instances::new(self.clone(), rows, |mapper, row| mapper.create_instance(row))
    }

    /// Lazily copy each row of `rows` into a bag.
    pub fn create_dynamics<S: RowSequence>(&self, rows: S) -> DynamicInstances<S> {
        Instances::new(self.clone(), rows, |mapper, row| mapper.create_dynamic(row))
    }
}

/// Iterator over the rows of a sequence, one materialized item per row.
///
/// The sequence is closed once it is exhausted, after the first error, or
/// when the iterator is dropped. No items follow an error.
pub struct Instances<T, S: RowSequence> {
    mapper: Mapper,
    rows: S,
    convert: fn(&Mapper, &S::Row) -> Result<T, MapError>,
    produced: usize,
    done: bool,
}

/// Iterator of dynamic bags, see [`Mapper::create_dynamics`].
pub type DynamicInstances<S> = Instances<DynamicBag, S>;

impl<T, S: RowSequence> Instances<T, S> {
    fn new(mapper: Mapper, rows: S, convert: fn(&Mapper, &S::Row) -> Result<T, MapError>) -> Self {
        Self {
            mapper,
            rows,
            convert,
            produced: 0,
            done: false,
        }
    }

    /// The underlying row sequence.
    pub fn row_sequence(&self) -> &S {
        &self.rows
    }

    fn finish(&mut self) {
        self.done = true;
        self.rows.close();
        debug!(rows = self.produced, "Closed row sequence");
    }
}

impl<T, S: RowSequence> Iterator for Instances<T, S> {
    type Item = Result<T, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = match self.rows.next_row() {
            None => {
                self.finish();
                return None;
            }
            Some(Ok(row)) => (self.convert)(&self.mapper, &row),
            Some(Err(e)) => Err(e),
        };

        match item {
            Ok(_) => self.produced += 1,
            Err(_) => self.finish(),
        }
        Some(item)
    }
}

impl<T, S: RowSequence> FusedIterator for Instances<T, S> {}

impl<T, S: RowSequence> Drop for Instances<T, S> {
    fn drop(&mut self) {
        if !self.rows.is_closed() {
            self.rows.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{MemoryRow, MemoryRows};
    use crate::values::Value;
    use crate::{member, MemberDescriptor, TargetType};

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i32,
        name: String,
    }

    impl Entity for Person {
        fn members() -> Vec<MemberDescriptor<Self>> {
            vec![
                member!(Person, id: TargetType::Int32),
                member!(Person, name: TargetType::String),
            ]
        }
    }

    #[test]
    fn test_create_dynamic_first_wins() {
        let row = MemoryRow::new()
            .column("id", 1i32)
            .column("name", Value::Null)
            .column("id", 2i32);
        let bag = Mapper::new().create_dynamic(&row).unwrap();

        assert_eq!(bag.len(), 2);
        assert_eq!(bag["id"], Value::Int32(1));
        assert_eq!(bag["name"], Value::Null);
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_materialize_shapes() {
        let mapper = Mapper::new();
        let row = MemoryRow::new().column("id", 4i64).column("name", "Bo");

        let typed = mapper.materialize::<Person, _>(&row, Shape::Typed).unwrap();
        assert_eq!(
            typed.typed(),
            Some(Person {
                id: 4,
                name: "Bo".to_string()
            })
        );

        let dynamic = mapper.materialize::<Person, _>(&row, Shape::Dynamic).unwrap();
        let bag = dynamic.dynamic().unwrap();
        // Dynamic output is not coerced
        assert_eq!(bag["id"], Value::Int64(4));
        assert_eq!(mapper.registry().len(), 1);
    }

    #[test]
    fn test_create_instance_from_map() {
        let mut map = DynamicBag::new();
        map.insert("name".to_string(), Value::Null);
        map.insert("unknown".to_string(), Value::Bool(true));

        let person: Person = Mapper::new().create_instance_from_map(&map).unwrap();
        assert_eq!(person, Person::default());
    }

    #[test]
    fn test_instances_close_on_exhaustion() {
        let rows = MemoryRows::new(vec![MemoryRow::new().column("id", 1i32)]);
        let mut instances = Mapper::new().create_instances::<Person, _>(rows);

        assert_eq!(instances.next().unwrap().unwrap().id, 1);
        assert!(!instances.row_sequence().is_closed());
        assert!(instances.next().is_none());
        assert!(instances.row_sequence().is_closed());
        assert!(instances.next().is_none());
    }

    #[test]
    fn test_instances_fuse_after_error() {
        let rows = MemoryRows::new(vec![
            MemoryRow::new().column("id", "one"),
            MemoryRow::new().column("id", 2i32),
        ]);
        let mut instances = Mapper::new().create_instances::<Person, _>(rows);

        assert!(matches!(
            instances.next(),
            Some(Err(MapError::Format { .. }))
        ));
        assert!(instances.row_sequence().is_closed());
        assert!(instances.next().is_none());
    }
}
