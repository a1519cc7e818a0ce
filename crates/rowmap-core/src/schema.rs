//! Entity member mapping and the schema cache.
//!
//! An entity type registers its members through [`Entity::members`]. The
//! resulting [`EntitySchema`] maps each resolved column name to the member
//! that receives it, and a [`SchemaRegistry`] computes that mapping once per
//! type and shares it afterwards.

use crate::error::MapError;
use crate::types::TargetType;
use crate::values::{DynamicBag, Value};
use indexmap::IndexMap;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

// ============================================================================
// Member descriptors
// ============================================================================

/// Reads a member of an entity.
pub type Getter<E> = fn(&E) -> Value;

/// Writes a coerced value into a member of an entity.
pub type Setter<E> = fn(&mut E, Value) -> Result<(), MapError>;

/// How one entity member binds to one result column.
pub struct MemberDescriptor<E> {
    name: &'static str,
    column: Option<&'static str>,
    target: TargetType,
    is_nullable: bool,
    not_mapped: bool,
    getter: Option<Getter<E>>,
    setter: Option<Setter<E>>,
}

impl<E> MemberDescriptor<E> {
    /// A member with no accessors, no column annotation and a non-nullable
    /// declared type.
    pub fn new(name: &'static str, target: TargetType) -> Self {
        Self {
            name,
            column: None,
            target,
            is_nullable: false,
            not_mapped: false,
            getter: None,
            setter: None,
        }
    }

    /// Bind the member to an explicitly named column.
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Mark the member as a nullable reference.
    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    /// Exclude the member from mapping.
    pub fn not_mapped(mut self) -> Self {
        self.not_mapped = true;
        self
    }

    pub fn getter(mut self, getter: Getter<E>) -> Self {
        self.getter = Some(getter);
        self
    }

    pub fn setter(mut self, setter: Setter<E>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The column annotation if present, else the member name.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    pub fn has_column_annotation(&self) -> bool {
        self.column.is_some()
    }

    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn is_not_mapped(&self) -> bool {
        self.not_mapped
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the member, `None` when it has no getter.
    pub fn get(&self, entity: &E) -> Option<Value> {
        self.getter.map(|getter| getter(entity))
    }

    /// Coerce `value` to the member's declared type and assign it.
    ///
    /// Returns `Ok(false)` without coercing when the member is not writable.
    pub fn set(&self, entity: &mut E, value: Value) -> Result<bool, MapError> {
        let Some(setter) = self.setter else {
            return Ok(false);
        };
        let coerced = crate::convert::change_type(value, &self.target, self.is_nullable)?;
        setter(entity, coerced)?;
        Ok(true)
    }
}

impl<E> Clone for MemberDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            column: self.column,
            target: self.target.clone(),
            is_nullable: self.is_nullable,
            not_mapped: self.not_mapped,
            getter: self.getter,
            setter: self.setter,
        }
    }
}

impl<E> fmt::Debug for MemberDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("target", &self.target)
            .field("is_nullable", &self.is_nullable)
            .field("not_mapped", &self.not_mapped)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Describe a readable and writable struct field.
///
/// The field type must convert into a [`Value`](crate::Value) and implement
/// [`FromValue`](crate::FromValue).
///
/// ```rust
/// use rowmap_core::{member, Entity, MemberDescriptor, TargetType};
///
/// #[derive(Default)]
/// struct User {
///     id: i32,
///     name: Option<String>,
/// }
///
/// impl Entity for User {
///     fn members() -> Vec<MemberDescriptor<Self>> {
///         vec![
///             member!(User, id: TargetType::Int32),
///             member!(User, name: TargetType::String).nullable(),
///         ]
///     }
/// }
/// ```
#[macro_export]
macro_rules! member {
    ($entity:ty, $field:ident : $target:expr) => {
        $crate::MemberDescriptor::<$entity>::new(stringify!($field), $target)
            .getter(|entity: &$entity| $crate::Value::from(entity.$field.clone()))
            .setter(
                |entity: &mut $entity,
                 value: $crate::Value|
                 -> ::std::result::Result<(), $crate::MapError> {
                    entity.$field = $crate::FromValue::from_value(value)?;
                    Ok(())
                },
            )
    };
}

// ============================================================================
// Entity schema
// ============================================================================

/// A type that rows can be materialized into.
pub trait Entity: Default + 'static {
    /// Every member of the type, in declaration order.
    fn members() -> Vec<MemberDescriptor<Self>>;
}

/// Resolved column name to member descriptor mapping of one entity type.
pub struct EntitySchema<E> {
    columns: IndexMap<&'static str, MemberDescriptor<E>>,
}

impl<E: Entity> EntitySchema<E> {
    /// Build the mapping from `E::members()`.
    ///
    /// Members marked `not_mapped` are skipped, as are members that are not
    /// both readable and writable unless they carry a column annotation.
    /// When two members resolve to the same column the later one wins.
    pub fn build() -> Self {
        let mut columns = IndexMap::new();
        for member in E::members() {
            if member.is_not_mapped() {
                continue;
            }
            if !member.has_column_annotation() && !(member.is_readable() && member.is_writable())
            {
                continue;
            }
            columns.insert(member.column_name(), member);
        }
        Self { columns }
    }
}

impl<E> EntitySchema<E> {
    /// The member bound to a column. Column names are case-sensitive.
    pub fn get(&self, column: &str) -> Option<&MemberDescriptor<E>> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.keys().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberDescriptor<E>> {
        self.columns.values()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Read every readable member of `entity`, keyed by column name.
    pub fn read(&self, entity: &E) -> DynamicBag {
        self.columns
            .iter()
            .filter_map(|(column, member)| {
                member
                    .get(entity)
                    .map(|value| (column.to_string(), value))
            })
            .collect()
    }
}

impl<E> fmt::Debug for EntitySchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.columns.iter()).finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

type SchemaEntry = Arc<dyn Any + Send + Sync>;

/// Type-keyed cache of entity schemas.
///
/// Each type's schema is built on first request and kept for the lifetime
/// of the registry. Concurrent first requests for the same type build it
/// once.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, SchemaEntry>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema of `E`, building and caching it on first use.
    pub fn schema<E: Entity>(&self) -> Arc<EntitySchema<E>> {
        let type_id = TypeId::of::<E>();

        let cached = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned();
        if let Some(schema) = cached.and_then(|entry| entry.downcast().ok()) {
            return schema;
        }

        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have populated the entry while we waited
        if let Some(entry) = schemas.get(&type_id) {
            if let Ok(schema) = Arc::clone(entry).downcast::<EntitySchema<E>>() {
                return schema;
            }
        }

        let schema = Arc::new(EntitySchema::<E>::build());
        debug!(
            entity = type_name::<E>(),
            columns = schema.len(),
            "Built entity schema"
        );
        schemas.insert(type_id, schema.clone());
        schema
    }

    /// Whether the schema of `E` has been built.
    pub fn contains<E: Entity>(&self) -> bool {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<E>())
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
        email: String,
        secret: String,
        display: Option<String>,
    }

    impl Entity for Account {
        fn members() -> Vec<MemberDescriptor<Self>> {
            vec![
                member!(Account, id: TargetType::Int64),
                member!(Account, email: TargetType::String).column("email_address"),
                member!(Account, secret: TargetType::String).not_mapped(),
                // Read-only and unannotated
                MemberDescriptor::new("display", TargetType::String)
                    .getter(|a: &Account| Value::from(a.display.clone())),
                // Write-only but annotated
                MemberDescriptor::new("nickname", TargetType::String)
                    .column("nick")
                    .nullable()
                    .setter(|a: &mut Account, value: Value| -> Result<(), MapError> {
                        a.display = crate::FromValue::from_value(value)?;
                        Ok(())
                    }),
            ]
        }
    }

    #[test]
    fn test_schema_inclusion_rules() {
        let schema = EntitySchema::<Account>::build();
        let columns: Vec<_> = schema.columns().collect();
        assert_eq!(columns, vec!["id", "email_address", "nick"]);
        assert!(!schema.contains("secret"));
        assert!(!schema.contains("display"));
        assert!(!schema.contains("email"));
        assert!(schema.get("nick").unwrap().is_nullable());
        assert!(!schema.get("nick").unwrap().is_readable());
    }

    #[derive(Default)]
    struct Duplicate {
        first: i32,
        second: i32,
    }

    impl Entity for Duplicate {
        fn members() -> Vec<MemberDescriptor<Self>> {
            vec![
                member!(Duplicate, first: TargetType::Int32).column("value"),
                member!(Duplicate, second: TargetType::Int32).column("value"),
            ]
        }
    }

    #[test]
    fn test_later_member_wins_column() {
        let schema = EntitySchema::<Duplicate>::build();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("value").unwrap().name(), "second");

        let mut entity = Duplicate::default();
        schema
            .get("value")
            .unwrap()
            .set(&mut entity, Value::from("12"))
            .unwrap();
        assert_eq!(entity.first, 0);
        assert_eq!(entity.second, 12);
    }

    #[derive(Default)]
    struct Empty;

    impl Entity for Empty {
        fn members() -> Vec<MemberDescriptor<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_empty_schema() {
        let registry = SchemaRegistry::new();
        assert!(registry.schema::<Empty>().is_empty());
        assert!(registry.contains::<Empty>());
    }

    static COUNTED_BUILDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counted {
        id: i32,
    }

    impl Entity for Counted {
        fn members() -> Vec<MemberDescriptor<Self>> {
            COUNTED_BUILDS.fetch_add(1, Ordering::SeqCst);
            vec![member!(Counted, id: TargetType::Int32)]
        }
    }

    #[test]
    fn test_registry_builds_once() {
        let registry = Arc::new(SchemaRegistry::new());
        assert!(registry.is_empty());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.schema::<Counted>().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }

        let first = registry.schema::<Counted>();
        let second = registry.schema::<Counted>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(COUNTED_BUILDS.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(!registry.contains::<Account>());
    }

    #[test]
    fn test_read_members() {
        let schema = EntitySchema::<Account>::build();
        let account = Account {
            id: 3,
            email: "a@b.c".to_string(),
            ..Default::default()
        };
        let bag = schema.read(&account);
        assert_eq!(bag.len(), 2);
        assert_eq!(bag["id"], Value::Int64(3));
        assert_eq!(bag["email_address"], Value::from("a@b.c"));
    }

    #[test]
    fn test_set_skips_unwritable_member() {
        let member = MemberDescriptor::<Account>::new("display", TargetType::String)
            .getter(|a: &Account| Value::from(a.display.clone()));
        let mut account = Account::default();
        assert!(!member.set(&mut account, Value::from("x")).unwrap());
        assert_eq!(member.get(&account), Some(Value::Null));
    }
}
