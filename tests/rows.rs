//! Row selection feeding the mapper, without a database.

use rowmap::{first_row, scalar, single_row};
use rowmap_core::{member, Entity, Mapper, MemberDescriptor, MemoryRow, MemoryRows, TargetType, Value};

#[derive(Debug, Default, PartialEq)]
struct Account {
    id: i64,
    owner: Option<String>,
    balance: f64,
}

impl Entity for Account {
    fn members() -> Vec<MemberDescriptor<Self>> {
        vec![
            member!(Account, id: TargetType::Int64),
            member!(Account, owner: TargetType::String).nullable(),
            member!(Account, balance: TargetType::Float64),
        ]
    }
}

fn accounts(count: i32) -> MemoryRows {
    (1..=count)
        .map(|id| {
            MemoryRow::new()
                .column("id", id)
                .column("owner", Value::Null)
                .column("balance", "12.5")
        })
        .collect()
}

#[test]
fn test_first_row_maps_to_entity() {
    let mapper = Mapper::new();
    let row = first_row(accounts(3)).unwrap().unwrap();
    let account: Account = mapper.create_instance(&row).unwrap();

    assert_eq!(
        account,
        Account {
            id: 1,
            owner: None,
            balance: 12.5,
        }
    );
}

#[test]
fn test_single_row_requires_exactly_one() {
    assert!(single_row(accounts(0)).unwrap().is_none());
    assert!(single_row(accounts(2)).unwrap().is_none());

    let row = single_row(accounts(1)).unwrap().unwrap();
    let bag = Mapper::new().create_dynamic(&row).unwrap();
    assert_eq!(bag.keys().collect::<Vec<_>>(), ["id", "owner", "balance"]);
    assert_eq!(bag["owner"], Value::Null);
}

#[test]
fn test_scalar_reads_first_column() {
    assert_eq!(scalar(accounts(2)).unwrap(), Some(Value::Int32(1)));
    assert_eq!(scalar(accounts(0)).unwrap(), None);
}
