use super::*;
use crate::common::Error;
use crate::types::field::Field;
use crate::types::{DataType, Table};

fn results_table() -> Table {
    Table::builder()
        .name("results")
        .column("user_id", DataType::Int)
        .column("total", DataType::Float)
        .build()
        .unwrap()
}

#[test]
pub fn test_comparison() {
    let mut fields = vec![
        Field::from(1),
        Field::from(2), // this will get modified later.
        Field::from(3),
    ];

    let row = Row::from(fields.clone());
    let row_eq = Row::from(fields.clone());
    assert_eq!(row, row_eq);

    fields[1] = fields[1].checked_add(&Field::from(2)).unwrap();
    let row_ne = Row::from(fields);
    assert_ne!(row, row_ne);
    assert!(row < row_ne);
}

#[test]
pub fn test_mixed_types() {
    let fields = vec![
        Field::from(1),
        Field::from("hello"),
        Field::from(3.14),
        Field::Null,
        Field::from(true),
    ];

    let row = Row::from(fields.clone());
    assert_eq!(row.size(), fields.len());
    fields
        .iter()
        .enumerate()
        .for_each(|(i, field)| assert_eq!(row.get_field(i).unwrap(), *field));
    assert_eq!(row.get_field(5), Err(Error::OutOfBounds));
    assert_eq!(row.to_string(Some(2)), "1, he, 3.14, NULL, true");
}

#[test]
pub fn test_coerce_to_schema() {
    let schema = results_table();

    let row = Row::from(vec![Field::from(7), Field::from(2)]);
    assert_eq!(
        row.coerce(&schema).unwrap(),
        Row::from(vec![Field::from(7), Field::from(2.0)])
    );

    let short = Row::from(vec![Field::from(7)]);
    assert_eq!(
        short.coerce(&schema),
        Err(Error::ArityMismatch {
            table: "results".to_string(),
            expected: 2,
            actual: 1,
        })
    );

    let mistyped = Row::from(vec![Field::from("seven"), Field::from(2.0)]);
    assert!(matches!(mistyped.coerce(&schema), Err(Error::InvalidData(_))));
}
