use crate::common::Result;
use crate::storage::tuple::Row;
use crate::types::field::Field;
use crate::types::{Column, DataType, Table};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;

/// Transactions generated per unit of scale.
pub const TRANSACTIONS_PER_SCALE: usize = 10_000;
/// Distinct users per unit of scale.
pub const USERS_PER_SCALE: usize = 1_000;

/// Creates `n` random rows for the table, reproducibly from `seed`.
pub fn create_n_rows(n: usize, table: &Table, seed: u64) -> Vec<Row> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| create_random_row(table, &mut rng)).collect()
}

/// Creates a random row for the table. Nullable columns are NULL one time in
/// ten.
pub fn create_random_row(table: &Table, rng: &mut impl Rng) -> Row {
    table
        .columns()
        .iter()
        .map(|column| create_random_field(column, &mut *rng))
        .collect()
}

fn create_random_field(column: &Column, rng: &mut impl Rng) -> Field {
    if column.nullable() && rng.gen_ratio(1, 10) {
        return Field::Null;
    }
    match column.get_data_type() {
        DataType::Bool => Field::Boolean(rng.gen()),
        DataType::Int => Field::Integer(rng.gen_range(0..1_000_000)),
        DataType::Float => Field::Float(rng.gen_range(0.0..1000.0)),
        DataType::Text => {
            let len = rng.gen_range(1..16);
            Field::String(
                (0..len)
                    .map(|_| rng.gen_range(b'a'..=b'z') as char)
                    .collect(),
            )
        }
    }
}

/// The demo's transactions table: every transaction belongs to a user and a
/// category and moves some dough.
pub fn transactions_table() -> Result<Table> {
    Table::builder()
        .name("transactions")
        .column_from_definition(Column::new("id", DataType::Int, false))
        .column_from_definition(Column::new("user_id", DataType::Int, false))
        .column_from_definition(Column::new("category_id", DataType::Int, false))
        .column_from_definition(Column::new("dough", DataType::Float, false))
        .build()
}

/// Generates `scale * TRANSACTIONS_PER_SCALE` transactions spread over
/// `scale * USERS_PER_SCALE` users and four categories, reproducibly from
/// `seed`.
pub fn generate_transactions(scale: usize, seed: u64) -> Vec<Row> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let users = (scale * USERS_PER_SCALE).max(1) as i64;
    (1..=scale * TRANSACTIONS_PER_SCALE)
        .map(|i| {
            let i = i as i64;
            Row::from(vec![
                Field::Integer(i),
                Field::Integer(rng.gen_range(1..=users)),
                Field::Integer(i % 4 + 1),
                Field::Float((rng.gen_range(0.0..1000.0_f64) * 100.0).round() / 100.0),
            ])
        })
        .collect()
}
