#![allow(dead_code)]

mod test_db;

pub use test_db::TestDb;
