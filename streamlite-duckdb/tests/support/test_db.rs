//! Minimal owner of a raw in-memory DuckDB database for integration tests.

use libduckdb_sys::*;
use std::ffi::{CStr, CString};
use std::ptr;

pub struct TestDb {
    db: duckdb_database,
    con: duckdb_connection,
}

/// Owned `duckdb_result`, destroyed on drop.
struct QueryResult(duckdb_result);

impl Drop for QueryResult {
    fn drop(&mut self) {
        unsafe { duckdb_destroy_result(&mut self.0) }
    }
}

impl TestDb {
    /// Open an in-memory database with every streamlite function registered.
    pub fn open() -> Self {
        let db = Self::open_bare();
        unsafe { streamlite_duckdb::try_init(db.db) }.expect("register streamlite functions");
        db
    }

    /// Open an in-memory database without registering anything.
    pub fn open_bare() -> Self {
        let mut db = ptr::null_mut();
        let mut con = ptr::null_mut();
        unsafe {
            assert_eq!(DuckDBSuccess, duckdb_open(ptr::null(), &mut db));
            assert_eq!(DuckDBSuccess, duckdb_connect(db, &mut con));
        }
        TestDb { db, con }
    }

    pub fn raw(&self) -> duckdb_database {
        self.db
    }

    fn run(&self, sql: &str) -> Result<QueryResult, String> {
        let sql_c = CString::new(sql).unwrap();
        unsafe {
            let mut result = QueryResult(std::mem::zeroed());
            if duckdb_query(self.con, sql_c.as_ptr(), &mut result.0) != DuckDBSuccess {
                let err = duckdb_result_error(&mut result.0);
                return Err(CStr::from_ptr(err).to_string_lossy().into_owned());
            }
            Ok(result)
        }
    }

    fn query_row(&self, sql: &str) -> QueryResult {
        let mut result = self
            .run(sql)
            .unwrap_or_else(|e| panic!("query failed for: {sql}: {e}"));
        assert!(
            unsafe { duckdb_row_count(&mut result.0) } >= 1,
            "no rows for: {sql}"
        );
        result
    }

    pub fn query_text(&self, sql: &str) -> String {
        self.try_query_text(sql)
            .unwrap_or_else(|e| panic!("query failed for: {sql}: {e}"))
    }

    pub fn query_f64(&self, sql: &str) -> f64 {
        let mut result = self.query_row(sql);
        unsafe { duckdb_value_double(&mut result.0, 0, 0) }
    }

    pub fn query_i64(&self, sql: &str) -> i64 {
        let mut result = self.query_row(sql);
        unsafe { duckdb_value_int64(&mut result.0, 0, 0) }
    }

    pub fn query_type(&self, sql: &str) -> DUCKDB_TYPE {
        let mut result = self.query_row(sql);
        unsafe { duckdb_column_type(&mut result.0, 0) }
    }

    pub fn query_is_null(&self, sql: &str) -> bool {
        let mut result = self.query_row(sql);
        unsafe { duckdb_value_is_null(&mut result.0, 0, 0) }
    }

    /// Run a single-row query and return the DuckDB error message if it fails.
    /// SQL NULL reads as an empty string.
    pub fn try_query_text(&self, sql: &str) -> Result<String, String> {
        let mut result = self.run(sql)?;
        unsafe {
            if duckdb_value_is_null(&mut result.0, 0, 0) {
                return Ok(String::new());
            }
            let raw = duckdb_value_varchar(&mut result.0, 0, 0);
            let text = CStr::from_ptr(raw).to_string_lossy().into_owned();
            duckdb_free(raw.cast());
            Ok(text)
        }
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        unsafe {
            duckdb_disconnect(&mut self.con);
            duckdb_close(&mut self.db);
        }
    }
}
