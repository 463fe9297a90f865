pub mod database;
pub mod feed;
pub mod lib_sqlite_impl;
pub mod records;
pub mod storage_traits;
