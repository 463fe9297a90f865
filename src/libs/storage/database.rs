#[allow(clippy::module_inception)]
pub mod database;
pub mod storage_sqllite;
