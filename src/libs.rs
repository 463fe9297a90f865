pub mod api;
pub mod core;
pub mod ffi;
pub mod realtime;
pub mod repository;
pub mod session;
pub mod storage;
pub mod sync;
