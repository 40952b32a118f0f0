//! Integration tests

pub mod config_test;
pub mod crud_test;
pub mod http_store_test;
