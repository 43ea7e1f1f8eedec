//! Property-based tests for identifier sharding, status lines and the file cache

mod sharding;
