//! Integration test modules

mod compiler_tests;
mod fleet_tests;
mod persistence_tests;
mod support;
