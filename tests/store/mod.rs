//! Record store and notification writer behavior

mod property_tests;
mod query_tests;
mod rename_tests;
