//! Full-scan reconciliation against real directory trees

mod filter_tests;
mod reconcile_tests;
