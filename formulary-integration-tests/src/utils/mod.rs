//! Tools for the tests.

pub mod logging;
pub mod metrics;
pub mod test_tools;
