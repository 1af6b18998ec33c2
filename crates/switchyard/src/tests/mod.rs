//! Test suites for the switchyard runtime.

mod lib_api;
pub(crate) mod support;
