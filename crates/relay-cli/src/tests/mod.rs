//! Test suites for the relay CLI.

mod support;
