// Consolidated integration test suite, compiled by `tests/harness.rs`.
mod background;
mod pipeline;
mod support;
