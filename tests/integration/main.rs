//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one station flow
//! against the simulation adapters and the mocks in `mocks.rs`.  All tests
//! run on the host with no real hardware required.

mod command_task_tests;
mod mocks;
mod provisioning_tests;
mod relay_tests;
mod time_driver;
