//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the running session actor
//! against mock adapters. No Bluetooth radio or Wi-Fi tooling is touched.

mod mock_transport;
mod session_flow_tests;
