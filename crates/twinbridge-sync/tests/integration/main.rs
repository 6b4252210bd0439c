//! Integration tests for twinbridge-sync
//!
//! Runs the fleet scheduler against the in-memory plant and twin hub and
//! verifies the end-to-end behavior of binding, the polling cycles and the
//! twin callbacks.

mod common;

mod test_binding;
mod test_callbacks;
mod test_error_cycle;
mod test_run;
