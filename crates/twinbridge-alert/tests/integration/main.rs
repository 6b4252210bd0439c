//! Integration tests for twinbridge-alert
//!
//! Uses wiremock to simulate the e-mail endpoint and verifies the request
//! the gateway sends and how it reacts to the server's answers.

mod common;

mod test_send;
