//! Integration tests module
//!
//! This module organizes all integration tests for the play-soundfile crate.

pub mod config_test;
pub mod node_test;
pub mod session_test;
