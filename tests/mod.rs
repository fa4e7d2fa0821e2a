//! Test suite for the Bamboo Journal auth layer
//!
//! This module organizes all tests

pub mod common;
pub mod integration;
