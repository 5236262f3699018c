//! Shared helpers for integration tests: a mock portal built on wiremock.

#![allow(dead_code)]

pub mod portal_mock;
