//! Integration tests for options-scanner

mod common;
mod feed_test;
mod scanner_test;
mod window_test;
