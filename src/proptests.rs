//! Property-based tests for parsing, rendering, evaluation and
//! differentiation.
