//! Integration tests for the PDP: decisions, references, loading and versions

mod decision_tests;
mod loading_tests;
mod reference_tests;
mod version_props;
