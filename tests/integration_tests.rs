// Gateway file to expose integration tests from the integration/ subdirectory
// This file allows Rust's test runner to discover tests in subdirectories

#[path = "common/mod.rs"]
mod common;

// Each test file in integration/ needs to be included here
#[path = "integration/test_engine_pipeline.rs"]
mod test_engine_pipeline;

#[path = "integration/test_density_mode.rs"]
mod test_density_mode;

#[path = "integration/test_config_loading.rs"]
mod test_config_loading;

#[path = "integration/test_concurrent_access.rs"]
mod test_concurrent_access;
