pub mod discovery;
pub mod infra;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod verification;
