pub mod app;

pub use app::{TestApp, TestResponse};

/// Schema used across the HTTP tests
pub const SAMPLE_SCHEMA: &str = "definition user {}

definition document {
    relation owner: user
    relation viewer: user
    permission view = owner + viewer
}
";
