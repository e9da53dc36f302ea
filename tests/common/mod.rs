#![allow(dead_code, unused_imports)]

pub use sentinel_test_utils::builders;
pub use sentinel_test_utils::fake_backend;
pub use sentinel_test_utils::fixture;
pub use sentinel_test_utils::go_json;
pub use sentinel_test_utils::{init_tracing, with_timeout};

use std::error::Error;

pub type Outcome = Result<(), Box<dyn Error>>;
