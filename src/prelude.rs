pub use anyhow::{Context, Result};
