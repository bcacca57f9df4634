//! Error types, shared with the daemon binary through `cg-error`

pub use cg_error::{CoolguardError, ErrorClass, Result};
