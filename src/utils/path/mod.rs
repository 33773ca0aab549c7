//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `clean_path`)
//! - [`slug`]: Source key slugification (`slugify`)

pub mod fs;
pub mod slug;

pub use fs::{clean_path, normalize_path};
pub use slug::slugify;
