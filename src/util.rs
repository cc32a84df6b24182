use std::{fs, path::Path};

use crate::error::Result;

/// Returns early with [`Error::Config`](crate::error::Error::Config) if a numerical value
/// is outside the interval `[a, b]`
///
/// ### Example
/// ```ignore
/// let gamma = 2.0;
/// ensure_interval!(gamma, 0.0, 1.0);
/// ```
/// This fails with the message "Invalid value for \`gamma\`: 2. Must be in the interval \[0, 1\]."
macro_rules! ensure_interval {
    ($var:expr, $a:expr, $b:expr) => {
        if !($var >= $a && $var <= $b) {
            return Err($crate::error::Error::Config(format!(
                "Invalid value for `{}`: {}. Must be in the interval [{}, {}].",
                stringify!($var),
                $var,
                $a,
                $b,
            )));
        }
    };
}

/// Returns early with [`Error::Config`](crate::error::Error::Config) if a count is zero
macro_rules! ensure_positive {
    ($var:expr) => {
        if $var == 0 {
            return Err($crate::error::Error::Config(format!(
                "Invalid value for `{}`. Must be at least 1.",
                stringify!($var),
            )));
        }
    };
}

pub(crate) use ensure_interval;
pub(crate) use ensure_positive;

/// Create `dir` and any missing parents
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
