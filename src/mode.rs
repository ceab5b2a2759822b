//! Environment mode resolution.
//!
//! The mode decides two things at normalization time: whether messages are
//! eligible for masking (production) and whether the backtrace is exposed
//! (development). It is read from the `APP_ENV` environment variable on
//! every call — never cached at load — so tests can flip it between
//! requests and observe the change immediately.

/// The active environment mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Development,
    Production,
}

/// Environment variable consulted by [`Mode::current`].
pub const ENV_VAR: &str = "APP_ENV";

impl Mode {
    /// Resolves the mode from the process environment.
    ///
    /// `APP_ENV=production` selects [`Mode::Production`]; any other value,
    /// or an unset variable, selects [`Mode::Development`].
    pub fn current() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(v) if v == "production" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}
