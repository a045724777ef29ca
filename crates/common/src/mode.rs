//! Compatibility modes.

use serde::{Deserialize, Serialize};

/// What `CURRVAL` returns for a sequence this session has not advanced yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrvalPolicy {
    /// Fail with `DbError::CurrentValueUndefined`.
    #[default]
    Error,
    /// Fall back to the generator's own current value.
    GeneratorValue,
}

/// Session-wide compatibility settings.
///
/// # Example
/// ```
/// use common::{CurrvalPolicy, Mode};
///
/// let mode = Mode::builder()
///     .name("LEGACY".to_string())
///     .currval_policy(CurrvalPolicy::GeneratorValue)
///     .build();
/// assert!(!mode.decimal_sequences);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct Mode {
    pub name: String,
    /// Sequence functions return `NUMERIC(19, 0)` instead of BIGINT.
    #[builder(default)]
    pub decimal_sequences: bool,
    #[builder(default)]
    pub currval_policy: CurrvalPolicy,
}

impl Mode {
    pub fn regular() -> Self {
        Self {
            name: "REGULAR".into(),
            decimal_sequences: false,
            currval_policy: CurrvalPolicy::Error,
        }
    }

    pub fn oracle() -> Self {
        Self {
            name: "ORACLE".into(),
            decimal_sequences: true,
            currval_policy: CurrvalPolicy::Error,
        }
    }

    /// Look up a preset by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Self> {
        [Self::regular(), Self::oracle()]
            .into_iter()
            .find(|mode| mode.name.eq_ignore_ascii_case(name))
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::regular()
    }
}
