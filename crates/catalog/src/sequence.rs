//! Sequence generators.
//!
//! A [`Sequence`] hands out one value per [`Sequence::next_value`] call. The
//! counter lives behind a mutex so concurrent sessions never receive the same
//! value.

use common::{DbError, DbResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Unique identifier for a sequence stored in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

/// Definition of a sequence: start, step, bounds and wrap-around.
///
/// Unset bounds default by direction: `1..=i64::MAX` when ascending,
/// `i64::MIN..=-1` when descending. An unset start is the bound the sequence
/// counts away from.
///
/// # Example
/// ```
/// use catalog::SequenceOptions;
///
/// let opts = SequenceOptions::builder().increment(-1).build();
/// assert_eq!(opts.start_value(), -1);
/// assert_eq!(opts.min_value(), i64::MIN);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct SequenceOptions {
    pub start: Option<i64>,
    #[builder(default = 1)]
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    #[builder(default)]
    pub cycle: bool,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SequenceOptions {
    fn ascending(&self) -> bool {
        self.increment > 0
    }

    pub fn min_value(&self) -> i64 {
        self.min_value
            .unwrap_or(if self.ascending() { 1 } else { i64::MIN })
    }

    pub fn max_value(&self) -> i64 {
        self.max_value
            .unwrap_or(if self.ascending() { i64::MAX } else { -1 })
    }

    pub fn start_value(&self) -> i64 {
        self.start.unwrap_or(if self.ascending() {
            self.min_value()
        } else {
            self.max_value()
        })
    }

    /// Reject definitions no generator could follow.
    pub fn validate(&self) -> DbResult<()> {
        if self.increment == 0 {
            return Err(DbError::Catalog("sequence increment must not be zero".into()));
        }
        let (min, max, start) = (self.min_value(), self.max_value(), self.start_value());
        if min > max {
            return Err(DbError::Catalog(format!(
                "sequence MINVALUE {min} exceeds MAXVALUE {max}"
            )));
        }
        if start < min || start > max {
            return Err(DbError::Catalog(format!(
                "sequence start {start} outside [{min}, {max}]"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct SequenceState {
    /// Value the next allocation returns.
    next: i64,
    /// Set once `next` would leave the bounds.
    exhausted: bool,
    /// Last value handed out.
    last: Option<i64>,
}

/// A named counter owned by a schema.
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "SequenceSnapshot", into = "SequenceSnapshot")]
pub struct Sequence {
    id: SequenceId,
    schema: String,
    name: String,
    options: SequenceOptions,
    state: Mutex<SequenceState>,
}

#[derive(Serialize, Deserialize)]
struct SequenceSnapshot {
    id: SequenceId,
    schema: String,
    name: String,
    options: SequenceOptions,
    state: SequenceState,
}

impl From<SequenceSnapshot> for Sequence {
    fn from(snapshot: SequenceSnapshot) -> Self {
        Self {
            id: snapshot.id,
            schema: snapshot.schema,
            name: snapshot.name,
            options: snapshot.options,
            state: Mutex::new(snapshot.state),
        }
    }
}

impl From<Sequence> for SequenceSnapshot {
    fn from(sequence: Sequence) -> Self {
        Self {
            id: sequence.id,
            schema: sequence.schema,
            name: sequence.name,
            options: sequence.options,
            state: sequence.state.into_inner(),
        }
    }
}

impl Clone for Sequence {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            schema: self.schema.clone(),
            name: self.name.clone(),
            options: self.options.clone(),
            state: Mutex::new(self.state.lock().clone()),
        }
    }
}

impl Sequence {
    pub(crate) fn new(
        id: SequenceId,
        schema: String,
        name: String,
        options: SequenceOptions,
    ) -> DbResult<Self> {
        options.validate()?;
        let state = SequenceState {
            next: options.start_value(),
            exhausted: false,
            last: None,
        };
        Ok(Self {
            id,
            schema,
            name,
            options,
            state: Mutex::new(state),
        })
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn options(&self) -> &SequenceOptions {
        &self.options
    }

    /// `schema.name`, as used in messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Allocate the next value. Atomic with respect to every other caller.
    pub fn next_value(&self) -> DbResult<i64> {
        let opts = &self.options;
        let mut state = self.state.lock();

        if state.exhausted {
            if !opts.cycle {
                return Err(DbError::SequenceExhausted(self.qualified_name()));
            }
            state.next = if opts.ascending() {
                opts.min_value()
            } else {
                opts.max_value()
            };
            state.exhausted = false;
        }

        let value = state.next;
        match value.checked_add(opts.increment) {
            Some(next) if next >= opts.min_value() && next <= opts.max_value() => {
                state.next = next;
            }
            _ => state.exhausted = true,
        }
        state.last = Some(value);

        trace!(sequence = %self.qualified_name(), value, "sequence value allocated");
        Ok(value)
    }

    /// Last value the generator handed out, or one step before the start if
    /// it has never allocated.
    pub fn current_value(&self) -> i64 {
        let state = self.state.lock();
        state
            .last
            .unwrap_or_else(|| self.options.start_value().saturating_sub(self.options.increment))
    }

    /// Make `value` the next value handed out.
    pub fn restart(&self, value: i64) -> DbResult<()> {
        let (min, max) = (self.options.min_value(), self.options.max_value());
        if value < min || value > max {
            return Err(DbError::Catalog(format!(
                "restart value {value} outside [{min}, {max}] for sequence {}",
                self.qualified_name()
            )));
        }
        let mut state = self.state.lock();
        state.next = value;
        state.exhausted = false;
        state.last = None;
        Ok(())
    }
}
