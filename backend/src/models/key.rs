//! Keys, values and domains
//!
//! A [`Key`] names one feature of the world state (e.g. `"Agent 1's decision"`),
//! an agent's reward slot, or an agent's model pointer. Every key is declared
//! once, together with the [`Domain`] its [`Value`]s must stay in.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Suffix used for reward slots (`"<agent>'s __REWARD__"`)
pub const REWARD: &str = "__REWARD__";

/// Suffix used for model pointers (`"<agent>'s __MODEL__"`)
pub const MODEL: &str = "__MODEL__";

/// Declared keys and their domains
pub type Universe = BTreeMap<Key, Domain>;

/// Identifier of a state feature, reward slot or model pointer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Key of a feature owned by an agent
///
/// # Example
/// ```
/// use tom_simulator_core_rs::models::state_key;
///
/// assert_eq!(state_key("actor1", "location").as_str(), "actor1's location");
/// ```
pub fn state_key(agent: &str, feature: &str) -> Key {
    Key(format!("{}'s {}", agent, feature))
}

/// Key of an agent's reward slot
pub fn reward_key(agent: &str) -> Key {
    state_key(agent, REWARD)
}

/// Key of an agent's model pointer
pub fn model_key(agent: &str) -> Key {
    state_key(agent, MODEL)
}

// ============================================================================
// VALUES
// ============================================================================

/// Value of a state feature
///
/// Numbers cover counts, locations and booleans (`1.0` / `0.0`); symbols
/// cover small enumerated domains such as `"cooperated"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Symbol(String),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Symbol(s) => Some(s),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Symbol(_) => 1,
        }
    }
}

// Numbers compare by total order so values can key hash maps and sorted
// collections; -0.0 is folded into 0.0 to keep Eq and Hash consistent.
fn canonical(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Number(n) => {
                0u8.hash(state);
                canonical(*n).to_bits().hash(state);
            }
            Value::Symbol(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Symbol(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Symbol(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Symbol(s)
    }
}

// ============================================================================
// DOMAINS
// ============================================================================

/// Set of values a key may take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Domain {
    /// Real-valued feature with optional inclusive bounds
    Numeric {
        #[serde(default)]
        lo: Option<f64>,
        #[serde(default)]
        hi: Option<f64>,
    },

    /// Truth value stored as `1.0` / `0.0`
    Boolean,

    /// Symbolic feature drawn from an ordered list of names
    Enumerated { values: Vec<String> },
}

impl Domain {
    /// Unbounded real-valued domain
    pub fn numeric() -> Self {
        Domain::Numeric { lo: None, hi: None }
    }

    /// Bounded real-valued domain
    pub fn range(lo: f64, hi: f64) -> Self {
        Domain::Numeric {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    /// Enumerated domain from a list of symbols
    pub fn enumerated<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Domain::Enumerated {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Domain::Enumerated { .. })
    }

    /// Whether `value` belongs to this domain
    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Domain::Numeric { lo, hi }, Value::Number(n)) => {
                n.is_finite()
                    && lo.map_or(true, |lo| *n >= lo)
                    && hi.map_or(true, |hi| *n <= hi)
            }
            (Domain::Boolean, Value::Number(n)) => *n == 0.0 || *n == 1.0,
            (Domain::Enumerated { values }, Value::Symbol(s)) => values.iter().any(|v| v == s),
            _ => false,
        }
    }

    /// Value a freshly declared feature starts with
    pub fn initial_value(&self) -> Value {
        match self {
            Domain::Numeric { lo, hi } => {
                let mut n = 0.0;
                if let Some(lo) = lo {
                    n = f64::max(n, *lo);
                }
                if let Some(hi) = hi {
                    n = f64::min(n, *hi);
                }
                Value::Number(n)
            }
            Domain::Boolean => Value::Number(0.0),
            Domain::Enumerated { values } => values
                .first()
                .map(|v| Value::Symbol(v.clone()))
                .unwrap_or(Value::Number(0.0)),
        }
    }

    /// Clamp a computed number into the domain's bounds
    pub fn clamp(&self, n: f64) -> f64 {
        match self {
            Domain::Numeric { lo, hi } => {
                let mut n = n;
                if let Some(lo) = lo {
                    n = n.max(*lo);
                }
                if let Some(hi) = hi {
                    n = n.min(*hi);
                }
                n
            }
            Domain::Boolean => {
                if n >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Domain::Enumerated { .. } => n,
        }
    }
}
