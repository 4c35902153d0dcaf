//! Cache key derivation.
//!
//! A key is a base string followed by the string form of each fragment,
//! joined with `|`. Scalars are written out as is; callables and composite
//! values are replaced by a SHA-256 digest so the key stays short and stable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Separator between the base key and each fragment.
pub const KEY_SEPARATOR: char = '|';

const NULL_FRAGMENT: &str = "NULL";
const CALLABLE_TAG: &str = "Closure()";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of one callable instance.
///
/// Fresh ids never collide; clones share the identity, so a callback keeps
/// producing the same fragment for as long as its id is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId(Uuid);

impl CallableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallableId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One input used, alongside a base key, to derive a cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFragment {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Callable(CallableId),
    /// Arbitrary structured data, hashed by its canonical JSON form.
    Composite(serde_json::Value),
    /// A value that could not be represented; contributes an empty fragment.
    Unrepresentable,
}

impl KeyFragment {
    /// Builds a composite fragment from any serializable value.
    pub fn composite<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => KeyFragment::Composite(v),
            Err(e) => {
                tracing::debug!(error = %e, "Key fragment is not serializable");
                KeyFragment::Unrepresentable
            }
        }
    }

    /// The string this fragment contributes to a key.
    pub fn stringify(&self) -> String {
        match self {
            KeyFragment::Null => NULL_FRAGMENT.to_string(),
            KeyFragment::Str(s) => s.clone(),
            KeyFragment::Int(i) => i.to_string(),
            KeyFragment::Float(f) => f.to_string(),
            KeyFragment::Bool(true) => "1".to_string(),
            KeyFragment::Bool(false) => String::new(),
            KeyFragment::Callable(id) => sha256_hex(format!("{}{}", CALLABLE_TAG, id).as_bytes()),
            KeyFragment::Composite(v) => match serde_json::to_string(&canonical(v)) {
                Ok(s) => sha256_hex(s.as_bytes()),
                Err(_) => String::new(),
            },
            KeyFragment::Unrepresentable => String::new(),
        }
    }
}

impl From<&str> for KeyFragment {
    fn from(s: &str) -> Self {
        KeyFragment::Str(s.to_string())
    }
}
impl From<String> for KeyFragment {
    fn from(s: String) -> Self {
        KeyFragment::Str(s)
    }
}
impl From<&String> for KeyFragment {
    fn from(s: &String) -> Self {
        KeyFragment::Str(s.clone())
    }
}
impl From<bool> for KeyFragment {
    fn from(b: bool) -> Self {
        KeyFragment::Bool(b)
    }
}
impl From<f64> for KeyFragment {
    fn from(f: f64) -> Self {
        KeyFragment::Float(f)
    }
}
impl From<CallableId> for KeyFragment {
    fn from(id: CallableId) -> Self {
        KeyFragment::Callable(id)
    }
}
impl From<serde_json::Value> for KeyFragment {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => KeyFragment::Null,
            serde_json::Value::Bool(b) => KeyFragment::Bool(b),
            serde_json::Value::String(s) => KeyFragment::Str(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => KeyFragment::Int(i),
                None => n.as_f64().map(KeyFragment::Float).unwrap_or(KeyFragment::Unrepresentable),
            },
            other => KeyFragment::Composite(other),
        }
    }
}
impl<T: Into<KeyFragment>> From<Option<T>> for KeyFragment {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(KeyFragment::Null)
    }
}

macro_rules! int_fragment {
    ($($t:ty),*) => {
        $(impl From<$t> for KeyFragment {
            fn from(i: $t) -> Self {
                KeyFragment::Int(i as i64)
            }
        })*
    };
}
int_fragment!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<u64> for KeyFragment {
    fn from(i: u64) -> Self {
        i64::try_from(i).map(KeyFragment::Int).unwrap_or_else(|_| KeyFragment::Str(i.to_string()))
    }
}

impl From<usize> for KeyFragment {
    fn from(i: usize) -> Self {
        KeyFragment::from(i as u64)
    }
}

/// Builds a `Vec<KeyFragment>` from mixed values.
///
/// ```rust
/// use mlp_cache::{fragments, cache::KeyFragment};
///
/// let f = fragments![42, "en", KeyFragment::Null];
/// assert_eq!(f.len(), 3);
/// ```
#[macro_export]
macro_rules! fragments {
    () => {
        ::std::vec::Vec::<$crate::cache::KeyFragment>::new()
    };
    ($($f:expr),+ $(,)?) => {
        vec![$($crate::cache::KeyFragment::from($f)),+]
    };
}

/// Derives the cache key for `base` and `fragments`.
pub fn derive_key(base: &str, fragments: &[KeyFragment]) -> CacheKey {
    if fragments.is_empty() {
        return CacheKey::new(base);
    }
    let mut key = String::from(base);
    for fragment in fragments {
        key.push(KEY_SEPARATOR);
        key.push_str(&fragment.stringify());
    }
    CacheKey(key)
}

/// `value` with object keys sorted at every depth, whatever order the map keeps.
fn canonical(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), canonical(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}
