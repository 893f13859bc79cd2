//! Short identifier generation for minified output.
//!
//! Candidates are enumerated in a fixed order: `a`..`z`, `A`..`Z`, then
//! two-character names whose first character is a letter and whose second is
//! `[a-zA-Z0-9]`, then three characters and so on. A generator hands out the
//! lowest candidate that is neither claimed nor blocked.

use jetpack_parser::is_reserved_word;
use std::collections::BTreeSet;

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const REST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Longest name the generator will produce.
const MAX_NAME_LEN: u32 = 6;

/// Prefix of synthetic module variables (`mod_<id>`).
pub const MODULE_VAR_PREFIX: &str = "mod_";
/// Binding introduced for `export default <expr>`.
pub const DEFAULT_EXPORT_NAME: &str = "_default";

/// Whether `name` has the shape of a module variable, `mod_` plus digits.
#[must_use]
pub fn is_module_var(name: &str) -> bool {
    name.strip_prefix(MODULE_VAR_PREFIX)
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Number of candidates of exactly `len` characters.
fn count_of_len(len: u32) -> u64 {
    FIRST_CHARS.len() as u64 * (REST_CHARS.len() as u64).pow(len - 1)
}

/// Total size of the candidate space.
fn candidate_space() -> u64 {
    (1..=MAX_NAME_LEN).map(count_of_len).sum()
}

/// The candidate at position `index` of the canonical order.
fn candidate(mut index: u64) -> Option<String> {
    let mut len = 1;
    while len <= MAX_NAME_LEN {
        let count = count_of_len(len);
        if index < count {
            break;
        }
        index -= count;
        len += 1;
    }
    if len > MAX_NAME_LEN {
        return None;
    }

    // The last `len - 1` characters are base-62 digits, most significant first.
    let rest_base = REST_CHARS.len() as u64;
    let mut tail = Vec::with_capacity(len as usize - 1);
    for _ in 1..len {
        tail.push(REST_CHARS[(index % rest_base) as usize]);
        index /= rest_base;
    }
    let mut name = String::with_capacity(len as usize);
    name.push(FIRST_CHARS[index as usize] as char);
    name.extend(tail.iter().rev().map(|&b| b as char));
    Some(name)
}

/// True for names no generator may ever issue.
fn is_excluded(name: &str) -> bool {
    is_reserved_word(name) || name.starts_with(MODULE_VAR_PREFIX) || name == DEFAULT_EXPORT_NAME
}

/// Issues short, unique identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameGenerator {
    /// Names already issued by this generator or any generator merged into it.
    claimed: BTreeSet<String>,
    /// Names that must never be issued (globals, preserved bindings).
    blocked: BTreeSet<String>,
    /// Index of the next candidate to consider.
    cursor: u64,
}

impl NameGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that never issues any of `blocked`.
    #[must_use]
    pub fn with_blocked<I, S>(blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: blocked.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Forbid `name` from now on.
    pub fn block(&mut self, name: impl Into<String>) {
        self.blocked.insert(name.into());
    }

    /// Mark `name` as used without issuing it.
    pub fn claim(&mut self, name: impl Into<String>) {
        self.claimed.insert(name.into());
    }

    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        !is_excluded(name) && !self.claimed.contains(name) && !self.blocked.contains(name)
    }

    #[must_use]
    pub fn claimed(&self) -> &BTreeSet<String> {
        &self.claimed
    }

    /// Issue the next free name. `_hint` is the original name of the symbol
    /// being renamed; the order does not depend on it.
    ///
    /// Returns `None` once every candidate up to the length cap is taken.
    pub fn next(&mut self, _hint: &str) -> Option<String> {
        let space = candidate_space();
        while self.cursor < space {
            let name = candidate(self.cursor)?;
            self.cursor += 1;
            if self.is_available(&name) {
                self.claimed.insert(name.clone());
                return Some(name);
            }
        }
        None
    }

    /// Combine generators of sibling scopes. The result has claimed every
    /// name any input claimed and blocks every name any input blocks.
    ///
    /// Both sets are ordered, so the result does not depend on the order of
    /// `generators`.
    #[must_use]
    pub fn merge<'a, I>(generators: I) -> Self
    where
        I: IntoIterator<Item = &'a NameGenerator>,
    {
        let mut merged = Self::default();
        for generator in generators {
            merged.claimed.extend(generator.claimed.iter().cloned());
            merged.blocked.extend(generator.blocked.iter().cloned());
        }
        merged.cursor = merged.lowest_unclaimed();
        merged
    }

    fn lowest_unclaimed(&self) -> u64 {
        let space = candidate_space();
        let mut index = 0;
        while index < space {
            match candidate(index) {
                Some(name) if self.claimed.contains(&name) => index += 1,
                _ => break,
            }
        }
        index
    }
}
