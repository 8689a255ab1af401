//! Recipient resolution
//!
//! Matches a voice-detected name against the known contacts and applies
//! the sticky-recipient policy.

use crate::state_machine::ConversationState;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared set of known contact display names.
///
/// Cloning yields another handle to the same set. Reads are synchronous.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    names: Arc<RwLock<BTreeSet<String>>>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive display-name lookup
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains(name)
    }

    /// Returns true if the name was not already present
    pub fn insert(&self, name: impl Into<String>) -> bool {
        self.write().insert(name.into())
    }

    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(name)
    }

    /// Sorted snapshot of all names
    pub fn names(&self) -> Vec<String> {
        self.read().iter().cloned().collect()
    }

    // Every update is a single set operation, so a poisoned set is still consistent
    fn read(&self) -> RwLockReadGuard<'_, BTreeSet<String>> {
        self.names.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeSet<String>> {
        self.names.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Into<String>> FromIterator<S> for ContactDirectory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let names = iter.into_iter().map(Into::into).collect();
        Self {
            names: Arc::new(RwLock::new(names)),
        }
    }
}

/// Outcome of a resolution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub recipient: Option<String>,
    /// True when `recipient` is resolved (kept or newly matched)
    pub matched: bool,
    /// The detected name that matched no contact, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched_name: Option<String>,
}

impl Resolution {
    /// A name was heard but it is not a known contact
    pub fn is_unresolved_detection(&self) -> bool {
        self.unmatched_name.is_some()
    }
}

/// Resolve the recipient for a turn.
///
/// An already-set recipient is returned unchanged; detection never
/// redirects an in-progress message.
pub fn resolve(
    detected_name: Option<&str>,
    current: &ConversationState,
    contacts: &ContactDirectory,
) -> Resolution {
    if let Some(recipient) = &current.recipient {
        return Resolution {
            recipient: Some(recipient.clone()),
            matched: true,
            unmatched_name: None,
        };
    }

    match detected_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if contacts.contains(name) => Resolution {
            recipient: Some(name.to_string()),
            matched: true,
            unmatched_name: None,
        },
        Some(name) => Resolution {
            recipient: None,
            matched: false,
            unmatched_name: Some(name.to_string()),
        },
        None => Resolution {
            recipient: None,
            matched: false,
            unmatched_name: None,
        },
    }
}
