//! In-memory whitelist and per-user language preferences.
//!
//! Both stores are plain key/value maps with no cross-key invariants, so a
//! short-lived `std::sync::RwLock` is enough; no lock is ever held across
//! an await point. They are owned by the composition root and injected into
//! the middleware and handlers.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{BotError, Result};
use crate::language::Language;

/// Authorized sender ids plus the designated admin.
///
/// The admin id is always authorized, whether or not it appears in the
/// explicit set, and can never be removed.
pub struct Whitelist {
    admin_id: u64,
    users: RwLock<HashSet<u64>>,
}

impl Whitelist {
    pub fn new(admin_id: u64, users: impl IntoIterator<Item = u64>) -> Self {
        Whitelist {
            admin_id,
            users: RwLock::new(users.into_iter().collect()),
        }
    }

    pub fn admin_id(&self) -> u64 {
        self.admin_id
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        user_id == self.admin_id
    }

    pub fn is_authorized(&self, user_id: u64) -> bool {
        self.is_admin(user_id)
            || self
                .users
                .read()
                .map(|set| set.contains(&user_id))
                .unwrap_or(false)
    }

    /// Add a user id. Returns false if it was already present.
    pub fn add(&self, user_id: u64) -> bool {
        self.users
            .write()
            .map(|mut set| set.insert(user_id))
            .unwrap_or(false)
    }

    /// Remove a user id. Removing the admin fails unconditionally and
    /// leaves the set unchanged.
    pub fn remove(&self, user_id: u64) -> Result<bool> {
        if user_id == self.admin_id {
            return Err(BotError::AdminImmutable);
        }
        Ok(self
            .users
            .write()
            .map(|mut set| set.remove(&user_id))
            .unwrap_or(false))
    }

    /// Sorted snapshot of the explicit member set (admin not included).
    pub fn members(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .users
            .read()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

/// Per-user language preference, created lazily on first /language.
pub struct LanguageStore {
    default: Language,
    prefs: RwLock<HashMap<u64, Language>>,
}

impl LanguageStore {
    pub fn new(default: Language) -> Self {
        LanguageStore {
            default,
            prefs: RwLock::new(HashMap::new()),
        }
    }

    /// Preference for a sender, or the configured default when unset.
    /// `None` senders (no resolvable id) get the default too.
    pub fn get(&self, user_id: Option<u64>) -> Language {
        user_id
            .and_then(|id| self.prefs.read().ok().and_then(|m| m.get(&id).copied()))
            .unwrap_or(self.default)
    }

    /// Set a preference from a raw code. An unrecognized code is rejected
    /// without mutating state.
    pub fn set(&self, user_id: u64, code: &str) -> Result<Language> {
        let lang = Language::parse(code).ok_or_else(|| BotError::UnknownLanguage {
            code: code.to_string(),
        })?;
        if let Ok(mut prefs) = self.prefs.write() {
            prefs.insert(user_id, lang);
        }
        Ok(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_always_authorized() {
        let wl = Whitelist::new(999, []);
        assert!(wl.is_authorized(999));
        assert!(!wl.is_authorized(100));
    }

    #[test]
    fn test_add_and_remove_members() {
        let wl = Whitelist::new(999, [100]);
        assert!(wl.is_authorized(100));
        assert!(wl.add(200));
        assert!(!wl.add(200));
        assert!(wl.is_authorized(200));
        assert!(wl.remove(100).unwrap());
        assert!(!wl.is_authorized(100));
        // Removing an id that is not present is not an error.
        assert!(!wl.remove(100).unwrap());
    }

    #[test]
    fn test_admin_removal_rejected_and_set_unchanged() {
        let wl = Whitelist::new(999, [999, 100]);
        let before = wl.members();
        assert!(matches!(wl.remove(999), Err(BotError::AdminImmutable)));
        assert_eq!(wl.members(), before);
        assert!(wl.is_authorized(999));
    }

    #[test]
    fn test_members_sorted_snapshot() {
        let wl = Whitelist::new(999, [300, 100, 200]);
        assert_eq!(wl.members(), vec![100, 200, 300]);
    }

    #[test]
    fn test_language_get_before_set_returns_default() {
        let store = LanguageStore::new(Language::En);
        assert_eq!(store.get(Some(42)), Language::En);
        assert_eq!(store.get(None), Language::En);
    }

    #[test]
    fn test_language_set_and_get() {
        let store = LanguageStore::new(Language::En);
        assert_eq!(store.set(42, "fa").unwrap(), Language::Fa);
        assert_eq!(store.get(Some(42)), Language::Fa);
        // Other users are unaffected.
        assert_eq!(store.get(Some(7)), Language::En);
    }

    #[test]
    fn test_invalid_code_leaves_previous_preference() {
        let store = LanguageStore::new(Language::En);
        store.set(42, "sv").unwrap();
        let err = store.set(42, "klingon").unwrap_err();
        assert!(matches!(err, BotError::UnknownLanguage { .. }));
        assert_eq!(store.get(Some(42)), Language::Sv);
    }

    #[test]
    fn test_invalid_code_before_any_set_keeps_default() {
        let store = LanguageStore::new(Language::Sv);
        assert!(store.set(42, "xx").is_err());
        assert_eq!(store.get(Some(42)), Language::Sv);
    }
}
