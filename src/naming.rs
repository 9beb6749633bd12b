//! Collision-free naming within a namespace of existing keys.
//!
//! A taken name `X` is suffixed as `X_2`, `X_3`, … until a free one is found.

use std::collections::HashSet;

/// Return `candidate` if it is not in `existing`, otherwise the first free
/// `candidate_N` for `N = 2, 3, …`.
///
/// `existing` is a caller-owned snapshot and is never modified.
pub fn resolve_unique_name(candidate: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }

    let mut suffix: u64 = 2;
    loop {
        let attempt = format!("{candidate}_{suffix}");
        if !existing.contains(&attempt) {
            return attempt;
        }
        suffix += 1;
    }
}

/// A snapshot of taken names that grows as names are claimed.
///
/// Claiming a name resolves it against everything taken so far, including
/// names claimed earlier from the same namespace, so one batch can never hand
/// out the same name twice.
#[derive(Debug, Clone, Default)]
pub struct KeyNamespace {
    taken: HashSet<String>,
}

impl KeyNamespace {
    /// Build a namespace from a snapshot of existing keys. Empty keys are
    /// ignored.
    pub fn from_snapshot<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let taken = keys
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| !k.is_empty())
            .collect();
        Self { taken }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }

    /// Resolve `candidate` and reserve the result.
    pub fn claim(&mut self, candidate: &str) -> String {
        let name = resolve_unique_name(candidate, &self.taken);
        self.taken.insert(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn free_name_is_unchanged() {
        assert_eq!(resolve_unique_name("API_KEY", &set(&[])), "API_KEY");
        assert_eq!(resolve_unique_name("API_KEY", &set(&["OTHER"])), "API_KEY");
    }

    #[test]
    fn taken_name_gets_first_free_suffix() {
        assert_eq!(resolve_unique_name("API_KEY", &set(&["API_KEY"])), "API_KEY_2");
        assert_eq!(
            resolve_unique_name("API_KEY", &set(&["API_KEY", "API_KEY_2", "API_KEY_3"])),
            "API_KEY_4"
        );
    }

    #[test]
    fn gaps_are_filled() {
        assert_eq!(
            resolve_unique_name("TOKEN", &set(&["TOKEN", "TOKEN_3"])),
            "TOKEN_2"
        );
    }

    #[test]
    fn suffixed_candidate_is_suffixed_again() {
        assert_eq!(
            resolve_unique_name("TOKEN_2", &set(&["TOKEN_2"])),
            "TOKEN_2_2"
        );
    }

    #[test]
    fn result_is_never_in_snapshot() {
        let existing = set(&["a", "a_2", "a_4", "b"]);
        for candidate in ["a", "a_2", "b", "c"] {
            let resolved = resolve_unique_name(candidate, &existing);
            assert!(!existing.contains(&resolved), "{candidate} -> {resolved}");
        }
    }

    #[test]
    fn namespace_claims_do_not_collide() {
        let mut ns = KeyNamespace::from_snapshot(["API_KEY"]);
        assert_eq!(ns.claim("API_KEY"), "API_KEY_2");
        assert_eq!(ns.claim("API_KEY"), "API_KEY_3");
        assert_eq!(ns.claim("OTHER"), "OTHER");
        assert_eq!(ns.claim("OTHER"), "OTHER_2");
        assert_eq!(ns.len(), 5);
    }

    #[test]
    fn namespace_ignores_empty_keys() {
        let ns = KeyNamespace::from_snapshot(["", "A"]);
        assert_eq!(ns.len(), 1);
        assert!(!ns.contains(""));
    }
}
