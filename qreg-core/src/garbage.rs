//! Garbage piles: scratch registers allocated inside a `garbage()` scope,
//! tracked so the scope can refuse to exit until they're uncomputed
//! again (or, for the anonymous pile, fail loudly if any are left).

use std::collections::HashMap;

use crate::control::PileKey;
use crate::error::{QregResult, ReversibilityError};
use crate::register::KeyId;

#[derive(Debug, Default)]
pub struct GarbagePiles {
    keyless_stack: Vec<Vec<KeyId>>,
    named: HashMap<String, Vec<KeyId>>,
    active: Vec<PileKey>,
    membership: HashMap<KeyId, PileKey>,
}

impl GarbagePiles {
    pub fn enter(&mut self, pile: PileKey) {
        if let PileKey::Keyless = pile {
            self.keyless_stack.push(Vec::new());
        } else if let PileKey::Named(name) = &pile {
            self.named.entry(name.clone()).or_default();
        }
        self.active.push(pile);
    }

    /// Pops the active pile. For the anonymous pile this also checks
    /// that nothing allocated inside it survived uncomputed.
    pub fn exit(&mut self) -> QregResult<PileKey> {
        let pile = self.active.pop().expect("garbage scope exited without a matching enter");
        if let PileKey::Keyless = &pile {
            let remaining = self.keyless_stack.pop().unwrap_or_default();
            if !remaining.is_empty() {
                return Err(ReversibilityError::GarbagePileNotEmpty(remaining.len()).into());
            }
        }
        Ok(pile)
    }

    /// Registers a freshly allocated key into the innermost active pile,
    /// if any garbage scope is open.
    pub fn record(&mut self, key: KeyId) {
        let Some(pile) = self.active.last().cloned() else { return };
        match &pile {
            PileKey::Keyless => {
                if let Some(top) = self.keyless_stack.last_mut() {
                    top.push(key);
                }
            }
            PileKey::Named(name) => {
                self.named.entry(name.clone()).or_default().push(key);
            }
        }
        self.membership.insert(key, pile);
    }

    /// Removes a key from whichever pile it was recorded in, called when
    /// that key (or its uncomputation partner) is deallocated.
    pub fn forget(&mut self, key: KeyId) {
        let Some(pile) = self.membership.remove(&key) else { return };
        let vec = match &pile {
            PileKey::Keyless => self.keyless_stack.last_mut(),
            PileKey::Named(name) => self.named.get_mut(name),
        };
        if let Some(v) = vec {
            if let Some(pos) = v.iter().position(|k| *k == key) {
                v.remove(pos);
            }
        }
    }

    pub fn assert_clean(&self, pile: &PileKey) -> QregResult<()> {
        let len = match pile {
            PileKey::Keyless => self.keyless_stack.last().map(Vec::len).unwrap_or(0),
            PileKey::Named(name) => self.named.get(name).map(Vec::len).unwrap_or(0),
        };
        if len == 0 {
            Ok(())
        } else {
            Err(ReversibilityError::GarbagePileNotEmpty(len).into())
        }
    }

    /// True while at least one garbage scope (anonymous or named) is
    /// open -- the gate on the `=`-style assignment forms.
    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Another still-live key recorded in the same pile as `key`, used to
    /// give a deallocated key an uncomputation partner to proxy through.
    pub fn sibling_of(&self, key: KeyId) -> Option<KeyId> {
        let pile = self.membership.get(&key)?;
        let members = match pile {
            PileKey::Keyless => self.keyless_stack.last(),
            PileKey::Named(name) => self.named.get(name),
        }?;
        members.iter().copied().find(|k| *k != key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyless_pile_rejects_leftover_registers() {
        let mut piles = GarbagePiles::default();
        piles.enter(PileKey::Keyless);
        piles.record(KeyId(0));
        assert!(piles.exit().is_err());
    }

    #[test]
    fn keyless_pile_accepts_fully_uncomputed_scope() {
        let mut piles = GarbagePiles::default();
        piles.enter(PileKey::Keyless);
        piles.record(KeyId(0));
        piles.forget(KeyId(0));
        assert!(piles.exit().is_ok());
    }

    #[test]
    fn is_active_tracks_open_scopes() {
        let mut piles = GarbagePiles::default();
        assert!(!piles.is_active());
        piles.enter(PileKey::Keyless);
        assert!(piles.is_active());
        piles.exit().unwrap();
        assert!(!piles.is_active());
    }

    #[test]
    fn sibling_of_finds_another_live_member_of_the_same_pile() {
        let mut piles = GarbagePiles::default();
        piles.enter(PileKey::Keyless);
        piles.record(KeyId(0));
        piles.record(KeyId(1));
        assert_eq!(piles.sibling_of(KeyId(0)), Some(KeyId(1)));
        piles.forget(KeyId(1));
        assert_eq!(piles.sibling_of(KeyId(0)), None);
    }

    #[test]
    fn named_pile_persists_across_scopes() {
        let mut piles = GarbagePiles::default();
        piles.enter(PileKey::Named("scratch".into()));
        piles.record(KeyId(1));
        piles.exit().unwrap();
        assert!(piles.assert_clean(&PileKey::Named("scratch".into())).is_err());
        piles.forget(KeyId(1));
        assert!(piles.assert_clean(&PileKey::Named("scratch".into())).is_ok());
    }
}
