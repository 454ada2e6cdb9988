//! Fixed-width component-set bitset used as the archetype key.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::component::{ComponentId, MAX_COMPONENTS};

const WORDS: usize = MAX_COMPONENTS / 64;

/// Sentinel for `lowest` when no bit is set (`highest` parks at 0).
const NO_BIT: u16 = u16::MAX;

/// Set of component ids, one bit per id, with the lowest and highest set
/// bits cached so iteration and layout planning scan a bounded range.
///
/// Two entities belong to the same archetype exactly when their signatures
/// compare equal; the signature is the key of the archetype map.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    words: [u64; WORDS],
    lowest: u16,
    highest: u16,
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl Signature {
    pub const fn new() -> Self {
        Self {
            words: [0; WORDS],
            lowest: NO_BIT,
            highest: 0,
        }
    }

    pub fn with(ids: &[ComponentId]) -> Self {
        let mut signature = Self::new();
        for &id in ids {
            signature.set(id);
        }
        signature
    }

    pub fn set(&mut self, id: ComponentId) {
        assert!(
            (id as usize) < MAX_COMPONENTS,
            "component id {id} is out of range (max {MAX_COMPONENTS})"
        );
        self.words[(id / 64) as usize] |= 1u64 << (id % 64);
        if self.lowest == NO_BIT {
            self.lowest = id;
            self.highest = id;
        } else {
            self.lowest = self.lowest.min(id);
            self.highest = self.highest.max(id);
        }
    }

    pub fn clear(&mut self, id: ComponentId) {
        assert!(
            (id as usize) < MAX_COMPONENTS,
            "component id {id} is out of range (max {MAX_COMPONENTS})"
        );
        self.words[(id / 64) as usize] &= !(1u64 << (id % 64));
        if id == self.lowest || id == self.highest {
            self.recalc_bounds();
        }
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        if (id as usize) >= MAX_COMPONENTS {
            return false;
        }
        self.words[(id / 64) as usize] & (1u64 << (id % 64)) != 0
    }

    /// True when every bit of `other` is also set here.
    pub fn contains_all(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    pub fn is_empty(&self) -> bool {
        self.lowest == NO_BIT
    }

    /// Number of set bits.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn union(&self, other: &Signature) -> Signature {
        let mut words = [0u64; WORDS];
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.words[index] | other.words[index];
        }
        let lowest = self.lowest.min(other.lowest);
        let highest = if lowest == NO_BIT {
            0
        } else {
            self.highest.max(other.highest)
        };
        Signature {
            words,
            lowest,
            highest,
        }
    }

    pub fn intersection(&self, other: &Signature) -> Signature {
        let mut out = Signature::new();
        for (index, word) in out.words.iter_mut().enumerate() {
            *word = self.words[index] & other.words[index];
        }
        out.recalc_bounds();
        out
    }

    /// Set ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        let (low, high) = if self.is_empty() {
            (1, 0)
        } else {
            (self.lowest, self.highest)
        };
        (low..=high).filter(move |&id| self.contains(id))
    }

    fn recalc_bounds(&mut self) {
        self.lowest = NO_BIT;
        self.highest = 0;
        for (index, word) in self.words.iter().enumerate() {
            if *word != 0 {
                if self.lowest == NO_BIT {
                    self.lowest = (index * 64) as u16 + word.trailing_zeros() as u16;
                }
                self.highest = (index * 64) as u16 + 63 - word.leading_zeros() as u16;
            }
        }
    }
}

impl BitOr for Signature {
    type Output = Signature;

    fn bitor(self, rhs: Signature) -> Signature {
        self.union(&rhs)
    }
}

impl BitAnd for Signature {
    type Output = Signature;

    fn bitand(self, rhs: Signature) -> Signature {
        self.intersection(&rhs)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature")?;
        f.debug_set().entries(self.ids()).finish()
    }
}
