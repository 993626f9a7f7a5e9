//! The alias map: canonicalization of signal bits merged by direct connections.

use std::collections::{HashMap, HashSet};

use super::{Module, SigBit, WireId};

/// Union-find over [`SigBit`]s.
///
/// Two bits connected (directly or transitively) by a module connection map to the same
/// representative. The representative of a class is its constant if it has one, else its
/// lowest bit on a public wire, else its lowest bit.
///
/// ```rust
/// use blifmap::design::{Module, SigBit, SigMap, State};
/// let mut m = Module::new("top");
/// let a = m.add_wire("a", 1).unwrap();
/// let t = m.add_wire("$tmp", 1).unwrap();
/// m.connect(SigBit::wire(t, 0), SigBit::wire(a, 0)).unwrap();
/// let sigmap = SigMap::from_module(&m);
/// assert_eq!(sigmap.apply(SigBit::wire(t, 0)), SigBit::wire(a, 0));
/// assert_eq!(sigmap.apply(SigBit::Const(State::S1)), SigBit::Const(State::S1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SigMap {
    parent: HashMap<SigBit, SigBit>,
    public: HashSet<WireId>,
}

impl SigMap {
    /// An empty map: every bit is its own representative.
    pub fn new() -> Self {
        SigMap::default()
    }

    /// Builds the map of all the connections of `module`.
    pub fn from_module(module: &Module) -> Self {
        let mut sigmap = SigMap {
            parent: HashMap::new(),
            public: module
                .wire_ids()
                .filter(|&id| !module.wire(id).is_internal())
                .collect(),
        };
        for (lhs, rhs) in module.connections() {
            for (&a, &b) in lhs.bits().iter().zip(rhs.bits()) {
                sigmap.add(a, b);
            }
        }
        let bits: Vec<SigBit> = sigmap.parent.keys().copied().collect();
        for bit in bits {
            sigmap.compress(bit);
        }
        sigmap
    }

    fn rank(&self, bit: &SigBit) -> (u8, SigBit) {
        let class = match bit {
            SigBit::Const(_) => 0,
            SigBit::Wire { wire, .. } if self.public.contains(wire) => 1,
            SigBit::Wire { .. } => 2,
        };
        (class, *bit)
    }

    fn find(&self, bit: SigBit) -> SigBit {
        let mut current = bit;
        while let Some(&next) = self.parent.get(&current) {
            current = next;
        }
        current
    }

    /// Points every bit on the path from `bit` straight to its representative.
    fn compress(&mut self, bit: SigBit) -> SigBit {
        let root = self.find(bit);
        let mut current = bit;
        while current != root {
            match self.parent.insert(current, root) {
                Some(next) => current = next,
                None => break,
            }
        }
        root
    }

    /// Merges the classes of `a` and `b`.
    pub fn add(&mut self, a: SigBit, b: SigBit) {
        let ra = self.compress(a);
        let rb = self.compress(b);
        if ra == rb {
            return;
        }
        // Two distinct constants never merge: a conflicting connection keeps both drivers.
        if ra.is_const() && rb.is_const() {
            return;
        }
        let (root, child) = if self.rank(&ra) <= self.rank(&rb) {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent.insert(child, root);
    }

    /// Returns the representative of `bit`.
    pub fn apply(&self, bit: SigBit) -> SigBit {
        self.find(bit)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::design::State;

    #[test]
    fn representative_test() {
        let mut m = Module::new("m");
        let t1 = m.add_wire("$t1", 2).unwrap();
        let b = m.add_wire("b", 2).unwrap();
        let a = m.add_wire("a", 1).unwrap();
        m.connect(SigBit::wire(t1, 0), SigBit::wire(b, 1)).unwrap();
        m.connect(SigBit::wire(a, 0), SigBit::wire(t1, 0)).unwrap();
        m.connect(SigBit::wire(t1, 1), SigBit::Const(State::S0)).unwrap();
        let sigmap = SigMap::from_module(&m);

        // Public wire wins over the internal one, lowest public bit wins among publics
        assert_eq!(sigmap.apply(SigBit::wire(a, 0)), SigBit::wire(b, 1));
        assert_eq!(sigmap.apply(SigBit::wire(t1, 0)), SigBit::wire(b, 1));
        // Constants win over everything
        assert_eq!(sigmap.apply(SigBit::wire(t1, 1)), SigBit::Const(State::S0));
        // Untouched bits are their own representative
        assert_eq!(sigmap.apply(SigBit::wire(b, 0)), SigBit::wire(b, 0));
    }

    #[test]
    fn transitive_test() {
        let mut sigmap = SigMap::new();
        let bits: Vec<SigBit> = (0..5).map(|i| SigBit::wire(WireId(i), 0)).collect();
        sigmap.add(bits[4], bits[3]);
        sigmap.add(bits[2], bits[1]);
        sigmap.add(bits[3], bits[2]);
        for &bit in &bits[1..] {
            assert_eq!(sigmap.apply(bit), bits[1]);
        }
        assert_eq!(sigmap.apply(bits[0]), bits[0]);
    }

    #[test]
    fn flat_chain_test() {
        let mut m = Module::new("m");
        let bits: Vec<SigBit> = (0..10)
            .map(|i| SigBit::wire(m.add_wire(format!("$t{}", i), 1).unwrap(), 0))
            .collect();
        // Each connection hangs the previous representative below a lower bit
        for i in (0..9).rev() {
            m.connect(bits[i], bits[i + 1]).unwrap();
        }
        let sigmap = SigMap::from_module(&m);
        assert_eq!(sigmap.parent.len(), 9);
        for root in sigmap.parent.values() {
            assert_eq!(root, &bits[0]);
        }
        assert_eq!(sigmap.apply(bits[9]), bits[0]);
    }
}
