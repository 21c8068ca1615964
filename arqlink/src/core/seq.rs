//! Modular sequence-number arithmetic.
//!
//! Sequence numbers live in `[0, N)` where `N = max_seq + 1 <= 256`, so a
//! sequence number always fits the one-byte wire field. All arithmetic wraps
//! at `N`, not at `u8::MAX`.
//!
//! ```text
//!          base                 bound
//!   ... ----|=====================|---- ...      (mod N)
//!           ^ in window           ^ exclusive or inclusive end
//! ```

/// A sequence number in `[0, N)`.
pub type Seq = u8;

/// How the far end of a window interval is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `[base, bound)`.
    Exclusive,
    /// `[base, bound]`.
    Inclusive,
}

/// A sequence space of modulus `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u16,
}

impl SeqSpace {
    /// Creates the space `[0, max_seq]`.
    pub const fn new(max_seq: Seq) -> Self {
        Self {
            modulus: max_seq as u16 + 1,
        }
    }

    /// Returns `N`.
    #[inline]
    pub const fn modulus(&self) -> u16 {
        self.modulus
    }

    /// Returns the largest sequence number, `N - 1`.
    #[inline]
    pub const fn max_seq(&self) -> Seq {
        (self.modulus - 1) as Seq
    }

    /// Returns true if `s` is a valid member of this space.
    #[inline]
    pub const fn contains(&self, s: Seq) -> bool {
        (s as u16) < self.modulus
    }

    /// `s + 1 (mod N)`.
    #[inline]
    pub const fn increment(&self, s: Seq) -> Seq {
        ((s as u16 + 1) % self.modulus) as Seq
    }

    /// `s + n (mod N)`.
    #[inline]
    pub const fn add(&self, s: Seq, n: u16) -> Seq {
        ((s as u16 + n % self.modulus) % self.modulus) as Seq
    }

    /// `s - n (mod N)`.
    #[inline]
    pub const fn sub(&self, s: Seq, n: u16) -> Seq {
        ((s as u16 + self.modulus - n % self.modulus) % self.modulus) as Seq
    }

    /// Number of forward steps from `from` to `to`.
    #[inline]
    pub const fn distance(&self, from: Seq, to: Seq) -> u16 {
        (to as u16 + self.modulus - from as u16) % self.modulus
    }

    /// Returns true if `s` lies on the circular interval that starts at
    /// `base` and ends at `bound`.
    ///
    /// Case-splits on which of `base`/`bound` is numerically smaller rather
    /// than relying on subtraction, so it is correct for any `N`. A window
    /// whose end equals its start is empty when exclusive and `{base}` when
    /// inclusive.
    pub const fn in_window(&self, base: Seq, s: Seq, bound: Seq, kind: Bound) -> bool {
        match kind {
            Bound::Exclusive => {
                if base <= bound {
                    base <= s && s < bound
                } else {
                    base <= s || s < bound
                }
            }
            Bound::Inclusive => {
                if base <= bound {
                    base <= s && s <= bound
                } else {
                    base <= s || s <= bound
                }
            }
        }
    }

    /// Iterates `count` consecutive sequence numbers starting at `from`.
    pub fn iter_from(&self, from: Seq, count: u16) -> impl Iterator<Item = Seq> + '_ {
        (0..count).map(move |i| self.add(from, i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unrolls the circle at `base` and compares plain integers.
    fn unrolled(space: &SeqSpace, base: Seq, s: Seq, bound: Seq, kind: Bound) -> bool {
        let s = space.distance(base, s);
        let bound = space.distance(base, bound);
        match kind {
            Bound::Exclusive => s < bound,
            Bound::Inclusive => s <= bound,
        }
    }

    #[test]
    fn test_in_window_exhaustive() {
        for max_seq in [1u8, 3, 7, 15, 31] {
            let space = SeqSpace::new(max_seq);
            for base in 0..=max_seq {
                for s in 0..=max_seq {
                    for bound in 0..=max_seq {
                        for kind in [Bound::Exclusive, Bound::Inclusive] {
                            assert_eq!(
                                space.in_window(base, s, bound, kind),
                                unrolled(&space, base, s, bound, kind),
                                "N={} base={} s={} bound={} {:?}",
                                space.modulus(),
                                base,
                                s,
                                bound,
                                kind
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_in_window_full_byte_space() {
        let space = SeqSpace::new(255);
        assert!(space.in_window(250, 255, 3, Bound::Exclusive));
        assert!(space.in_window(250, 0, 3, Bound::Exclusive));
        assert!(!space.in_window(250, 3, 3, Bound::Exclusive));
        assert!(space.in_window(250, 3, 3, Bound::Inclusive));
        assert!(!space.in_window(250, 249, 3, Bound::Inclusive));
    }

    #[test]
    fn test_empty_and_single_windows() {
        let space = SeqSpace::new(7);
        for s in 0..8 {
            assert!(!space.in_window(5, s, 5, Bound::Exclusive));
            assert_eq!(space.in_window(5, s, 5, Bound::Inclusive), s == 5);
        }
    }

    #[test]
    fn test_increment_wraps_at_modulus() {
        let space = SeqSpace::new(7);
        assert_eq!(space.increment(6), 7);
        assert_eq!(space.increment(7), 0);

        let space = SeqSpace::new(255);
        assert_eq!(space.increment(255), 0);
    }

    #[test]
    fn test_add_sub_distance() {
        let space = SeqSpace::new(31);
        assert_eq!(space.add(30, 5), 3);
        assert_eq!(space.sub(3, 5), 30);
        assert_eq!(space.sub(0, 1), 31);
        assert_eq!(space.distance(30, 3), 5);
        assert_eq!(space.distance(3, 3), 0);
        assert_eq!(space.add(4, 64), 4);
    }

    #[test]
    fn test_iter_from_wraps() {
        let space = SeqSpace::new(7);
        let seqs: heapless::Vec<Seq, 8> = space.iter_from(6, 4).collect();
        assert_eq!(seqs.as_slice(), &[6, 7, 0, 1]);
    }

    #[test]
    fn test_contains() {
        let space = SeqSpace::new(7);
        assert!(space.contains(7));
        assert!(!space.contains(8));
    }
}
