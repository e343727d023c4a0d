//! Trim-list evaluation.
//!
//! A compiled surface carries an ordered list of [`TrimEntry`] values built
//! once from its array's relation program. At hit time every entry is
//! checked against the candidate point; failing any of them discards the
//! hit. Membership tests are supplied by the caller so this module stays
//! independent of how surface poses are stored.

/// How a trim entry constrains a candidate hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimKind {
    /// Discard hits inside the operand.
    Outer,
    /// Discard hits outside the operand.
    Inner,
    /// Discard hits inside any member of the array accumulator.
    Accum,
}

/// One subtraction applied to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrimEntry {
    /// Global id of the subtrahend surface, or of the array owning the
    /// accumulator for [`TrimKind::Accum`].
    pub operand: usize,
    /// Constraint kind.
    pub kind: TrimKind,
}

impl TrimEntry {
    /// Entry subtracting the operand's interior.
    pub const fn outer(operand: usize) -> Self {
        Self {
            operand,
            kind: TrimKind::Outer,
        }
    }

    /// Entry subtracting the operand's exterior.
    pub const fn inner(operand: usize) -> Self {
        Self {
            operand,
            kind: TrimKind::Inner,
        }
    }

    /// Entry subtracting the accumulator region of array `array`.
    pub const fn accum(array: usize) -> Self {
        Self {
            operand: array,
            kind: TrimKind::Accum,
        }
    }
}

/// Decide whether a candidate hit on surface `owner` survives its trims.
///
/// `inside(s)` must report whether the candidate point lies strictly inside
/// surface `s`'s solid. `accumulator(a)` lists the surfaces accumulated by
/// array `a`; the owner itself is never tested against an accumulator.
pub fn passes_trims<'a, F, A>(owner: usize, trims: &[TrimEntry], accumulator: A, inside: F) -> bool
where
    F: Fn(usize) -> bool,
    A: Fn(usize) -> &'a [usize],
{
    trims.iter().all(|entry| match entry.kind {
        TrimKind::Outer => !inside(entry.operand),
        TrimKind::Inner => inside(entry.operand),
        TrimKind::Accum => !accumulator(entry.operand)
            .iter()
            .any(|&member| member != owner && inside(member)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Membership table for a fixed point: `table[s]` is true when the point
    /// is inside surface `s`.
    fn lookup(table: &[bool]) -> impl Fn(usize) -> bool + '_ {
        move |s| table[s]
    }

    fn none(_: usize) -> &'static [usize] {
        &[]
    }

    /// Accumulator table with a single array 0.
    fn acc<'a>(members: &'a [usize]) -> impl Fn(usize) -> &'a [usize] + 'a {
        move |_| members
    }

    #[test]
    fn test_outer_discards_inside_points() {
        let trims = [TrimEntry::outer(1)];
        assert!(!passes_trims(0, &trims, none, lookup(&[false, true])));
        assert!(passes_trims(0, &trims, none, lookup(&[false, false])));
    }

    #[test]
    fn test_inner_discards_outside_points() {
        let trims = [TrimEntry::inner(1)];
        assert!(passes_trims(0, &trims, none, lookup(&[false, true])));
        assert!(!passes_trims(0, &trims, none, lookup(&[false, false])));
    }

    #[test]
    fn test_distinct_operands_commute() {
        let a = [TrimEntry::outer(1), TrimEntry::inner(2)];
        let b = [TrimEntry::inner(2), TrimEntry::outer(1)];
        for bits in 0..8u8 {
            let table = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0];
            assert_eq!(
                passes_trims(0, &a, none, lookup(&table)),
                passes_trims(0, &b, none, lookup(&table))
            );
        }
    }

    #[test]
    fn test_accumulator_is_a_union() {
        let trims = [TrimEntry::accum(0)];
        for bits in 0..16u8 {
            let table = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0];
            let ab = passes_trims(0, &trims, acc(&[1, 2]), lookup(&table));
            let ba = passes_trims(0, &trims, acc(&[2, 1]), lookup(&table));
            assert_eq!(ab, ba);
            assert_eq!(ab, !(table[1] || table[2]));
        }
    }

    #[test]
    fn test_accum_position_among_outer_entries() {
        let before = [TrimEntry::accum(0), TrimEntry::outer(3)];
        let after = [TrimEntry::outer(3), TrimEntry::accum(0)];
        for bits in 0..16u8 {
            let table = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0];
            assert_eq!(
                passes_trims(0, &before, acc(&[1, 2]), lookup(&table)),
                passes_trims(0, &after, acc(&[1, 2]), lookup(&table))
            );
        }
    }

    #[test]
    fn test_owner_skipped_in_accumulator() {
        // The owner sits in the accumulator too; its own interior must not
        // trim it away.
        let trims = [TrimEntry::accum(0)];
        assert!(passes_trims(0, &trims, acc(&[0, 1]), lookup(&[true, false])));
        assert!(!passes_trims(0, &trims, acc(&[0, 1]), lookup(&[true, true])));
    }
}
