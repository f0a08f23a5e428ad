//! The SET matching rule.
//!
//! Three cards form a SET if, for every attribute, their values are either
//! all the same or pairwise different.

use itertools::Itertools;

use crate::tables::Table;

/// Whether the three cards form a SET.
pub fn is_set(first: &[i32], second: &[i32], third: &[i32]) -> bool {
    first
        .iter()
        .zip(second)
        .zip(third)
        .all(|((a, b), c)| (a == b && b == c) || (a != b && b != c && a != c))
}

/// Number of SETs among all card triplets of `table`.
pub fn count_sets(table: &Table) -> u32 {
    table
        .cards()
        .iter()
        .tuple_combinations()
        .filter(|(a, b, c)| is_set(a, b, c))
        .count() as u32
}

/// A table whose listed SET count disagrees with a recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountDiscrepancy {
    /// Position of the table in the report
    pub index: usize,
    /// Count given in the report
    pub reported: u32,
    /// Count obtained by [count_sets]
    pub recounted: u32,
}

/// Recount every table and list the disagreements with the reported counts.
pub fn verify_counts<'a>(
    tables: impl IntoIterator<Item = (&'a Table, u32)>,
) -> Vec<CountDiscrepancy> {
    tables
        .into_iter()
        .enumerate()
        .filter_map(|(index, (table, reported))| {
            let recounted = count_sets(table);
            (recounted != reported).then_some(CountDiscrepancy {
                index,
                reported,
                recounted,
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matching_rule() {
        assert!(is_set(&[0, 1, -1], &[0, 0, 0], &[0, -1, 1]));
        assert!(is_set(&[1, 1], &[0, 0], &[-1, -1]));
        assert!(!is_set(&[1, 1], &[1, 0], &[-1, -1]));
    }

    #[test]
    fn counting() {
        let table = Table::new(vec![
            vec![-1, -1],
            vec![0, 0],
            vec![1, 1],
            vec![1, 0],
            vec![1, -1],
        ]);
        // {(-1,-1),(0,0),(1,1)} and {(1,1),(1,0),(1,-1)}
        assert_eq!(count_sets(&table), 2);
    }

    #[test]
    fn discrepancies() {
        let tables = [
            Table::new(vec![vec![0], vec![1], vec![-1]]),
            Table::new(vec![vec![0], vec![0], vec![1]]),
        ];
        let found = verify_counts(tables.iter().zip([1, 1]));

        assert_eq!(
            found,
            vec![CountDiscrepancy {
                index: 1,
                reported: 1,
                recounted: 0
            }]
        );
    }
}
