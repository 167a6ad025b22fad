//! Reduces traced paths to a non-redundant set.
//!
//! Paths are compared as left-to-right layouts of oriented contigs, read on
//! either strand. Paths contained in another path are dropped and paths whose
//! tail equals another path's head are merged, until neither rule applies.
//! Paths that share contigs but disagree on their order or strand stay apart.

use crate::scaffold::trace_path::ScaffoldPath;

/// Contig index and whether it is reverse complemented
type Layout = Vec<(usize, bool)>;

#[derive(Debug, Clone, Default)]
pub struct PathPurger;

impl PathPurger {
    pub fn new() -> Self {
        Self
    }

    pub fn purge_paths(&self, paths: Vec<ScaffoldPath>) -> Vec<ScaffoldPath> {
        let mut layouts: Vec<Layout> = paths
            .iter()
            .filter(|p| !p.is_empty())
            .map(ScaffoldPath::layout)
            .collect();

        loop {
            if let Some(redundant) = Self::find_contained(&layouts) {
                layouts.remove(redundant);
                continue;
            }
            if let Some((into, from, rest)) = Self::find_overlap(&layouts) {
                layouts[into].extend(rest);
                layouts.remove(from);
                continue;
            }
            break;
        }

        layouts.iter().map(|layout| ScaffoldPath::from_layout(layout)).collect()
    }

    /// Index of a layout contained in another, longer or earlier, layout
    fn find_contained(layouts: &[Layout]) -> Option<usize> {
        for (i, outer) in layouts.iter().enumerate() {
            for (j, inner) in layouts.iter().enumerate() {
                if i == j || !(outer.len() > inner.len() || i < j) {
                    continue;
                }
                if contains_run(outer, inner) || contains_run(outer, &flipped(inner)) {
                    return Some(j);
                }
            }
        }
        None
    }

    /// First pair whose suffix/prefix agree, preferring the longest overlap.
    /// Returns the head index, the tail index and the part of the tail
    /// (on the matching strand) past the overlap.
    fn find_overlap(layouts: &[Layout]) -> Option<(usize, usize, Layout)> {
        for (i, head) in layouts.iter().enumerate() {
            for (j, tail) in layouts.iter().enumerate() {
                if i == j {
                    continue;
                }
                for candidate in [tail.clone(), flipped(tail)] {
                    let longest = head.len().min(candidate.len()).saturating_sub(1);
                    for overlap in (1..=longest).rev() {
                        if head[head.len() - overlap..] == candidate[..overlap] {
                            return Some((i, j, candidate[overlap..].to_vec()));
                        }
                    }
                }
            }
        }
        None
    }
}

/// Same layout read on the opposite strand
fn flipped(layout: &[(usize, bool)]) -> Layout {
    layout
        .iter()
        .rev()
        .map(|&(contig, reversed)| (contig, !reversed))
        .collect()
}

fn contains_run(haystack: &[(usize, bool)], needle: &[(usize, bool)]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len().max(1)).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaffold::trace_path::PathStep;

    fn path(contigs: &[usize]) -> ScaffoldPath {
        ScaffoldPath {
            steps: contigs
                .iter()
                .map(|&contig| PathStep {
                    contig,
                    same_orientation: true,
                })
                .collect(),
            grows_right: true,
        }
    }

    #[test]
    fn test_overlapping_paths_merge_into_one() {
        let purged = PathPurger::new().purge_paths(vec![
            path(&[0, 1, 2, 3]),
            path(&[2, 3, 4, 5]),
            path(&[3, 4]),
            path(&[]),
            path(&[5, 6, 7, 8, 9, 10]),
        ]);
        assert_eq!(purged, vec![path(&(0..=10).collect::<Vec<_>>())]);
    }

    #[test]
    fn test_duplicates_and_contained_paths_removed() {
        let purged = PathPurger::new().purge_paths(vec![path(&[1, 2]), path(&[0, 1, 2]), path(&[1, 2])]);
        assert_eq!(purged, vec![path(&[0, 1, 2])]);
    }

    fn oriented(steps: &[(usize, bool)], grows_right: bool) -> ScaffoldPath {
        ScaffoldPath {
            steps: steps
                .iter()
                .map(|&(contig, same_orientation)| PathStep {
                    contig,
                    same_orientation,
                })
                .collect(),
            grows_right,
        }
    }

    #[test]
    fn test_paths_placing_contig_on_opposite_sides_stay_apart() {
        // 1 right of 0, and 2 left of 1: 0 and 2 both claim the left end of 1
        let purged = PathPurger::new().purge_paths(vec![
            oriented(&[(0, true), (1, true)], true),
            oriented(&[(1, true), (2, true)], false),
        ]);
        assert_eq!(purged.len(), 2);
        let layouts: Vec<Vec<(usize, bool)>> = purged.iter().map(ScaffoldPath::layout).collect();
        assert_eq!(layouts, vec![vec![(0, false), (1, false)], vec![(2, false), (1, false)]]);
    }

    #[test]
    fn test_paths_disagreeing_on_strand_stay_apart() {
        let purged = PathPurger::new().purge_paths(vec![
            oriented(&[(0, true), (1, false)], true),
            oriented(&[(1, true), (2, false)], true),
        ]);
        assert_eq!(purged.len(), 2);
    }

    #[test]
    fn test_mirrored_path_is_contained() {
        // the same chain traced right from 0 and left from 2
        let purged = PathPurger::new().purge_paths(vec![
            oriented(&[(0, true), (1, true), (2, true)], true),
            oriented(&[(2, true), (1, true), (0, true)], false),
        ]);
        assert_eq!(purged, vec![path(&[0, 1, 2])]);
    }

    #[test]
    fn test_paths_merge_across_strands() {
        // traced from 2, contig 1 reads reverse complemented
        let purged = PathPurger::new().purge_paths(vec![
            oriented(&[(0, true), (1, true)], true),
            oriented(&[(2, true), (1, false)], true),
        ]);
        assert_eq!(purged, vec![oriented(&[(0, true), (1, true), (2, false)], true)]);
    }

    #[test]
    fn test_disjoint_paths_kept() {
        let purged = PathPurger::new().purge_paths(vec![path(&[0, 1]), path(&[2, 3])]);
        assert_eq!(purged.len(), 2);
    }
}
