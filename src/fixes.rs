// src/fixes.rs

//! Fix (binary patch) conflict checking and ordering
//!
//! Two installed fixes conflict when they update the same file. A fix may be
//! removed only if every fix it overlaps with either resolves all of its
//! problems (supersedes it) or is being removed in the same batch.

use crate::descriptor::FixDescriptor;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// True iff every problem display id of `a` also appears in `b`
pub fn superseded_by(a: &FixDescriptor, b: &FixDescriptor) -> bool {
    let theirs = b.problem_ids();
    a.problem_ids().iter().all(|id| theirs.contains(id))
}

pub fn shares_updated_file(a: &FixDescriptor, b: &FixDescriptor) -> bool {
    let theirs = b.file_ids();
    a.file_ids().iter().any(|id| theirs.contains(id))
}

/// `a` needs `b` present: they overlap and `b` does not supersede `a`
pub fn depends_on(a: &FixDescriptor, b: &FixDescriptor) -> bool {
    a.id() != b.id() && shares_updated_file(a, b) && !superseded_by(a, b)
}

/// First installed fix that prevents removing `target`
pub fn find_conflict<'a>(
    target: &FixDescriptor,
    installed: &'a [Arc<FixDescriptor>],
    co_removing: &HashSet<String>,
) -> Option<&'a Arc<FixDescriptor>> {
    installed.iter().find(|other| {
        if other.id() == target.id() || !shares_updated_file(target, other) {
            return false;
        }
        if superseded_by(target, other) {
            debug!("{} is superseded by {}", target.id(), other.id());
            return false;
        }
        !co_removing.contains(other.id())
    })
}

pub fn is_removable(
    target: &FixDescriptor,
    installed: &[Arc<FixDescriptor>],
    co_removing: &HashSet<String>,
) -> bool {
    find_conflict(target, installed, co_removing).is_none()
}

/// Pairwise comparator: a dependent fix sorts after what it depends on
pub fn compare(a: &FixDescriptor, b: &FixDescriptor) -> Ordering {
    if depends_on(a, b) {
        Ordering::Greater
    } else if depends_on(b, a) {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Apply order for a batch of fixes
///
/// The comparator is not guaranteed to be a total order, so this is a
/// stable insertion sort rather than `slice::sort_by`, which may panic on an
/// inconsistent comparator. Results can depend on input order when the
/// depends-on relation is not transitive.
pub fn order(fixes: &[Arc<FixDescriptor>]) -> Vec<Arc<FixDescriptor>> {
    let mut sorted: Vec<Arc<FixDescriptor>> = fixes.to_vec();
    for i in 1..sorted.len() {
        let mut j = i;
        while j > 0 && compare(&sorted[j - 1], &sorted[j]) == Ordering::Greater {
            sorted.swap(j - 1, j);
            j -= 1;
        }
    }
    sorted
}

/// Removal order for a batch: the reverse of the apply order
pub fn removal_order(fixes: &[Arc<FixDescriptor>]) -> Vec<Arc<FixDescriptor>> {
    let mut sorted = order(fixes);
    sorted.reverse();
    sorted
}

/// Check that every fix in `targets` can go, and return the removal order
pub fn plan_fix_removal(
    targets: &[String],
    installed: &[Arc<FixDescriptor>],
) -> Result<Vec<Arc<FixDescriptor>>> {
    if targets.is_empty() {
        return Err(Error::BadArgument("no fixes to uninstall".to_string()));
    }

    let mut selected = Vec::new();
    for id in targets {
        let fix = installed
            .iter()
            .find(|f| f.id() == id)
            .ok_or_else(|| Error::BadArgument(format!("fix {id} is not installed")))?;
        if !selected.iter().any(|s: &Arc<FixDescriptor>| s.id() == fix.id()) {
            selected.push(Arc::clone(fix));
        }
    }

    let co_removing: HashSet<String> = selected.iter().map(|f| f.id().to_string()).collect();
    for fix in &selected {
        if let Some(conflict) = find_conflict(fix, installed, &co_removing) {
            return Err(Error::FixConflict {
                fix: fix.id().to_string(),
                conflicting: conflict.id().to_string(),
            });
        }
    }

    let ordered = removal_order(&selected);
    info!("Planned removal of {} fixes", ordered.len());
    Ok(ordered)
}

/// Per installed fix: the fix that prevents removing it on its own, if any
pub fn removability_report(installed: &[Arc<FixDescriptor>]) -> Vec<(String, Option<String>)> {
    let none = HashSet::new();
    installed
        .iter()
        .map(|fix| {
            let conflict = find_conflict(fix, installed, &none).map(|c| c.id().to_string());
            (fix.id().to_string(), conflict)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(id: &str, problems: &[&str], files: &[&str]) -> Arc<FixDescriptor> {
        Arc::new(
            FixDescriptor::new(id)
                .with_problems(problems.iter().copied())
                .with_files(files.iter().copied()),
        )
    }

    #[test]
    fn test_superseded_by_is_subset_by_display_id() {
        let a = fix("a", &["A1"], &[]);
        let b = fix("b", &["A1", "A2"], &[]);
        let c = fix("c", &["A3"], &[]);
        assert!(superseded_by(&a, &b));
        assert!(!superseded_by(&b, &a));
        assert!(!superseded_by(&a, &c));
        assert!(!superseded_by(&c, &a));
    }

    #[test]
    fn test_removable_when_superseded() {
        let f1 = fix("F1", &["A1"], &["f.jar"]);
        let f2 = fix("F2", &["A1", "A2"], &["f.jar"]);
        let installed = vec![f1.clone(), f2];
        assert!(is_removable(&f1, &installed, &HashSet::new()));

        let f2 = fix("F2", &["A2"], &["f.jar"]);
        let installed = vec![f1.clone(), f2];
        assert!(!is_removable(&f1, &installed, &HashSet::new()));

        let co: HashSet<String> = ["F2".to_string()].into_iter().collect();
        assert!(is_removable(&f1, &installed, &co));
    }

    #[test]
    fn test_disjoint_files_never_conflict() {
        let f1 = fix("F1", &["A1"], &["a.jar"]);
        let f2 = fix("F2", &["A2"], &["b.jar"]);
        let installed = vec![f1.clone(), f2];
        assert!(is_removable(&f1, &installed, &HashSet::new()));
    }

    #[test]
    fn test_order_puts_superseded_first() {
        let old = fix("old", &["A1"], &["f.jar"]);
        let new = fix("new", &["A1", "A2"], &["f.jar"]);
        let applied = order(&[new.clone(), old.clone()]);
        assert_eq!(applied[0].id(), "old");
        assert_eq!(applied[1].id(), "new");

        let removed = removal_order(&[old, new]);
        assert_eq!(removed[0].id(), "new");
    }

    #[test]
    fn test_non_transitive_order_depends_on_input() {
        // c depends on a; b is unrelated to both
        let a = fix("a", &["P1"], &["x.jar"]);
        let b = fix("b", &["P2"], &["y.jar"]);
        let c = fix("c", &["P3"], &["x.jar"]);

        let one: Vec<String> = order(&[c.clone(), b.clone(), a.clone()])
            .iter()
            .map(|f| f.id().to_string())
            .collect();
        let two: Vec<String> = order(&[c, a, b])
            .iter()
            .map(|f| f.id().to_string())
            .collect();

        // Known limitation: the comparator is only consulted between
        // neighbours, so an unrelated fix in between hides the dependency
        assert_eq!(one, vec!["c", "b", "a"]);
        assert_eq!(two, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_plan_fix_removal_reports_conflict() {
        let f1 = fix("F1", &["A1"], &["f.jar"]);
        let f2 = fix("F2", &["A2"], &["f.jar"]);
        let installed = vec![f1, f2];

        let err = plan_fix_removal(&["F1".to_string()], &installed).unwrap_err();
        assert!(matches!(err, Error::FixConflict { ref conflicting, .. } if conflicting == "F2"));

        let both = plan_fix_removal(&["F1".to_string(), "F2".to_string()], &installed).unwrap();
        assert_eq!(both.len(), 2);

        let report = removability_report(&installed);
        assert_eq!(report[0], ("F1".to_string(), Some("F2".to_string())));
    }
}
