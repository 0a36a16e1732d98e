//! Zero/one/many resolution of lookup results.
//!
//! The resolver never guesses: more than one candidate is handed back to the
//! caller, who picks an index and asks again.

use crate::error::{DeskError, DeskResult};

/// Outcome of resolving a list of matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    NoMatch,
    Single(T),
    /// Sorted candidates; the caller must choose one.
    Ambiguous(Vec<T>),
}

impl<T: Ord> Selection<T> {
    /// Sort `candidates` and classify them.
    pub fn resolve(mut candidates: Vec<T>) -> Self {
        match candidates.len() {
            0 => Self::NoMatch,
            1 => candidates.pop().map_or(Self::NoMatch, Self::Single),
            _ => {
                candidates.sort();
                Self::Ambiguous(candidates)
            }
        }
    }

    /// Resolve, then apply a previously obtained choice.
    ///
    /// `choice` indexes the sorted candidate list the caller was shown. It is
    /// ignored when there is exactly one candidate.
    pub fn resolve_with(candidates: Vec<T>, choice: Option<usize>) -> Self {
        match (Self::resolve(candidates), choice) {
            (Self::Ambiguous(mut options), Some(index)) if index < options.len() => {
                Self::Single(options.swap_remove(index))
            }
            (selection, _) => selection,
        }
    }
}

/// Check a caller-supplied index against the candidate count.
pub fn check_choice(choice: Option<usize>, count: usize, what: &str) -> DeskResult<()> {
    match choice {
        Some(index) if count > 1 && index >= count => Err(DeskError::Validation(format!(
            "Choice {} out of range for {} ({} candidates)",
            index, what, count
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_counts() {
        assert_eq!(Selection::<u32>::resolve(vec![]), Selection::NoMatch);
        assert_eq!(Selection::resolve(vec![7]), Selection::Single(7));
        assert_eq!(
            Selection::resolve(vec![3, 1, 2]),
            Selection::Ambiguous(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_choice_indexes_sorted_list() {
        assert_eq!(
            Selection::resolve_with(vec!["b", "c", "a"], Some(0)),
            Selection::Single("a")
        );
        assert_eq!(
            Selection::resolve_with(vec!["b", "c", "a"], Some(2)),
            Selection::Single("c")
        );
        assert_eq!(
            Selection::resolve_with(vec!["b", "a"], None),
            Selection::Ambiguous(vec!["a", "b"])
        );
        assert_eq!(
            Selection::resolve_with(vec!["only"], Some(5)),
            Selection::Single("only")
        );
    }

    #[test]
    fn test_check_choice() {
        assert!(check_choice(None, 3, "client").is_ok());
        assert!(check_choice(Some(2), 3, "client").is_ok());
        assert!(matches!(
            check_choice(Some(3), 3, "client"),
            Err(DeskError::Validation(_))
        ));
        assert!(check_choice(Some(9), 1, "client").is_ok());
    }
}
