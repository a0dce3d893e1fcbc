use std::cmp::Ordering;
use std::iter::Peekable;

#[derive(Debug, PartialEq, Eq)]
pub enum JoinResult<A, B> {
    OnlyInFirst(A),
    OnlyInSecond(B),
    InBoth(A, B),
}

/// Outer join of two iterators that are both sorted by `cmp`.
pub struct SortMergeDiff<I: Iterator, J: Iterator, F> {
    first: Peekable<I>,
    second: Peekable<J>,
    cmp: F,
}

impl<I: Iterator, J: Iterator, F> SortMergeDiff<I, J, F>
where
    F: FnMut(&I::Item, &J::Item) -> Ordering,
{
    pub fn new(first: I, second: J, cmp: F) -> Self {
        SortMergeDiff {
            first: first.peekable(),
            second: second.peekable(),
            cmp,
        }
    }
}

impl<I: Iterator, J: Iterator, F> Iterator for SortMergeDiff<I, J, F>
where
    F: FnMut(&I::Item, &J::Item) -> Ordering,
{
    type Item = JoinResult<I::Item, J::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let ordering = match (self.first.peek(), self.second.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => (self.cmp)(a, b),
        };
        match ordering {
            Ordering::Less => self.first.next().map(JoinResult::OnlyInFirst),
            Ordering::Greater => self.second.next().map(JoinResult::OnlyInSecond),
            Ordering::Equal => match (self.first.next(), self.second.next()) {
                (Some(a), Some(b)) => Some(JoinResult::InBoth(a, b)),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_sorted_keys() {
        let first = [1, 2, 4].into_iter();
        let second = [2, 3, 4, 5].into_iter();
        let diff: Vec<_> = SortMergeDiff::new(first, second, |a, b| a.cmp(b)).collect();
        assert_eq!(
            diff,
            vec![
                JoinResult::OnlyInFirst(1),
                JoinResult::InBoth(2, 2),
                JoinResult::OnlyInSecond(3),
                JoinResult::InBoth(4, 4),
                JoinResult::OnlyInSecond(5),
            ]
        );
    }

    #[test]
    fn empty_sides() {
        let diff: Vec<JoinResult<i32, i32>> =
            SortMergeDiff::new(std::iter::empty(), std::iter::empty(), |a: &i32, b: &i32| a.cmp(b))
                .collect();
        assert!(diff.is_empty());
    }
}
