//! Descending ordered list.

use std::cmp::Ordering;

/// Returns the index at which `item` should be inserted into `items` so that `items` stays sorted in
/// descending order according to `compare`.
/// Items equal to `item` stay in front of it. Time complexity is log(*n*) comparisons.
///
/// # Arguments
/// * `items` - Items sorted in descending order
/// * `item` - Item to be inserted
/// * `compare` - Function to be used to compare items
pub fn insertion_point<T, F>(items: &[T], item: &T, compare: F) -> usize
where
    F: Fn(&T, &T) -> Ordering,
{
    let mut start = 0;
    let mut end = items.len();

    // invariant: items[..start] >= item, items[end..] < item
    while start < end {
        let mid = start + (end - start) / 2;
        match compare(item, &items[mid]) {
            Ordering::Greater => end = mid,
            Ordering::Less | Ordering::Equal => start = mid + 1,
        }
    }

    return start;
}

/// List kept sorted in descending order, so the smallest item is always the last one
/// and can be taken off in constant time.
pub struct OrderedList<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    compare: F,
}

impl<T, F> OrderedList<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty list.
    #[cfg(test)]
    pub(crate) fn new(compare: F) -> Self {
        OrderedList {
            items: Vec::new(),
            compare,
        }
    }

    /// Creates a list from unsorted items.
    pub fn from_vec(mut items: Vec<T>, compare: F) -> Self {
        items.sort_by(|a, b| compare(b, a));
        return OrderedList { items, compare };
    }

    /// Inserts an item keeping the descending order.
    pub fn insert(&mut self, item: T) {
        let idx = insertion_point(&self.items, &item, &self.compare);
        self.items.insert(idx, item);
    }

    /// Removes and returns the smallest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Returns the smallest item.
    #[cfg(test)]
    pub(crate) fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items in descending order.
    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[T] {
        self.items.as_slice()
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rand::Rng;
    use rstest::*;

    use super::{insertion_point, OrderedList};

    #[rstest]
    #[case(vec![], 5, 0)]
    #[case(vec![3], 5, 0)]
    #[case(vec![7], 5, 1)]
    #[case(vec![9, 7, 3, 1], 10, 0)]
    #[case(vec![9, 7, 3, 1], 0, 4)]
    #[case(vec![9, 7, 3, 1], 5, 2)]
    #[case(vec![9, 7, 3, 1], 8, 1)]
    #[case(vec![9, 7, 7, 3], 7, 3)]
    fn test_insertion_point(#[case] items: Vec<i32>, #[case] item: i32, #[case] expected: usize) {
        assert_eq!(insertion_point(&items, &item, |a: &i32, b: &i32| a.cmp(b)), expected);
    }

    #[test]
    fn test_from_vec() {
        let mut items = Vec::from_iter(0..50);
        items.shuffle(&mut rand::thread_rng());

        let mut list = OrderedList::from_vec(items, |a: &i32, b: &i32| a.cmp(b));
        assert_eq!(list.len(), 50);
        assert_eq!(list.last(), Some(&0));

        let popped = Vec::from_iter(std::iter::from_fn(|| list.pop()));
        assert_eq!(popped, Vec::from_iter(0..50));
        assert!(list.is_empty());
    }

    #[test]
    fn test_interleaved_operations() {
        let mut rng = rand::thread_rng();
        let mut list = OrderedList::new(|a: &i32, b: &i32| a.cmp(b));
        let mut reference: Vec<i32> = Vec::new();

        for _ in 0..2000 {
            if rng.gen_bool(0.6) || reference.is_empty() {
                let item = rng.gen_range(0..100);
                list.insert(item);
                reference.push(item);
            } else {
                reference.sort_by(|a, b| b.cmp(a));
                assert_eq!(list.pop(), reference.pop());
            }

            reference.sort_by(|a, b| b.cmp(a));
            assert_eq!(list.as_slice(), reference.as_slice());
        }
    }
}
