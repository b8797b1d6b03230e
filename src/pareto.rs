/// Decides if `left` is better than `right` in at least one criterion.
///
/// Two elements where both are better than the other in some criterion are both kept; an
/// element no better than another in any criterion is dominated (or equal) and is dropped.
pub trait ParetoComparator<T> {
    fn left_dominance_exist(&self, left: &T, right: &T) -> bool;
}

impl<T, F> ParetoComparator<T> for F
where
    F: Fn(&T, &T) -> bool,
{
    fn left_dominance_exist(&self, left: &T, right: &T) -> bool {
        self(left, right)
    }
}

/// A set of mutually non-dominated elements. Insertion order is kept.
#[derive(Clone)]
pub struct ParetoSet<T, C> {
    elements: Vec<T>,
    comparator: C,
}

impl<T, C: ParetoComparator<T>> ParetoSet<T, C> {
    pub fn new(comparator: C) -> Self {
        Self { elements: Vec::new(), comparator }
    }

    /// Adds `new` unless an existing element dominates or equals it. Returns `true` if added.
    pub fn add(&mut self, new: T) -> bool {
        self.add_with(new, |_| {})
    }

    /// Like [`ParetoSet::add`], handing every element evicted by `new` to `on_drop`.
    pub fn add_with(&mut self, new: T, mut on_drop: impl FnMut(T)) -> bool {
        if !self.qualify(&new) {
            return false;
        }
        let elements = std::mem::take(&mut self.elements);
        for element in elements {
            // `new` is better than every element in some criterion, so it only stays if it is
            // better than `new` in some criterion too.
            if self.comparator.left_dominance_exist(&element, &new) {
                self.elements.push(element);
            } else {
                on_drop(element);
            }
        }
        self.elements.push(new);
        true
    }

    /// `true` if `candidate` would be accepted, without adding it.
    pub fn qualify(&self, candidate: &T) -> bool {
        self.elements.iter().all(|e| self.comparator.left_dominance_exist(candidate, e))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl<'a, T, C> IntoIterator for &'a ParetoSet<T, C> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
