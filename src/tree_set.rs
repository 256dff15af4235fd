//! TreeSet: an unbalanced binary search tree of unique keys stored in a
//! slotmap arena, with parent links for stack-free bidirectional traversal.
//!
//! Nodes own their children by key and point back at their parent by key.
//! The tree's `root` slot plays the role of a sentinel whose left child is
//! the real root; `Position::END` stands for that sentinel. Generational keys
//! mean a position to an erased node never resolves to a different element.
//!
//! Shape follows insertion order; there is no rebalancing, so sorted input
//! produces a linear spine.

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::iter::FusedIterator;
use slotmap::{DefaultKey, SlotMap};

/// Location of an element inside a `TreeSet`, or the past-the-end sentinel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(Option<DefaultKey>);

impl Position {
    /// The past-the-end position shared by every set.
    pub const END: Position = Position(None);

    pub fn is_end(&self) -> bool {
        self.0.is_none()
    }
}

#[derive(Clone, Debug)]
struct Node<T> {
    left: Option<DefaultKey>,
    right: Option<DefaultKey>,
    parent: Option<DefaultKey>, // None: child of the sentinel
    value: T,
}

/// A child link that can be rewired: the sentinel's root slot or one side
/// of a node.
#[derive(Copy, Clone)]
enum Link {
    Root,
    Left(DefaultKey),
    Right(DefaultKey),
}

impl Link {
    fn parent(self) -> Option<DefaultKey> {
        match self {
            Link::Root => None,
            Link::Left(p) | Link::Right(p) => Some(p),
        }
    }
}

pub struct TreeSet<T> {
    nodes: SlotMap<DefaultKey, Node<T>>,
    root: Option<DefaultKey>,
}

impl<T> TreeSet<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Position of the smallest element, or `END` when empty.
    pub fn begin(&self) -> Position {
        Position(self.root.map(|r| self.leftmost(r)))
    }

    pub fn end(&self) -> Position {
        Position::END
    }

    /// The element at `pos`; `None` for `END` or a stale position.
    pub fn get_at(&self, pos: Position) -> Option<&T> {
        pos.0.and_then(|k| self.nodes.get(k)).map(|n| &n.value)
    }

    /// In-order successor. The successor of the largest element is `END`;
    /// `END` and stale positions stay at `END`.
    pub fn successor(&self, pos: Position) -> Position {
        match pos.0 {
            Some(k) if self.nodes.contains_key(k) => Position(self.next_key(k)),
            _ => Position::END,
        }
    }

    /// In-order predecessor. The predecessor of `END` is the largest
    /// element; the predecessor of the smallest element is `END`.
    pub fn predecessor(&self, pos: Position) -> Position {
        match pos.0 {
            Some(k) if self.nodes.contains_key(k) => Position(self.prev_key(k)),
            Some(_) => Position::END,
            None => Position(self.root.map(|r| self.rightmost(r))),
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.get_at(self.begin())
    }

    pub fn last(&self) -> Option<&T> {
        self.root.map(|r| &self.nodes[self.rightmost(r)].value)
    }

    pub fn pop_first(&mut self) -> Option<T> {
        let k = self.leftmost(self.root?);
        Some(self.unlink_min(k).0)
    }

    pub fn pop_last(&mut self) -> Option<T> {
        let k = self.rightmost(self.root?);
        Some(self.unlink_max(k))
    }

    /// Remove the element at `pos`, returning it with the position of its
    /// in-order successor. `None` for `END` or a stale position.
    pub fn remove_at(&mut self, pos: Position) -> Option<(T, Position)> {
        let k = pos.0.filter(|&k| self.nodes.contains_key(k))?;
        let succ = self.next_key(k);
        let (left, right, parent) = {
            let n = &self.nodes[k];
            (n.left, n.right, n.parent)
        };
        let link = self.link_of(k);
        match (left, right) {
            (None, None) => self.set_link(link, None),
            (Some(child), None) | (None, Some(child)) => {
                self.set_link(link, Some(child));
                self.nodes[child].parent = parent;
            }
            (Some(l), Some(r)) => {
                // The successor is the leftmost node of the right subtree and
                // has no left child of its own.
                let s = succ.expect("a node with a right subtree has a successor");
                if s != r {
                    let sp = self.nodes[s]
                        .parent
                        .expect("successor below the right child has a parent");
                    let sr = self.nodes[s].right;
                    self.nodes[sp].left = sr;
                    if let Some(x) = sr {
                        self.nodes[x].parent = Some(sp);
                    }
                    self.nodes[s].right = Some(r);
                    self.nodes[r].parent = Some(s);
                }
                self.nodes[s].left = Some(l);
                self.nodes[l].parent = Some(s);
                self.nodes[s].parent = parent;
                self.set_link(link, Some(s));
            }
        }
        let node = self.nodes.remove(k)?;
        Some((node.value, Position(succ)))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            set: self,
            front: self.root.map(|r| self.leftmost(r)),
            back: self.root.map(|r| self.rightmost(r)),
            remaining: self.len(),
        }
    }

    /// Attach `value` as the new maximum without comparing it to anything.
    ///
    /// The caller guarantees `value` is greater than every element present.
    pub(crate) fn push_greatest(&mut self, value: T) -> Position {
        let link = match self.root {
            None => Link::Root,
            Some(r) => Link::Right(self.rightmost(r)),
        };
        Position(Some(self.attach(link, value)))
    }

    /// Position of the element for which `cmp` returns `Equal`.
    ///
    /// `cmp` reports how a stored element orders relative to the target.
    pub(crate) fn find_by<F>(&self, mut cmp: F) -> Option<Position>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut cur = self.root;
        while let Some(k) = cur {
            let n = &self.nodes[k];
            cur = match cmp(&n.value) {
                Ordering::Equal => return Some(Position(Some(k))),
                Ordering::Less => n.right,
                Ordering::Greater => n.left,
            };
        }
        None
    }

    /// First element not ordered before the target.
    pub(crate) fn lower_bound_by<F>(&self, mut cmp: F) -> Position
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut found = None;
        let mut cur = self.root;
        while let Some(k) = cur {
            let n = &self.nodes[k];
            if cmp(&n.value) == Ordering::Less {
                cur = n.right;
            } else {
                found = Some(k);
                cur = n.left;
            }
        }
        Position(found)
    }

    /// First element ordered after the target.
    pub(crate) fn upper_bound_by<F>(&self, mut cmp: F) -> Position
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut found = None;
        let mut cur = self.root;
        while let Some(k) = cur {
            let n = &self.nodes[k];
            if cmp(&n.value) == Ordering::Greater {
                found = Some(k);
                cur = n.left;
            } else {
                cur = n.right;
            }
        }
        Position(found)
    }

    /// Descend to the link where an element ordered by `cmp` lives or belongs.
    fn search_by<F>(&self, mut cmp: F) -> Result<DefaultKey, Link>
    where
        F: FnMut(&T) -> Ordering,
    {
        let mut link = Link::Root;
        let mut cur = self.root;
        while let Some(k) = cur {
            let n = &self.nodes[k];
            match cmp(&n.value) {
                Ordering::Equal => return Ok(k),
                Ordering::Less => {
                    link = Link::Right(k);
                    cur = n.right;
                }
                Ordering::Greater => {
                    link = Link::Left(k);
                    cur = n.left;
                }
            }
        }
        Err(link)
    }

    fn attach(&mut self, link: Link, value: T) -> DefaultKey {
        let k = self.nodes.insert(Node {
            left: None,
            right: None,
            parent: link.parent(),
            value,
        });
        self.set_link(link, Some(k));
        k
    }

    fn link_of(&self, k: DefaultKey) -> Link {
        match self.nodes[k].parent {
            None => Link::Root,
            Some(p) if self.nodes[p].left == Some(k) => Link::Left(p),
            Some(p) => Link::Right(p),
        }
    }

    fn set_link(&mut self, link: Link, child: Option<DefaultKey>) {
        match link {
            Link::Root => self.root = child,
            Link::Left(p) => self.nodes[p].left = child,
            Link::Right(p) => self.nodes[p].right = child,
        }
    }

    fn leftmost(&self, mut k: DefaultKey) -> DefaultKey {
        while let Some(l) = self.nodes[k].left {
            k = l;
        }
        k
    }

    fn rightmost(&self, mut k: DefaultKey) -> DefaultKey {
        while let Some(r) = self.nodes[k].right {
            k = r;
        }
        k
    }

    fn next_key(&self, k: DefaultKey) -> Option<DefaultKey> {
        if let Some(r) = self.nodes[k].right {
            return Some(self.leftmost(r));
        }
        let mut cur = k;
        while let Some(p) = self.nodes[cur].parent {
            if self.nodes[p].right != Some(cur) {
                return Some(p);
            }
            cur = p;
        }
        None
    }

    fn prev_key(&self, k: DefaultKey) -> Option<DefaultKey> {
        if let Some(l) = self.nodes[k].left {
            return Some(self.rightmost(l));
        }
        let mut cur = k;
        while let Some(p) = self.nodes[cur].parent {
            if self.nodes[p].left != Some(cur) {
                return Some(p);
            }
            cur = p;
        }
        None
    }

    /// Remove the minimum node `k` and return its value plus the new minimum.
    fn unlink_min(&mut self, k: DefaultKey) -> (T, Option<DefaultKey>) {
        let node = self.nodes.remove(k).expect("minimum node is live");
        debug_assert!(node.left.is_none());
        match node.parent {
            None => self.root = node.right,
            Some(p) => self.nodes[p].left = node.right,
        }
        let next = match node.right {
            Some(r) => {
                self.nodes[r].parent = node.parent;
                Some(self.leftmost(r))
            }
            None => node.parent,
        };
        (node.value, next)
    }

    fn unlink_max(&mut self, k: DefaultKey) -> T {
        let node = self.nodes.remove(k).expect("maximum node is live");
        debug_assert!(node.right.is_none());
        match node.parent {
            None => self.root = node.left,
            Some(p) => self.nodes[p].right = node.left,
        }
        if let Some(l) = node.left {
            self.nodes[l].parent = node.parent;
        }
        node.value
    }
}

impl<T: Ord> TreeSet<T> {
    /// Insert `value`, returning its position and whether it was new. An
    /// equal element already present is kept and its position returned.
    pub fn insert(&mut self, value: T) -> (Position, bool) {
        match self.search_by(|candidate| candidate.cmp(&value)) {
            Ok(k) => (Position(Some(k)), false),
            Err(link) => (Position(Some(self.attach(link, value))), true),
        }
    }

    /// Insert using `hint` as the position `value` should precede.
    ///
    /// When the hint is right (the element before `hint` orders below
    /// `value` and `hint` orders above it) the node is attached without a
    /// search from the root; otherwise this behaves like `insert`.
    pub fn insert_hint(&mut self, hint: Position, value: T) -> (Position, bool) {
        let at = hint.0.filter(|&k| self.nodes.contains_key(k));
        let before = match at {
            Some(k) => self.prev_key(k),
            None => self.root.map(|r| self.rightmost(r)),
        };
        let after_before = before.map_or(true, |b| self.nodes[b].value < value);
        let before_at = at.map_or(true, |k| value < self.nodes[k].value);
        if !(after_before && before_at) {
            return self.insert(value);
        }
        let link = match (at, before) {
            (Some(k), _) if self.nodes[k].left.is_none() => Link::Left(k),
            (_, Some(b)) => Link::Right(b),
            (_, None) => Link::Root,
        };
        (Position(Some(self.attach(link, value))), true)
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Position>
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.find_by(|candidate| candidate.borrow().cmp(q))
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.find(q).and_then(|pos| self.get_at(pos))
    }

    /// First element `>= q`, or `END`.
    pub fn lower_bound<Q>(&self, q: &Q) -> Position
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.lower_bound_by(|candidate| candidate.borrow().cmp(q))
    }

    /// First element `> q`, or `END`.
    pub fn upper_bound<Q>(&self, q: &Q) -> Position
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.upper_bound_by(|candidate| candidate.borrow().cmp(q))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let pos = self.find(q)?;
        self.remove_at(pos).map(|(value, _)| value)
    }
}

impl<T> Default for TreeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for TreeSet<T> {
    /// Copies every node, keeping the tree's shape and keys.
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TreeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for TreeSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for TreeSet<T> {}

impl<T: Ord> FromIterator<T> for TreeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Ord> Extend<T> for TreeSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

/// Ascending iterator over a `TreeSet`; double-ended.
pub struct Iter<'a, T> {
    set: &'a TreeSet<T>,
    front: Option<DefaultKey>,
    back: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let k = self.front?;
        self.remaining -= 1;
        self.front = self.set.next_key(k);
        Some(&self.set.nodes[k].value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let k = self.back?;
        self.remaining -= 1;
        self.back = self.set.prev_key(k);
        Some(&self.set.nodes[k].value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            set: self.set,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> IntoIterator for &'a TreeSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Owning ascending iterator; unlinks successive minima.
pub struct IntoIter<T> {
    set: TreeSet<T>,
    front: Option<DefaultKey>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let k = self.front?;
        let (value, next) = self.set.unlink_min(k);
        self.front = next;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.set.len(), Some(self.set.len()))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}

impl<T> IntoIterator for TreeSet<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        let front = self.root.map(|r| self.leftmost(r));
        IntoIter { set: self, front }
    }
}

#[cfg(test)]
impl<T: Ord + fmt::Debug> TreeSet<T> {
    /// Check parent links, ordering, and node count against the arena.
    pub(crate) fn assert_structure(&self) {
        fn walk<T: Ord + fmt::Debug>(
            set: &TreeSet<T>,
            k: DefaultKey,
            parent: Option<DefaultKey>,
            out: &mut Vec<DefaultKey>,
        ) {
            let n = &set.nodes[k];
            assert_eq!(n.parent, parent, "parent link of {:?}", n.value);
            if let Some(l) = n.left {
                walk(set, l, Some(k), out);
            }
            out.push(k);
            if let Some(r) = n.right {
                walk(set, r, Some(k), out);
            }
        }

        let mut order = Vec::new();
        if let Some(r) = self.root {
            walk(self, r, None, &mut order);
        }
        assert_eq!(order.len(), self.nodes.len(), "unreachable nodes in arena");
        for w in order.windows(2) {
            assert!(
                self.nodes[w[0]].value < self.nodes[w[1]].value,
                "in-order sequence not strictly ascending"
            );
        }
    }

    pub(crate) fn depth(&self) -> usize {
        fn go<T>(set: &TreeSet<T>, k: Option<DefaultKey>) -> usize {
            k.map_or(0, |k| {
                1 + go(set, set.nodes[k].left).max(go(set, set.nodes[k].right))
            })
        }
        go(self, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(keys: &[i32]) -> TreeSet<i32> {
        let set: TreeSet<i32> = keys.iter().copied().collect();
        set.assert_structure();
        set
    }

    fn contents(set: &TreeSet<i32>) -> Vec<i32> {
        set.iter().copied().collect()
    }

    /// Invariant: erasing a leaf clears its parent's link only.
    #[test]
    fn erase_leaf() {
        let mut s = set_of(&[5, 3, 8, 1]);
        let pos = s.find(&1).unwrap();
        let (v, next) = s.remove_at(pos).unwrap();
        assert_eq!(v, 1);
        assert_eq!(s.get_at(next), Some(&3));
        s.assert_structure();
        assert_eq!(contents(&s), [3, 5, 8]);
    }

    /// Invariant: erasing a node with one child splices the child into the
    /// node's slot and rewires the child's parent link.
    #[test]
    fn erase_one_child() {
        let mut s = set_of(&[5, 3, 8, 9]);
        let (v, next) = s.remove_at(s.find(&8).unwrap()).unwrap();
        assert_eq!(v, 8);
        assert_eq!(s.get_at(next), Some(&9));
        s.assert_structure();

        let mut s = set_of(&[5, 3, 2]);
        let (_, next) = s.remove_at(s.find(&3).unwrap()).unwrap();
        assert_eq!(s.get_at(next), Some(&5));
        s.assert_structure();
        assert_eq!(contents(&s), [2, 5]);
    }

    /// Invariant: erasing a node with two children puts its in-order
    /// successor in its place, both when the successor is the right child
    /// and when it sits deeper with its own right subtree.
    #[test]
    fn erase_two_children() {
        // successor is the direct right child
        let mut s = set_of(&[5, 3, 8, 9]);
        let (_, next) = s.remove_at(s.find(&5).unwrap()).unwrap();
        assert_eq!(s.get_at(next), Some(&8));
        s.assert_structure();
        assert_eq!(contents(&s), [3, 8, 9]);

        // successor is deep in the right subtree and has a right child
        let mut s = set_of(&[10, 5, 20, 15, 25, 12, 13]);
        let (_, next) = s.remove_at(s.find(&10).unwrap()).unwrap();
        assert_eq!(s.get_at(next), Some(&12));
        s.assert_structure();
        assert_eq!(contents(&s), [5, 12, 13, 15, 20, 25]);
    }

    /// Invariant: erasing the root of a single-node tree empties it; the
    /// returned successor is END.
    #[test]
    fn erase_only_node() {
        let mut s = set_of(&[1]);
        let (_, next) = s.remove_at(s.begin()).unwrap();
        assert!(next.is_end());
        assert!(s.is_empty());
        assert!(s.remove_at(next).is_none());
    }

    /// Invariant: traversal wraps through END in both directions.
    #[test]
    fn successor_predecessor_around_end() {
        let s = set_of(&[2, 1, 3]);
        let last = s.predecessor(s.end());
        assert_eq!(s.get_at(last), Some(&3));
        assert!(s.successor(last).is_end());
        assert!(s.predecessor(s.begin()).is_end());
        assert!(s.successor(s.end()).is_end());
    }

    /// Invariant: a correct hint attaches next to its neighbours; a wrong
    /// hint still inserts in order; an equal element is never duplicated.
    #[test]
    fn hinted_insert() {
        let mut s = set_of(&[10, 20, 30]);
        let at = s.find(&20).unwrap();
        let (p, inserted) = s.insert_hint(at, 15);
        assert!(inserted);
        assert_eq!(s.get_at(p), Some(&15));
        assert_eq!(s.successor(p), at);
        s.assert_structure();

        let (_, inserted) = s.insert_hint(s.end(), 40);
        assert!(inserted);
        let (_, inserted) = s.insert_hint(s.begin(), 25);
        assert!(inserted, "wrong hint falls back to a full search");
        let (p, inserted) = s.insert_hint(at, 20);
        assert!(!inserted);
        assert_eq!(p, at);
        s.assert_structure();
        assert_eq!(contents(&s), [10, 15, 20, 25, 30, 40]);

        let mut e = TreeSet::new();
        let (p, inserted) = e.insert_hint(Position::END, 1);
        assert!(inserted);
        assert_eq!(e.begin(), p);
    }

    /// Invariant: sorted input degenerates into a spine (no balancing).
    #[test]
    fn sorted_input_is_not_rebalanced() {
        let s = set_of(&(0..64).collect::<Vec<_>>());
        assert_eq!(s.depth(), 64);
    }

    /// Invariant: `push_greatest` appends without comparisons and keeps the
    /// in-order sequence ascending.
    #[test]
    fn push_greatest_appends() {
        let mut s = set_of(&[4, 2, 6]);
        s.push_greatest(7);
        s.push_greatest(9);
        s.assert_structure();
        assert_eq!(s.last(), Some(&9));
    }

    /// Invariant: the owning iterator yields ascending values and consumes
    /// the arena node by node.
    #[test]
    fn owning_iteration_is_ascending() {
        let s = set_of(&[50, 20, 70, 10, 30, 60, 80, 25, 35]);
        let mut it = s.into_iter();
        assert_eq!(it.len(), 9);
        let first: Vec<i32> = it.by_ref().take(4).collect();
        assert_eq!(first, [10, 20, 25, 30]);
        assert_eq!(it.len(), 5);
        assert_eq!(it.collect::<Vec<_>>(), [35, 50, 60, 70, 80]);
    }

    /// Invariant: stale positions never alias a later element.
    #[test]
    fn stale_position_does_not_resolve() {
        let mut s = set_of(&[1, 2]);
        let old = s.find(&1).unwrap();
        s.remove_at(old);
        let (fresh, _) = s.insert(0);
        assert_ne!(old, fresh);
        assert_eq!(s.get_at(old), None);
        assert!(s.successor(old).is_end());
    }

    /// Invariant: the arena carries no shared block, so a tree is as
    /// thread-safe as its keys.
    #[test]
    fn tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TreeSet<i32>>();
        assert_send_sync::<TreeSet<String>>();
        assert_send_sync::<Position>();
    }
}
