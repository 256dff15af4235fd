mod common;

use common::{counted, values, Constructions, Counted, NoNewInstances};
use cow_collections::{Position, TreeSet};

#[test]
fn insert_in_order_and_reject_duplicate() {
    let mut s = TreeSet::new();
    for v in [1, 2, 3] {
        assert!(s.insert(v).1);
    }
    assert!(s.iter().copied().eq([1, 2, 3]));
    let at_two = s.find(&2).expect("2 present");
    let (pos, inserted) = s.insert(2);
    assert!(!inserted);
    assert_eq!(pos, at_two);
    assert_eq!(s.get_at(pos), Some(&2));
    assert_eq!(s.len(), 3);
}

#[test]
fn duplicate_insert_keeps_the_original_value() {
    let _guard = NoNewInstances::new();
    let mut s = TreeSet::new();
    s.insert(Counted::new(5));
    let c = Constructions::start();
    let (_, inserted) = s.insert(Counted::new(5));
    assert!(!inserted);
    assert_eq!(c.since(), 1, "only the rejected argument was constructed");
    assert_eq!(s.len(), 1);
}

#[test]
fn bounds_and_lookup() {
    let s: TreeSet<i32> = [10, 20, 30, 40].into_iter().collect();
    assert_eq!(s.get_at(s.lower_bound(&20)), Some(&20));
    assert_eq!(s.get_at(s.lower_bound(&21)), Some(&30));
    assert_eq!(s.get_at(s.upper_bound(&20)), Some(&30));
    assert!(s.upper_bound(&40).is_end());
    assert!(s.lower_bound(&41).is_end());
    assert_eq!(s.get_at(s.lower_bound(&i32::MIN)), Some(&10));
    assert!(s.find(&25).is_none());
    assert!(s.contains(&30));
    assert_eq!(s.first(), Some(&10));
    assert_eq!(s.last(), Some(&40));
}

#[test]
fn borrowed_lookup() {
    let mut s: TreeSet<String> = ["pear", "apple", "fig"].iter().map(|x| x.to_string()).collect();
    assert!(s.contains("fig"));
    assert_eq!(s.get("apple").map(String::as_str), Some("apple"));
    assert_eq!(s.remove("pear").as_deref(), Some("pear"));
    assert!(s.remove("pear").is_none());
    assert_eq!(format!("{:?}", s), r#"{"apple", "fig"}"#);
}

#[test]
fn reverse_iteration_and_meeting_ends() {
    let s: TreeSet<i32> = [5, 3, 8, 1, 4, 7, 9].into_iter().collect();
    assert!(s.iter().rev().copied().eq([9, 8, 7, 5, 4, 3, 1]));
    let mut it = s.iter();
    assert_eq!(it.next(), Some(&1));
    assert_eq!(it.next_back(), Some(&9));
    assert_eq!(it.len(), 5);
    let rest: Vec<_> = it.copied().collect();
    assert_eq!(rest, [3, 4, 5, 7, 8]);
}

#[test]
fn erase_walk_returns_successors() {
    let mut s: TreeSet<i32> = [50, 30, 70, 20, 40, 60, 80].into_iter().collect();
    let mut pos = s.lower_bound(&40);
    let mut removed = Vec::new();
    while let Some((v, next)) = s.remove_at(pos) {
        removed.push(v);
        pos = next;
        if removed.len() == 3 {
            break;
        }
    }
    assert_eq!(removed, [40, 50, 60]);
    assert_eq!(s.get_at(pos), Some(&70));
    assert!(s.iter().copied().eq([20, 30, 70, 80]));
    assert!(s.remove_at(Position::END).is_none());
}

#[test]
fn clone_is_independent() {
    let _guard = NoNewInstances::new();
    let a: TreeSet<Counted> = counted([3, 1, 2]).into_iter().collect();
    let c = Constructions::start();
    let mut b = a.clone();
    assert_eq!(c.since(), 3);
    assert_eq!(a, b);
    let pos = b.find(&Counted::new(2)).unwrap();
    assert_eq!(a.get_at(pos).map(|x| x.value), Some(2), "clones keep node positions");
    b.remove_at(pos);
    assert_ne!(a, b);
    assert_eq!(values(&a), [1, 2, 3]);
    assert_eq!(values(&b), [1, 3]);
}

#[test]
fn pop_and_clear_release_everything() {
    let _guard = NoNewInstances::new();
    let mut s: TreeSet<Counted> = counted([4, 2, 6, 1, 3, 5, 7]).into_iter().collect();
    assert_eq!(s.pop_first().map(|x| x.value), Some(1));
    assert_eq!(s.pop_last().map(|x| x.value), Some(7));
    assert_eq!(values(&s), [2, 3, 4, 5, 6]);
    s.clear();
    assert!(s.is_empty());
    assert!(s.begin().is_end());
    assert!(s.pop_first().is_none());

    let t: TreeSet<Counted> = counted(0..10).into_iter().collect();
    let mut it = t.into_iter();
    assert_eq!(it.next().map(|x| x.value), Some(0));
    drop(it);
}

#[test]
fn hint_before_end_builds_ascending_run() {
    let mut s = TreeSet::new();
    for v in 0..100 {
        let (_, inserted) = s.insert_hint(s.end(), v);
        assert!(inserted);
    }
    assert!(s.iter().copied().eq(0..100));
    let mut pos = s.begin();
    for v in (-50..0).rev() {
        pos = s.insert_hint(pos, v).0;
    }
    assert!(s.iter().copied().eq(-50..100));
}
