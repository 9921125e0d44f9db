use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn validate_tree<V>(t: &SniTree<V>) {
    let mut reachable = vec![false; t.nodes.nodes.len()];
    let mut stack = vec![NodeId::ROOT];
    let mut values = 0usize;

    while let Some(id) = stack.pop() {
        assert!(!reachable[id.0], "node {id:?} reachable twice");
        reachable[id.0] = true;

        let node = t.nodes.get(id);
        if id != NodeId::ROOT {
            assert!(!node.is_dead(), "dead node {id:?} left in the tree");
        }
        if node.value.is_some() {
            values += 1;
        }
        stack.extend(node.children.values().copied());
    }

    for &id in &t.nodes.free {
        assert_ne!(id, NodeId::ROOT, "root on the free list");
        assert!(!reachable[id.0], "freed node {id:?} still linked");
        assert!(t.nodes.get(id).is_dead(), "freed node {id:?} not empty");
    }

    let live = reachable.iter().filter(|&&r| r).count();
    assert_eq!(live, t.node_count(), "reachable nodes must match node_count");
    assert_eq!(values, t.len(), "stored values must match SniTree::len");
}

type Name = Vec<&'static str>;

fn name_strategy() -> impl Strategy<Value = Name> {
    // A tiny alphabet so that paths, wildcards and culling interact often.
    prop::collection::vec(prop::sample::select(vec!["a", "b", "www", "*"]), 0..=4)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 45)]
    Insert(#[proptest(strategy = "name_strategy()")] Name, u64),
    #[proptest(weight = 25)]
    Remove(#[proptest(strategy = "name_strategy()")] Name),
    #[proptest(weight = 30)]
    Find(#[proptest(strategy = "name_strategy()")] Name),
}

/// Reference wildcard lookup over a flat map of registered label paths.
fn model_find(m: &BTreeMap<Name, u64>, prefix: &mut Name, rest: &[&'static str]) -> Option<u64> {
    let Some((&label, rest)) = rest.split_first() else {
        return m.get(&*prefix).copied();
    };

    for candidate in [label, "*"] {
        prefix.push(candidate);
        let exists = m.keys().any(|k| k.starts_with(&prefix[..]));
        let found = if exists {
            model_find(m, prefix, rest)
        } else {
            None
        };
        prefix.pop();

        if candidate == "*" || found.is_some() {
            return found;
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=400)) {
        let mut t: SniTree<u64> = SniTree::new();
        let mut m: BTreeMap<Name, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(name, value) => {
                    let host = name.join(".");
                    let fresh = !m.contains_key(&name);
                    match t.insert(&host, value) {
                        Ok(()) => {
                            prop_assert!(fresh);
                        }
                        Err(err) => {
                            prop_assert!(!fresh);
                            prop_assert_eq!(err.error(), SniError::AlreadyExists);
                            prop_assert_eq!(err.into_value(), value);
                        }
                    }
                    m.entry(name).or_insert(value);
                }
                Op::Remove(name) => {
                    let host = name.join(".");
                    prop_assert_eq!(t.remove(&host), m.remove(&name));
                }
                Op::Find(name) => {
                    let host = name.join(".");
                    let expected = model_find(&m, &mut Vec::new(), &name);
                    prop_assert_eq!(t.find(&host).copied(), expected);
                    prop_assert_eq!(t.get_exact(&host).copied(), m.get(&name).copied());
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);

        let mut released = Vec::new();
        t.destroy(|v| released.push(v));
        released.sort_unstable();
        let mut expected: Vec<u64> = m.values().copied().collect();
        expected.sort_unstable();
        prop_assert_eq!(released, expected);
    }

    #[test]
    fn prop_insert_remove_restores_shape(
        base in prop::collection::vec(name_strategy(), 0..=20),
        extra in name_strategy(),
    ) {
        let mut t: SniTree<u64> = SniTree::new();
        for (i, name) in base.iter().enumerate() {
            let _ = t.insert(name.join("."), i as u64);
        }
        let host = extra.join(".");
        prop_assume!(t.get_exact(&host).is_none());

        let nodes = t.node_count();
        let len = t.len();
        t.insert(&host, u64::MAX).unwrap();
        prop_assert_eq!(t.find(&host), Some(&u64::MAX));
        prop_assert_eq!(t.remove(&host), Some(u64::MAX));

        prop_assert_eq!(t.node_count(), nodes);
        prop_assert_eq!(t.len(), len);
        validate_tree(&t);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_remove_order_small_set() {
    let names = ["com", "a.com", "*.com", "b.a.com", "b.*.com", ""];

    let mut base: SniTree<usize> = SniTree::new();
    for (i, name) in names.iter().enumerate() {
        base.insert(name, i).unwrap();
    }
    validate_tree(&base);

    for_each_permutation(&names, |perm| {
        let mut t = base.clone();
        for name in perm {
            let expected = names.iter().position(|n| *n == name);
            assert_eq!(t.remove(name), expected);
            validate_tree(&t);
        }
        assert!(t.is_empty());
        assert_eq!(t.node_count(), 1);
    });
}
