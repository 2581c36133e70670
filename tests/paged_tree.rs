use pagetree::{PagedBPlusTree, TreeConfig};

fn setup_tree(order: usize) -> PagedBPlusTree {
    let _ = env_logger::builder().is_test(true).try_init();
    PagedBPlusTree::in_memory(TreeConfig::new(order).unwrap()).unwrap()
}

#[test]
fn range_after_root_split() {
    let mut tree = setup_tree(4);
    for key in [10, 20, 5, 15, 25, 30, 35, 40] {
        tree.insert(key, key * 10).unwrap();
    }
    assert_eq!(tree.height().unwrap(), 2);

    let keys: Vec<i32> = tree.range(10, 30).unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![10, 15, 20, 25, 30]);
    assert_eq!(tree.search(25).unwrap(), Some(250));
    tree.check_structure().unwrap();
}

#[test]
fn two_hundred_sequential_inserts() {
    let mut tree = setup_tree(5);
    for key in 1..=200 {
        tree.insert(key, key * 100).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 200);
    for key in [1, 77, 150, 200] {
        assert_eq!(tree.search(key).unwrap(), Some(key * 100));
    }
    assert_eq!(tree.search(201).unwrap(), None);
    tree.check_structure().unwrap();
}

#[test]
fn overwrites_do_not_duplicate_keys() {
    let mut tree = setup_tree(3);
    for round in 0..3 {
        for key in (0..40).rev() {
            tree.insert(key, key + round).unwrap();
        }
    }
    let all = tree.scan_all().unwrap();
    assert_eq!(all.len(), 40);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(all.iter().all(|&(k, v)| v == k + 2));
    tree.check_structure().unwrap();
}

#[test]
fn wide_pages_hold_many_keys_per_node() {
    let mut tree = setup_tree(pagetree::config::MAX_ORDER);
    for key in 0..2_000 {
        tree.insert(key * 3 % 2_000, key).unwrap();
    }
    assert_eq!(tree.len().unwrap(), 2_000);
    assert_eq!(tree.height().unwrap(), 2);
    tree.check_structure().unwrap();
}

#[test]
fn range_iter_stops_past_end() {
    let mut tree = setup_tree(4);
    for key in 0..100 {
        tree.insert(key, key).unwrap();
    }
    let mut cursor = tree.range_iter(90, 92).unwrap();
    assert_eq!(cursor.next().unwrap().unwrap().key, 90);
    assert_eq!(cursor.next().unwrap().unwrap().key, 91);
    assert_eq!(cursor.next().unwrap().unwrap().key, 92);
    assert!(cursor.next().is_none());
    assert!(cursor.next().is_none());
}

#[test]
fn removals_leave_a_consistent_tree() {
    let mut tree = setup_tree(4);
    for key in 0..60 {
        tree.insert(key, key).unwrap();
    }
    for key in (0..60).filter(|k| k % 3 == 0) {
        assert_eq!(tree.remove(key).unwrap(), Some(key));
    }
    let remaining: Vec<i32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    let expected: Vec<i32> = (0..60).filter(|k| k % 3 != 0).collect();
    assert_eq!(remaining, expected);
    tree.check_structure().unwrap();
}
