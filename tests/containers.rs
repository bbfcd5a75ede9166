use std::collections::BTreeMap;

use allocator_api2::{boxed::Box, vec::Vec};
use pagealloc::{Error, List, PageAllocator, Policy};

#[test]
fn list_of_ten_prints_in_order() {
    let allocator = PageAllocator::<i32>::new();
    let mut list = List::new_in(&allocator).unwrap();

    for i in 0..10 {
        list.push_back(i).unwrap();
    }
    assert_eq!(list.to_string(), "0->1->2->3->4->5->6->7->8->9");

    list.remove_head();
    assert_eq!(list.to_string(), "1->2->3->4->5->6->7->8->9");

    list.remove_back();
    assert_eq!(list.to_string(), "1->2->3->4->5->6->7->8");
    assert_eq!(list.len(), 8);
}

#[test]
fn fixed_map_holds_ten_entries() {
    let allocator = PageAllocator::<(i32, i32)>::fixed(10).unwrap();
    let mut map = BTreeMap::new();

    for i in 0..10 {
        let entry = Box::try_new_in((i, i * i), &allocator).unwrap();
        map.insert(i, entry);
    }

    assert!(Box::try_new_in((10, 100), &allocator).is_err());
    assert_eq!(allocator.allocate(1).err(), Some(Error::OutOfMemory { requested: 8 }));

    assert_eq!(map.len(), 10);
    assert_eq!(*map[&7], (7, 49));

    // Dropping an entry makes room for exactly one more.
    map.remove(&3);
    map.insert(10, Box::try_new_in((10, 100), &allocator).unwrap());
    assert!(Box::try_new_in((11, 121), &allocator).is_err());
}

#[test]
fn vec_grows_inside_growable_pages() {
    let allocator = PageAllocator::<u64>::with_policy(Policy::growable_with_unit(256)).unwrap();
    let mut values = Vec::new_in(&allocator);

    for i in 0..1000u64 {
        values.push(i);
    }

    assert_eq!(values.len(), 1000);
    assert_eq!(values[999], 999);
    // Old buffers were handed back on every reallocation.
    assert!(allocator.stats().free_blocks > 0);
}

#[test]
fn lists_sharing_a_policy_do_not_share_storage() {
    let allocator = PageAllocator::<u8>::fixed(4).unwrap();
    let mut first = List::new_in(&allocator).unwrap();
    let mut second = List::new_in(&allocator).unwrap();

    for i in 0..4u8 {
        first.push_back(i).unwrap();
        second.push_back(i * 2).unwrap();
    }

    assert!(first.push_back(4).is_err());
    assert!(second.push_back(8).is_err());
    assert!(*first.allocator() == *second.allocator());
    assert_eq!(second.to_string(), "0->2->4->6");
}
