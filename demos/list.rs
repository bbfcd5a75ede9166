use pagealloc::{List, PageAllocator};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let allocator = PageAllocator::<i32>::new();
    let mut list = List::new_in(&allocator).expect("growable allocators map lazily");

    println!("List with PageAllocator");
    for i in 0..10 {
        list.push_back(i).expect("growable allocators only fail when the OS does");
    }
    list.print();

    list.remove_head();
    list.print();

    list.remove_back();
    list.print();

    println!("{:?}", list.allocator());
}
