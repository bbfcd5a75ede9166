use std::{fmt, marker::PhantomData, ptr::NonNull};

use crate::{allocator::PageAllocator, error::Result, policy::Policy};

/// Non-null pointer to `T`.
type Link<T> = Option<NonNull<T>>;

/// Node of a [`List`]. Its storage comes from the list's allocator.
pub struct Node<T> {
    /// Pointer to the next node of the list
    next: Link<Self>,
    /// Element of the node
    value: T,
}

/// Singly linked list whose nodes live in a [`PageAllocator`].
///
/// ```text
///  head                                     tail
///   |                                        |
///   v                                        v
/// +---+---+    +---+---+    +---+---+    +---+------+
/// | 0 | *-+--> | 1 | *-+--> | 2 | *-+--> | 3 | None |
/// +---+---+    +---+---+    +---+---+    +---+------+
/// ```
///
/// The list owns every node. Whatever allocator it is given is only used as a
/// policy: the list rebinds it to [`Node<T>`] and keeps the rebound one.
pub struct List<T> {
    head: Link<Node<T>>,
    tail: Link<Node<T>>,
    len: usize,
    allocator: PageAllocator<Node<T>>,
    marker: PhantomData<Box<Node<T>>>,
}

/// Borrowing iterator over the values of a [`List`], front to back.
pub struct Iter<'a, T> {
    current: Link<Node<T>>,
    remaining: usize,
    marker: PhantomData<&'a T>,
}

impl<T> List<T> {
    /// Creates an empty list backed by a growable allocator.
    pub fn new() -> Self {
        Self::from_allocator(PageAllocator::new())
    }

    /// Creates an empty list using the policy of `allocator`.
    pub fn new_in<A>(allocator: &PageAllocator<A>) -> Result<Self> {
        Ok(Self::from_allocator(allocator.rebind()?))
    }

    /// Creates an empty list whose node allocator follows `policy`.
    pub fn with_policy(policy: Policy) -> Result<Self> {
        Ok(Self::from_allocator(PageAllocator::with_policy(policy)?))
    }

    fn from_allocator(allocator: PageAllocator<Node<T>>) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// The allocator the nodes are stored in.
    #[inline]
    pub fn allocator(&self) -> &PageAllocator<Node<T>> {
        &self.allocator
    }

    pub fn front(&self) -> Option<&T> {
        // SAFETY: every linked node was constructed by `push_back` and is owned by us.
        self.head.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    pub fn back(&self) -> Option<&T> {
        // SAFETY: see `front`.
        self.tail.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    /// Appends `value` at the end of the list.
    ///
    /// Fails only when the node allocator is out of memory, in which case the
    /// list is left untouched.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        let node = self.allocator.allocate(1)?;

        unsafe {
            self.allocator.construct(node, Node { next: None, value });

            match self.tail {
                Some(tail) => (*tail.as_ptr()).next = Some(node),
                None => self.head = Some(node),
            }
        }

        self.tail = Some(node);
        self.len += 1;

        Ok(())
    }

    /// Destroys and deallocates the first node. Does nothing on an empty list.
    pub fn remove_head(&mut self) {
        let Some(head) = self.head else {
            return;
        };

        unsafe {
            self.head = (*head.as_ptr()).next;
            self.release(head);
        }

        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
    }

    /// Destroys and deallocates the last node. Does nothing on an empty list.
    ///
    /// Nodes don't know their predecessor, so this walks the whole list.
    pub fn remove_back(&mut self) {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return;
        };

        if head == tail {
            return self.remove_head();
        }

        unsafe {
            let mut current = head;
            while let Some(next) = (*current.as_ptr()).next {
                if next == tail {
                    break;
                }
                current = next;
            }

            (*current.as_ptr()).next = None;
            self.release(tail);
            self.tail = Some(current);
        }

        self.len -= 1;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }

    /// Prints the list as `a->b->c` followed by a new line. An empty list
    /// prints nothing.
    pub fn print(&self)
    where
        T: fmt::Display,
    {
        if !self.is_empty() {
            println!("{self}");
        }
    }

    /// **SAFETY**: `node` must be a constructed node of this list that is no
    /// longer linked.
    unsafe fn release(&mut self, node: NonNull<Node<T>>) {
        unsafe {
            self.allocator.destroy(node);
            self.allocator.deallocate(node, 1);
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        while !self.is_empty() {
            self.remove_head();
        }
    }
}

impl<T: fmt::Display> fmt::Display for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("->")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = (*node.as_ptr()).next;
            self.remaining -= 1;

            Some(&(*node.as_ptr()).value)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
