use std::{
    collections::{HashMap, hash_map::Entry},
    ptr::NonNull,
};

use parking_lot::Mutex;

/// Record of the allocations that are currently live, keyed by the address handed
/// to the caller.
///
/// The registry is what makes a release safe: the size to unmap comes from here,
/// never from the caller, and an address that isn't here was either released
/// already or never came from us. Both are bugs on the caller's side and, since
/// carrying on would mean unmapping memory we don't own, they panic.
///
/// The lock only covers the map update. Callers do their file and mapping syscalls
/// before [`AllocationRegistry::insert`] and after [`AllocationRegistry::remove`].
#[derive(Debug)]
pub struct AllocationRegistry<T = usize> {
    live: Mutex<HashMap<usize, T>>,
}

impl<T> Default for AllocationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AllocationRegistry<T> {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Records a new live allocation at `addr`.
    ///
    /// # Panics
    ///
    /// If `addr` is already live. Two live allocations can't share an address, so
    /// this means the OS handed out a range we still own. The entry already there
    /// is left untouched.
    pub fn insert(&self, addr: NonNull<u8>, value: T) {
        let key = addr.as_ptr() as usize;
        let duplicate = match self.live.lock().entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                false
            }
            Entry::Occupied(_) => true,
        };

        assert!(!duplicate, "address {key:#x} is already registered");
    }

    /// Forgets the allocation at `addr` and returns what was recorded for it.
    ///
    /// # Panics
    ///
    /// If `addr` is not live: a double free or a pointer that never came from this
    /// allocator.
    pub fn remove(&self, addr: NonNull<u8>) -> T {
        let key = addr.as_ptr() as usize;
        let value = self.live.lock().remove(&key);

        match value {
            Some(value) => value,
            None => panic!("address {key:#x} is not a live allocation (double free or foreign pointer)"),
        }
    }

    pub fn contains(&self, addr: NonNull<u8>) -> bool {
        self.live.lock().contains_key(&(addr.as_ptr() as usize))
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }
}

impl<T: Copy> AllocationRegistry<T> {
    /// What was recorded for `addr`, if it is live.
    pub fn get(&self, addr: NonNull<u8>) -> Option<T> {
        self.live.lock().get(&(addr.as_ptr() as usize)).copied()
    }
}

impl AllocationRegistry<usize> {
    /// Sum of the sizes of every live allocation.
    pub fn total_bytes(&self) -> usize {
        self.live.lock().values().sum()
    }
}
