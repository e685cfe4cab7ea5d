//! Generation-checked handle table.
//!
//! A handle packs a slot index (upper 32 bits) and the slot's generation
//! (lower 32 bits). Removing a value bumps the generation, so every handle
//! issued for the old occupant stops resolving. Handle `0` is never issued,
//! which lets C callers use it as "no arena".

const GENERATION_BITS: u32 = 32;

fn pack(index: u32, generation: u32) -> u64 {
    (u64::from(index) << GENERATION_BITS) | u64::from(generation)
}

fn unpack(handle: u64) -> (usize, u32) {
    ((handle >> GENERATION_BITS) as usize, handle as u32)
}

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Maps `u64` handles to owned values.
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> u64 {
        self.live += 1;
        if let Some(index) = self.free_head {
            let entry = &mut self.entries[index as usize];
            if let Entry::Vacant {
                generation,
                next_free,
            } = *entry
            {
                self.free_head = next_free;
                *entry = Entry::Occupied { generation, value };
                return pack(index, generation);
            }
        }
        let index = self.entries.len() as u32;
        // Generation starts at 1 so that no handle is ever 0.
        self.entries.push(Entry::Occupied {
            generation: 1,
            value,
        });
        pack(index, 1)
    }

    /// `None` for stale or never-issued handles.
    pub(crate) fn get(&self, handle: u64) -> Option<&T> {
        let (index, wanted) = unpack(handle);
        match self.entries.get(index)? {
            Entry::Occupied { generation, value } if *generation == wanted => Some(value),
            _ => None,
        }
    }

    /// Remove and return the value. Removing a stale handle is a no-op.
    ///
    /// A slot whose generation would wrap is retired instead of recycled,
    /// so a handle can never come back to life.
    pub(crate) fn remove(&mut self, handle: u64) -> Option<T> {
        let (index, wanted) = unpack(handle);
        match self.entries.get(index) {
            Some(Entry::Occupied { generation, .. }) if *generation == wanted => {}
            _ => return None,
        }
        let next_generation = wanted.wrapping_add(1);
        let recycle = next_generation != 0;
        let vacant = Entry::Vacant {
            generation: next_generation,
            next_free: if recycle { self.free_head } else { None },
        };
        let old = std::mem::replace(&mut self.entries[index], vacant);
        if recycle {
            self.free_head = Some(index as u32);
        }
        self.live -= 1;
        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
