//! Ordered, de-duplicated frontier of cell indices.
//!
//! This is an open-addressed linear-probing hash set for `u32` keys that also
//! records keys in first-insertion order. Slots are lazily cleared with an
//! epoch stamp, so each generation can start a fresh frontier without touching
//! the full backing array.

const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

#[derive(Clone, Copy)]
#[repr(C)]
struct Slot {
    key: u32,
    stamp: u32,
}

impl Slot {
    const EMPTY: Self = Self { key: 0, stamp: 0 };
}

#[inline(always)]
fn index_hash(key: u32) -> u64 {
    const M: u64 = 0x517c_c1b7_2722_0a95;
    let h = u64::from(key).wrapping_mul(M);
    h ^ (h >> 29)
}

#[inline]
fn slots_for(keys: usize) -> usize {
    keys.saturating_mul(LOAD_DEN)
        .div_ceil(LOAD_NUM)
        .next_power_of_two()
        .max(16)
}

pub struct FrontierSet {
    slots: Vec<Slot>,
    mask: usize,
    stamp: u32,
    order: Vec<u32>,
}

impl FrontierSet {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let slots = slots_for(cap);
        Self {
            slots: vec![Slot::EMPTY; slots],
            mask: slots - 1,
            stamp: 1,
            order: Vec::with_capacity(cap),
        }
    }

    /// Forget every key in O(1).
    #[inline]
    pub fn clear(&mut self) {
        self.order.clear();
        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.stamp = 1;
            for slot in &mut self.slots {
                slot.stamp = 0;
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in first-insertion order.
    #[inline]
    pub fn keys(&self) -> &[u32] {
        &self.order
    }

    #[inline]
    pub fn reserve_for(&mut self, keys: usize) {
        if keys == 0 {
            return;
        }
        let needed = slots_for(keys);
        if needed > self.slots.len() {
            self.resize(needed);
        }
    }

    #[inline(always)]
    fn needs_grow(&self) -> bool {
        self.order.len() * LOAD_DEN >= self.slots.len() * LOAD_NUM
    }

    fn resize(&mut self, new_slots: usize) {
        debug_assert!(new_slots.is_power_of_two());
        self.slots = vec![Slot::EMPTY; new_slots];
        self.mask = new_slots - 1;
        // `order` holds exactly the live keys, so rehash from it.
        for i in 0..self.order.len() {
            let key = self.order[i];
            let mut pos = index_hash(key) as usize & self.mask;
            while self.slots[pos].stamp == self.stamp {
                pos = (pos + 1) & self.mask;
            }
            self.slots[pos] = Slot {
                key,
                stamp: self.stamp,
            };
        }
    }

    /// Insert a key.
    /// Returns `true` if newly inserted, `false` if it already existed.
    #[inline]
    pub fn insert(&mut self, key: u32) -> bool {
        if self.needs_grow() {
            self.resize((self.slots.len() * 2).max(16));
        }

        let mask = self.mask;
        let mut pos = index_hash(key) as usize & mask;
        loop {
            let slot = &mut self.slots[pos];
            if slot.stamp != self.stamp {
                *slot = Slot {
                    key,
                    stamp: self.stamp,
                };
                self.order.push(key);
                return true;
            }
            if slot.key == key {
                return false;
            }
            pos = (pos + 1) & mask;
        }
    }

    #[cfg(test)]
    pub fn contains(&self, key: u32) -> bool {
        let mut pos = index_hash(key) as usize & self.mask;
        loop {
            let slot = &self.slots[pos];
            if slot.stamp != self.stamp {
                return false;
            }
            if slot.key == key {
                return true;
            }
            pos = (pos + 1) & self.mask;
        }
    }
}

impl Default for FrontierSet {
    fn default() -> Self {
        Self::new()
    }
}
