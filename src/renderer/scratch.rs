/// Reusable index list filled between two flushes.
///
/// Single owner: the renderer.  Contents are only meaningful until the next
/// [`truncate`](Self::truncate); capacity survives across flushes and frames.
#[derive(Debug, Default)]
pub struct IndexScratch {
    indices: Vec<u32>,
}

impl IndexScratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append target for [`Unit::push_indices`](super::bucket::Unit::push_indices).
    pub fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.indices
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.indices.capacity()
    }

    /// Reset the length to zero, keeping the allocation.
    pub fn truncate(&mut self) {
        self.indices.clear();
    }
}
