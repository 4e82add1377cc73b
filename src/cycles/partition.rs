use std::num::NonZeroUsize;

use crate::db::ScrewRecord;

/// 0-based position of a cycle in partition order.
pub type CycleIndex = usize;

/// A run of consecutive records. Only the trailing cycle may be short.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub index: CycleIndex,
    pub records: Vec<ScrewRecord>,
    size: NonZeroUsize,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.records.len() == self.size.get()
    }

    pub fn size(&self) -> NonZeroUsize {
        self.size
    }
}

/// Splits id-ordered records into consecutive cycles of `size`.
pub fn partition(records: &[ScrewRecord], size: NonZeroUsize) -> Vec<Cycle> {
    records
        .chunks(size.get())
        .enumerate()
        .map(|(index, chunk)| Cycle {
            index,
            records: chunk.to_vec(),
            size,
        })
        .collect()
}

/// What `order_by_id` had to fix in a fetched snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderingReport {
    pub was_sorted: bool,
    pub duplicate_ids: Vec<u64>,
}

impl OrderingReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty()
    }
}

/// Stable sort by `id`. Duplicates keep their fetch order and are reported.
pub fn order_by_id(records: &mut [ScrewRecord]) -> OrderingReport {
    let was_sorted = records.windows(2).all(|pair| pair[0].id <= pair[1].id);
    if !was_sorted {
        records.sort_by_key(|record| record.id);
    }

    let mut duplicate_ids: Vec<u64> = records
        .windows(2)
        .filter(|pair| pair[0].id == pair[1].id)
        .map(|pair| pair[0].id)
        .collect();
    duplicate_ids.dedup();

    OrderingReport {
        was_sorted,
        duplicate_ids,
    }
}
