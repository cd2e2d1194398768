//! Data-parallel bitonic merge sort over keyed records.
//!
//! The network operates on the input logically padded to the next power of
//! two `P`. Padding slots behave as `u32::MAX` keys that already sit at the
//! end, so any compare-exchange whose right index falls outside the real data
//! is simply skipped. With `S = log2(P)` the network runs `S (S + 1) / 2`
//! passes; each pass is `P / 2` independent compare-exchanges and passes run
//! strictly one after another.
//!
//! Inside a pass every pair lies in a block of `2 * group_width` consecutive
//! slots, so the slice is split into disjoint blocks with
//! [`par_chunks_mut`](rayon::slice::ParallelSliceMut::par_chunks_mut) and each
//! task owns exactly the two slots it compares.
//!
//! The sort is not stable: records with equal keys end up grouped but in no
//! particular order.

use rayon::prelude::*;

/// Record that can be ordered by the bitonic network.
pub trait SortKey {
    /// Sort key; records are ordered ascending by it.
    fn sort_key(&self) -> u32;
}

impl<T> SortKey for (u32, T) {
    #[inline]
    fn sort_key(&self) -> u32 {
        self.0
    }
}

/// Parameters of one pass of the bitonic network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitonicPass {
    /// Stage index in `[0, S)`.
    pub stage: u32,
    /// Step index in `[0, stage]`.
    pub step: u32,
    /// `2^(stage - step)`
    pub group_width: usize,
    /// `2 * group_width - 1`
    pub group_height: usize,
}

impl BitonicPass {
    /// Pass for the given stage and step.
    pub fn new(stage: u32, step: u32) -> Self {
        debug_assert!(step <= stage);
        let group_width = 1usize << (stage - step);
        Self {
            stage,
            step,
            group_width,
            group_height: 2 * group_width - 1,
        }
    }

    /// Full pass schedule for `len` records.
    pub fn schedule(len: usize) -> impl Iterator<Item = BitonicPass> {
        let stages = if len <= 1 {
            0
        } else {
            len.next_power_of_two().trailing_zeros()
        };
        (0..stages).flat_map(|stage| (0..=stage).map(move |step| BitonicPass::new(stage, step)))
    }

    /// Slot pair compared by task `thread` of this pass (`thread < P / 2`).
    ///
    /// The first step of every stage compares mirrored slots inside a block
    /// (a "flip"); later steps compare slots half a block apart.
    pub fn pair(&self, thread: usize) -> (usize, usize) {
        let h = thread & (self.group_width - 1);
        let left = h + (self.group_height + 1) * (thread / self.group_width);
        let right_step = if self.step == 0 {
            self.group_height - 2 * h
        } else {
            (self.group_height + 1) / 2
        };
        (left, left + right_step)
    }

    /// Run this pass over `entries` in parallel.
    pub fn run<T: SortKey + Send>(&self, entries: &mut [T]) {
        let width = self.group_width;
        let flip = self.step == 0;

        entries.par_chunks_mut(2 * width).for_each(|block| {
            if block.len() <= width {
                return;
            }
            let (lo, hi) = block.split_at_mut(width);
            if flip {
                // lo[h] pairs with block[2w - 1 - h]; a short tail block drops
                // the pairs whose partner lies in the padding.
                let skip = width - hi.len();
                lo[skip..]
                    .par_iter_mut()
                    .zip(hi.par_iter_mut().rev())
                    .for_each(|(a, b)| compare_exchange(a, b));
            } else {
                lo.par_iter_mut()
                    .zip(hi.par_iter_mut())
                    .for_each(|(a, b)| compare_exchange(a, b));
            }
        });
    }
}

#[inline]
fn compare_exchange<T: SortKey>(a: &mut T, b: &mut T) {
    if a.sort_key() > b.sort_key() {
        std::mem::swap(a, b);
    }
}

/// Sort `entries` ascending by key with the parallel bitonic network.
pub fn bitonic_sort<T: SortKey + Send>(entries: &mut [T]) {
    let mut passes = 0usize;
    for pass in BitonicPass::schedule(entries.len()) {
        pass.run(entries);
        passes += 1;
    }
    tracing::trace!(len = entries.len(), passes, "bitonic sort complete");
}
