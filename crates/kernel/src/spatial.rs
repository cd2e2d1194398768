//! Hashed uniform-grid spatial index for neighbor search.
//!
//! Space is divided into cubic cells with edge length equal to the smoothing
//! radius, so every neighbor of a particle lies in the 27 (3x3x3) cells
//! around its own cell. Cells are unbounded: their integer coordinates are
//! hashed into a fixed table instead of being flattened into a grid.
//!
//! Each step the index is rebuilt in three parallel passes:
//!
//! 1. one [`SpatialEntry`] `(key, hash, index)` per particle,
//! 2. bitonic sort of the entries by `key`, grouping each bucket into a run,
//! 3. the offset table `offsets[key]` = first entry of the run, or the
//!    particle count when the bucket is empty.
//!
//! Distinct cells can share a bucket. Entries keep the unreduced cell hash so
//! that [`SpatialIndex::for_each_candidate`] only reports particles of the
//! cell being visited; the caller still filters by distance.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{IVec3, Vec3};
use rayon::prelude::*;

use crate::error::KernelError;
use crate::particle::allocate;
use crate::sort::{bitonic_sort, SortKey};

/// Multiplier of the cell X coordinate in [`hash_cell`].
pub const HASH_K1: u32 = 15_823;
/// Multiplier of the cell Y coordinate in [`hash_cell`].
pub const HASH_K2: u32 = 9_737_333;
/// Multiplier of the cell Z coordinate in [`hash_cell`].
pub const HASH_K3: u32 = 440_817_757;

/// One particle's slot in the spatial index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialEntry {
    /// Bucket in the offset table: `hash % table_size`.
    pub key: u32,
    /// Unreduced hash of the particle's cell.
    pub hash: u32,
    /// Particle index.
    pub index: u32,
}

impl SortKey for SpatialEntry {
    #[inline]
    fn sort_key(&self) -> u32 {
        self.key
    }
}

/// Integer cell containing `position` for cells of edge `radius`.
#[inline]
pub fn cell_coord(position: Vec3, radius: f32) -> IVec3 {
    (position / radius).floor().as_ivec3()
}

/// Hash of a cell coordinate.
///
/// ```text
/// hash = x * 15823 + y * 9737333 + z * 440817757   (wrapping u32)
/// ```
///
/// Negative coordinates are reinterpreted as `u32` first.
#[inline]
pub fn hash_cell(cell: IVec3) -> u32 {
    let c = cell.as_uvec3();
    c.x.wrapping_mul(HASH_K1)
        .wrapping_add(c.y.wrapping_mul(HASH_K2))
        .wrapping_add(c.z.wrapping_mul(HASH_K3))
}

/// Spatial hash entries plus the bucket offset table.
///
/// Both arrays are allocated once and rewritten in place every step.
#[derive(Debug)]
pub struct SpatialIndex {
    entries: Vec<SpatialEntry>,
    offsets: Vec<AtomicU32>,
    table_size: u32,
    sentinel: u32,
}

impl SpatialIndex {
    /// Allocate an index for `particle_count` particles hashed into
    /// `table_size` buckets.
    pub fn new(particle_count: usize, table_size: usize) -> Result<Self, KernelError> {
        let sentinel = u32::try_from(particle_count)
            .map_err(|_| KernelError::TooManyParticles(particle_count))?;
        let table = u32::try_from(table_size)
            .ok()
            .filter(|&t| t > 0)
            .ok_or(KernelError::InvalidHashTableSize(table_size))?;

        let mut entries = allocate("spatial_entries", particle_count)?;
        entries.extend((0..sentinel).map(|index| SpatialEntry {
            key: 0,
            hash: 0,
            index,
        }));
        let mut offsets = allocate("offset_table", table_size)?;
        offsets.extend((0..table_size).map(|_| AtomicU32::new(sentinel)));

        Ok(Self {
            entries,
            offsets,
            table_size: table,
            sentinel,
        })
    }

    /// Number of buckets.
    pub fn table_size(&self) -> usize {
        self.table_size as usize
    }

    /// Value stored for empty buckets (the particle count).
    pub fn sentinel(&self) -> u32 {
        self.sentinel
    }

    /// Entries in their current order.
    pub fn entries(&self) -> &[SpatialEntry] {
        &self.entries
    }

    /// Bucket of a cell hash.
    #[inline]
    pub fn key_of(&self, hash: u32) -> u32 {
        hash % self.table_size
    }

    /// First sorted entry of bucket `key`, or [`sentinel`](Self::sentinel).
    #[inline]
    pub fn offset(&self, key: u32) -> u32 {
        self.offsets[key as usize].load(Ordering::Relaxed)
    }

    /// Copy of the offset table.
    pub fn offset_table(&self) -> Vec<u32> {
        self.offsets
            .iter()
            .map(|o| o.load(Ordering::Relaxed))
            .collect()
    }

    /// Write one entry per particle from the predicted positions.
    pub fn compute_hashes(&mut self, predicted: &[Vec3], radius: f32) {
        debug_assert_eq!(predicted.len(), self.entries.len());
        let table_size = self.table_size;
        self.entries
            .par_iter_mut()
            .zip(predicted.par_iter())
            .enumerate()
            .for_each(|(i, (entry, &pos))| {
                let hash = hash_cell(cell_coord(pos, radius));
                *entry = SpatialEntry {
                    key: hash % table_size,
                    hash,
                    index: i as u32,
                };
            });
    }

    /// Group the entries by key.
    pub fn sort_entries(&mut self) {
        bitonic_sort(&mut self.entries);
    }

    /// Rebuild the offset table from sorted entries.
    ///
    /// Every bucket is first reset to the sentinel; then the entry that
    /// starts each run writes its own index. A bucket has at most one run, so
    /// each slot is written by a single task.
    pub fn build_offsets(&mut self) {
        let sentinel = self.sentinel;
        self.offsets
            .par_iter()
            .for_each(|o| o.store(sentinel, Ordering::Relaxed));

        let entries = &self.entries;
        let offsets = &self.offsets;
        (0..entries.len()).into_par_iter().for_each(|i| {
            let key = entries[i].key;
            if i == 0 || entries[i - 1].key != key {
                offsets[key as usize].store(i as u32, Ordering::Relaxed);
            }
        });
    }

    /// Hash, sort and index `predicted` in one go.
    pub fn rebuild(&mut self, predicted: &[Vec3], radius: f32) {
        self.compute_hashes(predicted, radius);
        self.sort_entries();
        self.build_offsets();
    }

    /// Call `f` with the index of every particle whose cell is one of the 27
    /// cells around `position`.
    ///
    /// Candidates are not filtered by distance. Each particle is reported at
    /// most once.
    pub fn for_each_candidate<F>(&self, position: Vec3, radius: f32, mut f: F)
    where
        F: FnMut(usize),
    {
        let origin = cell_coord(position, radius);
        let n = self.entries.len();

        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let hash = hash_cell(origin + IVec3::new(dx, dy, dz));
                    let key = self.key_of(hash);
                    let mut cursor = self.offset(key) as usize;
                    while cursor < n {
                        let entry = self.entries[cursor];
                        if entry.key != key {
                            break;
                        }
                        cursor += 1;
                        if entry.hash == hash {
                            f(entry.index as usize);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered_positions(n: usize, extent: f32) -> Vec<Vec3> {
        let mut state = 0x9e37_79b9_u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32 - 0.5) * 2.0 * extent
        };
        (0..n).map(|_| Vec3::new(next(), next(), next())).collect()
    }

    #[test]
    fn hash_uses_wrapping_arithmetic() {
        let expected = 1u32
            .wrapping_mul(HASH_K1)
            .wrapping_add(2u32.wrapping_mul(HASH_K2))
            .wrapping_add(3u32.wrapping_mul(HASH_K3));
        assert_eq!(hash_cell(IVec3::new(1, 2, 3)), expected);
        assert_eq!(hash_cell(IVec3::new(-1, 0, 0)), 0u32.wrapping_sub(HASH_K1));
        assert_eq!(hash_cell(IVec3::ZERO), 0);
    }

    #[test]
    fn cell_coord_floors_negative_positions() {
        assert_eq!(cell_coord(Vec3::new(-0.01, 0.0, 0.39), 0.2), IVec3::new(-1, 0, 1));
        assert_eq!(cell_coord(Vec3::new(0.2, -0.2, 0.199), 0.2), IVec3::new(1, -1, 0));
    }

    #[test]
    fn neighborhood_hashes_are_distinct() {
        let origin = IVec3::new(-3, 7, 12);
        let mut hashes = Vec::new();
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    hashes.push(hash_cell(origin + IVec3::new(dx, dy, dz)));
                }
            }
        }
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), 27);
    }

    #[test]
    fn rejects_empty_table() {
        assert!(matches!(
            SpatialIndex::new(10, 0),
            Err(KernelError::InvalidHashTableSize(0))
        ));
    }

    #[test]
    fn offsets_point_at_run_starts() {
        let positions = scattered_positions(200, 1.0);
        let mut index = SpatialIndex::new(positions.len(), 37).unwrap();
        index.rebuild(&positions, 0.2);

        let entries = index.entries();
        for pair in entries.windows(2) {
            assert!(pair[0].key <= pair[1].key);
        }
        for key in 0..index.table_size() as u32 {
            let first = entries.iter().position(|e| e.key == key);
            let expected = first.map_or(index.sentinel(), |i| i as u32);
            assert_eq!(index.offset(key), expected, "key {key}");
        }
    }

    #[test]
    fn candidates_cover_every_neighbor_once() {
        let radius = 0.2;
        let positions = scattered_positions(300, 0.8);
        // A tiny table forces many unrelated cells into the same bucket.
        let mut index = SpatialIndex::new(positions.len(), 5).unwrap();
        index.rebuild(&positions, radius);

        for (i, &p) in positions.iter().enumerate() {
            let mut seen = vec![0u32; positions.len()];
            index.for_each_candidate(p, radius, |j| seen[j] += 1);

            for (j, &q) in positions.iter().enumerate() {
                assert!(seen[j] <= 1, "particle {j} reported twice for {i}");
                if (q - p).length_squared() <= radius * radius {
                    assert_eq!(seen[j], 1, "neighbor {j} of {i} missed");
                }
            }
        }
    }
}
