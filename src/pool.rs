// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The pool manager: binds one system-obtained memory region to its
//! [`SegmentList`] and [`GapIndex`], and is the only component that mutates
//! both together. Every public operation here keeps the two structures in
//! lockstep — see the gap index module for why that discipline matters.

use log::{debug, trace, warn};
use crate::error::{Error, ErrorKind, Result};
use crate::gap_index::GapIndex;
use crate::growth::GrowthPolicy;
use crate::segment::SegIdx;
use crate::segment_list::SegmentList;

/// Placement policy for a pool, fixed at [`Pool::open`] and immutable for
/// the pool's lifetime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Policy {
	/// Returns the lowest-address gap that's large enough.
	FirstFit,
	/// Returns the smallest sufficient gap, lowest address among ties.
	BestFit,
}

/// One contiguous region sub-allocated by this library.
pub struct Pool {
	/// Backing allocation, obtained once from the system allocator and held
	/// until [`Pool::close`]. Never read or written by this crate; it only
	/// exists to back the addresses this pool hands out with real memory.
	region: Box<[u8]>,
	policy: Policy,
	alloc_size: usize,
	num_allocs: usize,
	list: SegmentList,
	gaps: GapIndex,
}

impl Pool {
	/// Opens a pool of `size` bytes under `policy`. Installs one free
	/// segment covering the whole region and a single gap index entry.
	pub fn open(size: usize, policy: Policy, growth: GrowthPolicy) -> Result<Self> {
		if size == 0 {
			warn!("refusing to open a zero-size pool");
			return Err(Error::fail());
		}

		let region = alloc_region(size)?;
		let list = SegmentList::new(size, growth);
		let mut gaps = GapIndex::new(growth);
		gaps.insert(list.head(), &list);

		debug!("opened pool of {size}B at {:p} under {policy:?}", region.as_ptr());
		Ok(Self { region, policy, alloc_size: 0, num_allocs: 0, list, gaps })
	}

	/// The region's starting address, as handed to this pool by the system
	/// allocator.
	pub fn base(&self) -> usize { self.region.as_ptr() as usize }
	pub fn total_size(&self) -> usize { self.region.len() }
	pub fn policy(&self) -> Policy { self.policy }
	pub fn alloc_size(&self) -> usize { self.alloc_size }
	pub fn num_allocs(&self) -> usize { self.num_allocs }
	pub fn num_gaps(&self) -> usize { self.gaps.len() }

	/// Chooses a sufficient gap per this pool's policy, splits it, and
	/// returns the allocated head's address. Fails if no gap is large
	/// enough, or the segment slot array is full and cannot grow.
	pub fn allocate(&mut self, size: usize) -> Result<usize> {
		if size == 0 {
			return Err(Error::fail());
		}

		let Some(seg) = self.find_fit(size) else {
			trace!("no gap of at least {size}B available");
			return Err(Error::fail());
		};

		self.gaps
			.remove(seg)
			.unwrap_or_else(|()| invariant_violation("allocate: gap index missing a chosen gap"));

		let residual = self.list.split(seg, size);
		if let Some(residual) = residual {
			self.gaps.insert(residual, &self.list);
		}

		self.alloc_size += size;
		self.num_allocs += 1;

		let addr = self.base() + self.list.get(seg).base();
		debug!("allocated {size}B at {addr:#x}, {} gaps remaining", self.gaps.len());
		self.assert_invariants();
		Ok(addr)
	}

	fn find_fit(&self, size: usize) -> Option<SegIdx> {
		match self.policy {
			Policy::FirstFit => self.list.find_free_first_fit(size),
			Policy::BestFit => self.gaps.find_best_fit(size),
		}
	}

	/// Frees the allocation at `address`, coalescing with up to two free
	/// neighbors. Fails if `address` isn't the base of a live allocation
	/// (never returned by `allocate`, already freed, or mid-segment).
	pub fn deallocate(&mut self, address: usize) -> Result {
		let Some(offset) = address.checked_sub(self.base()) else {
			return Err(Error::not_found());
		};

		let Some(seg) = self.list
			.iter()
			.find(|&idx| self.list.get(idx).base() == offset && self.list.get(idx).is_allocated())
		else {
			warn!("deallocate: {address:#x} is not an active allocation");
			return Err(Error::not_found());
		};

		let size = self.list.get(seg).size();
		self.list.get_mut(seg).allocated = false;
		self.alloc_size -= size;
		self.num_allocs -= 1;

		let mut result = seg;
		if let Some(next) = self.list.get(seg).next {
			if self.list.get(next).is_free() {
				self.gaps
					.remove(next)
					.unwrap_or_else(|()| invariant_violation("deallocate: gap index missing the next neighbor"));
				self.list.merge_with_next(seg);
			}
		}
		if let Some(prev) = self.list.get(result).prev {
			if self.list.get(prev).is_free() {
				self.gaps
					.remove(prev)
					.unwrap_or_else(|()| invariant_violation("deallocate: gap index missing the previous neighbor"));
				result = self.list.merge_with_prev(result);
			}
		}

		self.gaps.insert(result, &self.list);

		debug!(
			"deallocated {size}B at {address:#x}, coalesced into {}B gap at {:#x}",
			self.list.get(result).size(),
			self.base() + self.list.get(result).base(),
		);
		self.assert_invariants();
		Ok(())
	}

	/// Walks the segment list in address order, emitting `(size, allocated)`
	/// for every used segment.
	pub fn inspect(&self) -> Vec<(usize, bool)> {
		self.list
			.iter()
			.map(|idx| {
				let seg = self.list.get(idx);
				(seg.size(), seg.is_allocated())
			})
			.collect()
	}

	/// `true` once `num_allocs == 0 && num_gaps == 1`, the gate
	/// [`crate::registry::Registry::pool_close`] checks before tearing a
	/// pool down.
	pub fn is_closeable(&self) -> bool {
		self.num_allocs == 0 && self.gaps.len() == 1
	}

	#[cfg(debug_assertions)]
	fn assert_invariants(&self) {
		let mut total = 0;
		for (i, idx) in self.list.iter().enumerate() {
			let seg = self.list.get(idx);
			assert!(seg.size() > 0, "segment sizes must be positive");
			if i == 0 {
				assert_eq!(seg.base(), 0, "first segment must start at offset 0");
			}
			total += seg.size();
		}
		assert_eq!(total, self.total_size(), "segments must tile the pool exactly");
		assert!(self.gaps.is_sorted(&self.list), "gap index must stay sorted");

		let mut prev_free = false;
		for idx in self.list.iter() {
			let free = self.list.get(idx).is_free();
			assert!(!(free && prev_free), "no two adjacent segments may both be free");
			prev_free = free;
		}

		let (alloc_size, num_allocs) = self.list
			.iter()
			.map(|idx| self.list.get(idx))
			.filter(|s| s.is_allocated())
			.fold((0, 0), |(size, count), s| (size + s.size(), count + 1));
		assert_eq!(alloc_size, self.alloc_size, "alloc_size must track allocated segments");
		assert_eq!(num_allocs, self.num_allocs, "num_allocs must track allocated segments");
	}

	#[cfg(not(debug_assertions))]
	fn assert_invariants(&self) {}
}

fn invariant_violation(msg: &'static str) -> ! {
	log::error!("{msg}");
	panic!("{msg}");
}

/// Obtains `size` bytes from the system allocator, reporting refusal as
/// `Err` instead of aborting the process. `vec![0u8; size]` would call
/// `handle_alloc_error` on failure, turning a refused allocation into a
/// process abort rather than an observable `open` failure.
fn alloc_region(size: usize) -> Result<Box<[u8]>> {
	let mut region = Vec::new();
	region.try_reserve_exact(size).map_err(|source| {
		warn!("failed to allocate a {size}B region: {source}");
		Error::with_source(ErrorKind::Fail, source)
	})?;
	region.resize(size, 0u8);
	Ok(region.into_boxed_slice())
}

#[cfg(test)]
mod test {
	use super::*;

	fn open(size: usize, policy: Policy) -> Pool {
		Pool::open(size, policy, GrowthPolicy::default()).unwrap()
	}

	#[test]
	fn best_fit_picks_smallest_sufficient() {
		let mut pool = open(1000, Policy::BestFit);
		let base = pool.base();
		assert_eq!(pool.allocate(100).unwrap(), base);
		assert_eq!(pool.allocate(200).unwrap(), base + 100);
		pool.deallocate(base).unwrap();
		assert_eq!(pool.allocate(50).unwrap(), base);

		let mut gaps = pool.inspect();
		gaps.retain(|&(_, allocated)| !allocated);
		assert_eq!(gaps, vec![(50, false), (700, false)]);
	}

	#[test]
	fn first_fit_picks_lowest_address() {
		let mut pool = open(1000, Policy::FirstFit);
		let base = pool.base();
		assert_eq!(pool.allocate(100).unwrap(), base);
		assert_eq!(pool.allocate(100).unwrap(), base + 100);
		assert_eq!(pool.allocate(100).unwrap(), base + 200);
		pool.deallocate(base + 100).unwrap();
		pool.deallocate(base).unwrap();
		assert_eq!(pool.allocate(50).unwrap(), base);

		let layout = pool.inspect();
		assert_eq!(layout, vec![(50, true), (150, false), (100, true), (700, false)]);
	}

	#[test]
	fn three_way_coalesce() {
		let mut pool = open(1000, Policy::FirstFit);
		let base = pool.base();
		pool.allocate(100).unwrap();
		pool.allocate(100).unwrap();
		pool.allocate(100).unwrap();
		pool.deallocate(base).unwrap();
		pool.deallocate(base + 200).unwrap();
		pool.deallocate(base + 100).unwrap();

		assert_eq!(pool.num_allocs(), 0);
		assert_eq!(pool.num_gaps(), 1);
		assert_eq!(pool.inspect(), vec![(1000, false)]);
	}

	#[test]
	fn exact_fit_has_no_residual() {
		let mut pool = open(100, Policy::FirstFit);
		let base = pool.base();
		assert_eq!(pool.allocate(100).unwrap(), base);
		assert_eq!(pool.num_gaps(), 0);
		assert!(pool.allocate(1).is_err());
		pool.deallocate(base).unwrap();
		assert_eq!(pool.num_gaps(), 1);
	}

	#[test]
	fn close_refuses_live_pool() {
		let mut pool = open(1000, Policy::FirstFit);
		let base = pool.base();
		pool.allocate(10).unwrap();
		assert!(!pool.is_closeable());
		pool.deallocate(base).unwrap();
		assert!(pool.is_closeable());
	}

	#[test]
	fn best_fit_tiebreaks_by_address() {
		let mut pool = open(1000, Policy::BestFit);
		let base = pool.base();
		pool.allocate(100).unwrap();
		pool.allocate(100).unwrap();
		pool.allocate(100).unwrap();
		pool.allocate(100).unwrap();
		pool.deallocate(base).unwrap();
		pool.deallocate(base + 200).unwrap();
		assert_eq!(pool.allocate(100).unwrap(), base);
	}

	#[test]
	fn deallocate_unknown_address_fails() {
		let mut pool = open(1000, Policy::FirstFit);
		assert!(pool.deallocate(pool.base() + 500).is_err());
	}

	#[test]
	fn deallocate_twice_fails() {
		let mut pool = open(1000, Policy::FirstFit);
		let base = pool.base();
		pool.allocate(100).unwrap();
		pool.deallocate(base).unwrap();
		assert!(pool.deallocate(base).is_err());
	}

	#[test]
	fn open_reports_a_refused_allocation_instead_of_aborting() {
		use std::error::Error as _;

		let err = Pool::open(usize::MAX, Policy::FirstFit, GrowthPolicy::default())
			.expect_err("a region this large must be refused, not abort the process");
		assert_eq!(err.kind(), ErrorKind::Fail);
		assert!(err.source().is_some(), "the refusing allocator error should be attached as a source");
	}
}
