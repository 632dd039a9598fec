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

//! The gap index: a size-sorted view of every free segment in a pool,
//! maintained in parallel with the segment list.
//!
//! Why a sorted array and not a balanced tree: the index is consulted once
//! per allocation and updated once per alloc/free. With the tens of gaps
//! typical of a pool's working set, linear operations dominate tree
//! overhead, and the sort key with an address tiebreak gives deterministic,
//! reproducible best-fit choices.

use log::trace;
use crate::growth::GrowthPolicy;
use crate::segment::SegIdx;
use crate::segment_list::SegmentList;

#[derive(Copy, Clone, Debug)]
struct Entry {
	size: usize,
	seg: SegIdx,
}

fn less(a: &Entry, b: &Entry, list: &SegmentList) -> bool {
	a.size < b.size || (a.size == b.size && list.get(a.seg).base() < list.get(b.seg).base())
}

pub struct GapIndex {
	entries: Vec<Entry>,
	policy: GrowthPolicy,
}

impl GapIndex {
	pub fn new(policy: GrowthPolicy) -> Self {
		Self { entries: Vec::with_capacity(policy.initial_capacity()), policy }
	}

	pub fn len(&self) -> usize { self.entries.len() }
	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	/// Appends `seg`'s entry, then bubbles it leftward past any strictly
	/// greater predecessor, per the `Insert` operation.
	pub fn insert(&mut self, seg: SegIdx, list: &SegmentList) {
		if self.policy.should_grow(self.entries.len(), self.entries.capacity()) {
			let next = self.policy.next_capacity(self.entries.capacity());
			trace!("growing gap index from {} to {next}", self.entries.capacity());
			self.entries.reserve(next - self.entries.len());
		}

		let entry = Entry { size: list.get(seg).size(), seg };
		self.entries.push(entry);

		let mut i = self.entries.len() - 1;
		while i > 0 && less(&self.entries[i], &self.entries[i - 1], list) {
			self.entries.swap(i, i - 1);
			i -= 1;
		}

		trace!("inserted gap of {}B at index {i}", entry.size);
	}

	/// Scans for `seg`'s entry and removes it, shifting successors down.
	/// Returns an error if no such entry exists, per the `Remove` contract:
	/// an invariant violation, not a crash.
	pub fn remove(&mut self, seg: SegIdx) -> Result<(), ()> {
		let pos = self.entries.iter().position(|e| e.seg == seg).ok_or(())?;
		self.entries.remove(pos);
		Ok(())
	}

	/// The first entry whose size is at least `min_size` — since the index
	/// is size-sorted, this is the smallest sufficient gap, with the
	/// address tiebreak naturally picking the lowest address among equal
	/// sizes.
	pub fn find_best_fit(&self, min_size: usize) -> Option<SegIdx> {
		self.entries
			.iter()
			.find(|e| e.size >= min_size)
			.map(|e| e.seg)
	}

	pub fn capacity(&self) -> usize { self.entries.capacity() }

	#[cfg(any(test, debug_assertions))]
	pub(crate) fn is_sorted(&self, list: &SegmentList) -> bool {
		self.entries.windows(2).all(|w| less(&w[0], &w[1], list))
	}
}
