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

//! The address-ordered doubly-linked list of every segment in a pool.
//!
//! Segments live in a preallocated slot array (`slots`), indexed by
//! [`SegIdx`] rather than pointer, so growing the array never invalidates a
//! reference held elsewhere (the gap index, a caller's in-flight split). A
//! freed slot is marked unused rather than removed; [`SegmentList::claim_slot`]
//! recycles the first unused slot it finds before growing the array.

use all_asserts::{assert_gt, assert_le};
use log::trace;
use crate::growth::GrowthPolicy;
use crate::segment::{SegIdx, Segment};

pub struct SegmentList {
	slots: Vec<Segment>,
	used: usize,
	head: SegIdx,
	policy: GrowthPolicy,
}

impl SegmentList {
	/// Creates a list tiling `[0, pool_size)` with one free segment, per
	/// the segment list's `Initialize` operation.
	pub fn new(pool_size: usize, policy: GrowthPolicy) -> Self {
		assert_gt!(pool_size, 0);

		let mut list = Self {
			slots: Vec::with_capacity(policy.initial_capacity()),
			used: 0,
			head: SegIdx(0),
			policy,
		};
		let head = list.claim_slot();
		*list.get_mut(head) = Segment {
			base: 0,
			size: pool_size,
			allocated: false,
			used: true,
			prev: None,
			next: None,
		};
		list.head = head;
		list
	}

	pub fn head(&self) -> SegIdx { self.head }

	pub fn get(&self, idx: SegIdx) -> &Segment { &self.slots[idx.get()] }
	pub(crate) fn get_mut(&mut self, idx: SegIdx) -> &mut Segment { &mut self.slots[idx.get()] }

	/// Iterates used segments in address order, head to tail.
	pub fn iter(&self) -> Iter<'_> { Iter { list: self, next: Some(self.head) } }

	/// Walks from the head, returning the first free segment whose size is
	/// at least `min_size`.
	pub fn find_free_first_fit(&self, min_size: usize) -> Option<SegIdx> {
		self.iter()
			.find(|&idx| {
				let seg = self.get(idx);
				!seg.allocated && seg.size >= min_size
			})
	}

	/// Splits `seg` into an allocated head of `head_size` bytes and, if
	/// there's a nonzero remainder, a free residual inserted immediately
	/// after it. Returns the residual's index, if any.
	///
	/// Precondition: `seg` is free and `head_size <= seg.size`.
	pub fn split(&mut self, seg: SegIdx, head_size: usize) -> Option<SegIdx> {
		let (base, original, next) = {
			let s = self.get(seg);
			assert!(!s.allocated, "split on an already-allocated segment");
			assert_le!(head_size, s.size);
			(s.base, s.size, s.next)
		};

		self.get_mut(seg).size = head_size;
		self.get_mut(seg).allocated = true;

		if head_size == original {
			return None;
		}

		let residual = self.claim_slot();
		*self.get_mut(residual) = Segment {
			base: base + head_size,
			size: original - head_size,
			allocated: false,
			used: true,
			prev: Some(seg),
			next,
		};
		if let Some(next) = next {
			self.get_mut(next).prev = Some(residual);
		}
		self.get_mut(seg).next = Some(residual);

		trace!("split segment at {base} into head {head_size}B and residual {}B", original - head_size);
		Some(residual)
	}

	/// Absorbs `seg`'s successor into it. Precondition: both are free.
	pub fn merge_with_next(&mut self, seg: SegIdx) {
		let next = self.get(seg).next.expect("merge_with_next: no next segment");
		assert!(!self.get(seg).allocated && !self.get(next).allocated, "merge_with_next: both segments must be free");

		let next_size = self.get(next).size;
		let after = self.get(next).next;

		self.get_mut(seg).size += next_size;
		self.get_mut(seg).next = after;
		if let Some(after) = after {
			self.get_mut(after).prev = Some(seg);
		}

		let slot = self.get_mut(next);
		slot.used = false;
		self.used -= 1;

		trace!("merged segment at {} with its successor, new size {}", self.get(seg).base, self.get(seg).size);
	}

	/// Absorbs `seg` into its predecessor, returning the predecessor's
	/// index. Precondition: both are free.
	pub fn merge_with_prev(&mut self, seg: SegIdx) -> SegIdx {
		let prev = self.get(seg).prev.expect("merge_with_prev: no previous segment");
		self.merge_with_next(prev);
		prev
	}

	/// Finds an unused slot, marking it used, growing the backing array
	/// geometrically if none is free.
	pub(crate) fn claim_slot(&mut self) -> SegIdx {
		if let Some(pos) = self.slots.iter().position(|s| !s.used) {
			self.slots[pos].used = true;
			self.used += 1;
			return SegIdx(pos);
		}

		if self.policy.should_grow(self.slots.len(), self.slots.capacity()) {
			let next = self.policy.next_capacity(self.slots.capacity());
			trace!("growing segment slot array from {} to {next}", self.slots.capacity());
			self.slots.reserve(next - self.slots.len());
		}

		let idx = SegIdx(self.slots.len());
		let mut seg = Segment::unused();
		seg.used = true;
		self.slots.push(seg);
		self.used += 1;
		idx
	}

	/// Number of used (live) segment slots, both free and allocated.
	pub fn used_segments(&self) -> usize { self.used }

	pub fn capacity(&self) -> usize { self.slots.capacity() }
}

pub struct Iter<'a> {
	list: &'a SegmentList,
	next: Option<SegIdx>,
}

impl<'a> Iterator for Iter<'a> {
	type Item = SegIdx;

	fn next(&mut self) -> Option<Self::Item> {
		let idx = self.next?;
		self.next = self.list.get(idx).next;
		Some(idx)
	}
}
