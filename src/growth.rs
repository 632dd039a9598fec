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

//! Geometric growth policy shared by the segment slot array, the gap index,
//! and the pool registry array. The original C source stubbed a `resize`
//! helper for each of the three with identical fill-factor/expand-factor
//! constants; this module is the one place that policy lives now.

/// Fill factor and expansion factor governing when and how much a
/// preallocated array grows. The default reproduces the source's literal
/// constants: a 0.75 fill factor and a doubling expand factor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GrowthPolicy {
	/// Load factor past which the array grows, in `(0, 1]`.
	pub fill_factor: f64,
	/// Multiplier applied to capacity on growth; must be > 1.
	pub expand_factor: usize,
	/// Capacity a fresh array is allocated with before any growth.
	pub initial_capacity: usize,
}

impl Default for GrowthPolicy {
	/// Reproduces the source's literal fill and expand factors (0.75,
	/// doubling) with a 40-entry default capacity.
	fn default() -> Self {
		Self { fill_factor: 0.75, expand_factor: 2, initial_capacity: 40 }
	}
}

impl GrowthPolicy {
	/// Same fill/expand factors, with a different starting capacity. Useful
	/// for a registry expected to hold far fewer pools than a segment array
	/// holds segments, or for tests that want to exercise growth quickly.
	pub fn with_initial_capacity(self, initial_capacity: usize) -> Self {
		Self { initial_capacity, ..self }
	}

	pub fn initial_capacity(&self) -> usize { self.initial_capacity }

	/// Returns `true` if `used` out of `capacity` slots crosses the fill
	/// factor, or if there's no capacity at all.
	pub fn should_grow(&self, used: usize, capacity: usize) -> bool {
		capacity == 0 || used as f64 / capacity as f64 > self.fill_factor
	}

	/// Returns the next capacity after growing from `capacity`, which is
	/// always strictly larger.
	pub fn next_capacity(&self, capacity: usize) -> usize {
		(capacity * self.expand_factor).max(capacity + 1)
	}
}
