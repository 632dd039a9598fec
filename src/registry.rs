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

//! The pool registry: a flat mapping from opaque [`PoolHandle`]s to
//! [`Pool`] managers, and the lifecycle gate for the library as a whole.
//!
//! Unlike the source's global `pool_store`, this is an explicit owned
//! value rather than hidden process-wide state. A caller who wants a
//! process-wide registry is free to put one behind their own
//! `static`/`Mutex` — exactly as they'd wrap a [`Pool`] for thread safety
//! (neither is this crate's concern; see the crate root's concurrency
//! notes).

use log::{debug, trace, warn};
use crate::error::{Error, Result};
use crate::growth::GrowthPolicy;
use crate::pool::{Policy, Pool};

/// A stable reference to a registered pool, indexing into the registry's
/// backing array. Never reused while the pool it names is open.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle(usize);

enum Slot {
	Empty,
	Occupied(Pool),
}

/// Process-wide (or however broadly the caller chooses to scope it) home
/// for every open pool.
pub struct Registry {
	slots: Vec<Slot>,
	growth: GrowthPolicy,
	live: usize,
}

impl Registry {
	/// Initializes a fresh registry under `growth`. The source's
	/// `called-again` kind applies to repeated `init` calls on one
	/// long-lived registry handle; since this is an owned value, that
	/// state machine is surfaced by [`Lifecycle`] for callers who want it
	/// modeled literally.
	pub fn init(growth: GrowthPolicy) -> Self {
		debug!("registry initialized with capacity {}", growth.initial_capacity());
		Self {
			slots: Vec::with_capacity(growth.initial_capacity()),
			growth,
			live: 0,
		}
	}

	/// Tears the registry down. Fails with `not-freed` if any managed pool
	/// is still registered.
	pub fn teardown(mut self) -> Result {
		if self.live > 0 {
			warn!("teardown refused: {} pool(s) still live", self.live);
			return Err(Error::not_freed());
		}
		self.slots.clear();
		debug!("registry torn down");
		Ok(())
	}

	/// Opens a new pool under this registry and returns its handle.
	pub fn pool_open(&mut self, size: usize, policy: Policy) -> Result<PoolHandle> {
		let pool = Pool::open(size, policy, self.growth)?;
		Ok(self.register(pool))
	}

	/// Closes the pool named by `handle`. Fails with `not-freed` if the
	/// pool still has live allocations or more than one gap.
	pub fn pool_close(&mut self, handle: PoolHandle) -> Result {
		let pool = self.get(handle)?;
		if !pool.is_closeable() {
			warn!("close refused on handle {}: pool still has live state", handle.0);
			return Err(Error::not_freed());
		}
		self.unregister(handle);
		debug!("closed pool at handle {}", handle.0);
		Ok(())
	}

	pub fn allocate(&mut self, handle: PoolHandle, size: usize) -> Result<usize> {
		self.get_mut(handle)?.allocate(size)
	}

	pub fn deallocate(&mut self, handle: PoolHandle, address: usize) -> Result {
		self.get_mut(handle)?.deallocate(address)
	}

	pub fn inspect(&self, handle: PoolHandle) -> Result<Vec<(usize, bool)>> {
		Ok(self.get(handle)?.inspect())
	}

	pub fn get(&self, handle: PoolHandle) -> Result<&Pool> {
		match self.slots.get(handle.0) {
			Some(Slot::Occupied(pool)) => Ok(pool),
			_ => Err(Error::fail()),
		}
	}

	pub fn get_mut(&mut self, handle: PoolHandle) -> Result<&mut Pool> {
		match self.slots.get_mut(handle.0) {
			Some(Slot::Occupied(pool)) => Ok(pool),
			_ => Err(Error::fail()),
		}
	}

	/// Appends a new occupied slot and returns its handle. Slots are never
	/// reused once a pool is closed, matching the source's append-only
	/// `pool_store` (`mem_pool_close` only nulls a slot; `mem_pool_open`
	/// always grows past `pool_store_size`). This keeps a stale `PoolHandle`
	/// retained across a `pool_close` from silently aliasing a later,
	/// unrelated pool: it keeps pointing at a permanently empty slot and
	/// `get`/`get_mut` reject it.
	fn register(&mut self, pool: Pool) -> PoolHandle {
		if self.growth.should_grow(self.slots.len(), self.slots.capacity()) {
			let next = self.growth.next_capacity(self.slots.capacity());
			trace!("growing registry array from {} to {next}", self.slots.capacity());
			self.slots.reserve(next - self.slots.len());
		}

		let handle = PoolHandle(self.slots.len());
		self.slots.push(Slot::Occupied(pool));
		self.live += 1;
		handle
	}

	fn unregister(&mut self, handle: PoolHandle) {
		if let Some(slot) = self.slots.get_mut(handle.0) {
			*slot = Slot::Empty;
			self.live -= 1;
		}
	}
}

/// A registry singleton that diagnoses repeated `init` calls as
/// `called-again`, matching the source's `mem_init`/`mem_free` lifecycle
/// literally for callers who want that exact state machine rather than
/// the owned-value model above.
#[derive(Default)]
pub struct Lifecycle {
	registry: Option<Registry>,
}

impl Lifecycle {
	pub fn init(&mut self, growth: GrowthPolicy) -> Result {
		if self.registry.is_some() {
			warn!("init called again without an intervening teardown");
			return Err(Error::called_again());
		}
		self.registry = Some(Registry::init(growth));
		Ok(())
	}

	pub fn teardown(&mut self) -> Result {
		let live = match &self.registry {
			Some(registry) => registry.live,
			None => return Err(Error::called_again()),
		};
		if live > 0 {
			warn!("teardown refused: {live} pool(s) still live");
			return Err(Error::not_freed());
		}
		// Only taken once known empty, so a live registry is left in place
		// for the caller to retry after closing its remaining pools.
		self.registry.take().unwrap().teardown()
	}

	pub fn registry(&self) -> Option<&Registry> { self.registry.as_ref() }
	pub fn registry_mut(&mut self) -> Option<&mut Registry> { self.registry.as_mut() }
}
