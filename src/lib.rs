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

//! ## How it works
//!
//! This crate sub-allocates variable-size chunks out of one or more large
//! contiguous regions ("pools") obtained from the system allocator at
//! setup time. Within a pool, free regions ("gaps") are tracked two ways
//! at once:
//!
//! - The segment list is an address-ordered doubly-linked list of every
//!   segment, allocated or free, supporting O(1) neighbor lookup for
//!   coalescing.
//! - The gap index is a size-sorted array of every free segment,
//!   supporting first-fit and best-fit placement.
//!
//! The [`pool::Pool`] manager binds one region to both views and is the
//! only place that mutates them, always together. The [`registry::Registry`]
//! is a flat, owned mapping from handle to pool; it is the library's
//! lifecycle root.
//!
//! ### Placement
//!
//! A pool is opened with a fixed [`pool::Policy`]: first-fit walks the
//! segment list in address order for the first sufficient gap; best-fit
//! consults the gap index for the smallest sufficient one, with an
//! address tiebreak for reproducible traces.
//!
//! ### Concurrency
//!
//! This crate is single-threaded throughout: no operation yields or
//! suspends, and no type here is `Sync`. Callers needing thread safety
//! wrap a [`pool::Pool`] or [`registry::Registry`] in their own mutex at
//! the handle granularity.

mod error;
mod growth;
mod segment;
mod segment_list;
mod gap_index;
pub mod pool;
pub mod registry;

pub use error::{Error, ErrorKind, Result};
pub use growth::GrowthPolicy;
pub use pool::{Policy, Pool};
pub use registry::{Lifecycle, PoolHandle, Registry};
