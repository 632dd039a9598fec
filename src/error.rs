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

//! The error vocabulary returned by every public operation. Four kinds, per
//! the allocator's lifecycle and placement failure modes; nothing here is
//! ever thrown, only returned.

/// The closed set of ways a public operation can fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
	/// A generic failure: the system allocator refused a region, a supporting
	/// array could not grow, or an address did not resolve to a live
	/// allocation.
	#[error("operation failed")]
	Fail,
	/// `deallocate` was given an address that was never returned by
	/// `allocate`, or that has already been freed.
	#[error("address is not an active allocation")]
	NotFound,
	/// `pool_close`/`teardown` was attempted while live state remains.
	#[error("pool or registry still has live allocations")]
	NotFreed,
	/// A lifecycle operation (`init`) was issued a second time without an
	/// intervening teardown.
	#[error("already initialized")]
	CalledAgain,
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
	kind: ErrorKind,
	#[source]
	source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
	pub fn kind(&self) -> ErrorKind { self.kind }

	pub(crate) fn new(kind: ErrorKind) -> Self {
		Self { kind, source: None }
	}

	pub(crate) fn with_source(
		kind: ErrorKind,
		source: impl std::error::Error + Send + Sync + 'static,
	) -> Self {
		Self { kind, source: Some(Box::new(source)) }
	}

	pub(crate) fn fail() -> Self { Self::new(ErrorKind::Fail) }
	pub(crate) fn not_found() -> Self { Self::new(ErrorKind::NotFound) }
	pub(crate) fn not_freed() -> Self { Self::new(ErrorKind::NotFreed) }
	pub(crate) fn called_again() -> Self { Self::new(ErrorKind::CalledAgain) }
}

pub type Result<T = ()> = std::result::Result<T, Error>;
