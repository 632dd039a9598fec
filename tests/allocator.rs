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

//! Black-box replays of the allocator's literal scenarios, against a pool
//! opened and driven entirely through the public `Registry`/`Pool` API.

use pretty_assertions::assert_eq;
use segpool::{GrowthPolicy, Policy, Registry};

fn registry() -> Registry { Registry::init(GrowthPolicy::default()) }

#[test]
fn best_fit_picks_smallest_sufficient_gap() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::BestFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	assert_eq!(reg.allocate(pool, 100).unwrap(), base);
	assert_eq!(reg.allocate(pool, 200).unwrap(), base + 100);
	reg.deallocate(pool, base).unwrap();
	assert_eq!(reg.allocate(pool, 50).unwrap(), base);

	let gaps: Vec<_> = reg.inspect(pool)
		.unwrap()
		.into_iter()
		.filter(|&(_, allocated)| !allocated)
		.collect();
	assert_eq!(gaps, vec![(50, false), (700, false)]);
}

#[test]
fn first_fit_picks_lowest_address_gap() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::FirstFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	assert_eq!(reg.allocate(pool, 100).unwrap(), base);
	assert_eq!(reg.allocate(pool, 100).unwrap(), base + 100);
	assert_eq!(reg.allocate(pool, 100).unwrap(), base + 200);
	reg.deallocate(pool, base + 100).unwrap();
	reg.deallocate(pool, base).unwrap();
	assert_eq!(reg.allocate(pool, 50).unwrap(), base);

	assert_eq!(
		reg.inspect(pool).unwrap(),
		vec![(50, true), (150, false), (100, true), (700, false)],
	);
}

#[test]
fn three_way_coalesce_restores_whole_pool_gap() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::FirstFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	reg.allocate(pool, 100).unwrap();
	reg.allocate(pool, 100).unwrap();
	reg.allocate(pool, 100).unwrap();
	reg.deallocate(pool, base).unwrap();
	reg.deallocate(pool, base + 200).unwrap();
	reg.deallocate(pool, base + 100).unwrap();

	assert_eq!(reg.inspect(pool).unwrap(), vec![(1000, false)]);
	assert_eq!(reg.get(pool).unwrap().num_allocs(), 0);
	assert_eq!(reg.get(pool).unwrap().num_gaps(), 1);

	reg.pool_close(pool).unwrap();
}

#[test]
fn exact_fit_allocation_produces_no_residual() {
	let mut reg = registry();
	let pool = reg.pool_open(100, Policy::FirstFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	assert_eq!(reg.allocate(pool, 100).unwrap(), base);
	assert_eq!(reg.get(pool).unwrap().num_gaps(), 0);
	assert!(reg.allocate(pool, 1).is_err());

	reg.deallocate(pool, base).unwrap();
	assert_eq!(reg.get(pool).unwrap().num_gaps(), 1);
}

#[test]
fn close_refuses_a_pool_with_live_allocations() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::FirstFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	reg.allocate(pool, 10).unwrap();
	assert!(reg.pool_close(pool).is_err());

	reg.deallocate(pool, base).unwrap();
	reg.pool_close(pool).unwrap();
}

#[test]
fn best_fit_tiebreaks_on_address() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::BestFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	reg.allocate(pool, 100).unwrap();
	reg.allocate(pool, 100).unwrap();
	reg.allocate(pool, 100).unwrap();
	reg.allocate(pool, 100).unwrap();
	reg.deallocate(pool, base).unwrap();
	reg.deallocate(pool, base + 200).unwrap();

	assert_eq!(reg.allocate(pool, 100).unwrap(), base);
}

#[test]
fn deallocating_an_unknown_or_repeated_address_is_diagnosed() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::FirstFit).unwrap();
	let base = reg.get(pool).unwrap().base();

	assert!(reg.deallocate(pool, base + 500).is_err());

	reg.allocate(pool, 100).unwrap();
	reg.deallocate(pool, base).unwrap();
	assert!(reg.deallocate(pool, base).is_err());
}

#[test]
fn allocate_deallocate_round_trip_restores_a_single_whole_pool_gap() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::BestFit).unwrap();

	let addrs: Vec<_> = [50, 200, 10, 700, 40]
		.into_iter()
		.map(|size| reg.allocate(pool, size).unwrap())
		.collect();

	for addr in addrs {
		reg.deallocate(pool, addr).unwrap();
	}

	assert_eq!(reg.inspect(pool).unwrap(), vec![(1000, false)]);
	reg.pool_close(pool).unwrap();
}

#[test]
fn segment_slot_array_grows_past_its_initial_capacity() {
	let mut reg = Registry::init(GrowthPolicy::default());
	let pool = reg.pool_open(1_000_000, Policy::FirstFit).unwrap();

	// Split 60 times; the default 40-slot segment array must grow at least
	// once past its 0.75 fill factor without any allocation failing.
	let addrs: Vec<_> = (0..60)
		.map(|_| reg.allocate(pool, 1000).unwrap())
		.collect();
	assert_eq!(addrs.len(), 60);

	for addr in addrs {
		reg.deallocate(pool, addr).unwrap();
	}
	assert_eq!(reg.get(pool).unwrap().num_gaps(), 1);
}

#[test]
fn registry_lifecycle_gates_on_live_pools() {
	let mut reg = registry();
	let pool = reg.pool_open(1000, Policy::FirstFit).unwrap();
	assert!(reg.pool_close(pool).is_ok());
}
