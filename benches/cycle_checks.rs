use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use uuid::Uuid;

use orgchart::invariants::{EmployeeLink, HierarchySnapshot, plan_reparenting};
use orgchart::models::{EmployeeId, OrgId};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

/// A single deep chain: employee i reports to employee i - 1.
fn chain_org(employee_count: usize) -> (HierarchySnapshot, Vec<EmployeeId>, OrgId) {
    let org_id = OrgId(Uuid::from_u128(1));
    let ids = (0..employee_count)
        .map(|idx| EmployeeId(Uuid::from_u128((idx as u128) + 1)))
        .collect::<Vec<_>>();

    let snapshot = HierarchySnapshot::from_links(ids.iter().enumerate().map(|(idx, id)| {
        let manager_id = if idx == 0 { None } else { Some(ids[idx - 1]) };
        (
            *id,
            EmployeeLink {
                org_id,
                manager_id,
            },
        )
    }));

    (snapshot, ids, org_id)
}

/// One root with `fanout` direct reports, each with its own subtree chain.
fn fanout_org(fanout: usize, depth: usize) -> (HierarchySnapshot, EmployeeId) {
    let org_id = OrgId(Uuid::from_u128(2));
    let root = EmployeeId(Uuid::from_u128(1));
    let middle = EmployeeId(Uuid::from_u128(2));
    let mut snapshot = HierarchySnapshot::new();
    snapshot.insert(
        root,
        EmployeeLink {
            org_id,
            manager_id: None,
        },
    );
    snapshot.insert(
        middle,
        EmployeeLink {
            org_id,
            manager_id: Some(root),
        },
    );

    let mut next = 3u128;
    for _ in 0..fanout {
        let mut manager = middle;
        for _ in 0..depth {
            let id = EmployeeId(Uuid::from_u128(next));
            next += 1;
            snapshot.insert(
                id,
                EmployeeLink {
                    org_id,
                    manager_id: Some(manager),
                },
            );
            manager = id;
        }
    }

    (snapshot, middle)
}

fn bench_cycle_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_checks");
    for employee_count in [1_000usize, 10_000usize] {
        let (snapshot, ids, _) = chain_org(employee_count);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("would_create_cycle", format!("{employee_count}_chain")),
            &(snapshot, ids),
            |b, (snapshot, ids)| {
                let mut seed = 42u64;
                b.iter(|| {
                    let employee = ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    let manager = ids[(lcg_next(&mut seed) as usize) % ids.len()];
                    black_box(snapshot.would_create_cycle(employee, manager));
                });
            },
        );
    }
    group.finish();
}

fn bench_reparent_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("reparent_planning");
    for (fanout, depth) in [(100usize, 10usize), (1_000usize, 3usize)] {
        let (snapshot, middle) = fanout_org(fanout, depth);

        group.throughput(Throughput::Elements(fanout as u64));
        group.bench_with_input(
            BenchmarkId::new("plan_reparenting", format!("{fanout}x{depth}")),
            &(snapshot, middle),
            |b, (snapshot, middle)| {
                b.iter(|| {
                    black_box(
                        plan_reparenting(snapshot, *middle)
                            .expect("synthetic forest should reparent cleanly"),
                    );
                });
            },
        );
    }
    group.finish();
}

criterion_group!(cycle_checks, bench_cycle_checks, bench_reparent_planning);
criterion_main!(cycle_checks);
