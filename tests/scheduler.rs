//! End-to-end scheduling scenarios driving the facade the way the console
//! does: real dispatcher, worker, generator and idle-sampler threads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use csopesy::config::{Config, SchedulerPolicy};
use csopesy::process::Process;
use csopesy::scheduler::{Scheduler, SchedulerPaths};

fn config(policy: SchedulerPolicy, num_cpu: usize, max_mem: u64, frame: u64) -> Config {
    Config {
        num_cpu,
        scheduler: policy,
        quantum_cycles: 2,
        batch_process_freq: 1,
        min_ins: 1,
        max_ins: 1,
        delay_per_exec: 50,
        max_overall_mem: max_mem,
        mem_per_frame: frame,
        min_mem_per_proc: 64,
        max_mem_per_proc: 64,
    }
}

fn scheduler_in(dir: &tempfile::TempDir, config: &Config) -> Scheduler {
    let paths = SchedulerPaths {
        backing_store: dir.path().join("backing-store.txt"),
        report: dir.path().join("csopesy-log.txt"),
        stamp_dir: dir.path().join("memory"),
    };
    Scheduler::with_paths(config, paths)
}

/// Poll `predicate` every few milliseconds until it holds or `timeout`
/// elapses.
fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

fn all_finished(processes: &[Arc<Process>]) -> bool {
    processes.iter().all(|p| p.is_finished())
}

#[test]
fn fcfs_single_core_completes_in_enqueue_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = scheduler_in(&dir, &config(SchedulerPolicy::Fcfs, 1, 1024, 1024));

    let a = scheduler.submit_process("a", 3, 64);
    let b = scheduler.submit_process("b", 2, 64);
    let c = scheduler.submit_process("c", 1, 64);
    scheduler.start();

    let jobs = [a, b, c];
    let mut finish_order = Vec::new();
    assert!(wait_until(Duration::from_secs(15), || {
        for p in &jobs {
            if p.is_finished() && !finish_order.contains(&p.pid()) {
                finish_order.push(p.pid());
            }
        }
        finish_order.len() == jobs.len()
    }));
    assert_eq!(finish_order, [1001, 1002, 1003]);

    for p in &jobs {
        assert_eq!(p.command_counter(), p.lines_of_code());
    }
    scheduler.stop();
}

#[test]
fn fcfs_two_cores_flat_memory_balances_paging_counters() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = scheduler_in(&dir, &config(SchedulerPolicy::Fcfs, 2, 1024, 1024));

    let jobs = [
        scheduler.submit_process("p1", 3, 64),
        scheduler.submit_process("p2", 2, 64),
        scheduler.submit_process("p3", 1, 64),
    ];
    scheduler.start();

    assert!(wait_until(Duration::from_secs(15), || all_finished(&jobs)));
    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.cores_available() == 2
    }));

    let memory = scheduler.memory_snapshot();
    assert_eq!(memory.paged_in, 3);
    assert_eq!(memory.paged_out, memory.paged_in);
    assert_eq!(memory.available, memory.max_memory);
    scheduler.stop();
}

#[test]
fn rr_keeps_residency_within_frame_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(SchedulerPolicy::RoundRobin, 2, 64, 16);
    cfg.min_mem_per_proc = 16;
    cfg.max_mem_per_proc = 16;
    let mut scheduler = scheduler_in(&dir, &cfg);

    // Capacity is four single-frame residents; the fifth must wait for an
    // idle resident to appear.
    let jobs: Vec<_> = (0..5)
        .map(|i| scheduler.submit_process(&format!("job{}", i), 4, 16))
        .collect();
    scheduler.start();

    let mut max_residents = 0;
    assert!(wait_until(Duration::from_secs(20), || {
        let snapshot = scheduler.memory_snapshot();
        max_residents = max_residents.max(snapshot.residents.len());
        assert!(snapshot.residents.len() <= 4);
        assert!(snapshot.paged_in >= snapshot.paged_out);
        all_finished(&jobs)
    }));
    assert!(max_residents > 0);

    let memory = scheduler.memory_snapshot();
    assert_eq!(memory.paged_in, memory.paged_out);
    assert!(memory.residents.is_empty());
    scheduler.stop();
}

#[test]
fn rr_eviction_swaps_idle_residents_and_preserves_progress() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(SchedulerPolicy::RoundRobin, 1, 32, 16);
    cfg.min_mem_per_proc = 32;
    cfg.max_mem_per_proc = 32;
    let mut scheduler = scheduler_in(&dir, &cfg);

    // Memory holds exactly one resident, so every dispatch of the other
    // process evicts the idle one.
    let first = scheduler.submit_process("first", 4, 32);
    let second = scheduler.submit_process("second", 4, 32);
    scheduler.start();

    assert!(wait_until(Duration::from_secs(20), || {
        first.is_finished() && second.is_finished()
    }));
    assert_eq!(first.command_counter(), 4);
    assert_eq!(second.command_counter(), 4);

    let text = std::fs::read_to_string(dir.path().join("backing-store.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.len() >= 2, "both processes were evicted at least once");
    // The first eviction archives "first" after its opening slice.
    assert!(lines[0].starts_with("first 1001 2 / 4 ("));
    scheduler.stop();
}

#[test]
fn rr_slice_boundaries_write_memory_stamps() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = scheduler_in(&dir, &config(SchedulerPolicy::RoundRobin, 1, 1024, 1024));

    let job = scheduler.submit_process("stamped", 2, 64);
    scheduler.start();
    assert!(wait_until(Duration::from_secs(15), || job.is_finished()));
    scheduler.stop();

    let stamps: Vec<_> = std::fs::read_dir(dir.path().join("memory"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(!stamps.is_empty());
    assert!(stamps.iter().all(|name| name.starts_with("memory_stamp_")));
}

#[test]
fn oversized_process_rotates_without_starving_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let mut scheduler = scheduler_in(&dir, &config(SchedulerPolicy::Fcfs, 1, 64, 64));

    // 128 KB can never fit in 64 KB of memory; the head rotation must let
    // the admissible process through.
    let big = scheduler.submit_process("big", 2, 128);
    let small = scheduler.submit_process("small", 2, 64);
    scheduler.start();

    assert!(wait_until(Duration::from_secs(15), || small.is_finished()));
    assert!(!big.is_finished());
    assert!(!scheduler
        .memory_snapshot()
        .residents
        .iter()
        .any(|r| r.pid == big.pid()));
    scheduler.stop();
}

#[test]
fn generator_enqueues_batches_on_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(SchedulerPolicy::Fcfs, 1, 16384, 16384);
    cfg.batch_process_freq = 3;
    cfg.delay_per_exec = 100;
    let mut scheduler = scheduler_in(&dir, &cfg);

    scheduler.start();
    scheduler.begin_generation();
    std::thread::sleep(Duration::from_secs(1));
    scheduler.end_generation();

    // ~10 generator ticks of 3 processes each, with generous slack for
    // scheduler jitter.
    let produced = scheduler.processes().len();
    assert!(
        (21..=39).contains(&produced),
        "expected about 30 generated processes, got {}",
        produced
    );

    let pids: Vec<_> = scheduler.processes().iter().map(|p| p.pid()).collect();
    assert_eq!(pids[0], 1001);
    assert!(pids.windows(2).all(|w| w[1] == w[0] + 1));
    scheduler.stop();
}

#[test]
fn clean_shutdown_freezes_the_reporting_surface() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(SchedulerPolicy::RoundRobin, 2, 256, 16);
    let mut scheduler = scheduler_in(&dir, &cfg);

    scheduler.start();
    scheduler.begin_generation();
    std::thread::sleep(Duration::from_millis(300));
    scheduler.end_generation();
    scheduler.stop();

    let first = scheduler.vmstat();
    std::thread::sleep(Duration::from_millis(50));
    let second = scheduler.vmstat();
    assert_eq!(first, second, "post-mortem snapshots must not move");

    // A second stop is a no-op.
    scheduler.stop();
    assert_eq!(scheduler.vmstat(), second);
}
