// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use super::testing::{boot, boot_with, Journal, TestScheduler};
use super::*;
use crate::kernel::arch::amd64::fpu::{read_fcw, write_fcw, FCW_DEFAULT};
use crate::kernel::arch::Hosted;
use crate::kernel::pmm::HeapPages;
use crate::kernel::thread::{PRIORITY_MAX, THREAD_PAGES};

fn fifo() -> SchedConfig {
    SchedConfig::with_policy(SchedPolicy::Fifo)
}

fn prio() -> SchedConfig {
    SchedConfig::with_policy(SchedPolicy::Priority)
}

/// Long enough that no test thread is preempted by accident
fn no_preemption(policy: SchedPolicy) -> SchedConfig {
    SchedConfig {
        policy,
        time_slice: 1000,
    }
}

/// Thread id of the idle thread
fn idle_thread(sched: &'static TestScheduler) -> ThreadId {
    let _irq = IrqSave::new(sched.arch());
    let mut idle = None;
    sched.for_each_thread(|info| {
        if info.name.as_str() == "idle" {
            idle = Some(info.tid);
        }
    });
    idle.unwrap()
}

/// Spawn a thread that logs `event` and signals `done`
fn spawn_logger(
    sched: &'static TestScheduler,
    name: &str,
    priority: ThreadPriority,
    event: u64,
    journal: &Journal,
    done: &Arc<Semaphore>,
) -> ThreadId {
    let (j, d) = (journal.clone(), done.clone());
    sched
        .spawn(name, priority, move || {
            j.push(event);
            d.up(sched);
        })
        .unwrap()
}

#[test]
fn test_init_adopts_boot_thread() {
    let sched = boot(fifo());

    let main = sched.current_thread_id();
    assert_eq!(sched.thread_name().as_str(), "main");
    assert_eq!(sched.thread_status(main), Some(ThreadState::Running));
    assert_eq!(sched.get_priority(), PRIORITY_DEFAULT);
    assert_eq!(sched.policy(), SchedPolicy::Fifo);

    // main and idle
    assert_eq!(sched.thread_count(), 2);
    assert!(sched.find_by_name("idle"));
    assert!(sched.ready_threads().is_empty());
    assert!(sched.arch().interrupts_enabled());
}

#[test]
fn test_fifo_runs_in_creation_order() {
    let sched = boot(fifo());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    for priority in [10, 50, 30] {
        spawn_logger(sched, "t", priority, priority as u64, &journal, &done);
    }
    assert_eq!(sched.ready_threads().len(), 3);

    for _ in 0..3 {
        done.down(sched);
    }
    assert_eq!(journal.take(), [10, 50, 30]);
}

#[test]
fn test_priority_order_and_preemption_on_create() {
    let sched = boot(prio());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    for priority in [10, 20, 30] {
        spawn_logger(sched, "low", priority, priority as u64, &journal, &done);
    }
    let queued: Vec<u8> = sched
        .ready_threads()
        .into_iter()
        .map(|tid| sched.effective_priority(tid))
        .collect();
    assert_eq!(queued, [30, 20, 10]);

    // Outranks main: runs before create returns.
    spawn_logger(sched, "high", 40, 40, &journal, &done);
    journal.push(0);

    for _ in 0..4 {
        done.down(sched);
    }
    assert_eq!(journal.take(), [40, 0, 30, 20, 10]);
}

#[test]
fn test_creator_preempted_by_higher_priority() {
    let sched = boot(prio());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    sched.set_priority(2).unwrap();
    for priority in [1, 5, 3] {
        spawn_logger(sched, "t", priority, priority as u64, &journal, &done);
    }
    journal.push(2);

    for _ in 0..3 {
        done.down(sched);
    }
    assert_eq!(journal.take(), [5, 3, 2, 1]);
}

#[test]
fn test_equal_priority_does_not_preempt() {
    let sched = boot(prio());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    spawn_logger(sched, "peer", PRIORITY_DEFAULT, 1, &journal, &done);
    journal.push(0);
    done.down(sched);
    assert_eq!(journal.take(), [0, 1]);
}

#[test]
fn test_yield_keeps_thread_ready() {
    let sched = boot(fifo());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let (j, d) = (journal.clone(), done.clone());
    let tid = sched
        .spawn("yielder", PRIORITY_DEFAULT, move || {
            j.push(1);
            sched.yield_now();
            j.push(3);
            d.up(sched);
        })
        .unwrap();

    sched.yield_now();
    journal.push(2);
    assert_eq!(sched.thread_status(tid), Some(ThreadState::Ready));

    done.down(sched);
    assert_eq!(journal.take(), [1, 2, 3]);
    assert!(sched.stats().yields >= 2);
}

#[test]
fn test_sleep_wakes_at_deadline() {
    let sched = boot(no_preemption(SchedPolicy::Fifo));
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let (j, d) = (journal.clone(), done.clone());
    let tid = sched
        .spawn("sleeper", PRIORITY_DEFAULT, move || {
            sched.sleep(10);
            j.push(sched.ticks());
            d.up(sched);
        })
        .unwrap();

    while sched.ticks() < 100 {
        sched.timer_interrupt();
    }
    sched.yield_now();
    let start = sched.ticks();
    assert_eq!(start, 100);
    let info = sched.thread_info(tid).unwrap();
    assert_eq!(info.status, ThreadState::Sleeping);
    assert_eq!(info.wake_time, 110);

    // Ticks 101..=109: still asleep, never queued.
    for _ in 0..9 {
        sched.timer_interrupt();
        assert_eq!(sched.thread_status(tid), Some(ThreadState::Sleeping));
        assert!(sched.ready_threads().is_empty());
    }
    sched.timer_interrupt();
    assert_eq!(sched.ticks(), 110);
    assert_eq!(sched.thread_status(tid), Some(ThreadState::Ready));
    assert_eq!(sched.ready_threads(), [tid]);

    done.down(sched);
    assert_eq!(journal.take(), [110]);
    assert_eq!(sched.stats().kernel_ticks, 110);
}

#[test]
fn test_idle_drives_time_for_sleepers() {
    let sched = boot(no_preemption(SchedPolicy::Fifo));
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));
    let start = sched.ticks();

    for ticks in [20i64, 5] {
        let (j, d) = (journal.clone(), done.clone());
        sched
            .spawn("sleeper", PRIORITY_DEFAULT, move || {
                sched.sleep(ticks);
                j.push(sched.ticks() - start);
                d.up(sched);
            })
            .unwrap();
    }

    done.down(sched);
    done.down(sched);
    assert_eq!(journal.take(), [5, 20]);

    let stats = sched.stats();
    assert_eq!(stats.idle_ticks, 20);
    assert_eq!(stats.kernel_ticks, 0);
    sched.print_stats();
}

#[test]
fn test_idle_is_never_queued() {
    let sched = boot(SchedConfig {
        policy: SchedPolicy::Fifo,
        time_slice: 1,
    });
    let idle = idle_thread(sched);
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let (j, d) = (journal.clone(), done.clone());
    sched
        .spawn("sleeper", PRIORITY_DEFAULT, move || {
            sched.sleep(5);
            j.push(sched.ready_threads().contains(&idle) as u64);
            d.up(sched);
        })
        .unwrap();

    // Every tick while idle runs ends its slice.
    done.down(sched);
    assert_eq!(journal.take(), [0]);
    assert!(!sched.ready_threads().contains(&idle));

    let stats = sched.stats();
    assert_eq!(stats.idle_ticks, 5);
    assert!(stats.preemptions >= 5);
}

#[test]
fn test_idle_thread_does_not_sleep_or_queue_itself() {
    let sched: &'static TestScheduler = Box::leak(Box::new(Scheduler::new(Hosted::new())));
    let pages: &'static HeapPages = Box::leak(Box::new(HeapPages::new()));
    sched.init(fifo(), pages);
    let main = sched.current_thread_id();
    sched.state.lock().idle = Some(main);
    sched.arch().enable_interrupts();

    sched.sleep(5);
    assert_eq!(sched.thread_status(main), Some(ThreadState::Running));
    assert_eq!(sched.stats().schedules, 0);

    sched.yield_now();
    assert_eq!(sched.thread_status(main), Some(ThreadState::Running));
    assert!(sched.ready_threads().is_empty());
    let stats = sched.stats();
    assert_eq!((stats.yields, stats.schedules), (1, 1));
}

#[test]
fn test_sleep_non_positive_returns_immediately() {
    let sched = boot(fifo());
    let before = sched.stats().schedules;

    sched.sleep(0);
    sched.sleep(-5);

    assert_eq!(sched.stats().schedules, before);
    let main = sched.current_thread_id();
    assert_eq!(sched.thread_status(main), Some(ThreadState::Running));
}

#[test]
fn test_time_slice_preempts() {
    let sched = boot(SchedConfig {
        policy: SchedPolicy::Fifo,
        time_slice: 2,
    });
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    for id in [1u64, 2] {
        let (j, d) = (journal.clone(), done.clone());
        sched
            .spawn("spinner", PRIORITY_DEFAULT, move || {
                j.push(id);
                sched.timer_interrupt();
                sched.timer_interrupt();
                j.push(id);
                d.up(sched);
            })
            .unwrap();
    }

    done.down(sched);
    done.down(sched);
    assert_eq!(journal.take(), [1, 2, 1, 2]);
    assert_eq!(sched.stats().preemptions, 2);
}

#[test]
fn test_unblock_from_interrupt_with_yield_on_return() {
    let sched = boot(fifo());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let (j, d) = (journal.clone(), done.clone());
    let tid = sched
        .spawn("waiter", PRIORITY_DEFAULT, move || {
            let irq = IrqSave::new(sched.arch());
            sched.block();
            drop(irq);
            j.push(1);
            d.up(sched);
        })
        .unwrap();

    sched.yield_now();
    assert_eq!(sched.thread_status(tid), Some(ThreadState::Blocked));

    sched.interrupt_context(|| {
        assert!(sched.in_interrupt());
        sched.unblock(tid);
        sched.yield_on_return();
    });
    assert!(!sched.in_interrupt());
    journal.push(2);

    done.down(sched);
    assert_eq!(journal.take(), [1, 2]);
}

#[test]
fn test_fpu_state_is_per_thread() {
    let sched = boot(fifo());
    let main_fcw = read_fcw();
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let (j, d) = (journal.clone(), done.clone());
    sched
        .spawn("fpu", PRIORITY_DEFAULT, move || {
            j.push(read_fcw() as u64);
            // Round toward zero.
            write_fcw(0x0f7f);
            sched.yield_now();
            j.push(read_fcw() as u64);
            d.up(sched);
        })
        .unwrap();

    sched.yield_now();
    assert_eq!(read_fcw(), main_fcw);

    done.down(sched);
    assert_eq!(journal.take(), [FCW_DEFAULT as u64, 0x0f7f]);
    assert_eq!(read_fcw(), main_fcw);
}

#[test]
fn test_set_priority_yields_to_higher() {
    let sched = boot(prio());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    spawn_logger(sched, "mid", 20, 20, &journal, &done);
    sched.set_priority(10).unwrap();
    journal.push(10);

    assert_eq!(sched.get_priority(), 10);
    done.down(sched);
    assert_eq!(journal.take(), [20, 10]);
}

#[test]
fn test_set_priority_under_donation() {
    let sched = boot(prio());
    let main = sched.current_thread_id();

    sched.force_effective_priority(main, 50);
    sched.set_priority(20).unwrap();
    let info = sched.thread_info(main).unwrap();
    assert_eq!((info.priority, info.base_priority), (50, 20));

    // A base above the donated level raises the effective priority too.
    sched.set_priority(60).unwrap();
    let info = sched.thread_info(main).unwrap();
    assert_eq!((info.priority, info.base_priority), (60, 60));

    sched.set_priority(5).unwrap();
    assert_eq!(sched.get_priority(), 5);
}

#[test]
fn test_invalid_priority_rejected() {
    let sched = boot(fifo());
    assert_eq!(sched.set_priority(PRIORITY_MAX + 1), Err(Error::InvalidArgs));
    assert_eq!(
        sched.spawn("bad", PRIORITY_MAX + 1, || {}),
        Err(Error::InvalidArgs)
    );
    assert_eq!(sched.get_priority(), PRIORITY_DEFAULT);
    assert_eq!(sched.thread_count(), 2);
}

#[test]
fn test_exit_reclaims_block() {
    let pages: &'static HeapPages = Box::leak(Box::new(HeapPages::new()));
    let sched = boot_with(fifo(), pages);
    let baseline = pages.pages_in_use();
    assert_eq!(baseline, 2 * THREAD_PAGES);

    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));
    let tid = spawn_logger(sched, "worker", PRIORITY_DEFAULT, 1, &journal, &done);
    assert_eq!(pages.pages_in_use(), baseline + THREAD_PAGES);

    done.down(sched);
    // The worker ran `exit` and main reclaimed it on the way back in.
    assert_eq!(pages.pages_in_use(), baseline);
    assert_eq!(pages.free_count(), 1);
    assert_eq!(sched.thread_status(tid), None);
    assert!(!sched.find_by_name("worker"));
    assert_eq!(sched.thread_count(), 2);
}

#[test]
fn test_create_out_of_memory() {
    let pages: &'static HeapPages = Box::leak(Box::new(HeapPages::with_limit(3 * THREAD_PAGES)));
    let sched = boot_with(fifo(), pages);
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    let first = spawn_logger(sched, "first", PRIORITY_DEFAULT, 1, &journal, &done);

    let token = Arc::new(());
    let held = token.clone();
    let result = sched.spawn("second", PRIORITY_DEFAULT, move || drop(held));
    assert_eq!(result, Err(Error::NoMemory));
    assert_eq!(Arc::strong_count(&token), 1);
    assert_eq!(sched.thread_count(), 3);

    // Free `first`; the failed attempt consumed no identifier.
    done.down(sched);
    let third = spawn_logger(sched, "third", PRIORITY_DEFAULT, 3, &journal, &done);
    assert_eq!(third, first + 1);
    done.down(sched);
    assert_eq!(journal.take(), [1, 3]);
}

struct RecordingHooks {
    activations: AtomicUsize,
    released: Mutex<Vec<(ThreadId, Option<ProcessId>)>>,
}

impl ProcessHooks for RecordingHooks {
    fn activate(&self, _tid: ThreadId, _process: Option<ProcessId>) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self, tid: ThreadId, process: Option<ProcessId>) {
        self.released.lock().push((tid, process));
    }
}

#[test]
fn test_process_hooks_and_user_ticks() {
    let sched = boot(fifo());
    let hooks: &'static RecordingHooks = Box::leak(Box::new(RecordingHooks {
        activations: AtomicUsize::new(0),
        released: Mutex::new(Vec::new()),
    }));
    sched.set_process_hooks(hooks);

    let done = Arc::new(Semaphore::new(0));
    let d = done.clone();
    let tid = sched
        .spawn("user", PRIORITY_DEFAULT, move || {
            sched.timer_interrupt();
            d.up(sched);
        })
        .unwrap();
    sched.attach_process(tid, 7).unwrap();
    sched.attach_process(tid, 7).unwrap();
    assert_eq!(sched.attach_process(tid, 8), Err(Error::BadState));
    assert_eq!(sched.attach_process(9999, 1), Err(Error::NotFound));

    done.down(sched);
    assert_eq!(*hooks.released.lock(), [(tid, Some(7))]);
    assert!(hooks.activations.load(Ordering::Relaxed) >= 2);
    assert_eq!(sched.stats().user_ticks, 1);
}

#[test]
fn test_mlfqs_accessors_report_zero() {
    let sched = boot(fifo());
    assert_eq!(sched.set_nice(5), Err(Error::NotSupported));
    assert_eq!(sched.nice(), 0);
    assert_eq!(sched.load_avg(), 0);
    assert_eq!(sched.recent_cpu(), 0);
}

std::thread_local! {
    static LOG_OBSERVER: Cell<Option<&'static TestScheduler>> = const { Cell::new(None) };
}

static OBSERVED_RECORDS: AtomicUsize = AtomicUsize::new(0);

/// Logger that asks the observed scheduler for the running thread
struct QueryingLogger;

impl log::Log for QueryingLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, _: &log::Record) {
        if let Some(sched) = LOG_OBSERVER.with(Cell::get) {
            sched.current_thread_id();
            OBSERVED_RECORDS.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn flush(&self) {}
}

static QUERYING_LOGGER: QueryingLogger = QueryingLogger;

#[test]
fn test_logger_may_query_scheduler() {
    let _ = log::set_logger(&QUERYING_LOGGER);
    log::set_max_level(log::LevelFilter::Trace);

    let sched = boot(no_preemption(SchedPolicy::Fifo));
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));
    let before = OBSERVED_RECORDS.load(Ordering::Relaxed);
    LOG_OBSERVER.with(|observer| observer.set(Some(sched)));

    let (j, d) = (journal.clone(), done.clone());
    let tid = sched
        .spawn("sleeper", PRIORITY_DEFAULT, move || {
            sched.sleep(1);
            j.push(sched.current_thread_id());
            d.up(sched);
        })
        .unwrap();

    // Switch, wake-up, exit and reclaim are all logged.
    sched.yield_now();
    sched.timer_interrupt();
    done.down(sched);
    sched.yield_now();

    LOG_OBSERVER.with(|observer| observer.set(None));
    assert_eq!(journal.take(), [tid]);
    assert!(OBSERVED_RECORDS.load(Ordering::Relaxed) > before);
    assert_eq!(sched.thread_status(tid), None);
}

#[test]
fn test_exactly_one_running_thread() {
    let sched = boot(fifo());
    let journal = Journal::new();
    let done = Arc::new(Semaphore::new(0));

    for _ in 0..3 {
        let (j, d) = (journal.clone(), done.clone());
        sched
            .spawn("counter", PRIORITY_DEFAULT, move || {
                let irq = IrqSave::new(sched.arch());
                let me = sched.current_thread_id();
                let mut running = 0;
                sched.for_each_thread(|info| {
                    if info.status == ThreadState::Running {
                        running += 1;
                        assert_eq!(info.tid, me);
                    }
                });
                drop(irq);
                j.push(running);
                d.up(sched);
            })
            .unwrap();
    }

    for _ in 0..3 {
        done.down(sched);
    }
    assert_eq!(journal.take(), [1, 1, 1]);
}

#[test]
#[should_panic(expected = "corrupted")]
fn test_corrupted_thread_is_fatal() {
    let sched = boot(fifo());
    let tid = sched.spawn("victim", PRIORITY_DEFAULT, || {}).unwrap();
    sched.corrupt_thread(tid);
    sched.unblock(tid);
}

#[test]
#[should_panic(expected = "corrupted")]
fn test_corrupted_sleeper_is_fatal_on_tick() {
    let sched = boot(no_preemption(SchedPolicy::Fifo));
    let tid = sched.spawn("sleeper", PRIORITY_DEFAULT, move || sched.sleep(50)).unwrap();
    sched.yield_now();
    assert_eq!(sched.thread_status(tid), Some(ThreadState::Sleeping));

    sched.corrupt_thread(tid);
    sched.timer_interrupt();
}

#[test]
#[should_panic(expected = "not blocked")]
fn test_unblock_ready_thread_is_fatal() {
    let sched = boot(fifo());
    let tid = sched.spawn("ready", PRIORITY_DEFAULT, || {}).unwrap();
    sched.unblock(tid);
}

#[test]
#[should_panic(expected = "interrupt context")]
fn test_block_in_interrupt_is_fatal() {
    let sched = boot(fifo());
    sched.interrupt_context(|| sched.block());
}

#[test]
#[should_panic(expected = "interrupts enabled")]
fn test_block_with_interrupts_enabled_is_fatal() {
    let sched = boot(fifo());
    sched.block();
}

#[test]
#[should_panic(expected = "nested interrupt context")]
fn test_nested_interrupt_is_fatal() {
    let sched = boot(fifo());
    sched.interrupt_context(|| sched.interrupt_context(|| {}));
}

#[test]
#[should_panic(expected = "outside interrupt context")]
fn test_yield_on_return_outside_interrupt_is_fatal() {
    let sched = boot(fifo());
    sched.yield_on_return();
}

#[test]
#[should_panic(expected = "for_each_thread called with interrupts enabled")]
fn test_for_each_with_interrupts_enabled_is_fatal() {
    let sched = boot(fifo());
    sched.for_each_thread(|_| {});
}

#[test]
#[should_panic(expected = "-sched=mlfqs")]
fn test_init_with_unimplemented_policy_is_fatal() {
    let sched: &'static TestScheduler = Box::leak(Box::new(Scheduler::new(Hosted::new())));
    let pages: &'static HeapPages = Box::leak(Box::new(HeapPages::new()));
    sched.init(SchedConfig::with_policy(SchedPolicy::Mlfqs), pages);
}

#[test]
#[should_panic(expected = "initialised twice")]
fn test_double_init_is_fatal() {
    let sched: &'static TestScheduler = Box::leak(Box::new(Scheduler::new(Hosted::new())));
    let pages: &'static HeapPages = Box::leak(Box::new(HeapPages::new()));
    sched.init(fifo(), pages);
    sched.init(fifo(), pages);
}
