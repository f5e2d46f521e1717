use atmega_runtime::rtos::{Alarm, AlarmListener, Clock, Duration, Scheduler, TickRate, Timestamp};
use atmega_runtime::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Records the clock reading each time it fires.
struct Recorder<'c> {
    clock: &'c Clock,
    fired_at: Mutex<Vec<Timestamp>>,
    due: Mutex<Vec<Timestamp>>,
}

impl<'c> Recorder<'c> {
    fn new(clock: &'c Clock) -> Self {
        Self {
            clock,
            fired_at: Mutex::new(Vec::new()),
            due: Mutex::new(Vec::new()),
        }
    }

    fn fired_at(&self) -> Vec<u32> {
        self.fired_at.lock().unwrap().iter().map(|t| t.ticks()).collect()
    }

    fn due(&self) -> Vec<u32> {
        self.due.lock().unwrap().iter().map(|t| t.ticks()).collect()
    }
}

impl AlarmListener for Recorder<'_> {
    fn alarm(&self, alarm: &Alarm) {
        self.fired_at.lock().unwrap().push(self.clock.current());
        self.due.lock().unwrap().push(alarm.when());
    }
}

fn run_ticks<const N: usize>(clock: &Clock, scheduler: &Scheduler<'_, N>, ticks: u32) {
    for _ in 0..ticks {
        clock.tick();
        scheduler.handle_events();
    }
}

#[test]
fn alarm_fires_at_first_tick_not_before_due() {
    let clock = Clock::new(TickRate::new(1000));
    for delay in [1u32, 2, 7, 50] {
        let recorder = Recorder::new(&clock);
        let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
        let start = clock.current();

        scheduler.add_alarm(&recorder, Duration::from_ticks(delay)).unwrap();
        run_ticks(&clock, &scheduler, delay - 1);
        assert!(recorder.fired_at().is_empty(), "delay {delay} fired early");
        run_ticks(&clock, &scheduler, 1);
        assert_eq!(recorder.fired_at(), vec![start.ticks() + delay]);
    }
}

#[test]
fn repeating_alarm_does_not_drift() {
    let clock = Clock::new(TickRate::new(1000));
    let recorder = Recorder::new(&clock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let interval = 7;

    scheduler
        .add_repeating_alarm(&recorder, Duration::from_ticks(interval), Duration::from_ticks(interval))
        .unwrap();

    // Poll irregularly: sometimes every tick, sometimes with gaps shorter
    // than the interval.
    let mut elapsed = 0;
    for (i, gap) in [1u32, 3, 5, 2, 6, 1, 4].iter().cycle().enumerate() {
        if i >= 200 {
            break;
        }
        for _ in 0..*gap {
            clock.tick();
        }
        elapsed += gap;
        scheduler.handle_events();
    }

    let due = recorder.due();
    assert_eq!(due.len() as u32, elapsed / interval);
    for (n, when) in due.iter().enumerate() {
        assert_eq!(*when, interval * (n as u32 + 1));
    }
    // each firing happened no earlier than its due time and within one gap
    for (fired, when) in recorder.fired_at().iter().zip(due.iter()) {
        assert!(fired >= when && fired - when < 6);
    }
}

#[test]
fn fifth_alarm_exceeds_capacity_of_four() {
    let clock = Clock::new(TickRate::new(1000));
    let recorders: Vec<Recorder> = (0..5).map(|_| Recorder::new(&clock)).collect();
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

    for (i, recorder) in recorders.iter().take(4).enumerate() {
        scheduler
            .add_alarm(recorder, Duration::from_ticks(10 * (i as u32 + 1)))
            .unwrap();
    }
    assert_eq!(
        scheduler.add_alarm(&recorders[4], Duration::from_ticks(5)),
        Err(Error::CapacityExceeded)
    );
    assert_eq!(scheduler.pending(), 4);

    run_ticks(&clock, &scheduler, 40);
    for (i, recorder) in recorders.iter().take(4).enumerate() {
        assert_eq!(recorder.fired_at(), vec![10 * (i as u32 + 1)]);
    }
    assert!(recorders[4].fired_at().is_empty());
}

#[test]
fn alarm_due_before_wrap_fires_once() {
    let start = Timestamp::from_ticks(u32::MAX - 20);
    let clock = Clock::starting_at(TickRate::new(1000), start);
    let recorder = Recorder::new(&clock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

    // due 10 ticks before the counter wraps
    scheduler.add_alarm(&recorder, Duration::from_ticks(10)).unwrap();
    run_ticks(&clock, &scheduler, 40);
    assert_eq!(recorder.fired_at(), vec![u32::MAX - 10]);
}

#[test]
fn alarm_due_after_wrap_fires_at_correct_tick() {
    let start = Timestamp::from_ticks(u32::MAX - 9);
    let clock = Clock::starting_at(TickRate::new(1000), start);
    let recorder = Recorder::new(&clock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

    // armed 10 ticks before the wrap, due 5 ticks after it
    scheduler.add_alarm(&recorder, Duration::from_ticks(15)).unwrap();
    run_ticks(&clock, &scheduler, 14);
    assert!(recorder.fired_at().is_empty());
    run_ticks(&clock, &scheduler, 20);
    assert_eq!(recorder.fired_at(), vec![5]);
}

#[test]
fn repeating_alarm_across_wrap() {
    let clock = Clock::starting_at(TickRate::new(1000), Timestamp::from_ticks(u32::MAX - 12));
    let recorder = Recorder::new(&clock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

    scheduler
        .add_repeating_alarm(&recorder, Duration::from_ticks(5), Duration::from_ticks(5))
        .unwrap();
    run_ticks(&clock, &scheduler, 20);
    assert_eq!(
        recorder.fired_at(),
        vec![u32::MAX - 7, u32::MAX - 2, 2, 7]
    );
}

/// Removes another listener's alarm and re-arms itself from its callback.
struct Meddler<'a, 's> {
    scheduler: &'s Scheduler<'a, 4>,
    victim: &'a dyn AlarmListener,
    calls: Mutex<u32>,
}

impl AlarmListener for Meddler<'_, '_> {
    fn alarm(&self, _alarm: &Alarm) {
        *self.calls.lock().unwrap() += 1;
        self.scheduler.remove_alarm(self.victim);
    }
}

#[test]
fn listener_may_remove_later_alarm_during_pass() {
    let clock = Clock::new(TickRate::new(1000));
    let victim = Recorder::new(&clock);
    let bystander = Recorder::new(&clock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
    let meddler = Meddler {
        scheduler: &scheduler,
        victim: &victim,
        calls: Mutex::new(0),
    };

    // meddler in slot 0, victim in slot 1, bystander in slot 2, all due together
    scheduler.add_alarm(&meddler, Duration::from_ticks(3)).unwrap();
    scheduler.add_alarm(&victim, Duration::from_ticks(3)).unwrap();
    scheduler.add_alarm(&bystander, Duration::from_ticks(3)).unwrap();
    run_ticks(&clock, &scheduler, 5);

    assert_eq!(*meddler.calls.lock().unwrap(), 1);
    assert!(victim.fired_at().is_empty());
    assert_eq!(bystander.fired_at(), vec![3]);
    assert_eq!(scheduler.pending(), 0);
}

static TICK_FIRED: AtomicU32 = AtomicU32::new(0);
static TOCK_FIRED: AtomicU32 = AtomicU32::new(0);

struct Tick;
struct Tock;

impl AlarmListener for Tick {
    fn alarm(&self, _alarm: &Alarm) {
        TICK_FIRED.fetch_add(1, Ordering::SeqCst);
    }
}

impl AlarmListener for Tock {
    fn alarm(&self, _alarm: &Alarm) {
        TOCK_FIRED.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn unit_struct_listeners_keep_their_own_alarms() {
    let clock = Clock::new(TickRate::new(1000));
    let (tick, tock) = (Tick, Tock);
    let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);

    scheduler.add_alarm(&tick, Duration::from_ticks(2)).unwrap();
    scheduler.add_alarm(&tock, Duration::from_ticks(2)).unwrap();
    assert!(scheduler.remove_alarm(&tock));
    assert!(scheduler.is_armed(&tick));
    assert!(!scheduler.is_armed(&tock));
    assert!(!scheduler.remove_alarm(&tock));

    run_ticks(&clock, &scheduler, 5);
    assert_eq!(TICK_FIRED.load(Ordering::SeqCst), 1);
    assert_eq!(TOCK_FIRED.load(Ordering::SeqCst), 0);
}
