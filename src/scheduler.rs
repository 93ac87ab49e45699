//! Turns elapsed host time into CPU cycles, timer decrements and display
//! frames.
//!
//! Time is kept as a running total of nanoseconds. After a total of `T`
//! nanoseconds exactly `T * hz / 10^9` (rounded down) of each event have
//! happened, so the cadence doesn't drift with the host's tick length and
//! the timers run at their own rate whatever the CPU rate is.
//!
//! Within a tick the order is fixed: the keypad snapshot is refreshed, every
//! CPU cycle due runs, then the timers are decremented, then any frame due
//! is reported. Nothing happens mid-instruction.
use std::time::Duration;

use slog::{error, info, o, warn, Logger};

use crate::config::{Config, FaultPolicy};
use crate::error::Error;
use crate::keyboard::AsKeyboard;
use crate::{logging, Cycle, Emulator};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// What happened during one [`Scheduler::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Instructions actually stepped, including key-wait retries.
    pub cycles: u64,
    pub timer_ticks: u32,
    /// Frames due. Non-zero means the host should redraw from
    /// [`Emulator::graphics`].
    pub frames: u32,
    /// Faults tolerated under [`FaultPolicy::Permissive`].
    pub faults: u32,
    /// A clear or draw ran, so the pixel buffer may differ from the last
    /// frame.
    pub display_changed: bool,
    /// The program has parked itself on a self-jump.
    pub halted: bool,
    /// The sound timer is non-zero after this tick.
    pub sound_active: bool,
}

pub struct Scheduler {
    cpu_hz: u128,
    timer_hz: u128,
    display_hz: u128,
    policy: FaultPolicy,

    elapsed_ns: u128,
    cycles: u128,
    timer_ticks: u128,
    frames: u128,
    halted: bool,

    logger: Logger,
}

impl Scheduler {
    pub fn new(config: &Config, logger: Option<Logger>) -> Self {
        let logger = logger
            .unwrap_or_else(logging::discard_logger)
            .new(o!("component" => "scheduler"));

        Scheduler {
            cpu_hz: config.cpu_hz as u128,
            timer_hz: config.timer_hz as u128,
            display_hz: config.display_hz as u128,
            policy: config.fault_policy,
            elapsed_ns: 0,
            cycles: 0,
            timer_ticks: 0,
            frames: 0,
            halted: false,
            logger,
        }
    }

    /// Advance the machine by `elapsed` of emulated time.
    ///
    /// A fatal fault stops the tick right after the faulting cycle and is
    /// returned. The time is still counted, so cycles, timer decrements and
    /// frames left over from this tick are caught up by the next one.
    pub fn tick<K: AsKeyboard + ?Sized>(
        &mut self,
        emulator: &mut Emulator,
        elapsed: Duration,
        input: &K,
    ) -> Result<TickReport, Error> {
        let mut report = TickReport::default();
        emulator.handle_key_input(input);

        let target = self.elapsed_ns + elapsed.as_nanos();
        self.elapsed_ns = target;
        self.run_cycles(emulator, due(target, self.cpu_hz), &mut report)?;

        let timer_due = due(target, self.timer_hz);
        while self.timer_ticks < timer_due {
            emulator.decrement_timers();
            self.timer_ticks += 1;
            report.timer_ticks += 1;
        }

        let frames_due = due(target, self.display_hz);
        report.frames = (frames_due - self.frames) as u32;
        self.frames = frames_due;

        report.halted = self.halted;
        report.sound_active = emulator.is_sound_active();
        Ok(report)
    }

    fn run_cycles(
        &mut self,
        emulator: &mut Emulator,
        cycles_due: u128,
        report: &mut TickReport,
    ) -> Result<(), Error> {
        while self.cycles < cycles_due {
            if self.halted {
                // nothing can move the program counter off a self-jump
                self.cycles = cycles_due;
                break;
            }
            self.cycles += 1;
            report.cycles += 1;

            let pc = emulator.pc();
            match emulator.step() {
                Ok(Cycle::Halted) => {
                    info!(self.logger, "program halted"; "pc" => format!("{:#05x}", pc));
                    self.halted = true;
                }
                Ok(Cycle::Executed(op)) if op.is_display_op() => report.display_changed = true,
                Ok(_) => {}
                Err(e) if e.is_fatal(self.policy) => {
                    error!(self.logger, "fatal fault"; "pc" => format!("{:#05x}", pc), "error" => %e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(self.logger, "fault ignored"; "pc" => format!("{:#05x}", pc), "error" => %e);
                    report.faults += 1;
                }
            }
        }
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.min(u64::MAX as u128) as u64)
    }

    pub fn total_cycles(&self) -> u128 {
        self.cycles
    }

    pub fn total_timer_ticks(&self) -> u128 {
        self.timer_ticks
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

/// Events of a `hz` clock that have happened by `ns`.
fn due(ns: u128, hz: u128) -> u128 {
    ns * hz / NANOS_PER_SEC
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{Key, NoKeys};

    /// Length of tick `k` (1-based) when a second is split into `n` ticks
    /// whose boundaries are rounded up, so the ticks sum to exactly 1s.
    fn nth_slice(k: u64, n: u64) -> Duration {
        let boundary = |i: u64| (i * 1_000_000_000 + n - 1) / n;
        Duration::from_nanos(boundary(k) - boundary(k - 1))
    }

    fn config(cpu_hz: u32, policy: FaultPolicy) -> Config {
        Config {
            cpu_hz,
            fault_policy: policy,
            seed: Some(7),
            ..Config::default()
        }
    }

    fn emulator_with(program: &[u8]) -> Emulator {
        let mut emulator = Emulator::with_seed(7, None);
        emulator.load_program(program).unwrap();
        emulator
    }

    // 0x200: JP 0x202, 0x202: JP 0x200
    const SPIN: [u8; 4] = [0x12, 0x02, 0x12, 0x00];

    #[test]
    fn timers_run_down_in_one_second_at_any_cpu_rate() {
        for cpu_hz in [60, 500, 540, 1000] {
            let mut emulator = emulator_with(&SPIN);
            emulator.delay_timer = 60;
            emulator.sound_timer = 60;
            let mut scheduler = Scheduler::new(&config(cpu_hz, FaultPolicy::Strict), None);

            for k in 1..=60 {
                let report = scheduler
                    .tick(&mut emulator, nth_slice(k, 60), &NoKeys)
                    .unwrap();
                assert_eq!(report.timer_ticks, 1, "cpu_hz {} tick {}", cpu_hz, k);
                assert_eq!(emulator.delay_timer(), 60 - k as u8);
            }

            assert_eq!(emulator.delay_timer(), 0);
            assert_eq!(emulator.sound_timer(), 0);
            assert_eq!(scheduler.total_cycles(), cpu_hz as u128);
            assert_eq!(scheduler.elapsed(), Duration::from_secs(1));
        }
    }

    #[test]
    fn timers_stop_at_zero() {
        let mut emulator = emulator_with(&SPIN);
        emulator.delay_timer = 3;
        let mut scheduler = Scheduler::new(&Config::default(), None);

        let report = scheduler
            .tick(&mut emulator, Duration::from_secs(1), &NoKeys)
            .unwrap();

        assert_eq!(report.timer_ticks, 60);
        assert_eq!(emulator.delay_timer(), 0);
        assert!(!report.sound_active);
    }

    #[test]
    fn cycle_budget_tracks_elapsed_time() {
        let mut emulator = emulator_with(&SPIN);
        let mut scheduler = Scheduler::new(&config(540, FaultPolicy::Strict), None);

        // 540 Hz is 9 cycles per 1/60s
        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();
        assert_eq!(report.cycles, 9);
        assert_eq!(report.frames, 1);

        // too short for a cycle
        let report = scheduler
            .tick(&mut emulator, Duration::from_micros(1), &NoKeys)
            .unwrap();
        assert_eq!(report.cycles, 0);
        assert_eq!(report.timer_ticks, 0);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn cycles_run_before_timer_decrement() {
        // LD V1, 0x05 / LD DT, V1 / JP 0x204
        let mut emulator = emulator_with(&[0x61, 0x05, 0xF1, 0x15, 0x12, 0x04]);
        let mut scheduler = Scheduler::new(&config(120, FaultPolicy::Strict), None);

        // both instructions run, then the decrement is applied to the new value
        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();
        assert_eq!(report.cycles, 2);
        assert_eq!(emulator.delay_timer(), 4);
    }

    #[test]
    fn self_jump_halts_but_timers_keep_running() {
        let mut emulator = emulator_with(&[0x12, 0x00]);
        emulator.sound_timer = 2;
        let mut scheduler = Scheduler::new(&Config::default(), None);

        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();
        assert!(report.halted);
        assert_eq!(report.cycles, 1);
        assert!(report.sound_active);
        assert_eq!(emulator.pc(), 0x200);

        let report = scheduler
            .tick(&mut emulator, nth_slice(2, 60), &NoKeys)
            .unwrap();
        assert!(report.halted);
        assert_eq!(report.cycles, 0);
        assert_eq!(report.timer_ticks, 1);
        assert!(!report.sound_active);
        assert!(scheduler.is_halted());
    }

    #[test]
    fn permissive_policy_skips_unknown_opcodes() {
        // UNKNOWN / LD V0, 0x2A / JP 0x204
        let mut emulator = emulator_with(&[0xFF, 0xFF, 0x60, 0x2A, 0x12, 0x04]);
        let mut scheduler = Scheduler::new(&config(180, FaultPolicy::Permissive), None);

        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();

        assert_eq!(report.faults, 1);
        assert_eq!(emulator.register(0), 0x2A);
        assert!(report.halted);
    }

    #[test]
    fn strict_policy_halts_on_unknown_opcode() {
        let mut emulator = emulator_with(&[0xFF, 0xFF, 0x60, 0x2A, 0x12, 0x04]);
        let mut scheduler = Scheduler::new(&config(180, FaultPolicy::Strict), None);

        let result = scheduler.tick(&mut emulator, nth_slice(1, 60), &NoKeys);

        assert!(matches!(
            result,
            Err(Error::UnknownOpcode { opcode: 0xFFFF })
        ));
        assert_eq!(emulator.register(0), 0);
    }

    #[test]
    fn time_of_a_failed_tick_is_still_counted() {
        let mut emulator = emulator_with(&[0xFF, 0xFF, 0x60, 0x2A, 0x12, 0x04]);
        let mut scheduler = Scheduler::new(&config(180, FaultPolicy::Strict), None);

        assert!(scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .is_err());
        assert_eq!(scheduler.total_cycles(), 1);
        assert_eq!(scheduler.elapsed(), nth_slice(1, 60));

        // the two cycles and the timer decrement the failed tick didn't get to
        let report = scheduler
            .tick(&mut emulator, Duration::ZERO, &NoKeys)
            .unwrap();
        assert_eq!(report.cycles, 2);
        assert_eq!(report.timer_ticks, 1);
        assert_eq!(scheduler.total_cycles(), 3);
        assert_eq!(emulator.register(0), 0x2A);
        assert!(report.halted);
    }

    #[test]
    fn draws_mark_the_display_changed() {
        // LD V0, 0x05 / DRW V0, V0, 1 / JP 0x204
        let mut emulator = emulator_with(&[0x60, 0x05, 0xD0, 0x01, 0x12, 0x04]);
        let mut scheduler = Scheduler::new(&config(60, FaultPolicy::Strict), None);

        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();
        assert!(!report.display_changed);

        let report = scheduler
            .tick(&mut emulator, nth_slice(2, 60), &NoKeys)
            .unwrap();
        assert!(report.display_changed);

        let report = scheduler
            .tick(&mut emulator, nth_slice(3, 60), &NoKeys)
            .unwrap();
        assert!(!report.display_changed);
        assert!(report.halted);
    }

    #[test]
    fn running_off_the_program_is_fatal_even_when_permissive() {
        let mut emulator = emulator_with(&[0x60, 0x05]);
        let mut scheduler = Scheduler::new(&config(540, FaultPolicy::Permissive), None);

        let result = scheduler.tick(&mut emulator, nth_slice(1, 60), &NoKeys);

        assert!(matches!(result, Err(Error::FetchOutOfRange { pc: 0x202 })));
        assert_eq!(emulator.register(0), 5);
    }

    struct Held(Vec<Key>);

    impl AsKeyboard for Held {
        fn keys_down(&self) -> Vec<Key> {
            self.0.clone()
        }
    }

    #[test]
    fn key_wait_spends_cycles_until_input_arrives() {
        // LD V3, K / JP 0x202
        let mut emulator = emulator_with(&[0xF3, 0x0A, 0x12, 0x02]);
        let mut scheduler = Scheduler::new(&config(540, FaultPolicy::Strict), None);

        let report = scheduler
            .tick(&mut emulator, nth_slice(1, 60), &NoKeys)
            .unwrap();
        assert_eq!(report.cycles, 9);
        assert!(!report.halted);
        assert_eq!(emulator.pc(), 0x200);
        assert!(emulator.keyboard().is_blocking());

        let report = scheduler
            .tick(&mut emulator, nth_slice(2, 60), &Held(vec![Key::E]))
            .unwrap();
        assert_eq!(emulator.register(3), 0xE);
        assert!(report.halted);
        assert_eq!(emulator.pc(), 0x202);
    }
}
