//! TaskGenerator - synthetic task source for the producer.
//!
//! 乱数源はグローバルではなく generator が所有します（seed を渡せば再現可能）。

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::task::{TASK_ID_MAX, TASK_ID_MIN};
use super::{Task, TaskKind};
use crate::ports::Clock;

/// TaskGenerator は Task を 1 件ずつ生成
///
/// # 保証
/// - `task_id` は [1000, 9999]
/// - `task_type` は TaskKind::ALL から一様に選ぶ
/// - `timestamp` は同一 generator 内で単調非減少（clock が巻き戻っても）
pub struct TaskGenerator<C, R = StdRng> {
    rng: R,
    clock: C,
    last_timestamp: f64,
}

impl<C: Clock> TaskGenerator<C, StdRng> {
    /// seed 固定の generator
    pub fn seeded(seed: u64, clock: C) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), clock)
    }

    /// OS entropy から seed する generator
    pub fn from_entropy(clock: C) -> Self {
        Self::with_rng(StdRng::from_entropy(), clock)
    }
}

impl<C: Clock, R: Rng> TaskGenerator<C, R> {
    pub fn with_rng(rng: R, clock: C) -> Self {
        Self {
            rng,
            clock,
            last_timestamp: f64::MIN,
        }
    }

    pub fn generate(&mut self) -> Task {
        let task_id = self.rng.gen_range(TASK_ID_MIN..=TASK_ID_MAX);
        let kind = TaskKind::ALL[self.rng.gen_range(0..TaskKind::ALL.len())];

        let sampled = self.clock.now().timestamp_micros() as f64 / 1e6;
        let timestamp = sampled.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        Task::new(task_id, kind, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::collections::HashSet;

    /// 呼ばれるたびに 1 秒ずつ巻き戻る clock
    struct RewindingClock {
        next: Mutex<DateTime<Utc>>,
    }

    impl Clock for RewindingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock();
            let now = *next;
            *next = now - Duration::seconds(1);
            now
        }
    }

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(u64::MAX)]
    fn ids_and_kinds_stay_in_range(#[case] seed: u64) {
        let mut generator = TaskGenerator::seeded(seed, SystemClock);
        for _ in 0..500 {
            let task = generator.generate();
            assert!((TASK_ID_MIN..=TASK_ID_MAX).contains(&task.task_id));
            assert!(TaskKind::ALL.contains(&task.task_type));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let at = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let mut a = TaskGenerator::seeded(7, FixedClock::new(at));
        let mut b = TaskGenerator::seeded(7, FixedClock::new(at));

        let xs: Vec<Task> = (0..20).map(|_| a.generate()).collect();
        let ys: Vec<Task> = (0..20).map(|_| b.generate()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn every_kind_eventually_appears() {
        let mut generator = TaskGenerator::seeded(1, SystemClock);
        let kinds: HashSet<TaskKind> = (0..200).map(|_| generator.generate().task_type).collect();
        assert_eq!(kinds.len(), TaskKind::ALL.len());
    }

    #[test]
    fn timestamp_is_taken_from_clock() {
        let at = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let mut generator = TaskGenerator::seeded(3, FixedClock::new(at));
        assert_eq!(generator.generate().timestamp, 1_700_000_000.0);
    }

    #[test]
    fn timestamp_never_goes_backwards() {
        let start = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let clock = RewindingClock {
            next: Mutex::new(start),
        };
        let mut generator = TaskGenerator::seeded(9, clock);

        let mut previous = f64::MIN;
        for _ in 0..10 {
            let task = generator.generate();
            assert!(task.timestamp >= previous);
            previous = task.timestamp;
        }
        assert_eq!(previous, 1_700_000_000.0);
    }
}
