//! 发射调度器
//!
//! 把一帧的播放时间区间 `(last, current)` 转换为若干生成请求 `(时间戳, 数量)`。
//!
//! - 连续速率发射基于累加器：发射间隔严格为 `1 / rate`，与帧时间抖动无关。
//! - 爆发发射按周期处理：一帧跨越循环边界时被拆分为
//!   "当前周期剩余部分 + N 个完整周期 + 新周期起始部分"，每个周期开始时爆发游标归零。
//!
//! 播放时间是周期内的本地时间，`current` 可以超出周期长度（跨越多个周期），
//! 也可以小于 `last`（调用方已经回绕）。生成请求的时间戳与 `last` 处于同一坐标系：
//! 时间戳 `t` 表示比帧起点晚 `t - last` 秒。

use rand::Rng;

use super::burst::{Burst, BurstList};

/// 速率判定的相对容差，吸收浮点累加误差
const RATE_TOLERANCE: f32 = 1.0e-3;

/// 单帧发射所需的时间参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionTiming {
    /// 本帧的发射速率（每秒粒子数）
    pub rate: f32,
    /// 周期长度（秒），必须大于 0
    pub duration: f32,
    /// 是否循环
    pub looping: bool,
    /// 单帧连续发射的上限，超出部分按最旧的先跳过
    pub max_rate_emissions: usize,
}

/// 生成请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    /// 生成时间（与帧起点 `last` 同一坐标系）
    pub time: f32,
    /// 数量
    pub count: u32,
}

/// 单帧调度结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionStep {
    /// 帧结束时的周期内播放时间，恰好落在周期末尾时为 `duration`
    pub play_time: f32,
    /// 本帧闭合的周期数
    pub cycles_completed: u32,
    /// 非循环发射器已经走完整个周期
    pub finished: bool,
}

/// 发射调度器
#[derive(Debug, Clone, Default)]
pub struct EmissionScheduler {
    /// 下一次连续发射的时间戳（距离上次发射欠下的时间）
    frame_rate_accumulator: f32,
    /// 当前周期内下一个待检查的爆发
    current_burst_index: usize,
    /// 按时间排序的爆发列表
    bursts: BurstList,
}

impl EmissionScheduler {
    pub fn new(bursts: BurstList) -> Self {
        Self {
            frame_rate_accumulator: 0.0,
            current_burst_index: 0,
            bursts,
        }
    }

    /// 重置到播放起点（仅在系统重启时调用）
    pub fn reset(&mut self) {
        self.frame_rate_accumulator = 0.0;
        self.current_burst_index = 0;
    }

    /// 添加爆发，保持列表有序
    ///
    /// 插入到游标之前的爆发属于本周期已经过去的时间，从下一周期开始生效。
    pub fn add_burst(&mut self, burst: Burst) {
        let index = self.bursts.insert(burst);
        if index < self.current_burst_index {
            self.current_burst_index += 1;
        }
    }

    pub fn clear_bursts(&mut self) {
        self.bursts.clear();
        self.current_burst_index = 0;
    }

    pub fn bursts(&self) -> &BurstList {
        &self.bursts
    }

    pub fn frame_rate_accumulator(&self) -> f32 {
        self.frame_rate_accumulator
    }

    pub fn current_burst_index(&self) -> usize {
        self.current_burst_index
    }

    /// 推进一帧，把生成请求追加到 `out`
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        timing: &EmissionTiming,
        last: f32,
        current: f32,
        rng: &mut R,
        out: &mut Vec<SpawnRequest>,
    ) -> EmissionStep {
        let duration = timing.duration;
        let mut current = current;

        if timing.looping && current < last {
            // 播放时间已被调用方回绕
            current += duration * ((last - current) / duration).ceil();
        }

        if current <= last {
            return EmissionStep {
                play_time: last,
                cycles_completed: 0,
                finished: !timing.looping && last >= duration,
            };
        }

        if !timing.looping {
            let end = current.min(duration);
            if end > last {
                self.emit_rate(timing, end, out);
                self.emit_bursts(last, end, 0.0, rng, out);
            }
            return EmissionStep {
                play_time: end.max(last),
                cycles_completed: 0,
                finished: current >= duration,
            };
        }

        self.emit_rate(timing, current, out);
        let (play_time, cycles_completed) = self.emit_bursts_looping(last, current, duration, rng, out);

        // 累加器换算到新周期的坐标系
        self.frame_rate_accumulator -= current - play_time;

        EmissionStep {
            play_time,
            cycles_completed,
            finished: false,
        }
    }

    /// 连续速率发射
    fn emit_rate(&mut self, timing: &EmissionTiming, current: f32, out: &mut Vec<SpawnRequest>) {
        if !(timing.rate > 0.0) || !timing.rate.is_finite() {
            // 速率为 0 时累加器跟随时间，避免速率恢复时一次性补发
            self.frame_rate_accumulator = current;
            return;
        }

        let emit_interval = 1.0 / timing.rate;
        let tolerance = emit_interval * RATE_TOLERANCE;
        let mut elapsed = current - self.frame_rate_accumulator;

        let owed = ((elapsed + tolerance) / emit_interval).floor();
        if owed > timing.max_rate_emissions as f32 {
            let skipped = owed - timing.max_rate_emissions as f32;
            elapsed -= skipped * emit_interval;
            self.frame_rate_accumulator += skipped * emit_interval;
        }

        while elapsed >= emit_interval - tolerance {
            out.push(SpawnRequest {
                time: self.frame_rate_accumulator,
                count: 1,
            });
            elapsed -= emit_interval;
            self.frame_rate_accumulator += emit_interval;
        }
    }

    /// 循环播放时的爆发发射，返回 `(新的周期内时间, 闭合周期数)`
    fn emit_bursts_looping<R: Rng + ?Sized>(
        &mut self,
        last: f32,
        current: f32,
        duration: f32,
        rng: &mut R,
        out: &mut Vec<SpawnRequest>,
    ) -> (f32, u32) {
        // last 恰好落在周期末尾时，该周期已在上一帧闭合
        let closed = (last / duration).floor();
        let cycle_start = last - closed * duration;
        let base = last - cycle_start;
        if closed > 0.0 {
            self.current_burst_index = 0;
        }

        let remaining = duration - cycle_start;
        let span = current - last;
        if span <= remaining {
            let end = cycle_start + span;
            self.emit_bursts(cycle_start, end, base, rng, out);
            return (end, 0);
        }

        // 当前周期剩余部分，边界上的爆发归属于被闭合的周期
        self.emit_bursts(cycle_start, duration, base, rng, out);

        // 先减后除：超出当前周期的时间里完整跨越的周期数
        let overflow = span - remaining;
        let full_cycles = ((overflow / duration).ceil() as u32).saturating_sub(1);
        for i in 0..full_cycles {
            self.current_burst_index = 0;
            let cycle_base = base + duration * (i + 1) as f32;
            self.emit_bursts(0.0, duration, cycle_base, rng, out);
        }

        // 新周期的起始部分
        self.current_burst_index = 0;
        let tail = (overflow - duration * full_cycles as f32).clamp(0.0, duration);
        let tail_base = base + duration * (full_cycles + 1) as f32;
        self.emit_bursts(0.0, tail, tail_base, rng, out);

        (tail, full_cycles + 1)
    }

    /// 在一个周期内的子区间 `[start, end]` 推进爆发游标
    fn emit_bursts<R: Rng + ?Sized>(
        &mut self,
        start: f32,
        end: f32,
        base: f32,
        rng: &mut R,
        out: &mut Vec<SpawnRequest>,
    ) {
        while let Some(burst) = self.bursts.get(self.current_burst_index) {
            if burst.time > end {
                break;
            }
            self.current_burst_index += 1;
            // 早于子区间起点的爆发不再补发
            if burst.time < start {
                continue;
            }
            let count = burst.evaluate_count(rng.gen::<f32>());
            if count > 0 {
                out.push(SpawnRequest {
                    time: base + burst.time,
                    count,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn timing(rate: f32, duration: f32, looping: bool) -> EmissionTiming {
        EmissionTiming {
            rate,
            duration,
            looping,
            max_rate_emissions: usize::MAX,
        }
    }

    fn total(requests: &[SpawnRequest]) -> u32 {
        requests.iter().map(|r| r.count).sum()
    }

    /// 按帧推进，返回总发射数
    fn run_frames(
        scheduler: &mut EmissionScheduler,
        timing: &EmissionTiming,
        steps: &[f32],
    ) -> u32 {
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = Vec::new();
        let mut play_time = 0.0f32;
        for dt in steps {
            let step = scheduler.advance(timing, play_time, play_time + dt, &mut rng, &mut out);
            play_time = step.play_time;
        }
        total(&out)
    }

    #[test]
    fn test_rate_accumulates_across_frames() {
        // 10/s，每帧 0.05s，共 20 帧：恰好 10 个
        let mut scheduler = EmissionScheduler::default();
        let emitted = run_frames(&mut scheduler, &timing(10.0, 5.0, true), &[0.05; 20]);
        assert_eq!(emitted, 10);
    }

    #[test]
    fn test_rate_zero_is_skipped() {
        let mut scheduler = EmissionScheduler::default();
        let emitted = run_frames(&mut scheduler, &timing(0.0, 5.0, true), &[0.1; 10]);
        assert_eq!(emitted, 0);
        // 累加器跟随时间，不会积压
        assert!((scheduler.frame_rate_accumulator() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_rate_timestamps_are_evenly_spaced() {
        let mut scheduler = EmissionScheduler::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Vec::new();
        scheduler.advance(&timing(4.0, 10.0, true), 0.0, 1.0, &mut rng, &mut out);
        let times: Vec<f32> = out.iter().map(|r| r.time).collect();
        assert_eq!(times.len(), 4);
        for (i, t) in times.iter().enumerate() {
            assert!((t - i as f32 * 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn test_max_rate_emissions_skips_oldest() {
        let mut scheduler = EmissionScheduler::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = Vec::new();
        let limited = EmissionTiming {
            max_rate_emissions: 5,
            ..timing(100.0, 10.0, true)
        };
        scheduler.advance(&limited, 0.0, 1.0, &mut rng, &mut out);
        assert_eq!(total(&out), 5);
        // 保留的是最新的 5 个
        assert!(out.iter().all(|r| r.time >= 0.94));
    }

    #[test]
    fn test_burst_fires_once_per_cycle_crossed() {
        // 爆发在 t=2.0，周期 3.0，循环，单帧从 1.0 到 7.0：触发两次
        let mut scheduler = EmissionScheduler::new([Burst::fixed(2.0, 1)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let step = scheduler.advance(&timing(0.0, 3.0, true), 1.0, 7.0, &mut rng, &mut out);

        assert_eq!(out.len(), 2);
        assert!((out[0].time - 2.0).abs() < 1e-5);
        assert!((out[1].time - 5.0).abs() < 1e-5);
        assert_eq!(step.cycles_completed, 2);
        assert!((step.play_time - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_burst_non_looping_fires_once() {
        let mut scheduler = EmissionScheduler::new([Burst::fixed(0.5, 30)].into_iter().collect());
        let emitted = run_frames(&mut scheduler, &timing(0.0, 1.0, false), &[0.1; 30]);
        assert_eq!(emitted, 30);
    }

    #[test]
    fn test_burst_at_time_zero_fires_on_first_frame() {
        let mut scheduler = EmissionScheduler::new([Burst::fixed(0.0, 5)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        scheduler.advance(&timing(0.0, 1.0, false), 0.0, 0.016, &mut rng, &mut out);
        assert_eq!(total(&out), 5);
    }

    #[test]
    fn test_boundary_burst_closes_ending_cycle() {
        // 周期末尾的爆发在闭合该周期的帧中触发，新周期起始处不再重复
        let mut scheduler = EmissionScheduler::new([Burst::fixed(1.0, 1)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let t = timing(0.0, 1.0, true);

        let step = scheduler.advance(&t, 0.5, 1.0, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(step.play_time, 1.0);
        assert_eq!(step.cycles_completed, 0);

        let step = scheduler.advance(&t, step.play_time, 1.5, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        assert!((step.play_time - 0.5).abs() < 1e-6);

        let _ = scheduler.advance(&t, step.play_time, 1.0, &mut rng, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_boundary_burst_when_frame_ends_exactly_on_cycle_end() {
        let mut scheduler = EmissionScheduler::new(
            [Burst::fixed(0.0, 1), Burst::fixed(2.0, 1)].into_iter().collect(),
        );
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let t = timing(0.0, 2.0, true);

        // [0, 4]：第一个周期起点、末尾，第二个周期起点、末尾
        let step = scheduler.advance(&t, 0.0, 4.0, &mut rng, &mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(step.cycles_completed, 1);
        assert!((step.play_time - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrapped_time_is_handled() {
        let mut scheduler = EmissionScheduler::new([Burst::fixed(0.25, 1)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let t = timing(0.0, 1.0, true);

        scheduler.advance(&t, 0.0, 0.5, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        // 调用方回绕：0.9 -> 0.3
        scheduler.advance(&t, 0.5, 0.9, &mut rng, &mut out);
        let step = scheduler.advance(&t, 0.9, 0.3, &mut rng, &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[1].time - 1.25).abs() < 1e-5);
        assert!((step.play_time - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_non_looping_finishes() {
        let mut scheduler = EmissionScheduler::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let t = timing(10.0, 1.0, false);

        let step = scheduler.advance(&t, 0.0, 0.6, &mut rng, &mut out);
        assert!(!step.finished);
        let step = scheduler.advance(&t, step.play_time, 1.2, &mut rng, &mut out);
        assert!(step.finished);
        assert_eq!(step.play_time, 1.0);
        assert_eq!(total(&out), 10);

        let before = out.len();
        let step = scheduler.advance(&t, step.play_time, 1.5, &mut rng, &mut out);
        assert!(step.finished);
        assert_eq!(out.len(), before);
    }

    #[test]
    fn test_add_burst_before_cursor_waits_for_next_cycle() {
        let mut scheduler = EmissionScheduler::new([Burst::fixed(0.8, 1)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        let t = timing(0.0, 1.0, true);

        scheduler.advance(&t, 0.0, 0.9, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        scheduler.add_burst(Burst::fixed(0.2, 1));
        assert!(scheduler.bursts().is_sorted());

        let step = scheduler.advance(&t, 0.9, 0.95, &mut rng, &mut out);
        assert_eq!(out.len(), 1);
        scheduler.advance(&t, step.play_time, 1.3, &mut rng, &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_reset() {
        let mut scheduler = EmissionScheduler::new([Burst::fixed(0.1, 1)].into_iter().collect());
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        scheduler.advance(&timing(5.0, 1.0, false), 0.0, 0.5, &mut rng, &mut out);
        assert!(scheduler.current_burst_index() > 0);
        scheduler.reset();
        assert_eq!(scheduler.current_burst_index(), 0);
        assert_eq!(scheduler.frame_rate_accumulator(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_emission_conservation(
            rate in 1.0f32..200.0,
            steps in proptest::collection::vec(0.001f32..0.05, 1..200),
        ) {
            // 单帧步长不小于 1/rate 时，总数为 floor(R*T) ±1
            let mut scheduler = EmissionScheduler::default();
            let t = timing(rate, 1.0e6, true);
            let emitted = run_frames(&mut scheduler, &t, &steps) as i64;
            let elapsed: f32 = steps.iter().sum();
            let expected = (rate * elapsed).floor() as i64;
            prop_assert!((emitted - expected).abs() <= 1, "emitted {} expected {}", emitted, expected);
        }

        #[test]
        fn prop_non_looping_burst_exactness(
            burst_time in 0.0f32..2.0,
            steps in proptest::collection::vec(0.0f32..0.3, 1..60),
        ) {
            let mut scheduler = EmissionScheduler::new([Burst::fixed(burst_time, 1)].into_iter().collect());
            let t = timing(0.0, 2.0, false);
            let emitted = run_frames(&mut scheduler, &t, &steps);
            let elapsed: f32 = steps.iter().sum();
            if elapsed >= burst_time + 1e-4 {
                prop_assert_eq!(emitted, 1);
            } else if elapsed + 1e-4 < burst_time {
                prop_assert_eq!(emitted, 0);
            } else {
                prop_assert!(emitted <= 1);
            }
        }

        #[test]
        fn prop_looping_burst_once_per_cycle(
            steps in proptest::collection::vec(0.01f32..2.5, 1..40),
        ) {
            // 周期 1.0，爆发在 0.5：每个经过的 0.5 + k 恰好触发一次
            let mut scheduler = EmissionScheduler::new([Burst::fixed(0.5, 1)].into_iter().collect());
            let t = timing(0.0, 1.0, true);
            let emitted = run_frames(&mut scheduler, &t, &steps) as i64;
            let elapsed: f32 = steps.iter().sum();
            let expected = (elapsed + 0.5).floor() as i64;
            prop_assert!((emitted - expected).abs() <= 1, "emitted {} expected {}", emitted, expected);
        }
    }
}
