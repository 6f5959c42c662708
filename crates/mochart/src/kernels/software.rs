//! Single-precision reference implementations of every kernel.
//!
//! These follow accelerator semantics: inputs come from the flattened
//! `f32` bar buffer, parameters from a decoded [`ParamBlock`], and every
//! undefined output slot holds [`NAN_SENTINEL`]. Window kernels compute
//! each bar independently (one invocation per bar); recursive kernels run
//! a single sequential pass.
//!
//! Output layout is interleaved: slot `i * outputs + s` holds output `s`
//! of bar `i`.

use super::{KernelId, BAR_STRIDE, NAN_SENTINEL};
use crate::kernels::params::ParamBlock;

const HIGH: usize = 2;
const LOW: usize = 3;
const CLOSE: usize = 4;
const VOLUME: usize = 5;

struct Bars<'a> {
    data: &'a [f32],
    len: usize,
}

impl Bars<'_> {
    fn field(&self, i: usize, offset: usize) -> f32 {
        self.data[i * BAR_STRIDE + offset]
    }

    fn close(&self, i: usize) -> f32 {
        self.field(i, CLOSE)
    }

    fn high(&self, i: usize) -> f32 {
        self.field(i, HIGH)
    }

    fn low(&self, i: usize) -> f32 {
        self.field(i, LOW)
    }

    fn volume(&self, i: usize) -> f32 {
        self.field(i, VOLUME)
    }

    fn typical(&self, i: usize) -> f32 {
        (self.high(i) + self.low(i) + self.close(i)) / 3.0
    }

    fn true_range(&self, i: usize) -> f32 {
        let prev = self.close(i - 1);
        (self.high(i) - self.low(i))
            .max((self.high(i) - prev).abs())
            .max((self.low(i) - prev).abs())
    }

    /// Mean and population standard deviation of closes in the window
    /// ending at `end`. Sums are taken relative to the first close so a
    /// flat window has a deviation of exactly zero.
    fn band(&self, end: usize, period: usize) -> (f32, f32) {
        let start = end + 1 - period;
        let n = period as f32;
        let base = self.close(start);
        let mean = base + (start..=end).map(|j| self.close(j) - base).sum::<f32>() / n;
        let var = (start..=end)
            .map(|j| {
                let d = self.close(j) - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        (mean, var.sqrt())
    }
}

/// Runs `kernel` over `bar_count` bars, writing into `out`.
///
/// `out` must hold `bar_count * kernel.output_count()` slots and is fully
/// overwritten.
pub(crate) fn run(kernel: KernelId, data: &[f32], bar_count: usize, block: &ParamBlock, out: &mut [f32]) {
    out.fill(NAN_SENTINEL);
    let bars = Bars {
        data,
        len: bar_count,
    };
    match kernel {
        KernelId::Sma => sma(&bars, block.period().period as usize, out),
        KernelId::Ema => ema(&bars, block.period().period as usize, out),
        KernelId::Bollinger => {
            let p = block.band();
            bollinger(&bars, p.period as usize, p.std_dev, out);
        }
        KernelId::PercentB => {
            let p = block.band();
            percent_b(&bars, p.period as usize, p.std_dev, out);
        }
        KernelId::BbWidth => {
            let p = block.band();
            bb_width(&bars, p.period as usize, p.std_dev, out);
        }
        KernelId::Rsi => rsi(&bars, block.period().period as usize, out),
        KernelId::Atr => atr(&bars, block.period().period as usize, out),
        KernelId::Adx => adx(&bars, block.period().period as usize, out),
        KernelId::Macd => {
            let p = block.triple();
            macd(
                &bars,
                p.fast as usize,
                p.slow as usize,
                p.signal as usize,
                out,
            );
        }
        KernelId::Vwap => vwap(&bars, block.period().period as usize, out),
        KernelId::VolRatio => vol_ratio(&bars, block.period().period as usize, out),
    }
}

fn windows(bars: &Bars<'_>, period: usize) -> impl Iterator<Item = usize> {
    let first = period.max(1) - 1;
    first..bars.len
}

fn sma(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let sum: f32 = (i + 1 - period..=i).map(|j| bars.close(j)).sum();
        out[i] = sum / period as f32;
    }
}

fn ema(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 || bars.len == 0 {
        return;
    }
    let k = 2.0 / (period as f32 + 1.0);
    let mut value = bars.close(0);
    for i in 0..bars.len {
        if i > 0 {
            value = bars.close(i) * k + value * (1.0 - k);
        }
        if i + 1 >= period {
            out[i] = value;
        }
    }
}

fn bollinger(bars: &Bars<'_>, period: usize, k: f32, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let (mean, sd) = bars.band(i, period);
        let upper = mean + k * sd;
        out[i * 4] = upper;
        out[i * 4 + 1] = mean;
        out[i * 4 + 2] = mean - k * sd;
        out[i * 4 + 3] = upper;
    }
}

fn percent_b(bars: &Bars<'_>, period: usize, k: f32, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let (mean, sd) = bars.band(i, period);
        let lower = mean - k * sd;
        let width = 2.0 * k * sd;
        out[i] = if width == 0.0 {
            0.5
        } else {
            (bars.close(i) - lower) / width
        };
    }
}

fn bb_width(bars: &Bars<'_>, period: usize, k: f32, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let (mean, sd) = bars.band(i, period);
        out[i] = if mean > 0.0 { 2.0 * k * sd / mean } else { 0.0 };
    }
}

fn rsi(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 || bars.len <= period {
        return;
    }
    let p = period as f32;
    let mut gain = 0.0f32;
    let mut loss = 0.0f32;
    for i in 1..bars.len {
        let change = bars.close(i) - bars.close(i - 1);
        let (g, l) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        if i <= period {
            gain += g;
            loss += l;
            if i < period {
                continue;
            }
            gain /= p;
            loss /= p;
        } else {
            gain = (gain * (p - 1.0) + g) / p;
            loss = (loss * (p - 1.0) + l) / p;
        }
        let rs = if loss == 0.0 { 100.0 } else { gain / loss };
        out[i] = 100.0 - 100.0 / (1.0 + rs);
    }
}

fn atr(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 || bars.len <= period {
        return;
    }
    let p = period as f32;
    let mut value = 0.0f32;
    for i in 1..bars.len {
        let tr = bars.true_range(i);
        if i < period {
            value += tr;
        } else if i == period {
            value = (value + tr) / p;
            out[i] = value;
        } else {
            value = (value * (p - 1.0) + tr) / p;
            out[i] = value;
        }
    }
}

fn adx(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 || bars.len <= period {
        return;
    }
    let p = period as f32;
    let (mut s_tr, mut s_plus, mut s_minus) = (0.0f32, 0.0f32, 0.0f32);
    let mut adx = 0.0f32;
    for i in 1..bars.len {
        let up = bars.high(i) - bars.high(i - 1);
        let down = bars.low(i - 1) - bars.low(i);
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = bars.true_range(i);

        if i <= period {
            s_tr += tr;
            s_plus += plus_dm;
            s_minus += minus_dm;
            if i < period {
                continue;
            }
        } else {
            s_tr = s_tr - s_tr / p + tr;
            s_plus = s_plus - s_plus / p + plus_dm;
            s_minus = s_minus - s_minus / p + minus_dm;
        }

        let (plus_di, minus_di) = if s_tr == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };

        out[i * 3 + 1] = plus_di;
        out[i * 3 + 2] = minus_di;

        let seed_end = 2 * period - 1;
        if i < seed_end {
            adx += dx;
        } else if i == seed_end {
            adx = (adx + dx) / p;
            out[i * 3] = adx;
        } else {
            adx = (adx * (p - 1.0) + dx) / p;
            out[i * 3] = adx;
        }
    }
}

fn macd(bars: &Bars<'_>, fast: usize, slow: usize, signal: usize, out: &mut [f32]) {
    if fast == 0 || slow == 0 || signal == 0 || bars.len == 0 {
        return;
    }
    let kf = 2.0 / (fast as f32 + 1.0);
    let ks = 2.0 / (slow as f32 + 1.0);
    let kg = 2.0 / (signal as f32 + 1.0);
    let first = slow + signal - 1;

    let mut ema_fast = bars.close(0);
    let mut ema_slow = bars.close(0);
    let mut sig = 0.0f32;
    for i in 0..bars.len {
        if i > 0 {
            let c = bars.close(i);
            ema_fast = c * kf + ema_fast * (1.0 - kf);
            ema_slow = c * ks + ema_slow * (1.0 - ks);
        }
        let line = ema_fast - ema_slow;
        sig = if i == 0 { line } else { line * kg + sig * (1.0 - kg) };
        if i >= first {
            out[i * 3] = line;
            out[i * 3 + 1] = sig;
            out[i * 3 + 2] = line - sig;
        }
    }
}

fn vwap(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let (mut pv, mut v) = (0.0f32, 0.0f32);
        for j in i + 1 - period..=i {
            pv += bars.typical(j) * bars.volume(j);
            v += bars.volume(j);
        }
        if v != 0.0 {
            out[i] = pv / v;
        }
    }
}

fn vol_ratio(bars: &Bars<'_>, period: usize, out: &mut [f32]) {
    if period == 0 {
        return;
    }
    for i in windows(bars, period) {
        let avg = (i + 1 - period..=i).map(|j| bars.volume(j)).sum::<f32>() / period as f32;
        out[i] = if avg == 0.0 { 0.0 } else { bars.volume(i) / avg };
    }
}
