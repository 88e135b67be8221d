//! Vectorized numeric kernels.
//!
//! One API with two execution shapes: striped multi-accumulator loops the
//! compiler can auto-vectorize for the reductions, and incremental
//! algorithms for the sliding-window and smoothing kernels. The striped
//! paths re-associate IEEE-754 additions; outputs agree with the scalar
//! reference to 1e-10 relative, which is the contract every indicator
//! relies on.
//!
//! Prefix convention: a kernel that needs `period` inputs writes NaN into
//! every slot before its first valid index. Indicators align on exactly
//! this prefix.

const LANES: usize = 4;

/// Element-wise addition.
pub fn add(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((r, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *r = x + y;
    }
}

/// Element-wise subtraction.
pub fn sub(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((r, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *r = x - y;
    }
}

/// Element-wise multiplication.
pub fn mul(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((r, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *r = x * y;
    }
}

/// Element-wise division; a zero divisor yields NaN.
pub fn div(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((r, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *r = if y != 0.0 { x / y } else { f64::NAN };
    }
}

/// Multiply every element by a scalar.
pub fn mul_by_scalar(a: &[f64], scalar: f64, out: &mut [f64]) {
    for (r, &x) in out.iter_mut().zip(a) {
        *r = x * scalar;
    }
}

/// Sum with four striped accumulators (the portable wide-register form).
pub fn sum(data: &[f64]) -> f64 {
    let mut acc = [0.0f64; LANES];
    let chunks = data.chunks_exact(LANES);
    let rem = chunks.remainder();
    for chunk in chunks {
        for (a, &v) in acc.iter_mut().zip(chunk) {
            *a += v;
        }
    }
    let mut total = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    for &v in rem {
        total += v;
    }
    total
}

/// Plain left-to-right sum; the reference the striped path is checked
/// against.
pub fn sum_scalar(data: &[f64]) -> f64 {
    data.iter().sum()
}

/// Dot product, striped like `sum`.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let mut acc = [0.0f64; LANES];
    let mut i = 0;
    while i + LANES <= n {
        for lane in 0..LANES {
            acc[lane] += a[i + lane] * b[i + lane];
        }
        i += LANES;
    }
    let mut total = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    while i < n {
        total += a[i] * b[i];
        i += 1;
    }
    total
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    sum(data) / data.len() as f64
}

/// Population variance around a supplied mean.
pub fn variance(data: &[f64], mean_val: f64) -> f64 {
    if data.len() < 2 {
        return f64::NAN;
    }
    let mut acc = 0.0;
    for &v in data {
        let d = v - mean_val;
        acc += d * d;
    }
    acc / data.len() as f64
}

/// Population standard deviation. A constant window yields exactly 0.
pub fn stddev(data: &[f64], mean_val: f64) -> f64 {
    let var = variance(data, mean_val);
    if var.is_nan() {
        f64::NAN
    } else {
        var.sqrt()
    }
}

pub fn max(data: &[f64]) -> f64 {
    data.iter().copied().fold(f64::NAN, |m, v| {
        if m.is_nan() || v > m {
            v
        } else {
            m
        }
    })
}

pub fn min(data: &[f64]) -> f64 {
    data.iter().copied().fold(f64::NAN, |m, v| {
        if m.is_nan() || v < m {
            v
        } else {
            m
        }
    })
}

/// First index holding a real value. Chained indicators hand buffers with
/// a NaN warm-up prefix to downstream kernels; windows start past it.
fn first_valid(data: &[f64]) -> usize {
    data.iter().position(|v| !v.is_nan()).unwrap_or(data.len())
}

/// Sliding-window sum, incremental: one subtraction and one addition per
/// step after the first window. A NaN prefix on the input shifts the
/// first defined output accordingly.
pub fn sliding_sum(data: &[f64], window: usize, out: &mut Vec<f64>) {
    out.clear();
    out.resize(data.len(), f64::NAN);
    let base = first_valid(data);
    let valid = &data[base..];
    if window == 0 || valid.len() < window {
        return;
    }
    let mut acc = sum(&valid[..window]);
    out[base + window - 1] = acc;
    for i in window..valid.len() {
        acc = acc - valid[i - window] + valid[i];
        out[base + i] = acc;
    }
}

/// Sliding-window mean (SMA).
pub fn sliding_mean(data: &[f64], window: usize, out: &mut Vec<f64>) {
    sliding_sum(data, window, out);
    let divisor = window as f64;
    for v in out.iter_mut() {
        if !v.is_nan() {
            *v /= divisor;
        }
    }
}

/// Sliding-window maximum via a monotonic deque, O(N) overall.
pub fn sliding_max(data: &[f64], window: usize, out: &mut Vec<f64>) {
    sliding_extremum(data, window, out, |a, b| a >= b)
}

/// Sliding-window minimum via a monotonic deque, O(N) overall.
pub fn sliding_min(data: &[f64], window: usize, out: &mut Vec<f64>) {
    sliding_extremum(data, window, out, |a, b| a <= b)
}

fn sliding_extremum(
    data: &[f64],
    window: usize,
    out: &mut Vec<f64>,
    keep: impl Fn(f64, f64) -> bool,
) {
    out.clear();
    out.resize(data.len(), f64::NAN);
    if window == 0 || data.len() < window {
        return;
    }
    let mut deque: std::collections::VecDeque<usize> = std::collections::VecDeque::new();
    for i in 0..data.len() {
        while let Some(&front) = deque.front() {
            if front + window <= i {
                deque.pop_front();
            } else {
                break;
            }
        }
        while let Some(&back) = deque.back() {
            if keep(data[i], data[back]) {
                deque.pop_back();
            } else {
                break;
            }
        }
        deque.push_back(i);
        if i + 1 >= window {
            out[i] = data[*deque.front().expect("window is non-empty")];
        }
    }
}

fn ema_with_alpha(data: &[f64], period: usize, alpha: f64, out: &mut Vec<f64>) {
    out.clear();
    out.resize(data.len(), f64::NAN);
    let base = first_valid(data);
    let valid = &data[base..];
    if period == 0 || valid.len() < period {
        return;
    }
    let one_minus = 1.0 - alpha;
    out[base + period - 1] = sum(&valid[..period]) / period as f64;
    for i in period..valid.len() {
        out[base + i] = alpha * valid[i] + one_minus * out[base + i - 1];
    }
}

/// Exponential moving average, seeded with the SMA of the first `period`
/// values, then `out[i] = α·x[i] + (1−α)·out[i−1]` with α = 2/(period+1).
pub fn ema(data: &[f64], period: usize, out: &mut Vec<f64>) {
    ema_with_alpha(data, period, 2.0 / (period as f64 + 1.0), out);
}

/// Wilder-smoothed EMA (α = 1/period), the smoothing RSI uses.
fn wilder_ema(data: &[f64], period: usize, out: &mut Vec<f64>) {
    ema_with_alpha(data, period, 1.0 / period as f64, out);
}

/// Relative Strength Index.
///
/// One-step differences split into gains and losses, each Wilder-smoothed,
/// then `100 − 100/(1 + gain/loss)`. A zero average loss pegs at 100, a
/// zero average gain at 0. First valid output is at index `period`
/// (the differencing consumes one bar).
pub fn rsi(data: &[f64], period: usize, out: &mut Vec<f64>) {
    out.clear();
    out.resize(data.len(), f64::NAN);
    if period == 0 || data.len() < 2 {
        return;
    }
    let n = data.len() - 1;
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 0..n {
        let change = data[i + 1] - data[i];
        if change.is_nan() {
            gains[i] = f64::NAN;
            losses[i] = f64::NAN;
        } else if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut avg_gain = Vec::new();
    let mut avg_loss = Vec::new();
    wilder_ema(&gains, period, &mut avg_gain);
    wilder_ema(&losses, period, &mut avg_loss);

    for i in period..data.len() {
        let idx = i - 1;
        let ag = avg_gain[idx];
        let al = avg_loss[idx];
        if ag.is_nan() || al.is_nan() {
            continue;
        }
        out[i] = if al == 0.0 {
            100.0
        } else if ag == 0.0 {
            0.0
        } else {
            100.0 - 100.0 / (1.0 + ag / al)
        };
    }
}

/// MACD line, signal line, histogram.
///
/// macd = ema(fast) − ema(slow); signal is an EMA computed over the
/// first-valid-forward slice of the macd line; every output before
/// `slow + signal − 2` is NaN.
pub fn macd(
    data: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
    macd_out: &mut Vec<f64>,
    signal_out: &mut Vec<f64>,
    hist_out: &mut Vec<f64>,
) {
    let n = data.len();
    macd_out.clear();
    macd_out.resize(n, f64::NAN);
    signal_out.clear();
    signal_out.resize(n, f64::NAN);
    hist_out.clear();
    hist_out.resize(n, f64::NAN);
    if n < slow || slow == 0 || fast == 0 || signal == 0 {
        return;
    }

    let mut fast_ema = Vec::new();
    let mut slow_ema = Vec::new();
    ema(data, fast, &mut fast_ema);
    ema(data, slow, &mut slow_ema);

    for i in 0..n {
        if !fast_ema[i].is_nan() && !slow_ema[i].is_nan() {
            macd_out[i] = fast_ema[i] - slow_ema[i];
        }
    }

    let base = first_valid(macd_out);
    if base + signal > n {
        return;
    }
    let mut sig = Vec::new();
    ema(&macd_out[base..], signal, &mut sig);
    for (i, v) in sig.into_iter().enumerate() {
        signal_out[base + i] = v;
    }

    for i in 0..n {
        if !macd_out[i].is_nan() && !signal_out[i].is_nan() {
            hist_out[i] = macd_out[i] - signal_out[i];
        }
    }
}

/// Bollinger bands: middle = SMA, upper/lower = middle ± k·σ with the
/// population standard deviation over the same window.
pub fn bollinger(
    data: &[f64],
    period: usize,
    dev_factor: f64,
    middle: &mut Vec<f64>,
    upper: &mut Vec<f64>,
    lower: &mut Vec<f64>,
) {
    let n = data.len();
    middle.clear();
    upper.clear();
    lower.clear();
    middle.resize(n, f64::NAN);
    upper.resize(n, f64::NAN);
    lower.resize(n, f64::NAN);
    if period == 0 || n < period {
        return;
    }

    sliding_mean(data, period, middle);
    for i in (period - 1)..n {
        if middle[i].is_nan() {
            continue;
        }
        let window = &data[i + 1 - period..=i];
        let sd = window_stddev(window, middle[i]);
        upper[i] = middle[i] + dev_factor * sd;
        lower[i] = middle[i] - dev_factor * sd;
    }
}

fn window_stddev(window: &[f64], mean_val: f64) -> f64 {
    let mut acc = 0.0;
    for &v in window {
        let d = v - mean_val;
        acc += d * d;
    }
    (acc / window.len() as f64).sqrt()
}
