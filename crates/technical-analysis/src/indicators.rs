/// Exponential Moving Average, aligned one-to-one with `data`.
///
/// Uses `alpha = 2 / (span + 1)` and seeds the recursion with the first raw
/// sample (no bias adjustment).
pub fn ema(data: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || data.is_empty() {
        return vec![];
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    ewm(data, alpha)
}

/// Recursive exponential smoothing with an explicit smoothing factor.
fn ewm(data: &[f64], alpha: f64) -> Vec<f64> {
    let mut result = Vec::with_capacity(data.len());
    let Some(&first) = data.first() else {
        return result;
    };

    result.push(first);
    for &value in &data[1..] {
        let prev = result[result.len() - 1];
        result.push(alpha * value + (1.0 - alpha) * prev);
    }
    result
}

/// Triple Exponential Moving Average: `3*EMA1 - 3*EMA2 + EMA3`, where each
/// EMA is taken over the previous one. Aligned one-to-one with `data`.
pub fn tema(data: &[f64], span: usize) -> Vec<f64> {
    let ema1 = ema(data, span);
    let ema2 = ema(&ema1, span);
    let ema3 = ema(&ema2, span);

    ema1.iter()
        .zip(&ema2)
        .zip(&ema3)
        .map(|((e1, e2), e3)| 3.0 * e1 - 3.0 * e2 + e3)
        .collect()
}

/// Relative Strength Index with Wilder smoothing (`alpha = 1 / period`).
///
/// Aligned with `data`: the first `period - 1` positions are `None`. A window
/// with no losses reads 100; a window with no movement at all is `None`.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || data.len() < period {
        return vec![None; data.len()];
    }

    let mut gains = Vec::with_capacity(data.len());
    let mut losses = Vec::with_capacity(data.len());
    gains.push(0.0);
    losses.push(0.0);

    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let alpha = 1.0 / period as f64;
    let avg_gain = ewm(&gains, alpha);
    let avg_loss = ewm(&losses, alpha);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .enumerate()
        .map(|(i, (&gain, &loss))| {
            if i + 1 < period {
                None
            } else if loss == 0.0 {
                if gain == 0.0 { None } else { Some(100.0) }
            } else {
                let rs = gain / loss;
                Some(100.0 - (100.0 / (1.0 + rs)))
            }
        })
        .collect()
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD line, signal line and histogram, all aligned with `data`.
pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult { macd_line: vec![], signal_line: vec![], histogram: vec![] };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal_period);
    let histogram = macd_line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}
