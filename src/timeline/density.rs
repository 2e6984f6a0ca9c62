//! Chat density histograms for seek-bar heatmaps.
//!
//! Two profiles are produced: a 100-bin profile for a single segment and a
//! 200-bin profile spanning a whole session on the virtual global timeline.
//! Raw bin counts are smoothed with an edge-truncated moving average and then
//! normalized to `[0, 1]` so the UI can map them straight to bar heights.

/// 単一セグメント用のビン数
pub const SEGMENT_BIN_COUNT: usize = 100;
/// 単一セグメント用の移動平均半径（±3ビン）
pub const SEGMENT_SMOOTH_RADIUS: usize = 3;
/// セッション全体用のビン数
pub const SESSION_BIN_COUNT: usize = 200;
/// セッション全体用の移動平均半径（±2ビン）
pub const SESSION_SMOOTH_RADIUS: usize = 2;

/// Density profile for one segment (event times are segment-local seconds).
pub fn segment_density(times: &[f64], duration: f64) -> Vec<f32> {
    density_profile(times, duration, SEGMENT_BIN_COUNT, SEGMENT_SMOOTH_RADIUS)
}

/// Density profile for a whole session (event times are global seconds).
pub fn session_density(times: &[f64], duration: f64) -> Vec<f32> {
    density_profile(times, duration, SESSION_BIN_COUNT, SESSION_SMOOTH_RADIUS)
}

/// Bin event times over `[0, duration]`, smooth, and normalize.
///
/// Always returns exactly `bin_count` values in `[0, 1]`, even for an empty
/// or zero-length input. An all-zero histogram normalizes to all zeros, never
/// to NaN.
pub fn density_profile(
    times: &[f64],
    duration: f64,
    bin_count: usize,
    smooth_radius: usize,
) -> Vec<f32> {
    let counts = bin_counts(times, duration, bin_count);
    let smoothed = smooth(&counts, smooth_radius);
    normalize(&smoothed)
}

/// Count events per bin. Times outside `[0, duration]` and non-finite times
/// are ignored; `t == duration` lands in the last bin.
fn bin_counts(times: &[f64], duration: f64, bin_count: usize) -> Vec<u32> {
    let mut counts = vec![0u32; bin_count];
    if bin_count == 0 || !duration.is_finite() || duration <= 0.0 {
        return counts;
    }
    for &t in times {
        if !t.is_finite() || t < 0.0 || t > duration {
            continue;
        }
        let index = ((t / duration) * bin_count as f64) as usize;
        let index = index.min(bin_count - 1);
        counts[index] += 1;
    }
    counts
}

/// Moving average with the window truncated at both edges, so the first and
/// last bins average over fewer neighbors instead of borrowing phantom zeros.
fn smooth(counts: &[u32], radius: usize) -> Vec<f32> {
    if radius == 0 {
        return counts.iter().map(|&c| c as f32).collect();
    }
    let len = counts.len();
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(len.saturating_sub(1));
        let window = &counts[lo..=hi];
        let sum: u32 = window.iter().sum();
        out.push(sum as f32 / window.len() as f32);
    }
    out
}

/// Scale so the tallest bin becomes 1.0. All-zero input stays all-zero.
fn normalize(values: &[f32]) -> Vec<f32> {
    let max = values.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| v / max).collect()
}
