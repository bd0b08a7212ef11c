/// Frames needed to cover `seconds` at `fps`, rounded up.
pub fn total_frames(seconds: f64, fps: u32) -> u64 {
    let frames = (seconds * f64::from(fps)).ceil();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// Splits `total` frames across `count` clips. Earlier clips absorb the
/// remainder one frame each, so the parts sum to `total` and differ by at
/// most one.
pub fn allocate_frames(total: u64, count: usize) -> Vec<u64> {
    if count == 0 {
        return Vec::new();
    }
    let count_u64 = count as u64;
    let base = total / count_u64;
    let remainder = (total % count_u64) as usize;
    (0..count)
        .map(|index| base + u64::from(index < remainder))
        .collect()
}
