//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the contain-fit size of `source` inside `max`, never upscaling.
///
/// A zero on one axis of `max` leaves that axis unconstrained (the aspect
/// ratio decides it); zeros on both axes keep the source size. The scale
/// factor is the minimum of `1.0` and every active axis ratio, so the result
/// never exceeds the source on either axis.
///
/// # Arguments
/// * `source` - Decoded source dimensions (width, height)
/// * `max` - Configured maxima (width, height), `0` = auto
///
/// # Examples
/// ```
/// # use gallery_ingest::imaging::calculate_contain_dimensions;
/// assert_eq!(calculate_contain_dimensions((2000, 1000), (600, 600)), (600, 300));
/// // Never upscale
/// assert_eq!(calculate_contain_dimensions((300, 200), (1000, 1000)), (300, 200));
/// ```
pub fn calculate_contain_dimensions(source: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w < 1 || src_h < 1 {
        return (1, 1);
    }

    let (max_w, max_h) = max;
    if max_w == 0 && max_h == 0 {
        return source;
    }

    let mut scale = 1.0_f64;
    if max_w > 0 {
        scale = scale.min(max_w as f64 / src_w as f64);
    }
    if max_h > 0 {
        scale = scale.min(max_h as f64 / src_h as f64);
    }

    let mut width = ((src_w as f64 * scale).round() as u32).max(1);
    let mut height = ((src_h as f64 * scale).round() as u32).max(1);

    // Rounding can overshoot a bound by one pixel
    if max_w > 0 {
        width = width.min(max_w);
    }
    if max_h > 0 {
        height = height.min(max_h);
    }

    (width, height)
}
