/// Returns true if `needle` occurs in `haystack` in order, possibly with gaps.
///
/// ```text
/// [1, 3] in [1, 2, 3] => true
/// [3, 1] in [1, 2, 3] => false
/// ```
pub fn is_subsequence<T: PartialEq>(needle: &[T], haystack: &[T]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|x| rest.any(|y| y == x))
}

/// Returns true if `needle` occurs in `haystack` as a contiguous run.
///
/// The empty needle occurs everywhere, including in an empty haystack.
pub fn contains_run<T: PartialEq>(needle: &[T], haystack: &[T]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Numerically stable `log(sum(exp(x)))`.
///
/// Returns negative infinity for an empty input.
pub fn log_sum_exp(xs: impl IntoIterator<Item = f64> + Clone) -> f64 {
    let max = xs.clone().into_iter().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + xs.into_iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}
