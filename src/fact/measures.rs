//! Row-wise arithmetic over nullable measures.

/// Sum of the present components; `None` only when every component is null.
pub fn sum_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Null if either side is null.
pub fn product(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? * b?)
}

/// Null if either side is null or the denominator is zero.
pub fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let d = denominator?;
    if d == 0.0 {
        return None;
    }
    Some(numerator? / d)
}

/// Column-wise [`sum_present`] over equal-length columns.
pub fn sum_columns(columns: &[&[Option<f64>]], rows: usize) -> Vec<Option<f64>> {
    (0..rows)
        .map(|r| sum_present(columns.iter().map(|c| c[r])))
        .collect()
}

pub fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(Option<f64>, Option<f64>) -> Option<f64>,
{
    a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()
}
