/// Inclusive interval overlap: true iff [start_a, end_a] and
/// [start_b, end_b] share at least one point.
///
/// Shared by the leave ledger and any other interval-based rule so the
/// overlap test is written exactly once.
pub fn intervals_overlap<T: PartialOrd>(start_a: T, end_a: T, start_b: T, end_b: T) -> bool {
    start_a <= end_b && end_a >= start_b
}
