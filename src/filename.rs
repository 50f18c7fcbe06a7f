/// Longest joined-name stem kept before the counter suffix.
pub const MAX_STEM_CHARS: usize = 200;

/// Combination-mode file name: display names joined with `_`, truncated,
/// then the 1-based counter and extension.
///
/// Truncation counts characters, not bytes, and may cut mid-name; the
/// counter suffix survives truncation untouched, which is what keeps long
/// names collision-free.
pub fn combine_file_name(names: &[&str], counter: usize, ext: &str) -> String {
    let joined = names.join("_");
    let stem: String = joined.chars().take(MAX_STEM_CHARS).collect();
    format!("{stem}_{counter}.{ext}")
}

/// Pairing-mode file name. The index-for-index walk already disambiguates,
/// so no counter is appended.
pub fn pair_file_name(first: &str, second: &str, ext: &str) -> String {
    format!("{first}_-_{second}.{ext}")
}
