//! Free-text merging for visit comments and party names.

/// Separator between merged comment fragments.
pub const COMMENT_SEPARATOR: &str = "\n";

/// Separator between merged party names.
pub const PARTY_SEPARATOR: &str = ", ";

/// Splits `existing` and `addition` on `separator`, drops blank fragments,
/// removes exact duplicates (first occurrence wins) and rejoins.
///
/// Comparison is case-sensitive and fragments are not trimmed, so
/// `"JD"` and `"jd"` are both kept.
pub fn merge_unique_strings(separator: &str, existing: &str, addition: Option<&str>) -> String {
    let mut unique: Vec<&str> = Vec::new();

    for fragment in std::iter::once(existing)
        .chain(addition)
        .flat_map(|text| text.split(separator))
    {
        if fragment.trim().is_empty() || unique.contains(&fragment) {
            continue;
        }
        unique.push(fragment);
    }

    unique.join(separator)
}

pub fn merge_comments(existing: &str, addition: Option<&str>) -> String {
    merge_unique_strings(COMMENT_SEPARATOR, existing, addition)
}

pub fn merge_party(existing: &str, addition: Option<&str>) -> String {
    merge_unique_strings(PARTY_SEPARATOR, existing, addition)
}
