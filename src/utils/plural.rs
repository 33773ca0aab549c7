//! Counted nouns for log lines and report pages.

/// English plural of a regular `noun`: consonant + `y` becomes `ies`,
/// sibilant endings take `es`, everything else `s`.
pub fn plural(noun: &str) -> String {
    let consonant_y = noun
        .strip_suffix('y')
        .and_then(|stem| stem.chars().last())
        .is_some_and(|c| !"aeiou".contains(c));
    if consonant_y {
        return format!("{}ies", &noun[..noun.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| noun.ends_with(end)) {
        return format!("{noun}es");
    }
    format!("{noun}s")
}

/// `count` followed by `noun`, pluralized unless `count` is 1.
///
/// `plural_count(1, "entry")` is `"1 entry"`, `plural_count(3, "entry")`
/// is `"3 entries"`.
pub fn plural_count(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {}", plural(noun))
    }
}
