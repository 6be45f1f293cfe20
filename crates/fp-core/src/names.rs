use std::collections::HashSet;

/// Return `base` if unused, otherwise the first free `base_1`, `base_2`, ...
pub fn unique_name<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = existing.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_base_is_kept() {
        assert_eq!(unique_name("Group", ["Review"]), "Group");
    }

    #[test]
    fn appends_first_free_suffix() {
        assert_eq!(unique_name("Group", ["Group", "Group_1", "Group_3"]), "Group_2");
    }
}
