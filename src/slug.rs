//! Slug generation for file and run identifiers.

/// Maximum length for generated slugs (file name prefixes)
pub const MAX_SLUG_LENGTH: usize = 30;

/// Convert a project name to a lowercase, hyphen-separated slug.
///
/// Truncates at a hyphen boundary to stay under [`MAX_SLUG_LENGTH`] and
/// returns `"untitled"` when nothing alphanumeric remains.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut prev_dash = true;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_LENGTH {
        let mut cut = MAX_SLUG_LENGTH;
        while !slug.is_char_boundary(cut) {
            cut -= 1;
        }
        match slug[..cut].rfind('-') {
            Some(pos) if pos > 0 => slug.truncate(pos),
            _ => slug.truncate(cut),
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Task Management App"), "task-management-app");
        assert_eq!(slugify("  Multiple   Spaces!  "), "multiple-spaces");
        assert_eq!(slugify("v2.0 Release"), "v2-0-release");
    }

    #[test]
    fn test_slugify_truncates_at_word_boundary() {
        let slug = slugify("Requirements gathering for the enterprise document conversion pipeline");
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
        assert_eq!(slug, "requirements-gathering-for");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("---"), "untitled");
    }
}
