//! Compiled-key derivation, shared by the schema and layout walks.

/// Reduce a label or legend to its slug: lowercased alphanumerics and
/// underscores, with runs of spaces and hyphens collapsed to single hyphens
/// and every other character dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.trim().chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if ch == ' ' || ch == '-' {
            pending_hyphen = true;
        }
    }
    slug
}

/// The compiled key for a field label under a namespace: `<slug>` at the top
/// level, `<namespace>.<slug>` inside a fieldset.
pub fn field_key(namespace: &str, label: &str) -> String {
    let slug = slugify(label);
    if namespace.is_empty() {
        slug
    } else {
        format!("{}.{}", namespace, slug)
    }
}
