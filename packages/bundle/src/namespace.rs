use crc32fast::Hasher;
use std::path::Path;

/// Separator between a namespace and a local name in generated identifiers
pub const NAMESPACE_DELIMITER: &str = "__";

/// Default namespace for a stylesheet path: the file name up to its first
/// `.`, followed by the CRC32 of the full path
pub fn derive_namespace(path: &Path) -> String {
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = stem.split('.').next().unwrap_or_default();

    let mut hasher = Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{}{:x}", sanitize(stem), hasher.finalize())
}

/// `<namespace>__<local>`
pub fn scoped_name(namespace: &str, local: &str) -> String {
    format!("{}{}{}", namespace, NAMESPACE_DELIMITER, local)
}

/// Strip quotes around an `@namespace` parameter
pub fn parse_namespace_param(params: &str) -> Option<String> {
    let trimmed = params.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(sanitize(trimmed))
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_is_stable_and_path_specific() {
        let a = derive_namespace(Path::new("/src/button.st.css"));
        let b = derive_namespace(Path::new("/lib/button.st.css"));
        assert!(a.starts_with("button"));
        assert_eq!(a, derive_namespace(Path::new("/src/button.st.css")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_scoped_name() {
        assert_eq!(scoped_name("button1a2b", "label"), "button1a2b__label");
    }

    #[test]
    fn test_parse_namespace_param() {
        assert_eq!(parse_namespace_param("\"Comp\""), Some("Comp".to_string()));
        assert_eq!(parse_namespace_param(" my ns "), Some("my-ns".to_string()));
        assert_eq!(parse_namespace_param("''"), None);
    }
}
