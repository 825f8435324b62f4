//! Validation of client-supplied download names.

/// Accept `name` only if it is a bare, mfetch-owned file name.
///
/// Anything that could address another location is rejected outright
/// rather than rewritten: separators of either platform, NUL and control
/// characters, `.`/`..`, hidden names, and names without the namespace prefix.
pub fn safe_download_name(name: &str) -> Option<&str> {
    const NAME_MAX: usize = 255;

    if name.is_empty() || name.len() > NAME_MAX {
        return None;
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0' || c == ':' || c.is_control())
    {
        return None;
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return None;
    }
    if !super::is_owned_name(name) {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_owned_bare_names() {
        assert_eq!(
            safe_download_name("mfetch_0011aabbccddeeff.mp4"),
            Some("mfetch_0011aabbccddeeff.mp4")
        );
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(safe_download_name("../../etc/passwd"), None);
        assert_eq!(safe_download_name(".."), None);
        assert_eq!(safe_download_name("mfetch_x/../../etc/passwd"), None);
        assert_eq!(safe_download_name("..\\..\\boot.ini"), None);
        assert_eq!(safe_download_name("/etc/passwd"), None);
        assert_eq!(safe_download_name("C:mfetch_x.mp4"), None);
    }

    #[test]
    fn rejects_hidden_control_and_foreign_names() {
        assert_eq!(safe_download_name(""), None);
        assert_eq!(safe_download_name(".mfetch_x.mp4"), None);
        assert_eq!(safe_download_name("mfetch_x\0.mp4"), None);
        assert_eq!(safe_download_name("mfetch_x\n.mp4"), None);
        assert_eq!(safe_download_name("passwd"), None);
        assert_eq!(safe_download_name(&"mfetch_a".repeat(40)), None);
    }
}
