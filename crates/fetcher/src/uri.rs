//! URI rewriting against a session base URL.

use std::path::Path;

use purc_core::url::BrokenDownUrl;

/// Resolves `target` against `base`.
///
/// Already-valid absolute URIs pass through. A scheme-relative target
/// (`//host/...`) borrows the base scheme; an absolute path replaces the
/// base path; anything else appends to the base. When the base is a
/// `file:` URL with an empty host and the root path, relative targets are
/// resolved against `working_dir` instead.
pub fn build_uri(base: Option<&str>, target: &str, working_dir: &Path) -> String {
    if BrokenDownUrl::break_down(target).is_ok() {
        return target.to_string();
    }

    let Some(base) = base else {
        return target.to_string();
    };

    let Ok(base_url) = BrokenDownUrl::break_down(base) else {
        return target.to_string();
    };

    if let Some(rest) = target.strip_prefix("//") {
        let schema = base_url.schema.as_deref().unwrap_or("file");
        return format!("{schema}://{rest}");
    }

    if target.starts_with('/') {
        let mut rebased = base_url;
        rebased.path = Some(target.to_string());
        rebased.query = None;
        rebased.fragment = None;
        return rebased.assemble();
    }

    let base_is_bare_file = base_url.is_local_file()
        && base_url.host.as_deref().unwrap_or("").is_empty()
        && matches!(base_url.path.as_deref(), None | Some("/"));
    if base_is_bare_file {
        let joined = working_dir.join(target);
        return format!("file://{}", joined.display());
    }

    if base.ends_with('/') {
        format!("{base}{target}")
    } else {
        format!("{base}/{target}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        PathBuf::from("/work/dir")
    }

    #[test]
    fn test_absolute_target_passes_through() {
        assert_eq!(
            build_uri(Some("http://base/x"), "https://other/y", &cwd()),
            "https://other/y"
        );
    }

    #[test]
    fn test_scheme_relative_borrows_base_scheme() {
        assert_eq!(
            build_uri(Some("https://base/app/"), "//cdn.example.com/lib.json", &cwd()),
            "https://cdn.example.com/lib.json"
        );
    }

    #[test]
    fn test_absolute_path_replaces_base_path() {
        assert_eq!(
            build_uri(Some("http://host/a/b?q#f"), "/data.json", &cwd()),
            "http://host/data.json"
        );
    }

    #[test]
    fn test_relative_appends_to_base() {
        assert_eq!(
            build_uri(Some("http://host/app"), "data.json", &cwd()),
            "http://host/app/data.json"
        );
        assert_eq!(
            build_uri(Some("http://host/app/"), "data.json", &cwd()),
            "http://host/app/data.json"
        );
    }

    #[test]
    fn test_bare_file_base_uses_working_dir() {
        assert_eq!(
            build_uri(Some("file:///"), "data.json", &cwd()),
            "file:///work/dir/data.json"
        );
    }

    #[test]
    fn test_no_base() {
        assert_eq!(build_uri(None, "data.json", &cwd()), "data.json");
    }
}
