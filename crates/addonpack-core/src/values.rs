//! Values file resolution

use std::path::{Path, PathBuf};

/// Conventional values file shipped inside a chart
pub const DEFAULT_VALUES_FILE: &str = "values.yaml";

/// Pick the values file used for rendering.
///
/// An explicit file always wins. Otherwise the chart's own `values.yaml` is
/// used when present. `None` means rendering proceeds without `-f`.
#[must_use]
pub fn resolve_values_file(chart_path: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(values) = explicit {
        return Some(values.to_path_buf());
    }
    let default = chart_path.join(DEFAULT_VALUES_FILE);
    default.is_file().then_some(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_values_win() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("values.yaml"), "a: 1\n").unwrap();
        let explicit = temp.path().join("prod.yaml");

        assert_eq!(
            resolve_values_file(temp.path(), Some(&explicit)),
            Some(explicit.clone())
        );
    }

    #[test]
    fn test_default_values_when_present() {
        let temp = TempDir::new().unwrap();
        assert_eq!(resolve_values_file(temp.path(), None), None);

        std::fs::write(temp.path().join("values.yaml"), "a: 1\n").unwrap();
        assert_eq!(
            resolve_values_file(temp.path(), None),
            Some(temp.path().join("values.yaml"))
        );
    }

    #[test]
    fn test_values_directory_is_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("values.yaml")).unwrap();
        assert_eq!(resolve_values_file(temp.path(), None), None);
    }
}
