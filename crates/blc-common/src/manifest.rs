use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::phase::Phase;
use crate::span::LineMap;

pub const MANIFEST_FILE: &str = "Blc.toml";

/// The parsed Blc.toml manifest.
#[derive(Debug, Clone)]
pub struct BlcManifest {
    pub project: ProjectSection,
    pub analysis: AnalysisSection,
    pub log: LogSection,
    /// The directory containing the Blc.toml file.
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    pub name: String,
    #[serde(default)]
    pub entry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSection {
    /// Last phase to run; later phases are skipped.
    #[serde(default)]
    pub stop_after: Option<Phase>,
    #[serde(default = "default_tab_size")]
    pub tab_size: u32,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            stop_after: None,
            tab_size: default_tab_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_tab_size() -> u32 {
    LineMap::DEFAULT_TAB_SIZE
}

fn default_log_filter() -> String {
    "warn".to_string()
}

/// Raw TOML structure for deserialization.
#[derive(Debug, Deserialize)]
struct RawManifest {
    project: ProjectSection,
    #[serde(default)]
    analysis: AnalysisSection,
    #[serde(default)]
    log: LogSection,
}

/// Errors that can occur when loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no Blc.toml found (searched from {0})")]
    NotFound(String),
    #[error("failed to read Blc.toml: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid Blc.toml: {0}")]
    ParseError(String),
    #[error("invalid Blc.toml: [analysis] tab_size must be at least 1")]
    InvalidTabSize,
    #[error("invalid Blc.toml: [project] name must not be empty")]
    EmptyProjectName,
}

/// Walk up from `start_dir` looking for `Blc.toml`.
/// Returns the path to the manifest file if found.
pub fn find_manifest(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load and validate a Blc.toml manifest from a file path.
pub fn load_manifest(path: &Path) -> Result<BlcManifest, ManifestError> {
    let content = std::fs::read_to_string(path)?;
    let root_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    parse_manifest(&content, root_dir)
}

/// Parse and validate a Blc.toml manifest from a string.
pub fn parse_manifest(content: &str, root_dir: PathBuf) -> Result<BlcManifest, ManifestError> {
    let raw: RawManifest =
        toml::from_str(content).map_err(|e| ManifestError::ParseError(e.to_string()))?;

    if raw.project.name.trim().is_empty() {
        return Err(ManifestError::EmptyProjectName);
    }
    if raw.analysis.tab_size == 0 {
        return Err(ManifestError::InvalidTabSize);
    }

    Ok(BlcManifest {
        project: raw.project,
        analysis: raw.analysis,
        log: raw.log,
        root_dir,
    })
}

/// Find and load the manifest starting from a source file's directory.
pub fn find_and_load_manifest(source_file: &Path) -> Result<BlcManifest, ManifestError> {
    let start_dir = source_file.parent().unwrap_or_else(|| Path::new("."));
    let manifest_path = find_manifest(start_dir)
        .ok_or_else(|| ManifestError::NotFound(start_dir.display().to_string()))?;
    load_manifest(&manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_manifest() {
        let toml = r#"
[project]
name = "demo"
"#;
        let manifest = parse_manifest(toml, PathBuf::from(".")).unwrap();
        assert_eq!(manifest.project.name, "demo");
        assert!(manifest.project.entry.is_none());
        assert!(manifest.analysis.stop_after.is_none());
        assert_eq!(manifest.analysis.tab_size, 4);
        assert_eq!(manifest.log.filter, "warn");
    }

    #[test]
    fn parse_full_manifest() {
        let toml = r#"
[project]
name = "shapes"
entry = "src/main.bl"

[analysis]
stop_after = "check-inferred"
tab_size = 8

[log]
filter = "blc_compiler=trace"
"#;
        let manifest = parse_manifest(toml, PathBuf::from("/tmp/shapes")).unwrap();
        assert_eq!(manifest.project.entry.as_deref(), Some("src/main.bl"));
        assert_eq!(manifest.analysis.stop_after, Some(Phase::CheckInferred));
        assert_eq!(manifest.analysis.tab_size, 8);
        assert_eq!(manifest.log.filter, "blc_compiler=trace");
        assert_eq!(manifest.root_dir, PathBuf::from("/tmp/shapes"));
    }

    #[test]
    fn missing_project_section_fails() {
        let toml = r#"
[analysis]
tab_size = 2
"#;
        let err = parse_manifest(toml, PathBuf::from(".")).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError(_)));
    }

    #[test]
    fn unknown_phase_fails() {
        let toml = r#"
[project]
name = "demo"

[analysis]
stop_after = "codegen"
"#;
        let err = parse_manifest(toml, PathBuf::from(".")).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError(_)));
    }

    #[test]
    fn zero_tab_size_fails() {
        let toml = r#"
[project]
name = "demo"

[analysis]
tab_size = 0
"#;
        let err = parse_manifest(toml, PathBuf::from(".")).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidTabSize));
    }

    #[test]
    fn blank_project_name_fails() {
        let err = parse_manifest("[project]\nname = \"  \"\n", PathBuf::from(".")).unwrap_err();
        assert!(matches!(err, ManifestError::EmptyProjectName));
    }

    #[test]
    fn find_manifest_walks_up() {
        let tmp = std::env::temp_dir().join("blc_test_manifest");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(tmp.join("src/nested")).unwrap();
        std::fs::write(tmp.join(MANIFEST_FILE), "[project]\nname = \"test\"\n").unwrap();

        let found = find_manifest(&tmp.join("src/nested"));
        assert_eq!(found, Some(tmp.join(MANIFEST_FILE)));

        let manifest = find_and_load_manifest(&tmp.join("src/nested/main.bl")).unwrap();
        assert_eq!(manifest.project.name, "test");
        assert_eq!(manifest.root_dir, tmp);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
