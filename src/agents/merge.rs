use crate::agents::project_scanner::PACKAGE_JSON;
use crate::error::{Result, VintageError};
use crate::utils::fs::replace_path;
use crate::utils::path_validator::PathValidator;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Fixed set of template paths copied into the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeManifest {
    /// Copied with overwrite; directories replace the whole destination subtree.
    pub copies: Vec<&'static str>,
    /// Reconciled field by field instead of copied.
    pub package_json: &'static str,
}

impl Default for MergeManifest {
    fn default() -> Self {
        Self {
            copies: vec!["gulp", "webpack.config.js", "vintage-frontend.json"],
            package_json: PACKAGE_JSON,
        }
    }
}

/// How a single manifest entry fared.
///
/// A source missing from the bundle is tolerated and reported; any other I/O failure
/// aborts the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Applied,
    MissingInBundle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: Vec<String>,
    pub missing: Vec<String>,
}

impl MergeReport {
    fn record(&mut self, entry: &str, status: EntryStatus) {
        match status {
            EntryStatus::Applied => self.applied.push(entry.to_string()),
            EntryStatus::MissingInBundle => {
                warn!(entry, "entry missing from template bundle, skipped");
                self.missing.push(entry.to_string());
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// MergeEngine copies the manifest from a staged bundle into the working tree
pub struct MergeEngine {
    manifest: MergeManifest,
}

impl MergeEngine {
    pub fn new(manifest: MergeManifest) -> Self {
        Self { manifest }
    }

    pub fn apply_merge(&self, bundle_root: &Path, working_dir: &Path) -> Result<MergeReport> {
        let mut report = MergeReport::default();

        for entry in &self.manifest.copies {
            let status = copy_entry(bundle_root, working_dir, entry)?;
            report.record(entry, status);
        }

        let status = merge_package_json(bundle_root, working_dir, self.manifest.package_json)?;
        report.record(self.manifest.package_json, status);

        Ok(report)
    }
}

fn copy_entry(bundle_root: &Path, working_dir: &Path, entry: &str) -> Result<EntryStatus> {
    let src = PathValidator::join_relative(bundle_root, entry)?;
    let dst = PathValidator::join_relative(working_dir, entry)?;

    match fs::symlink_metadata(&src) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EntryStatus::MissingInBundle),
        Err(e) => return Err(VintageError::fs(src, e)),
    }

    debug!(from = %src.display(), to = %dst.display(), "replacing");
    replace_path(&src, &dst).map_err(|e| VintageError::fs(&dst, e))?;
    Ok(EntryStatus::Applied)
}

fn merge_package_json(bundle_root: &Path, working_dir: &Path, entry: &str) -> Result<EntryStatus> {
    let incoming_path = PathValidator::join_relative(bundle_root, entry)?;
    let existing_path = PathValidator::join_relative(working_dir, entry)?;

    let incoming = match fs::read(&incoming_path) {
        Ok(bytes) => parse_document(&incoming_path, &bytes)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EntryStatus::MissingInBundle),
        Err(e) => return Err(VintageError::fs(incoming_path, e)),
    };
    let existing_bytes = fs::read(&existing_path).map_err(|e| VintageError::fs(&existing_path, e))?;
    let existing = parse_document(&existing_path, &existing_bytes)?;

    let merged = reconcile_package(existing, &incoming)?;
    write_document(&existing_path, &merged)?;
    Ok(EntryStatus::Applied)
}

/// Builds the project's new `package.json`.
///
/// `version` and `scripts` come from the template (kept as-is when the template has
/// none). `devDependencies` is a shallow merge where template entries win. Every
/// other key, `dependencies` included, is left exactly as the project had it.
pub fn reconcile_package(existing: Value, incoming: &Value) -> Result<Value> {
    let Value::Object(mut doc) = existing else {
        return Err(VintageError::Merge(
            "project package.json is not a JSON object".to_string(),
        ));
    };
    let Some(incoming) = incoming.as_object() else {
        return Err(VintageError::Merge(
            "template package.json is not a JSON object".to_string(),
        ));
    };

    for key in ["version", "scripts"] {
        if let Some(value) = incoming.get(key) {
            doc.insert(key.to_string(), value.clone());
        }
    }

    if let Some(incoming_dev) = incoming.get("devDependencies") {
        let Some(incoming_dev) = incoming_dev.as_object() else {
            return Err(VintageError::Merge(
                "template devDependencies is not an object".to_string(),
            ));
        };

        // updated in place so the key keeps its position in the file
        match doc.get_mut("devDependencies") {
            Some(Value::Object(dev)) => {
                for (name, version) in incoming_dev {
                    dev.insert(name.clone(), version.clone());
                }
            }
            Some(other) => {
                warn!(found = %other, "project devDependencies is not an object, replacing it");
                *other = Value::Object(incoming_dev.clone());
            }
            None => {
                doc.insert(
                    "devDependencies".to_string(),
                    Value::Object(incoming_dev.clone()),
                );
            }
        }
    }

    Ok(Value::Object(doc))
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| VintageError::Merge(format!("cannot parse '{}': {e}", path.display())))
}

/// Write through a sibling temp file and rename, so readers never see half a document.
fn write_document(path: &Path, doc: &Value) -> Result<()> {
    let mut rendered = serde_json::to_string_pretty(doc)?;
    rendered.push('\n');

    let tmp = path.with_extension("json.vintage-tmp");
    let write = || -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(rendered.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        VintageError::fs(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read_json(path: PathBuf) -> Value {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn reconciles_version_scripts_and_dev_dependencies() {
        let existing = json!({
            "dependencies": {"a": "1"},
            "devDependencies": {"x": "1"},
            "scripts": {"build": "old"},
            "version": "1.0.0"
        });
        let incoming = json!({
            "devDependencies": {"x": "2", "y": "1"},
            "scripts": {"build": "new"},
            "version": "2.0.0"
        });

        let merged = reconcile_package(existing, &incoming).unwrap();

        assert_eq!(
            merged,
            json!({
                "dependencies": {"a": "1"},
                "devDependencies": {"x": "2", "y": "1"},
                "scripts": {"build": "new"},
                "version": "2.0.0"
            })
        );
    }

    #[test]
    fn scripts_are_replaced_not_merged() {
        let existing = json!({"scripts": {"build": "old", "lint": "eslint"}, "name": "site"});
        let incoming = json!({"scripts": {"build": "new"}, "dependencies": {"evil": "1"}});

        let merged = reconcile_package(existing, &incoming).unwrap();
        assert_eq!(merged["scripts"], json!({"build": "new"}));
        assert_eq!(merged["name"], json!("site"));
        assert!(merged.get("dependencies").is_none());
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(matches!(
            reconcile_package(json!([1, 2]), &json!({})),
            Err(VintageError::Merge(_))
        ));
        assert!(matches!(
            reconcile_package(json!({}), &json!({"devDependencies": "x"})),
            Err(VintageError::Merge(_))
        ));
    }

    fn bundle_and_project() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("bundle");
        let project = dir.path().join("project");

        write(bundle.join("gulp/tasks/build.js"), "new build");
        write(bundle.join("webpack.config.js"), "new webpack");
        write(bundle.join("vintage-frontend.json"), r#"{"template":"2"}"#);
        write(
            bundle.join("package.json"),
            r#"{"version":"2.0.0","scripts":{"build":"gulp"},"devDependencies":{"gulp":"4"}}"#,
        );

        write(project.join("gulp/tasks/old.js"), "stale");
        write(project.join("webpack.config.js"), "old webpack");
        write(project.join("src/app.js"), "user code");
        write(
            project.join("package.json"),
            r#"{"name":"site","version":"1.0.0","dependencies":{"jquery":"3"},"devDependencies":{"eslint":"8"}}"#,
        );

        (dir, bundle, project)
    }

    #[test]
    fn applies_manifest_to_working_tree() {
        let (_dir, bundle, project) = bundle_and_project();

        let report = MergeEngine::new(MergeManifest::default())
            .apply_merge(&bundle, &project)
            .unwrap();

        assert!(!report.is_partial());
        assert_eq!(report.applied.len(), 4);
        assert_eq!(
            fs::read_to_string(project.join("gulp/tasks/build.js")).unwrap(),
            "new build"
        );
        assert!(!project.join("gulp/tasks/old.js").exists());
        assert_eq!(
            fs::read_to_string(project.join("webpack.config.js")).unwrap(),
            "new webpack"
        );
        assert_eq!(fs::read_to_string(project.join("src/app.js")).unwrap(), "user code");
        assert_eq!(
            read_json(project.join("package.json")),
            json!({
                "name": "site",
                "version": "2.0.0",
                "dependencies": {"jquery": "3"},
                "devDependencies": {"eslint": "8", "gulp": "4"},
                "scripts": {"build": "gulp"}
            })
        );
    }

    #[test]
    fn merging_twice_matches_merging_once() {
        let (_dir, bundle, project) = bundle_and_project();
        let engine = MergeEngine::new(MergeManifest::default());

        engine.apply_merge(&bundle, &project).unwrap();
        let once = snapshot(&project);
        engine.apply_merge(&bundle, &project).unwrap();
        let twice = snapshot(&project);

        assert_eq!(once, twice);
    }

    #[test]
    fn missing_bundle_entry_is_reported_and_rest_applied() {
        let (_dir, bundle, project) = bundle_and_project();
        fs::remove_file(bundle.join("webpack.config.js")).unwrap();

        let report = MergeEngine::new(MergeManifest::default())
            .apply_merge(&bundle, &project)
            .unwrap();

        assert_eq!(report.missing, vec!["webpack.config.js".to_string()]);
        assert_eq!(
            fs::read_to_string(project.join("webpack.config.js")).unwrap(),
            "old webpack"
        );
        assert_eq!(read_json(project.join("package.json"))["version"], json!("2.0.0"));
    }

    #[test]
    fn missing_project_package_json_is_fatal() {
        let (_dir, bundle, project) = bundle_and_project();
        fs::remove_file(project.join("package.json")).unwrap();

        let err = MergeEngine::new(MergeManifest::default())
            .apply_merge(&bundle, &project)
            .unwrap_err();
        assert!(matches!(err, VintageError::Filesystem { .. }));
    }

    #[test]
    fn unparsable_project_package_json_is_left_untouched() {
        let (_dir, bundle, project) = bundle_and_project();
        write(project.join("package.json"), "{ broken");

        let err = MergeEngine::new(MergeManifest::default())
            .apply_merge(&bundle, &project)
            .unwrap_err();
        assert!(matches!(err, VintageError::Merge(_)));
        assert_eq!(
            fs::read_to_string(project.join("package.json")).unwrap(),
            "{ broken"
        );
    }
}
