// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Codebase analysis.
//!
//! Walks a repository and gathers, for every source file of a known
//! language: size, line count, imports, classes, functions, exports, notable
//! constructs (HTTP endpoints, persistent models, UI components), and a rough
//! complexity score. On top of that, a project level summary is derived:
//! languages, frameworks, declared dependencies, entry points, configuration
//! and documentation files, and the files most worth reading first.
//!
//! Hidden entries and well-known build or dependency directories are never
//! descended into. Files that cannot be read are logged and skipped.
//!
//! # See Also
//!
//! 1. [`extract`] for the pattern based extractors.

pub mod extract;

pub use extract::{KeyPattern, Language, Outline};

use chrono::{DateTime, Local, Utc};
use glob::Pattern;
use ignore::WalkBuilder;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write as FmtWrite,
    fs::{read, read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Directories never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    "dist",
    "build",
    "target",
    "bin",
    "obj",
];

const ENTRY_POINTS: &[&str] = &[
    "main.py",
    "app.py",
    "index.js",
    "server.js",
    "main.js",
    "index.ts",
    "main.ts",
    "App.js",
    "App.tsx",
    "index.html",
    "src/main.rs",
    "src/lib.rs",
    "main.go",
];

const CONFIG_PATTERNS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "Pipfile",
    "pom.xml",
    "build.gradle",
    "Cargo.toml",
    "composer.json",
    "setup.py",
    "pyproject.toml",
    "go.mod",
    "config.*",
    "settings.*",
    "*.config.*",
    "docker*",
    "Dockerfile",
];

const NAME_LIMIT: usize = 20;
const PATTERN_LIMIT: usize = 10;

/// Facts about a single source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// Path relative to repository root.
    pub path: PathBuf,
    pub size: u64,
    pub lines: usize,
    pub language: Language,
    pub imports: Vec<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub exports: Vec<String>,
    pub key_patterns: Vec<KeyPattern>,
    pub complexity: u32,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Project level facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectStructure {
    pub name: String,
    pub root: PathBuf,
    pub total_files: usize,
    pub total_lines: usize,

    /// Number of files per language.
    pub languages: BTreeMap<Language, usize>,
    pub frameworks: BTreeSet<String>,

    /// Declared dependencies, keyed `<ecosystem>:<name>`.
    pub dependencies: BTreeMap<String, String>,
    pub entry_points: Vec<String>,
    pub config_files: Vec<PathBuf>,
    pub documentation: Vec<PathBuf>,
}

/// Notable construct together with the file it was found in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub name: String,
    pub file: PathBuf,
    pub language: Language,
}

/// Complex file worth reading first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyComponent {
    pub name: String,
    pub path: PathBuf,
    pub language: Language,
    pub complexity: u32,
    pub lines: usize,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub key_patterns: Vec<KeyPattern>,
}

/// Condensed view of a project for picking up work on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectContext {
    pub architecture_patterns: Vec<String>,
    pub key_components: Vec<KeyComponent>,
    pub api_endpoints: Vec<Finding>,
    pub database_models: Vec<Finding>,
    pub ui_components: Vec<Finding>,
    pub external_services: Vec<String>,
    pub critical_files: Vec<PathBuf>,
    pub analyzed_at: DateTime<Local>,
}

/// Full analysis of a repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub files: Vec<FileReport>,
    pub structure: ProjectStructure,
    pub context: ProjectContext,
}

/// Analyze repository at root.
///
/// # Errors
///
/// - Return [`AnalyzeError::NotADirectory`] if root is not a directory.
#[instrument(skip(root), level = "debug")]
pub fn analyze(root: impl AsRef<Path>) -> Result<Analysis> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(AnalyzeError::NotADirectory(root.to_path_buf()));
    }

    let config_patterns = CONFIG_PATTERNS
        .iter()
        .map(|pattern| Pattern::new(pattern))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut files = Vec::new();
    let mut structure = ProjectStructure {
        name: root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        root: root.to_path_buf(),
        ..Default::default()
    };

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
            let ignored = IGNORED_DIRS.iter().any(|dir| entry.file_name() == *dir);
            !(is_dir && entry.depth() > 0 && ignored)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("skip unreadable entry: {error}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let name = entry.file_name().to_string_lossy();
        if config_patterns.iter().any(|pattern| pattern.matches(&name)) {
            structure.config_files.push(relative.clone());
        }
        if name.ends_with(".md") && structure.documentation.len() < PATTERN_LIMIT {
            structure.documentation.push(relative.clone());
        }

        let Some(language) = path
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(Language::from_extension)
        else {
            continue;
        };

        let content = match read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(error) => {
                warn!("skip unreadable file {:?}: {error}", path.display());
                continue;
            }
        };
        let metadata = entry.metadata().ok();

        let report = analyze_file(
            relative,
            language,
            &content,
            metadata.as_ref().map_or(0, |meta| meta.len()),
            metadata
                .and_then(|meta| meta.modified().ok())
                .map(DateTime::<Utc>::from),
        );
        debug!("analyzed {:?}", report.path.display());

        *structure.languages.entry(language).or_default() += 1;
        structure.total_lines += report.lines;
        structure
            .frameworks
            .extend(extract::detect_frameworks(&content).into_iter().map(String::from));
        files.push(report);
    }

    structure.total_files = files.len();
    structure.dependencies = read_dependencies(root);
    structure.entry_points = ENTRY_POINTS
        .iter()
        .filter(|entry| root.join(entry).is_file())
        .map(|entry| entry.to_string())
        .collect();

    let context = build_context(&files, &structure);
    info!(
        "analyzed {} file(s) in {} language(s) under {:?}",
        structure.total_files,
        structure.languages.len(),
        root.display()
    );

    Ok(Analysis {
        files,
        structure,
        context,
    })
}

/// Build report of one file from its content.
pub fn analyze_file(
    path: PathBuf,
    language: Language,
    content: &str,
    size: u64,
    last_modified: Option<DateTime<Utc>>,
) -> FileReport {
    let outline = match language {
        Language::Python => extract::python_outline(content),
        language if language.is_script() => extract::script_outline(content),
        _ => Outline::default(),
    };
    let limit = |mut names: Vec<String>| -> Vec<String> {
        names.truncate(NAME_LIMIT);
        names
    };

    let mut key_patterns = extract::key_patterns(content, language);
    key_patterns.truncate(PATTERN_LIMIT);

    FileReport {
        path,
        size,
        lines: content.matches('\n').count() + 1,
        language,
        imports: limit(outline.imports),
        classes: limit(outline.classes),
        functions: limit(outline.functions),
        exports: limit(outline.exports),
        key_patterns,
        complexity: extract::complexity_score(content),
        last_modified,
    }
}

/// Declared dependencies of npm, pip, and cargo manifests at root.
///
/// Unreadable or malformed manifests are logged and skipped.
pub fn read_dependencies(root: &Path) -> BTreeMap<String, String> {
    let mut dependencies = BTreeMap::new();

    if let Some(content) = read_manifest(&root.join("package.json")) {
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(json) => {
                for section in ["dependencies", "devDependencies"] {
                    let Some(entries) = json.get(section).and_then(|value| value.as_object()) else {
                        continue;
                    };
                    for (name, version) in entries {
                        let version = version.as_str().unwrap_or_default().to_string();
                        dependencies.insert(format!("npm:{name}"), version);
                    }
                }
            }
            Err(error) => warn!("skip malformed package.json: {error}"),
        }
    }

    if let Some(content) = read_manifest(&root.join("requirements.txt")) {
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let name = line
                .split(['=', '>', '<', '~', '!', '[', ';', ' '])
                .next()
                .unwrap_or(line);
            dependencies.insert(format!("pip:{name}"), line.to_string());
        }
    }

    if let Some(content) = read_manifest(&root.join("Cargo.toml")) {
        match content.parse::<toml::Table>() {
            Ok(manifest) => {
                for section in ["dependencies", "dev-dependencies"] {
                    let entries = manifest.get(section).and_then(|value| value.as_table());
                    let Some(entries) = entries else {
                        continue;
                    };
                    for (name, spec) in entries {
                        let version = match spec {
                            toml::Value::String(version) => version.clone(),
                            toml::Value::Table(table) => table
                                .get("version")
                                .and_then(|version| version.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            _ => String::new(),
                        };
                        dependencies.insert(format!("cargo:{name}"), version);
                    }
                }
            }
            Err(error) => warn!("skip malformed Cargo.toml: {error}"),
        }
    }

    dependencies
}

fn read_manifest(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match read_to_string(path) {
        Ok(content) => Some(content),
        Err(error) => {
            warn!("skip unreadable {:?}: {error}", path.display());
            None
        }
    }
}

fn build_context(files: &[FileReport], structure: &ProjectStructure) -> ProjectContext {
    let mut api_endpoints = Vec::new();
    let mut database_models = Vec::new();
    let mut ui_components = Vec::new();
    for file in files {
        for pattern in &file.key_patterns {
            let (bucket, name) = match pattern {
                KeyPattern::ApiEndpoint(name) => (&mut api_endpoints, name),
                KeyPattern::DbModel(name) => (&mut database_models, name),
                KeyPattern::UiComponent(name) => (&mut ui_components, name),
            };
            bucket.push(Finding {
                name: name.clone(),
                file: file.path.clone(),
                language: file.language,
            });
        }
    }
    api_endpoints.truncate(20);
    database_models.truncate(15);
    ui_components.truncate(20);

    let key_components = by_complexity(files, 25)
        .into_iter()
        .take(15)
        .map(|file| KeyComponent {
            name: file
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: file.path.clone(),
            language: file.language,
            complexity: file.complexity,
            lines: file.lines,
            classes: file.classes.iter().take(5).cloned().collect(),
            functions: file.functions.iter().take(10).cloned().collect(),
            key_patterns: file.key_patterns.iter().take(5).cloned().collect(),
        })
        .collect();

    let path_mentions = |needle: &str| {
        files
            .iter()
            .any(|file| file.path.to_string_lossy().to_lowercase().contains(needle))
    };
    let architecture_patterns = [
        ("models", "Model-View Architecture"),
        ("controller", "MVC Pattern"),
        ("service", "Service Layer Pattern"),
        ("component", "Component-Based Architecture"),
    ]
    .into_iter()
    .filter(|(needle, _)| path_mentions(*needle))
    .map(|(_, pattern)| pattern.to_string())
    .collect();

    let external_services = structure
        .dependencies
        .keys()
        .filter(|name| {
            let name = name.to_lowercase();
            ["api", "http", "request", "axios", "fetch"]
                .iter()
                .any(|hint| name.contains(hint))
        })
        .cloned()
        .collect();

    let critical_files = files
        .iter()
        .filter(|file| file.complexity > 40)
        .take(10)
        .map(|file| file.path.clone())
        .collect();

    ProjectContext {
        architecture_patterns,
        key_components,
        api_endpoints,
        database_models,
        ui_components,
        external_services,
        critical_files,
        analyzed_at: Local::now(),
    }
}

/// Files above a complexity score, most complex first, ties by path.
fn by_complexity(files: &[FileReport], above: u32) -> Vec<&FileReport> {
    let mut complex = files
        .iter()
        .filter(|file| file.complexity > above)
        .collect::<Vec<_>>();
    complex.sort_by(|a, b| b.complexity.cmp(&a.complexity).then_with(|| a.path.cmp(&b.path)));
    complex
}

impl Analysis {
    /// Render Markdown summary of the analysis.
    pub fn render_summary(&self) -> String {
        let structure = &self.structure;
        let context = &self.context;
        let join = |items: &[String], fallback: &str| -> String {
            if items.is_empty() {
                fallback.to_string()
            } else {
                items.join(", ")
            }
        };

        let mut languages = structure.languages.iter().collect::<Vec<_>>();
        languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let languages = languages
            .iter()
            .map(|(language, count)| format!("{language} ({count} files)"))
            .collect::<Vec<_>>();
        let frameworks = structure.frameworks.iter().cloned().collect::<Vec<_>>();

        // INVARIANT: Writing into a string never fails.
        let mut out = String::new();
        let _ = writeln!(out, "# Project analysis: {}\n", structure.name);
        let _ = writeln!(out, "## Statistics\n");
        let _ = writeln!(out, "- Files: {}", structure.total_files);
        let _ = writeln!(out, "- Lines: {}", structure.total_lines);
        let _ = writeln!(out, "- Languages: {}", join(&languages, "none"));
        let _ = writeln!(out, "- Frameworks: {}", join(&frameworks, "none detected"));
        let _ = writeln!(
            out,
            "- Architecture: {}",
            join(&context.architecture_patterns, "not identified")
        );
        let _ = writeln!(
            out,
            "- Entry points: {}",
            join(&structure.entry_points, "not identified")
        );
        let _ = writeln!(out, "- Configuration files: {}", structure.config_files.len());
        let _ = writeln!(out, "- Documentation files: {}", structure.documentation.len());

        let _ = writeln!(out, "\n## Dependencies\n");
        if structure.dependencies.is_empty() {
            let _ = writeln!(out, "No dependency manifest found.");
        }
        for (name, version) in structure.dependencies.iter().take(15) {
            let _ = writeln!(out, "- {name} {version}");
        }

        let _ = writeln!(out, "\n## Critical files\n");
        if context.key_components.is_empty() {
            let _ = writeln!(out, "No file stands out by complexity.");
        }
        for component in context.key_components.iter().take(10) {
            let _ = writeln!(
                out,
                "- `{}` ({}, {} lines, complexity {})",
                component.path.display(),
                component.language,
                component.lines,
                component.complexity
            );
            if !component.functions.is_empty() {
                let functions = component.functions.iter().take(5).cloned().collect::<Vec<_>>();
                let _ = writeln!(out, "  - functions: {}", functions.join(", "));
            }
            if !component.classes.is_empty() {
                let classes = component.classes.iter().take(3).cloned().collect::<Vec<_>>();
                let _ = writeln!(out, "  - classes: {}", classes.join(", "));
            }
        }

        for (title, findings, shown) in [
            ("API endpoints", &context.api_endpoints, 10),
            ("Database models", &context.database_models, 8),
            ("UI components", &context.ui_components, 10),
        ] {
            if findings.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {title}\n");
            for finding in findings.iter().take(shown) {
                let _ = writeln!(out, "- `{}` in {}", finding.name, finding.file.display());
            }
        }

        let _ = writeln!(out, "\nAnalyzed at {}", context.analyzed_at.to_rfc3339());
        out
    }

    /// Write analysis artifacts into output directory.
    ///
    /// Writes `files.json`, `structure.json`, `context.json`, and
    /// `summary.md`, or only the summary. Returns written paths.
    ///
    /// # Errors
    ///
    /// - Return [`AnalyzeError::Write`] if an artifact cannot be written.
    /// - Return [`AnalyzeError::Json`] if an artifact cannot be serialized.
    #[instrument(skip(self, output_dir), level = "debug")]
    pub fn write_reports(
        &self,
        output_dir: impl AsRef<Path>,
        summary_only: bool,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        mkdirp::mkdirp(output_dir).map_err(|err| AnalyzeError::Write {
            source: err,
            path: output_dir.to_path_buf(),
        })?;

        let mut artifacts = Vec::new();
        if !summary_only {
            artifacts.push(("files.json", serde_json::to_string_pretty(&self.files)?));
            artifacts.push(("structure.json", serde_json::to_string_pretty(&self.structure)?));
            artifacts.push(("context.json", serde_json::to_string_pretty(&self.context)?));
        }
        artifacts.push(("summary.md", self.render_summary()));

        let mut paths = Vec::new();
        for (name, content) in artifacts {
            let path = output_dir.join(name);
            write(&path, content).map_err(|err| AnalyzeError::Write {
                source: err,
                path: path.clone(),
            })?;
            paths.push(path);
        }
        info!("wrote {} artifact(s) into {:?}", paths.len(), output_dir.display());

        Ok(paths)
    }
}

/// Codebase analysis error types.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Root is not a directory.
    #[error("{:?} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Artifact cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Artifact cannot be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Configuration file pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = AnalyzeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write_file(root: &Path, relative: &str, content: &str) -> std::io::Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }

    fn fixture() -> anyhow::Result<tempfile::TempDir> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        write_file(
            root,
            "app.py",
            indoc! {r#"
                from flask import Flask
                app = Flask(__name__)

                @app.route("/health")
                def health():
                    return "ok"
            "#},
        )?;
        write_file(
            root,
            "services/models.py",
            indoc! {"
                import sqlalchemy

                class Account(db.Model):
                    pass
            "},
        )?;
        write_file(root, "web/Header.jsx", "export const Header = () => <h1/>;\n")?;
        write_file(root, "README.md", "# demo\n")?;
        write_file(root, "requirements.txt", "flask==3.0\n# tooling\nrequests>=2\n")?;
        write_file(root, "node_modules/left-pad/index.js", "module.exports = pad;\n")?;
        write_file(root, ".venv/lib/site.py", "import os\n")?;
        write_file(root, "target/debug/build.rs", "fn main() {}\n")?;
        Ok(dir)
    }

    #[test]
    fn analyze_skips_ignored_directories() -> anyhow::Result<()> {
        let dir = fixture()?;
        let analysis = analyze(dir.path())?;

        let paths = analysis
            .files
            .iter()
            .map(|file| file.path.clone())
            .collect::<Vec<_>>();
        let expect = vec![
            PathBuf::from("app.py"),
            PathBuf::from("services/models.py"),
            PathBuf::from("web/Header.jsx"),
        ];
        assert_eq!(paths, expect);

        let structure = &analysis.structure;
        assert_eq!(structure.total_files, 3);
        assert_eq!(structure.languages.get(&Language::Python), Some(&2));
        assert_eq!(structure.languages.get(&Language::React), Some(&1));
        assert!(structure.frameworks.contains("Flask"));
        assert_eq!(structure.entry_points, vec!["app.py".to_string()]);
        assert_eq!(structure.config_files, vec![PathBuf::from("requirements.txt")]);
        assert_eq!(structure.documentation, vec![PathBuf::from("README.md")]);

        Ok(())
    }

    #[test]
    fn analyze_collects_findings() -> anyhow::Result<()> {
        let dir = fixture()?;
        let analysis = analyze(dir.path())?;
        let context = &analysis.context;

        let names = |findings: &[Finding]| -> Vec<String> {
            findings.iter().map(|finding| finding.name.clone()).collect()
        };
        assert_eq!(names(&context.api_endpoints), vec!["/health"]);
        assert_eq!(names(&context.database_models), vec!["Account"]);
        assert_eq!(names(&context.ui_components), vec!["Header"]);
        assert_eq!(
            context.architecture_patterns,
            vec!["Model-View Architecture", "Service Layer Pattern"]
        );
        assert_eq!(context.external_services, vec!["pip:requests"]);

        let app = &analysis.files[0];
        assert_eq!(app.imports, vec!["flask.Flask"]);
        assert_eq!(app.functions, vec!["health"]);
        assert_eq!(app.lines, 7);

        Ok(())
    }

    #[test]
    fn read_dependencies_from_manifests() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_file(
            dir.path(),
            "package.json",
            r#"{ "dependencies": { "axios": "^1.6" }, "devDependencies": { "jest": "29" } }"#,
        )?;
        write_file(
            dir.path(),
            "Cargo.toml",
            indoc! {r#"
                [dependencies]
                serde = { version = "1.0", features = ["derive"] }
                regex = "1.10"
            "#},
        )?;

        let result = read_dependencies(dir.path());
        let expect = BTreeMap::from([
            ("cargo:regex".to_string(), "1.10".to_string()),
            ("cargo:serde".to_string(), "1.0".to_string()),
            ("npm:axios".to_string(), "^1.6".to_string()),
            ("npm:jest".to_string(), "29".to_string()),
        ]);
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn key_components_rank_by_complexity() {
        let simple = analyze_file(PathBuf::from("a.py"), Language::Python, "x = 1\n", 6, None);
        let busy_source = "if (x) {}\n".repeat(20);
        let busy = analyze_file(PathBuf::from("b.js"), Language::Javascript, &busy_source, 0, None);
        let structure = ProjectStructure::default();

        let context = build_context(&[simple, busy], &structure);
        let ranked = context
            .key_components
            .iter()
            .map(|component| component.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(ranked, vec!["b".to_string()]);
        assert_eq!(context.critical_files, vec![PathBuf::from("b.js")]);
    }

    #[test]
    fn write_reports_honors_summary_only() -> anyhow::Result<()> {
        let dir = fixture()?;
        let output = tempfile::tempdir()?;
        let analysis = analyze(dir.path())?;

        let paths = analysis.write_reports(output.path().join("full"), false)?;
        assert_eq!(paths.len(), 4);
        let files: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.path().join("full/files.json"))?)?;
        assert_eq!(files[0]["path"], "app.py");
        assert_eq!(files[0]["language"], "python");
        assert_eq!(files[0]["key_patterns"][0]["kind"], "api_endpoint");

        let paths = analysis.write_reports(output.path().join("brief"), true)?;
        assert_eq!(paths, vec![output.path().join("brief/summary.md")]);
        let summary = fs::read_to_string(&paths[0])?;
        assert!(summary.contains("- Frameworks: Flask"));
        assert!(summary.contains("`/health` in app.py"));

        Ok(())
    }
}
