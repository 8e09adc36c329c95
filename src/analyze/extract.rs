// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pattern based extraction from source text.
//!
//! Nothing here parses source code. Every extractor is a set of regular
//! expressions run over the raw text, so results are best-effort.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Language of a source file, detected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    React,
    Vue,
    Java,
    Cpp,
    C,
    Csharp,
    Go,
    Rust,
    Php,
    Ruby,
    Swift,
    Kotlin,
    Html,
    Css,
    Scss,
    Sql,
}

impl Language {
    /// Detect language from file extension, case-insensitive.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let language = match extension.to_ascii_lowercase().as_str() {
            "py" => Self::Python,
            "js" => Self::Javascript,
            "ts" => Self::Typescript,
            "jsx" | "tsx" => Self::React,
            "vue" => Self::Vue,
            "java" => Self::Java,
            "cpp" => Self::Cpp,
            "c" => Self::C,
            "cs" => Self::Csharp,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "php" => Self::Php,
            "rb" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" => Self::Kotlin,
            "html" => Self::Html,
            "css" => Self::Css,
            "scss" => Self::Scss,
            "sql" => Self::Sql,
            _ => return None,
        };

        Some(language)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::React => "react",
            Self::Vue => "vue",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Csharp => "csharp",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Php => "php",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Html => "html",
            Self::Css => "css",
            Self::Scss => "scss",
            Self::Sql => "sql",
        }
    }

    /// JavaScript family: plain, TypeScript, or JSX/TSX.
    pub fn is_script(&self) -> bool {
        matches!(self, Self::Javascript | Self::Typescript | Self::React)
    }
}

impl Display for Language {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.pad(self.as_str())
    }
}

/// Named items declared or referenced by a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub imports: Vec<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub exports: Vec<String>,
}

/// Notable construct found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum KeyPattern {
    /// HTTP route, e.g., `/users/<id>`.
    ApiEndpoint(String),

    /// Persistent model or table.
    DbModel(String),

    /// UI component.
    UiComponent(String),
}

impl Display for KeyPattern {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::ApiEndpoint(name) => write!(fmt, "endpoint {name}"),
            Self::DbModel(name) => write!(fmt, "model {name}"),
            Self::UiComponent(name) => write!(fmt, "component {name}"),
        }
    }
}

fn regex(pattern: &str) -> Regex {
    // INVARIANT: Only called with constant patterns covered by tests.
    Regex::new(pattern).unwrap_or_else(|error| panic!("bad pattern {pattern:?}: {error}"))
}

fn regex_ignore_case(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|error| panic!("bad pattern {pattern:?}: {error}"))
}

fn regexes(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|pattern| regex(pattern)).collect()
}

static PY_IMPORT: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*import\s+([\w.]+(?:\s*,\s*[\w.]+)*)"));
static PY_FROM_IMPORT: Lazy<Regex> =
    Lazy::new(|| regex(r"(?m)^\s*from\s+([\w.]+)\s+import\s+\(?\s*(\w+|\*)"));
static PY_CLASS: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*class\s+(\w+)"));
static PY_FUNCTION: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*(?:async\s+)?def\s+(\w+)"));

static JS_IMPORTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    regexes(&[
        r#"import\s+[^;]*?\s+from\s+["']([^"']+)["']"#,
        r#"import\s+["']([^"']+)["']"#,
        r#"require\(["']([^"']+)["']\)"#,
    ])
});
static JS_EXPORT_NAMED: Lazy<Regex> =
    Lazy::new(|| regex(r"export\s+(?:default\s+)?(?:class|function|const|let|var)\s+(\w+)"));
static JS_EXPORT_LIST: Lazy<Regex> = Lazy::new(|| regex(r"export\s*\{\s*([^}]+)\s*\}"));
static JS_MODULE_EXPORTS: Lazy<Regex> = Lazy::new(|| regex(r"module\.exports\s*=\s*(\w+)"));
static JS_CLASS: Lazy<Regex> = Lazy::new(|| regex(r"\bclass\s+(\w+)"));
static JS_FUNCTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    regexes(&[
        r"(?:async\s+)?function\s+(\w+)\s*\(",
        r"const\s+(\w+)\s*=\s*(?:async\s+)?\([^)]*\)\s*=>",
        r"(\w+)\s*:\s*(?:async\s+)?function",
    ])
});

static COMPLEXITY: Lazy<Vec<Regex>> = Lazy::new(|| {
    regexes(&[
        r"class\s+\w+",
        r"function\s+\w+",
        r"def\s+\w+",
        r"if\s*\(",
        r"for\s*\(",
        r"while\s*\(",
        r"try\s*\{",
        r"catch\s*\(",
        r"except\s*:",
        r"async\s+",
        r"await\s+",
        r"Promise",
        r"@\w+",
        r"#\[.*\]",
    ])
});

static FRAMEWORKS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    let table: [(&str, &[&str]); 11] = [
        ("React", &[r"import.*react", r#"from ["']react["']"#]),
        ("Vue", &[r"import.*vue", r"<template>", r"export default.*Vue"]),
        ("Angular", &[r"@angular", r"@Component", r"@Injectable"]),
        ("Django", &[r"from django", r"django\.urls", r"models\.Model"]),
        ("Flask", &[r"from flask", r"Flask\(__name__\)", r"@app\.route"]),
        ("Express", &[r"express\(\)", r#"require\(["']express["']"#]),
        ("FastAPI", &[r"from fastapi", r"FastAPI\(\)"]),
        ("Spring", &[r"@RestController", r"@Service", r"@Entity"]),
        ("Next.js", &[r"next/head", r"next/router", r"getStaticProps"]),
        ("Nuxt", &[r"nuxt\.config", r"<nuxt-", r"@nuxtjs"]),
        ("Svelte", &[r"export let", r"svelte/store"]),
    ];
    table
        .into_iter()
        .map(|(name, patterns)| {
            let patterns = patterns
                .iter()
                .map(|pattern| regex_ignore_case(pattern))
                .collect::<Vec<_>>();
            (name, patterns)
        })
        .collect()
});

static API_ENDPOINTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    regexes(&[
        r#"@app\.route\(["']([^"']+)["']"#,
        r#"@(?:Get|Post|Put|Delete|Patch)Mapping\(["']([^"']+)["']"#,
        r#"router\.(?:get|post|put|delete|patch)\(["']([^"']+)["']"#,
        r#"app\.(?:get|post|put|delete|patch)\(["']([^"']+)["']"#,
    ])
});
static DB_MODELS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex_ignore_case(r"class\s+(\w+)\s*\([^)]*Model[^)]*\)"),
        regex(r"@Entity\s+(?:public\s+)?class\s+(\w+)"),
        regex_ignore_case(r"CREATE TABLE\s+(?:IF NOT EXISTS\s+)?(\w+)"),
    ]
});
static UI_COMPONENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    regexes(&[
        r"(?:function|const)\s+([A-Z]\w+).*?(?:return\s*\(|\s*=>)",
        r"class\s+([A-Z]\w+)\s+extends\s+(?:React\.)?Component",
    ])
});

fn captures<'a>(regex: &'a Regex, content: &'a str) -> impl Iterator<Item = String> + 'a {
    regex
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().trim().to_string())
}

/// Outline of Python source.
///
/// `from a.b import c` is recorded as import `a.b.c`.
pub fn python_outline(content: &str) -> Outline {
    let mut outline = Outline::default();
    for caps in PY_IMPORT.captures_iter(content) {
        outline.imports.extend(
            caps[1]
                .split(',')
                .map(|module| module.trim().to_string())
                .filter(|module| !module.is_empty()),
        );
    }
    for caps in PY_FROM_IMPORT.captures_iter(content) {
        outline.imports.push(format!("{}.{}", &caps[1], &caps[2]));
    }
    outline.classes.extend(captures(&PY_CLASS, content));
    outline.functions.extend(captures(&PY_FUNCTION, content));

    outline
}

/// Outline of JavaScript family source.
pub fn script_outline(content: &str) -> Outline {
    let mut outline = Outline::default();
    for regex in JS_IMPORTS.iter() {
        outline.imports.extend(captures(regex, content));
    }

    outline.exports.extend(captures(&JS_EXPORT_NAMED, content));
    for list in captures(&JS_EXPORT_LIST, content) {
        outline.exports.extend(
            list.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        );
    }
    outline.exports.extend(captures(&JS_MODULE_EXPORTS, content));

    outline.classes.extend(captures(&JS_CLASS, content));
    for regex in JS_FUNCTIONS.iter() {
        outline.functions.extend(captures(regex, content));
    }

    outline
}

/// Rough complexity score in `0..=100`.
///
/// One point per ten lines, capped at 50, plus two points per control
/// structure, definition, async construct, or decorator.
pub fn complexity_score(content: &str) -> u32 {
    let lines = content.matches('\n').count() + 1;
    let mut score = (lines / 10).min(50);
    for regex in COMPLEXITY.iter() {
        score += regex.find_iter(content).count() * 2;
    }

    u32::try_from(score.min(100)).unwrap_or(100)
}

/// Frameworks hinted at by content, in fixed order.
pub fn detect_frameworks(content: &str) -> Vec<&'static str> {
    FRAMEWORKS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|regex| regex.is_match(content)))
        .map(|(name, _)| *name)
        .collect()
}

/// Endpoints, models, and (for script languages) UI components.
pub fn key_patterns(content: &str, language: Language) -> Vec<KeyPattern> {
    let mut found = Vec::new();
    for regex in API_ENDPOINTS.iter() {
        found.extend(captures(regex, content).map(KeyPattern::ApiEndpoint));
    }
    for regex in DB_MODELS.iter() {
        found.extend(captures(regex, content).map(KeyPattern::DbModel));
    }
    if language.is_script() {
        for regex in UI_COMPONENTS.iter() {
            found.extend(captures(regex, content).map(KeyPattern::UiComponent));
        }
    }

    found
}
