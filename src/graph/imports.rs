// src/graph/imports.rs

//! Just enough Go source scanning to build the local import graph.

use std::sync::LazyLock;

use regex::Regex;

static MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).expect("module regex is valid")
});

static IMPORT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^\s*import\s*\((.*?)\)").expect("import block regex is valid")
});

static IMPORT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("import line regex is valid")
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("quoted string regex is valid"));

/// Module path declared in a `go.mod` file.
pub fn module_path(go_mod: &str) -> Option<String> {
    MODULE_RE
        .captures(go_mod)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every import path of a Go source file, in order of appearance.
pub fn imports(source: &str) -> Vec<String> {
    let mut found = Vec::new();

    for block in IMPORT_BLOCK_RE.captures_iter(source) {
        if let Some(body) = block.get(1) {
            for line in body.as_str().lines() {
                let line = line.split("//").next().unwrap_or_default();
                if let Some(q) = QUOTED_RE.captures(line).and_then(|c| c.get(1)) {
                    found.push(q.as_str().to_string());
                }
            }
        }
    }

    for single in IMPORT_LINE_RE.captures_iter(source) {
        if let Some(q) = single.get(1) {
            found.push(q.as_str().to_string());
        }
    }

    found
}

/// Map an import path onto a package directory inside the module.
///
/// `example.com/app/pkg/store` with module `example.com/app` → `pkg/store`;
/// the module itself → `.`; anything else is external.
pub fn local_dir(module: &str, import: &str) -> Option<String> {
    if import == module {
        return Some(".".to_string());
    }
    import
        .strip_prefix(module)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}
