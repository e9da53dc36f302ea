// src/parser/source.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::model::{SourceContext, SourceLine};

/// Resolve a file named in test output.
///
/// `go test` prints paths relative to the package directory for `t.Errorf`
/// and absolute paths in stack traces.
pub fn resolve_source_path(package_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        package_dir.join(path)
    }
}

/// Up to `radius` lines on each side of `line` (1-based), with `line` marked.
///
/// Any failure to produce the window degrades to
/// [`SourceContext::Unavailable`].
pub fn extract_context(fs: &dyn FileSystem, path: &Path, line: usize, radius: usize) -> SourceContext {
    let contents = match fs.read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "source context unavailable");
            return SourceContext::unavailable();
        }
    };

    let all: Vec<&str> = contents.lines().collect();
    if line == 0 || line > all.len() {
        debug!(path = %path.display(), line, len = all.len(), "error line outside file");
        return SourceContext::unavailable();
    }

    let first = line.saturating_sub(radius).max(1);
    let last = (line + radius).min(all.len());

    let window = (first..=last)
        .map(|number| SourceLine {
            number,
            text: all[number - 1].to_string(),
            is_error_line: number == line,
        })
        .collect();

    SourceContext::Lines(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn window_is_clamped_at_file_edges() {
        let fs = MockFileSystem::new();
        fs.add_file("pkg/a_test.go", numbered(3));

        let SourceContext::Lines(lines) = extract_context(&fs, Path::new("pkg/a_test.go"), 1, 2) else {
            panic!("expected lines");
        };
        assert_eq!(lines.iter().map(|l| l.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(lines[0].is_error_line);
    }

    #[test]
    fn missing_file_or_line_is_unavailable() {
        let fs = MockFileSystem::new();
        fs.add_file("pkg/a_test.go", numbered(3));

        assert_eq!(
            extract_context(&fs, Path::new("pkg/missing.go"), 1, 2),
            SourceContext::unavailable()
        );
        assert_eq!(
            extract_context(&fs, Path::new("pkg/a_test.go"), 9, 2),
            SourceContext::unavailable()
        );
    }
}
