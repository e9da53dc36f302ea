//! On-disk Go module fixtures.

use std::fs;
use std::path::{Path, PathBuf};

/// Writes a small Go module under a root directory.
#[derive(Debug, Clone)]
pub struct GoModule {
    root: PathBuf,
    module: String,
}

impl GoModule {
    /// Create `go.mod` declaring `module` in `root`.
    pub fn create(root: &Path, module: &str) -> Self {
        fs::write(root.join("go.mod"), format!("module {module}\n\ngo 1.22\n"))
            .expect("write go.mod");
        Self {
            root: root.to_path_buf(),
            module: module.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `dir/file` with a package clause and imports of the given local
    /// package dirs.
    pub fn source(&self, dir: &str, file: &str, local_imports: &[&str]) -> PathBuf {
        let package = Path::new(dir)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| n != ".")
            .unwrap_or_else(|| "main".to_string());

        let mut body = format!("package {package}\n\n");
        if !local_imports.is_empty() {
            body.push_str("import (\n\t\"fmt\"\n");
            for import in local_imports {
                body.push_str(&format!("\t\"{}/{}\"\n", self.module, import));
            }
            body.push_str(")\n\n");
        }
        body.push_str("func Value() int { return 1 }\n");
        self.write(dir, file, &body)
    }

    /// Write a `_test.go` file so `dir` becomes a test target.
    pub fn test_file(&self, dir: &str, file: &str) -> PathBuf {
        let package = Path::new(dir)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        let body = format!(
            "package {package}\n\nimport \"testing\"\n\nfunc TestValue(t *testing.T) {{\n\tif Value() != 1 {{\n\t\tt.Fatal(\"bad\")\n\t}}\n}}\n"
        );
        self.write(dir, file, &body)
    }

    /// Write arbitrary content relative to the root.
    pub fn write(&self, dir: &str, file: &str, content: &str) -> PathBuf {
        let dir_path = self.root.join(dir);
        fs::create_dir_all(&dir_path).expect("create package dir");
        let path = dir_path.join(file);
        fs::write(&path, content).expect("write fixture file");
        path
    }
}

/// Root of the in-memory module built by [`mock_shop`].
pub const SHOP_ROOT: &str = "/proj";

/// An in-memory module `example.com/shop`:
///
/// ```text
/// store            (tests)
/// api        → store   (tests)
/// e2e        → api     (tests)
/// cmd/server → api
/// util             (no tests, imported by nobody)
/// ```
pub fn mock_shop() -> sentinel::fs::mock::MockFileSystem {
    let fs = sentinel::fs::mock::MockFileSystem::new();
    let file = |rel: &str, body: &str| fs.add_file(format!("{SHOP_ROOT}/{rel}"), body);

    file("go.mod", "module example.com/shop\n\ngo 1.22\n");
    file("store/store.go", "package store\n\nfunc Get() int { return 1 }\n");
    file(
        "store/store_test.go",
        "package store\n\nimport \"testing\"\n\nfunc TestGet(t *testing.T) {\n\tif Get() != 2 {\n\t\tt.Fatalf(\"want 2\")\n\t}\n}\n",
    );
    file(
        "api/api.go",
        "package api\n\nimport (\n\t\"fmt\"\n\t\"example.com/shop/store\"\n)\n\nfunc Show() string { return fmt.Sprint(store.Get()) }\n",
    );
    file("api/api_test.go", "package api\n\nimport \"testing\"\n\nfunc TestShow(t *testing.T) {}\n");
    file(
        "e2e/e2e_test.go",
        "package e2e\n\nimport (\n\t\"testing\"\n\n\t\"example.com/shop/api\"\n)\n\nfunc TestFlow(t *testing.T) { _ = api.Show() }\n",
    );
    file(
        "cmd/server/main.go",
        "package main\n\nimport \"example.com/shop/api\"\n\nfunc main() { println(api.Show()) }\n",
    );
    file("util/util.go", "package util\n\nfunc Noop() {}\n");
    fs
}
