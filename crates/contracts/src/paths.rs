use std::path::{Path, PathBuf};

/// Where ecosystem packages are installed unless configured otherwise.
pub const DEFAULT_PACKAGES_DIR: &str = "node_modules";

/// Directory of the published package for an artifact family, e.g.
/// `node_modules/@0x/contracts-zero-ex`.
pub fn package_dir(root: &Path, family: &str) -> PathBuf {
    root.join("@0x").join(format!("contracts-{family}"))
}

pub fn artifact_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(name).with_extension("json")
}

/// The standard-JSON compiler input stored next to an artifact.
pub fn compiler_input_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.input.json"))
}
