use {
    crate::{
        artifact::{Artifact, ArtifactError, ArtifactId, CompilerInput},
        paths,
    },
    std::path::{Path, PathBuf},
};

/// Resolves ecosystem contract artifacts by family and name.
pub trait ArtifactStore: Send + Sync {
    fn resolve(&self, id: &ArtifactId) -> Result<Artifact, ArtifactError>;

    /// The standard-JSON compiler input the artifact was compiled from.
    fn resolve_input(&self, id: &ArtifactId) -> Result<CompilerInput, ArtifactError>;
}

/// Which generated-artifacts directory of a published package to read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    Test,
    Lib,
}

impl Layout {
    fn dir(self) -> &'static str {
        match self {
            Layout::Test => "test/generated-artifacts",
            Layout::Lib => "lib/generated-artifacts",
        }
    }
}

/// Artifacts of installed `@0x/contracts-<family>` packages.
#[derive(Clone, Debug)]
pub struct PackageStore {
    root: PathBuf,
    layout: Layout,
}

impl PackageStore {
    pub fn new(root: impl Into<PathBuf>, layout: Layout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    fn dir(&self, family: &str) -> PathBuf {
        paths::package_dir(&self.root, family).join(self.layout.dir())
    }

    fn existing(&self, id: &ArtifactId, path: PathBuf) -> Result<PathBuf, ArtifactError> {
        if path.is_file() {
            Ok(path)
        } else {
            tracing::trace!(%id, path = %path.display(), "artifact candidate missing");
            Err(ArtifactError::not_found(id))
        }
    }
}

impl ArtifactStore for PackageStore {
    fn resolve(&self, id: &ArtifactId) -> Result<Artifact, ArtifactError> {
        let path = self.existing(id, paths::artifact_file(&self.dir(&id.family), &id.name))?;
        Artifact::from_file(&path)
    }

    fn resolve_input(&self, id: &ArtifactId) -> Result<CompilerInput, ArtifactError> {
        let path = self.existing(
            id,
            paths::compiler_input_file(&self.dir(&id.family), &id.name),
        )?;
        CompilerInput::from_file(&path)
    }
}

/// Tries each store in order; the first store that has the artifact wins.
/// Any error other than "not found" is returned immediately.
pub struct Fallback(Vec<Box<dyn ArtifactStore>>);

impl Fallback {
    pub fn new(stores: Vec<Box<dyn ArtifactStore>>) -> Self {
        Self(stores)
    }

    /// The package registry: test artifacts first, then lib artifacts.
    pub fn packages(root: &Path) -> Self {
        Self::new(vec![
            Box::new(PackageStore::new(root, Layout::Test)),
            Box::new(PackageStore::new(root, Layout::Lib)),
        ])
    }

    fn first<T>(
        &self,
        id: &ArtifactId,
        resolve: impl Fn(&dyn ArtifactStore) -> Result<T, ArtifactError>,
    ) -> Result<T, ArtifactError> {
        for store in &self.0 {
            match resolve(store.as_ref()) {
                Err(ArtifactError::NotFound { .. }) => continue,
                result => return result,
            }
        }
        Err(ArtifactError::not_found(id))
    }
}

impl ArtifactStore for Fallback {
    fn resolve(&self, id: &ArtifactId) -> Result<Artifact, ArtifactError> {
        self.first(id, |store| store.resolve(id))
    }

    fn resolve_input(&self, id: &ArtifactId) -> Result<CompilerInput, ArtifactError> {
        self.first(id, |store| store.resolve_input(id))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json, std::fs};

    fn write_artifact(root: &Path, layout: Layout, id: &ArtifactId, bytecode: &str) {
        let dir = paths::package_dir(root, &id.family).join(layout.dir());
        fs::create_dir_all(&dir).unwrap();
        let artifact = json!({
            "contractName": id.name,
            "compilerOutput": {
                "abi": [],
                "evm": { "bytecode": { "object": bytecode } },
            },
        });
        fs::write(
            paths::artifact_file(&dir, &id.name),
            artifact.to_string(),
        )
        .unwrap();
    }

    #[test]
    fn prefers_test_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("zero-ex", "ZeroEx");
        write_artifact(root.path(), Layout::Test, &id, "0x01");
        write_artifact(root.path(), Layout::Lib, &id, "0x02");

        let artifact = Fallback::packages(root.path()).resolve(&id).unwrap();
        assert_eq!(artifact.bytecode.as_ref(), [0x01]);
    }

    #[test]
    fn falls_back_to_lib_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("multisig", "ZeroExGovernor");
        write_artifact(root.path(), Layout::Lib, &id, "0x02");

        let artifact = Fallback::packages(root.path()).resolve(&id).unwrap();
        assert_eq!(artifact.contract_name, "ZeroExGovernor");
        assert_eq!(artifact.bytecode.as_ref(), [0x02]);
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("zero-ex", "Nope");
        let err = Fallback::packages(root.path()).resolve(&id).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::NotFound { ref family, ref name }
                if family == "zero-ex" && name == "Nope"
        ));
        assert_eq!(err.to_string(), "unable to find Nope for zero-ex");
    }

    #[test]
    fn malformed_artifact_is_not_skipped() {
        let root = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("zero-ex", "Broken");
        let dir = paths::package_dir(root.path(), &id.family).join(Layout::Test.dir());
        fs::create_dir_all(&dir).unwrap();
        fs::write(paths::artifact_file(&dir, &id.name), "not json").unwrap();
        write_artifact(root.path(), Layout::Lib, &id, "0x02");

        let err = Fallback::packages(root.path()).resolve(&id).unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { .. }));
    }

    #[test]
    fn resolves_compiler_input() {
        let root = tempfile::tempdir().unwrap();
        let id = ArtifactId::new("zero-ex", "ZeroEx");
        let dir = paths::package_dir(root.path(), &id.family).join(Layout::Test.dir());
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            paths::compiler_input_file(&dir, &id.name),
            json!({ "settings": { "version": "0.6.12" } }).to_string(),
        )
        .unwrap();

        let input = Fallback::packages(root.path()).resolve_input(&id).unwrap();
        assert_eq!(input.version(), Some("0.6.12"));
    }
}
