use {
    alloy::{json_abi::JsonAbi, primitives::Bytes},
    serde_json::Value,
    std::{
        fmt,
        fs,
        path::{Path, PathBuf},
        str::FromStr,
    },
};

/// Identifies an ecosystem contract as `<family>/<contractName>`, for example
/// `zero-ex/ZeroEx` or `multisig/ZeroExGovernor`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ArtifactId {
    pub family: String,
    pub name: String,
}

impl ArtifactId {
    pub fn new(family: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
        }
    }
}

impl FromStr for ArtifactId {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((family, name)) if !family.is_empty() && !name.is_empty() => {
                Ok(Self::new(family, name))
            }
            _ => Err(ArtifactError::InvalidId(s.to_owned())),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid artifact name {0:?}, expected `<family>/<contractName>`")]
    InvalidId(String),
    #[error("unable to find {name} for {family}")]
    NotFound { family: String, name: String },
    #[error("malformed artifact {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub fn not_found(id: &ArtifactId) -> Self {
        Self::NotFound {
            family: id.family.clone(),
            name: id.name.clone(),
        }
    }
}

/// Where each property lives in the supported artifact layouts. The first
/// non-null path wins, so published packages (`compilerOutput.*`) and flat
/// build outputs (`abi`, `bytecode`) load the same way.
const ABI_PATHS: &str = "compilerOutput.abi,abi";
const BYTECODE_PATHS: &str = "compilerOutput.evm.bytecode.object,bytecode.object,bytecode";
const CONTRACT_NAME_PATHS: &str = "contractName,contract_name";

/// A compiled contract: interface description and creation code.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    /// Creation code. Empty for interface-only artifacts.
    pub bytecode: Bytes,
}

impl Artifact {
    /// Loads an artifact from a JSON file. The file stem is used as the
    /// contract name if the artifact does not carry one.
    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let json = read_json(path)?;
        let fallback_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.trim_end_matches(".output"))
            .unwrap_or_default();
        Self::from_json(&json, fallback_name).map_err(|reason| ArtifactError::Malformed {
            path: path.to_owned(),
            reason,
        })
    }

    pub fn from_json(json: &Value, fallback_name: &str) -> Result<Self, String> {
        let abi = lookup(json, ABI_PATHS).ok_or("missing ABI")?;
        let abi = serde_json::from_value::<JsonAbi>(abi.clone())
            .map_err(|err| format!("invalid ABI: {err}"))?;
        let bytecode = match lookup(json, BYTECODE_PATHS) {
            Some(Value::String(code)) => code
                .parse::<Bytes>()
                .map_err(|err| format!("invalid bytecode: {err}"))?,
            Some(_) => return Err("bytecode is not a hex string".to_owned()),
            None => Bytes::new(),
        };
        let contract_name = lookup(json, CONTRACT_NAME_PATHS)
            .and_then(Value::as_str)
            .unwrap_or(fallback_name)
            .to_owned();
        Ok(Self {
            contract_name,
            abi,
            bytecode,
        })
    }
}

/// The standard-JSON compiler input an artifact was built from. Needed to
/// reproduce the compilation for source verification.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerInput(pub Value);

impl CompilerInput {
    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        read_json(path).map(Self)
    }

    /// The compiler version the input was compiled with, e.g.
    /// `0.6.12+commit.27d51765`.
    pub fn version(&self) -> Option<&str> {
        self.0.pointer("/settings/version")?.as_str()
    }

    /// The input with `settings.version` stripped, which explorers reject.
    pub fn without_version(&self) -> Value {
        let mut input = self.0.clone();
        if let Some(settings) = input.get_mut("settings").and_then(Value::as_object_mut) {
            settings.remove("version");
        }
        input
    }

    /// The fully qualified `<file path>:<contract name>` of a contract in the
    /// input's sources. The first matching file in the input's order wins.
    pub fn contract_path(&self, contract_name: &str) -> Option<String> {
        let suffix = format!("/{contract_name}.sol");
        self.0
            .get("sources")?
            .as_object()?
            .keys()
            .find(|file| file.ends_with(&suffix))
            .map(|file| format!("{file}:{contract_name}"))
    }
}

fn lookup<'a>(json: &'a Value, paths: &str) -> Option<&'a Value> {
    paths
        .split(',')
        .map(|path| {
            path.split('.')
                .try_fold(json, |value, property| value.get(property))
        })
        .find_map(|value| value.filter(|value| !value.is_null()))
}

pub(crate) fn read_json(path: &Path) -> Result<Value, ArtifactError> {
    let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|err| ArtifactError::Malformed {
        path: path.to_owned(),
        reason: err.to_string(),
    })
}
