//! Handles on ecosystem contracts, driven by their published artifacts.

use {
    alloy::{
        dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier},
        json_abi::Function,
        primitives::{Address, Bytes},
    },
    contracts::{Artifact, ArtifactId},
    std::sync::Arc,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} has not been deployed")]
    NotDeployed(ArtifactId),
    #[error("{0} has no creation code")]
    NoBytecode(ArtifactId),
    #[error("{contract} has no function {function} taking {arguments} arguments")]
    UnknownFunction {
        contract: ArtifactId,
        function: String,
        arguments: usize,
    },
    #[error("{contract} expects {expected} constructor arguments, got {actual}")]
    ConstructorArguments {
        contract: ArtifactId,
        expected: usize,
        actual: usize,
    },
    #[error("failed to ABI-encode or decode {context} of {contract}")]
    Encoding {
        contract: ArtifactId,
        context: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
}

/// An artifact, optionally bound to the address it is deployed at.
#[derive(Clone, Debug)]
pub struct EcosystemContract {
    id: ArtifactId,
    artifact: Arc<Artifact>,
    address: Option<Address>,
}

impl EcosystemContract {
    pub fn new(id: ArtifactId, artifact: Artifact, address: Option<Address>) -> Self {
        Self {
            id,
            artifact: Arc::new(artifact),
            address,
        }
    }

    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn address(&self) -> Result<Address, Error> {
        self.address.ok_or_else(|| Error::NotDeployed(self.id.clone()))
    }

    /// Binds a freshly deployed handle to its address.
    pub(crate) fn deployed_at(self, address: Address) -> Self {
        debug_assert!(self.address.is_none(), "{} is already bound", self.id);
        Self {
            address: Some(address),
            ..self
        }
    }

    /// ABI-encoded constructor arguments, without the creation code.
    pub fn encode_constructor_args(&self, args: &[DynSolValue]) -> Result<Bytes, Error> {
        let Some(constructor) = &self.artifact.abi.constructor else {
            return match args.len() {
                0 => Ok(Bytes::new()),
                actual => Err(Error::ConstructorArguments {
                    contract: self.id.clone(),
                    expected: 0,
                    actual,
                }),
            };
        };
        if constructor.inputs.len() != args.len() {
            return Err(Error::ConstructorArguments {
                contract: self.id.clone(),
                expected: constructor.inputs.len(),
                actual: args.len(),
            });
        }
        constructor
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|source| self.encoding_error("constructor arguments", source))
    }

    /// Creation code followed by the encoded constructor arguments.
    pub fn encode_deploy(&self, args: &[DynSolValue]) -> Result<Bytes, Error> {
        if self.artifact.bytecode.is_empty() {
            return Err(Error::NoBytecode(self.id.clone()));
        }
        let args = self.encode_constructor_args(args)?;
        Ok([self.artifact.bytecode.as_ref(), args.as_ref()]
            .concat()
            .into())
    }

    /// The overload of `name` that takes `arguments` arguments.
    pub fn function(&self, name: &str, arguments: usize) -> Result<&Function, Error> {
        self.artifact
            .abi
            .function(name)
            .into_iter()
            .flatten()
            .find(|function| function.inputs.len() == arguments)
            .ok_or_else(|| Error::UnknownFunction {
                contract: self.id.clone(),
                function: name.to_owned(),
                arguments,
            })
    }

    /// Selector followed by the encoded arguments.
    pub fn encode_call(&self, name: &str, args: &[DynSolValue]) -> Result<Bytes, Error> {
        self.function(name, args.len())?
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|source| self.encoding_error(name, source))
    }

    pub fn decode_output(
        &self,
        name: &str,
        arguments: usize,
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, Error> {
        self.function(name, arguments)?
            .abi_decode_output(data)
            .map_err(|source| self.encoding_error(name, source))
    }

    /// Parses textual constructor arguments by the constructor's parameter
    /// types.
    pub fn parse_constructor_args(&self, args: &[String]) -> Result<Vec<DynSolValue>, Error> {
        let inputs = self
            .artifact
            .abi
            .constructor
            .as_ref()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();
        if inputs.len() != args.len() {
            return Err(Error::ConstructorArguments {
                contract: self.id.clone(),
                expected: inputs.len(),
                actual: args.len(),
            });
        }
        let context = "constructor arguments";
        inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty: DynSolType = param
                    .resolve()
                    .map_err(|source| self.encoding_error(context, source))?;
                ty.coerce_str(arg)
                    .map_err(|source| self.encoding_error(context, source))
            })
            .collect()
    }

    fn encoding_error(&self, context: &str, source: alloy::dyn_abi::Error) -> Error {
        Error::Encoding {
            contract: self.id.clone(),
            context: context.to_owned(),
            source,
        }
    }
}
