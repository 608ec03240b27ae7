//! Deferred source verification on block explorers.
//!
//! Every deployment is recorded in a [`VerifyQueue`]. At the end of a live
//! run the queue is drained: entries are submitted to the network's explorer
//! one at a time, with a delay between submissions to stay below the
//! explorer's rate limits.

use {
    alloy::primitives::{Address, Bytes},
    anyhow::{Context, Result},
    chain::Network,
    contracts::{ArtifactId, ArtifactStore},
    serde::{Deserialize, Serialize},
    std::{error::Error as StdError, io, sync::Arc, time::Duration},
};

/// A successful deployment awaiting source verification.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// `<family>/<contractName>` of the deployed artifact.
    pub name: String,
    pub address: Address,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
}

#[derive(Debug, Default)]
pub struct VerifyQueue(parking_lot::Mutex<Vec<DeploymentRecord>>);

impl VerifyQueue {
    pub fn enqueue(&self, record: DeploymentRecord) {
        tracing::debug!(name = %record.name, address = ?record.address, "queued for verification");
        self.0.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Empties the queue, returning its entries in insertion order. Entries
    /// queued afterwards land in the emptied queue.
    pub fn take(&self) -> Vec<DeploymentRecord> {
        std::mem::take(&mut *self.0.lock())
    }

    /// Verifies every queued entry, sleeping `delay` before each submission.
    /// Draining an empty queue does nothing.
    pub async fn drain(&self, verifier: &Verifier, delay: Duration) -> Result<Vec<Outcome>> {
        let records = self.take();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(count = records.len(), ?delay, "verifying deployed contracts");

        let mut outcomes = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            tokio::time::sleep(delay).await;
            match verifier.verify(record).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    for unverified in &records[i..] {
                        tracing::error!(record = %manual(unverified), "not verified");
                    }
                    return Err(err);
                }
            }
        }
        Ok(outcomes)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Accepted by the explorer. Carries the explorer's reference (usually a
    /// GUID to poll the verification status with).
    Submitted(String),
    /// Rejected by the explorer. Needs to be verified manually.
    Rejected(String),
    /// The network has no explorer to verify on.
    Skipped,
}

/// The form posted to an Etherscan-compatible `verifysourcecode` endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VerificationRequest {
    pub apikey: String,
    pub module: &'static str,
    pub action: &'static str,
    pub contractaddress: Address,
    #[serde(rename = "sourceCode")]
    pub source_code: String,
    pub codeformat: &'static str,
    pub contractname: String,
    /// Hex without prefix. Omitted when there are no constructor arguments.
    #[serde(
        rename = "constructorArguements",
        skip_serializing_if = "Option::is_none"
    )]
    pub constructor_arguments: Option<String>,
    pub compilerversion: String,
    #[serde(rename = "licenseType")]
    pub license_type: u8,
}

/// Explorer license id for Apache-2.0.
const LICENSE_APACHE_2_0: u8 = 12;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == "1"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The request did not make it to the explorer but may on a retry.
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error(transparent)]
    Fatal(anyhow::Error),
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait VerificationApi: Send + Sync {
    async fn submit(
        &self,
        url: &str,
        request: &VerificationRequest,
    ) -> Result<ApiResponse, SubmitError>;
}

/// [`VerificationApi`] over HTTP.
pub struct Explorer {
    client: reqwest::Client,
}

impl Explorer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build explorer HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl VerificationApi for Explorer {
    async fn submit(
        &self,
        url: &str,
        request: &VerificationRequest,
    ) -> Result<ApiResponse, SubmitError> {
        let response = self
            .client
            .post(url)
            .form(request)
            .send()
            .await
            .map_err(classify)?;
        response.json().await.map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> SubmitError {
    if err.is_timeout() || is_transient(&err) {
        SubmitError::Transient(err.to_string())
    } else {
        SubmitError::Fatal(err.into())
    }
}

/// Resolver message for `EAI_AGAIN`.
const DNS_TRY_AGAIN: &str = "Temporary failure in name resolution";

/// Connections reset or dropped mid-request, timeouts and DNS lookups that
/// ran out of retries. Refused connections, unknown hosts and TLS failures
/// do not go away by retrying.
fn is_transient(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<io::Error>() {
            if matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::TimedOut
            ) || io.to_string().contains(DNS_TRY_AGAIN)
            {
                return true;
            }
        }
        if let Some(hyper) = inner.downcast_ref::<hyper::Error>() {
            if hyper.is_incomplete_message() || hyper.is_closed() || hyper.is_timeout() {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

/// The compiler input does not contain the contract's source file, so the
/// explorer cannot compile it.
#[derive(Debug, thiserror::Error)]
#[error("compiler input of {0} has no source for it")]
pub struct MissingSource(pub ArtifactId);

/// Submits deployment records to the explorer of one network.
pub struct Verifier {
    api: Arc<dyn VerificationApi>,
    artifacts: Arc<dyn ArtifactStore>,
    network: &'static Network,
    api_key: String,
}

impl Verifier {
    pub fn new(
        api: Arc<dyn VerificationApi>,
        artifacts: Arc<dyn ArtifactStore>,
        network: &'static Network,
        api_key: String,
    ) -> Self {
        Self {
            api,
            artifacts,
            network,
            api_key,
        }
    }

    /// Builds the verification form: the standard-JSON input the artifact was
    /// compiled from and the encoded constructor arguments.
    pub fn request(&self, record: &DeploymentRecord) -> Result<VerificationRequest> {
        let id = record.name.parse::<ArtifactId>()?;
        let artifact = self.artifacts.resolve(&id)?;
        let input = self.artifacts.resolve_input(&id)?;
        let compiler_version = input
            .version()
            .with_context(|| format!("compiler input of {id} has no version"))?;
        let contract_path = input
            .contract_path(&artifact.contract_name)
            .ok_or_else(|| MissingSource(id.clone()))?;

        Ok(VerificationRequest {
            apikey: self.api_key.clone(),
            module: "contract",
            action: "verifysourcecode",
            contractaddress: record.address,
            source_code: serde_json::to_string(&input.without_version())?,
            codeformat: "solidity-standard-json-input",
            contractname: contract_path,
            constructor_arguments: (!record.constructor_args.is_empty())
                .then(|| alloy::primitives::hex::encode(&record.constructor_args)),
            compilerversion: format!("v{compiler_version}"),
            license_type: LICENSE_APACHE_2_0,
        })
    }

    /// Submits one record. Transient transport errors are retried until the
    /// explorer answers. A rejection is logged for manual follow-up and is
    /// not an error.
    pub async fn verify(&self, record: &DeploymentRecord) -> Result<Outcome> {
        let Some(url) = self.network.explorer_api_url else {
            tracing::warn!(
                network = %self.network,
                record = %manual(record),
                "no explorer to verify on"
            );
            return Ok(Outcome::Skipped);
        };
        let request = match self.request(record) {
            Ok(request) => request,
            Err(err) if err.is::<MissingSource>() => {
                tracing::error!(%err, record = %manual(record), "verification rejected");
                return Ok(Outcome::Rejected(err.to_string()));
            }
            Err(err) => return Err(err),
        };
        tracing::info!(
            name = %record.name,
            network = %self.network,
            address = ?record.address,
            "verifying source code"
        );

        let response = loop {
            match self.api.submit(url, &request).await {
                Ok(response) => break response,
                Err(SubmitError::Transient(reason)) => {
                    tracing::warn!(%reason, name = %record.name, "explorer unreachable, retrying");
                }
                Err(SubmitError::Fatal(err)) => {
                    return Err(err.context(format!("failed to verify {}", record.name)));
                }
            }
        };

        let result = match &response.result {
            serde_json::Value::String(result) => result.clone(),
            other => other.to_string(),
        };
        if !response.is_success() {
            tracing::error!(
                message = %response.message,
                %result,
                record = %manual(record),
                "verification rejected"
            );
            return Ok(Outcome::Rejected(result));
        }
        tracing::info!(name = %record.name, reference = %result, "verification submitted");
        Ok(Outcome::Submitted(result))
    }
}

/// The record as JSON, enough to verify it by hand.
fn manual(record: &DeploymentRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| format!("{record:?}"))
}
