//! Off-chain multisig upgrade proposals.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use vault_core::Address;

use crate::error::{ChainError, ChainResult};

/// Everything a multisig needs to execute an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub network: String,
    /// The proxy being upgraded.
    pub contract_address: Address,
    pub contract_name: String,
    pub new_implementation: Address,
    /// Encoded post-upgrade call, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<String>,
    /// Custody account the proposal is addressed to.
    pub via: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalMetadata {
    pub proposal_id: String,
    /// Implementation address as reported back by the backend. Backends are
    /// not required to echo it.
    pub new_implementation_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub url: String,
    pub metadata: ProposalMetadata,
}

#[async_trait]
pub trait ProposalService: Send + Sync {
    async fn create_proposal(&self, request: &ProposalRequest) -> ChainResult<Proposal>;
}

/// Writes each proposal as a JSON document into a directory, for review and
/// hand-off to whoever operates the custody account.
#[derive(Debug, Clone)]
pub struct FileProposalService {
    dir: PathBuf,
    rehearsal: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposalDocument<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    rehearsal: bool,
    #[serde(flatten)]
    request: &'a ProposalRequest,
}

impl FileProposalService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rehearsal: false,
        }
    }

    /// Mark every document as a rehearsal: its addresses come from a
    /// simulated chain and must not be executed.
    pub fn rehearsal(mut self) -> Self {
        self.rehearsal = true;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn proposal_id(request: &ProposalRequest) -> ChainResult<String> {
        let canonical = serde_json::to_vec(request).map_err(|e| ChainError::Proposal(e.to_string()))?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(&digest[..8]))
    }
}

#[async_trait]
impl ProposalService for FileProposalService {
    async fn create_proposal(&self, request: &ProposalRequest) -> ChainResult<Proposal> {
        let id = Self::proposal_id(request)?;
        let document = ProposalDocument {
            id: &id,
            rehearsal: self.rehearsal,
            request,
        };
        let mut body =
            serde_json::to_string_pretty(&document).map_err(|e| ChainError::Proposal(e.to_string()))?;
        body.push('\n');

        fs::create_dir_all(&self.dir).map_err(|e| ChainError::Proposal(e.to_string()))?;
        let path = self.dir.join(format!("{id}.json"));
        fs::write(&path, body).map_err(|e| ChainError::Proposal(e.to_string()))?;

        let url = format!("file://{}", path.display());
        info!(
            network = %request.network,
            rehearsal = self.rehearsal,
            proxy = %request.contract_address,
            via = %request.via,
            %url,
            "upgrade proposal written"
        );

        Ok(Proposal {
            url,
            metadata: ProposalMetadata {
                proposal_id: id,
                new_implementation_address: Some(request.new_implementation),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProposalRequest {
        ProposalRequest {
            network: "arbitrum".to_string(),
            contract_address: Address::from_bytes([1u8; 20]),
            contract_name: "Strategy".to_string(),
            new_implementation: Address::from_bytes([2u8; 20]),
            call_data: Some("0xdeadbeef".to_string()),
            via: Address::from_bytes([3u8; 20]),
        }
    }

    #[tokio::test]
    async fn writes_document_and_reports_implementation() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileProposalService::new(dir.path().join("proposals"));

        let proposal = service.create_proposal(&request()).await.unwrap();
        assert!(proposal.url.starts_with("file://"));
        assert_eq!(
            proposal.metadata.new_implementation_address,
            Some(Address::from_bytes([2u8; 20]))
        );

        let path = service.dir().join(format!("{}.json", proposal.metadata.proposal_id));
        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(doc["callData"], "0xdeadbeef");
        assert_eq!(doc["via"], Address::from_bytes([3u8; 20]).to_string());
        assert!(doc.get("rehearsal").is_none());
    }

    #[tokio::test]
    async fn ids_are_stable_and_rehearsals_are_marked() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileProposalService::new(dir.path()).rehearsal();

        let a = service.create_proposal(&request()).await.unwrap();
        let b = service.create_proposal(&request()).await.unwrap();
        assert_eq!(a.metadata.proposal_id, b.metadata.proposal_id);

        let path = service.dir().join(format!("{}.json", a.metadata.proposal_id));
        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(doc["rehearsal"], true);
    }
}
