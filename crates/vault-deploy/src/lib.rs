//! vault-deploy: provisions investables and their libraries from a deploy
//! descriptor.
//!
//! # Architecture
//!
//! ```text
//! DeployPipeline
//!   ├── descriptor (vault-core resolver → ordered DeployUnits)
//!   ├── per unit
//!   │   ├── LibraryDeployer (dependency-ordered, reuses live records)
//!   │   ├── InvestableFactory (token → oracle → investable → wiring → ownership)
//!   │   └── LiveStore put
//!   ├── SmokeValidator (top-level investable only)
//!   └── VerificationQueue drain
//! ```
//!
//! Every state-mutating chain call goes through [`with_retry`]; structural
//! problems (bad descriptors, unresolved references) are raised before the
//! first transaction of the step they concern.

pub mod context;
pub mod error;
pub mod factory;
pub mod init;
pub mod libraries;
pub mod pipeline;
pub mod retry;
pub mod smoke;

pub use context::{DeployContext, RedeployPolicy};
pub use error::{DeployError, DeployResult};
pub use factory::{DeployedInvestable, InvestableFactory, INVESTMENT_TOKEN_CONTRACT};
pub use init::InitArgs;
pub use libraries::LibraryDeployer;
pub use pipeline::{DeployPipeline, DeployRequest, DeploymentReport};
pub use retry::{with_retry, RetryPolicy};
pub use smoke::{SmokeOutcome, SmokeReport, SmokeValidator};
