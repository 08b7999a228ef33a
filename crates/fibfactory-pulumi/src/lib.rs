//! Pulumi engine for fibfactory
//!
//! Implements the `AutomationEngine` trait on top of the pulumi CLI and
//! renders the App Runner program the environment stacks run.
//!
//! # Requirements
//!
//! - `pulumi` CLI must be installed and logged in to a backend
//!   (`pulumi login`, or `PULUMI_BACKEND_URL`)
//! - Docker must be available for the image build
//! - AWS credentials are picked up by the AWS provider as usual
//!
//! # Example
//!
//! ```ignore
//! use fibfactory_core::{Lifecycle, ProjectName};
//! use fibfactory_pulumi::{AppRunnerProgram, PulumiCli, PulumiEngine};
//!
//! let program = app_runner_program.materialize(&work_dir).await?;
//! let engine = PulumiEngine::new(PulumiCli::new("pulumi", &work_dir));
//! let lifecycle = Lifecycle::new(engine, ProjectName::new("fibfactory")?, program);
//!
//! let outcome = lifecycle.create("test1").await?;
//! println!("{}", outcome.service_url().unwrap_or_default());
//! ```

pub mod cli;
pub mod engine;
pub mod error;
pub mod program;

pub use cli::{PulumiCli, StackInfo, UpdateInfo};
pub use engine::{PulumiEngine, PulumiStack};
pub use error::{PulumiError, Result};
pub use program::{AppRunnerProgram, PROJECT_FILE, read_project_name};
