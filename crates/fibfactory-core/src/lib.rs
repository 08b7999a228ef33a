//! fibfactory core
//!
//! Lifecycle orchestration for ephemeral environments of the fib service.
//! Each environment is one infrastructure stack named `{project}-{env}`,
//! created, listed and destroyed through an injected automation engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 fibfactory CLI                   │
//! │            (create / list / destroy)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                fibfactory-core                   │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │ Stack Naming │  │   Lifecycle<E: Engine>   │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait AutomationEngine / StackHandle     │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  pulumi CLI   │ │   in-memory   │
//! │    engine     │ │ engine (test) │
//! └───────────────┘ └───────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod naming;
pub mod outcome;
pub mod stack;

// Re-exports
pub use engine::{AutomationEngine, InfrastructureProgram, StackHandle};
pub use error::{EngineError, EngineResult, ErrorKind, LifecycleError, Result, Step};
pub use lifecycle::Lifecycle;
pub use memory::{InMemoryEngine, InMemoryStack};
pub use naming::{
    EnvironmentId, MAX_ENVIRONMENT_ID_LEN, ProjectName, StackName, derive_stack_name,
};
pub use outcome::{ListOutcome, Operation, OperationOutcome};
pub use stack::{
    APP_NAME_KEY, CONTAINER_PORT_KEY, ConfigValue, DEFAULT_CONTAINER_PORT, DestroyResult,
    SERVICE_URL_OUTPUT, StackConfig, StackSummary, UpResult, UpdateSummary,
};
