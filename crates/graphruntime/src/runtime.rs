use crate::System;
use graphcore::lower::Block;
use graphcore::{FlowError, Severity, TypeRegistry, ValidationReport, Wiring};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main entry point for validating, running and lowering a root system
pub struct FlowRuntime {
    types: Arc<TypeRegistry>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(TypeRegistry::standard()), config)
    }

    /// Create a new runtime with a pre-configured type registry
    pub fn with_registry(types: Arc<TypeRegistry>, config: RuntimeConfig) -> Self {
        Self { types, config }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Validate every node of the system and log what was found
    pub fn validate(&self, wiring: &Wiring, system: &System) -> ValidationReport {
        let report = system.validate(wiring, &self.types);
        for issue in report.issues() {
            match issue.severity {
                Severity::Error => tracing::error!(
                    system = %system.name(),
                    kind = %issue.kind,
                    location = %issue.location,
                    "{}",
                    issue.message
                ),
                Severity::Warning => tracing::warn!(
                    system = %system.name(),
                    kind = %issue.kind,
                    location = %issue.location,
                    "{}",
                    issue.message
                ),
            }
        }
        report
    }

    /// Run a system to completion
    pub fn execute(&self, wiring: &mut Wiring, system: &mut System) -> Result<ExecutionResult, FlowError> {
        let execution_id = Uuid::new_v4();
        let start_time = Instant::now();
        tracing::info!(%execution_id, system = %system.name(), "Starting execution");

        let validation = if self.config.validate_before_run {
            self.validate(wiring, system)
        } else {
            ValidationReport::new()
        };
        if self.config.deny_validation_errors && validation.has_errors() {
            let errors = validation.errors().count();
            tracing::error!(%execution_id, errors, "Refusing to run a system that failed validation");
            return Err(FlowError::Validation { errors });
        }

        if let Err(e) = system.run(wiring) {
            tracing::error!(%execution_id, "Execution failed: {}", e);
            return Err(e);
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(%execution_id, duration_ms, "Execution completed");

        Ok(ExecutionResult {
            execution_id,
            validation,
            duration_ms,
        })
    }

    /// Lower a system into an equivalent statement block
    pub fn lower(&self, wiring: &Wiring, system: &System) -> Result<Block, FlowError> {
        let block = system.lower(wiring)?;
        tracing::debug!(system = %system.name(), statements = block.len(), "Lowered system");
        Ok(block)
    }

    /// Lower a system and serialize the block for an external renderer
    pub fn lower_json(&self, wiring: &Wiring, system: &System) -> Result<String, FlowError> {
        Ok(self.lower(wiring, system)?.to_json()?)
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Validate the root system before every run
    pub validate_before_run: bool,
    /// Fail a run whose validation reported errors instead of only logging them
    pub deny_validation_errors: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            validate_before_run: true,
            deny_validation_errors: false,
        }
    }
}

/// Result of one run of a root system
#[derive(Debug)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub validation: ValidationReport,
    pub duration_ms: u64,
}
