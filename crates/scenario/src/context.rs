//! State shared by every task of a load run.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use campus_client::{ApiError, CampusApi, Connector};
use campus_core::accounts::AccountPool;
use campus_core::allocator::CapacityAllocator;
use campus_core::config::BenchConfig;
use campus_core::failure::Failure;
use campus_core::ledger::Ledger;
use campus_core::model::{Course, Student};
use campus_core::reference::ReferenceModel;
use campus_core::types::UserCode;
use campus_events::DispatchBus;

use crate::deadline::Deadline;
use crate::params::CourseCodes;
use crate::retry::RetryPolicy;
use crate::verify::Sampler;

/// A newly activated student together with its logged-in session.
#[derive(Clone)]
pub struct StudentLoad {
    pub student: Arc<Student>,
    pub api: Arc<dyn CampusApi>,
}

/// A newly created course together with its teacher's session.
#[derive(Clone)]
pub struct CourseLoad {
    pub course: Arc<Course>,
    pub api: Arc<dyn CampusApi>,
}

/// Whether setup failures escalate to Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RampUp,
    Load,
}

pub struct LoadContext {
    pub config: BenchConfig,
    pub deadline: Deadline,
    pub ledger: Arc<Ledger>,
    pub model: ReferenceModel,
    pub allocator: CapacityAllocator,
    pub accounts: AccountPool,
    pub codes: CourseCodes,
    pub connector: Arc<dyn Connector>,
    pub student_bus: DispatchBus<StudentLoad>,
    pub course_bus: DispatchBus<CourseLoad>,
    agents: RwLock<HashMap<UserCode, Arc<dyn CampusApi>>>,
}

impl LoadContext {
    pub fn new(
        config: BenchConfig,
        deadline: Deadline,
        ledger: Arc<Ledger>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let accounts = AccountPool::new(config.teacher_count);
        let model = ReferenceModel::new(&accounts);
        Self {
            config,
            deadline,
            ledger,
            model,
            allocator: CapacityAllocator::new(),
            accounts,
            codes: CourseCodes::new(),
            connector,
            student_bus: DispatchBus::new("students"),
            course_bus: DispatchBus::new("courses"),
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Record a failed call. Timeouts are counted as noise.
    pub fn record(&self, error: &ApiError, expected: &[u16]) {
        match error.to_failure(expected) {
            Some(failure) => self.ledger.add_failure(failure),
            None => self.ledger.add_timeout(),
        }
    }

    /// Record verification failures. Returns `true` when there were none.
    pub fn record_failures(&self, failures: Vec<Failure>) -> bool {
        let clean = failures.is_empty();
        self.ledger.add_failures(failures);
        clean
    }

    pub fn retry_idempotent(&self) -> RetryPolicy {
        RetryPolicy::idempotent(self.config.retry_backoff)
    }

    pub fn retry_creation(&self) -> RetryPolicy {
        RetryPolicy::creation(self.config.retry_backoff)
    }

    pub fn search_sampler(&self) -> Sampler {
        Sampler::new(self.config.search_verify_rate)
    }

    pub fn archive_sampler(&self) -> Sampler {
        Sampler::new(self.config.assignments_verify_rate)
    }

    /// Pause before a cycle re-enters from the top. Returns `false` once the window closed.
    pub async fn idle(&self) -> bool {
        self.deadline.sleep(self.config.idle_backoff).await
    }

    pub async fn register_agent(&self, code: &str, api: Arc<dyn CampusApi>) {
        self.agents.write().await.insert(code.to_string(), api);
    }

    pub async fn agent(&self, code: &str) -> Option<Arc<dyn CampusApi>> {
        self.agents.read().await.get(code).cloned()
    }
}
