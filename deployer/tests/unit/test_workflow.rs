//! Deployment workflow tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use project_deployer::app::options::WorkflowOptions;
use project_deployer::deploy::fsm::WorkflowState;
use project_deployer::deploy::provisioner::{
    ProjectBinding, ProvisionOutcome, Provisioner, ProvisionerFactory,
};
use project_deployer::deploy::workflow::DeploymentWorkflow;
use project_deployer::errors::DeployError;
use project_deployer::notify::NotificationSink;
use project_deployer::storage::state_store::{StateStore, StoreSession};
use project_models::{parse_members, DeploymentRequest, Members, ProjectStatus};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Bind,
    Launch,
    Clean {
        delete_job_name: Option<String>,
        raise_error: bool,
    },
    OpenSession,
    RecordLaunch {
        project_id: u64,
        members: Members,
        applications: Vec<String>,
    },
    RecordFailure {
        project_id: u64,
        status: ProjectStatus,
    },
    RecordDeletion {
        project_id: u64,
    },
    Discard,
    Close,
    Notify {
        label: String,
        text: String,
    },
}

type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Clone)]
enum Behavior {
    Succeed,
    Fail(&'static str),
    Hang,
}

// ============================== FAKES ============================== //

struct FakeFactory {
    log: CallLog,
    bind_fails: bool,
    launch: Behavior,
    clean: Behavior,
    outcome: ProvisionOutcome,
}

impl ProvisionerFactory for FakeFactory {
    fn bind(&self, _binding: &ProjectBinding) -> Result<Box<dyn Provisioner>, DeployError> {
        self.log.lock().unwrap().push(Call::Bind);
        if self.bind_fails {
            return Err(DeployError::Provisioning("cannot reach cluster".to_string()));
        }
        Ok(Box::new(FakeProvisioner {
            log: self.log.clone(),
            launch: self.launch.clone(),
            clean: self.clean.clone(),
            outcome: self.outcome.clone(),
        }))
    }
}

struct FakeProvisioner {
    log: CallLog,
    launch: Behavior,
    clean: Behavior,
    outcome: ProvisionOutcome,
}

async fn act(behavior: &Behavior) -> Result<(), DeployError> {
    match behavior {
        Behavior::Succeed => Ok(()),
        Behavior::Fail(message) => Err(DeployError::Provisioning(message.to_string())),
        Behavior::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn launch_project(&self) -> Result<ProvisionOutcome, DeployError> {
        self.log.lock().unwrap().push(Call::Launch);
        act(&self.launch).await?;
        Ok(self.outcome.clone())
    }

    async fn clean_project(
        &self,
        delete_job_name: Option<&str>,
        raise_error: bool,
    ) -> Result<(), DeployError> {
        self.log.lock().unwrap().push(Call::Clean {
            delete_job_name: delete_job_name.map(str::to_string),
            raise_error,
        });
        act(&self.clean).await
    }
}

#[derive(Clone, Default)]
struct StoreFailures {
    record_launch: bool,
    record_failure: bool,
}

struct FakeStore {
    log: CallLog,
    failures: StoreFailures,
}

#[async_trait]
impl StateStore for FakeStore {
    async fn open_session(&self) -> Result<Box<dyn StoreSession>, DeployError> {
        self.log.lock().unwrap().push(Call::OpenSession);
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            failures: self.failures.clone(),
        }))
    }
}

struct FakeSession {
    log: CallLog,
    failures: StoreFailures,
}

#[async_trait]
impl StoreSession for FakeSession {
    async fn record_launch(
        &mut self,
        project_id: u64,
        members: &Members,
        applications: &[String],
    ) -> Result<(), DeployError> {
        self.log.lock().unwrap().push(Call::RecordLaunch {
            project_id,
            members: members.clone(),
            applications: applications.to_vec(),
        });
        if self.failures.record_launch {
            return Err(DeployError::Persistence("connection reset".to_string()));
        }
        Ok(())
    }

    async fn record_failure(
        &mut self,
        project_id: u64,
        status: ProjectStatus,
    ) -> Result<(), DeployError> {
        self.log
            .lock()
            .unwrap()
            .push(Call::RecordFailure { project_id, status });
        if self.failures.record_failure {
            return Err(DeployError::Persistence("database is down".to_string()));
        }
        Ok(())
    }

    async fn record_deletion(&mut self, project_id: u64) -> Result<(), DeployError> {
        self.log
            .lock()
            .unwrap()
            .push(Call::RecordDeletion { project_id });
        Ok(())
    }

    async fn discard(self: Box<Self>) {
        self.log.lock().unwrap().push(Call::Discard);
    }

    async fn close(self: Box<Self>) {
        self.log.lock().unwrap().push(Call::Close);
    }
}

struct FakeNotifier {
    log: CallLog,
    fails: bool,
}

#[async_trait]
impl NotificationSink for FakeNotifier {
    async fn notify(&self, context_label: &str, error_text: &str) -> Result<(), DeployError> {
        self.log.lock().unwrap().push(Call::Notify {
            label: context_label.to_string(),
            text: error_text.to_string(),
        });
        if self.fails {
            return Err(DeployError::Notification("webhook returned 500".to_string()));
        }
        Ok(())
    }
}

// ============================== HARNESS ============================== //

struct Harness {
    log: CallLog,
    bind_fails: bool,
    launch: Behavior,
    clean: Behavior,
    store_failures: StoreFailures,
    notify_fails: bool,
    timeout: Duration,
}

impl Harness {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            bind_fails: false,
            launch: Behavior::Succeed,
            clean: Behavior::Succeed,
            store_failures: StoreFailures::default(),
            notify_fails: false,
            timeout: Duration::from_secs(5),
        }
    }

    fn workflow(&self) -> DeploymentWorkflow {
        let factory = Arc::new(FakeFactory {
            log: self.log.clone(),
            bind_fails: self.bind_fails,
            launch: self.launch.clone(),
            clean: self.clean.clone(),
            outcome: outcome(),
        });
        let store = Arc::new(FakeStore {
            log: self.log.clone(),
            failures: self.store_failures.clone(),
        });
        let notifier = Arc::new(FakeNotifier {
            log: self.log.clone(),
            fails: self.notify_fails,
        });
        let options = WorkflowOptions {
            provisioning_timeout: self.timeout,
            ..Default::default()
        };
        DeploymentWorkflow::new(factory, store, notifier, options)
    }

    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn position(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().position(|c| predicate(c)).unwrap()
    }
}

fn create_test_request(clean: bool) -> DeploymentRequest {
    DeploymentRequest {
        project_name: "analytics".to_string(),
        project_id: 31,
        enterprise_id: 7,
        members: parse_members("{'ann@corp.io':{'password':'pw','permission':'creator'}}").unwrap(),
        cluster_namespace: "lequanha".to_string(),
        components: ["airflow", "jupyter"].iter().map(|s| s.to_string()).collect(),
        environment: "staging".to_string(),
        image_tag: "latest".to_string(),
        clean,
    }
}

/// What the provisioner reports back, deliberately different from the request
fn outcome() -> ProvisionOutcome {
    ProvisionOutcome {
        members: parse_members("{'ann@corp.io':{'password':'rotated','permission':'owner'}}")
            .unwrap(),
        applications: vec!["airflow".to_string(), "jupyter".to_string()],
    }
}

fn is_clean(call: &Call) -> bool {
    matches!(call, Call::Clean { .. })
}

fn is_record_failure(call: &Call) -> bool {
    matches!(call, Call::RecordFailure { .. })
}

fn is_notify(call: &Call) -> bool {
    matches!(call, Call::Notify { .. })
}

// ============================== LAUNCH ============================== //

#[tokio::test]
async fn test_launch_success_records_outcome() {
    let harness = Harness::new();
    let mut workflow = harness.workflow();

    let state = workflow.run(&create_test_request(false)).await.unwrap();
    assert_eq!(state, WorkflowState::Committed);
    assert_eq!(workflow.state(), WorkflowState::Committed);

    let expected = outcome();
    let record = Call::RecordLaunch {
        project_id: 31,
        members: expected.members,
        applications: expected.applications,
    };
    assert_eq!(harness.count(|c| *c == record), 1);
    assert_eq!(harness.count(is_notify), 0);
    assert_eq!(harness.count(is_clean), 0);
    assert_eq!(harness.count(is_record_failure), 0);
    assert_eq!(harness.count(|c| *c == Call::Close), 1);
}

#[tokio::test]
async fn test_launch_failure_compensates_records_and_notifies() {
    let mut harness = Harness::new();
    harness.launch = Behavior::Fail("quota exhausted after creating airflow");
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    match &err {
        DeployError::Provisioning(message) => {
            assert_eq!(message, "quota exhausted after creating airflow")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(workflow.state(), WorkflowState::Failed);

    // Compensation exactly once, raising hook failures
    assert_eq!(
        harness.count(|c| *c
            == Call::Clean {
                delete_job_name: None,
                raise_error: true
            }),
        1
    );
    assert_eq!(harness.count(is_clean), 1);

    // Failure recorded exactly once with the default status
    assert_eq!(
        harness.count(|c| *c
            == Call::RecordFailure {
                project_id: 31,
                status: ProjectStatus::Failed
            }),
        1
    );
    assert_eq!(harness.count(is_record_failure), 1);

    // Notified exactly once with the original error text
    let notifications: Vec<Call> = harness.calls().into_iter().filter(is_notify).collect();
    assert_eq!(notifications.len(), 1);
    let Call::Notify { label, text } = &notifications[0] else {
        unreachable!()
    };
    assert_eq!(label, "Project Deployment");
    assert!(text.contains("quota exhausted after creating airflow"));

    // Compensate, then record, then notify
    assert!(harness.position(is_clean) < harness.position(is_record_failure));
    assert!(harness.position(is_record_failure) < harness.position(is_notify));
    assert_eq!(harness.count(|c| matches!(c, Call::RecordLaunch { .. })), 0);
}

#[tokio::test]
async fn test_launch_persistence_failure_discards_session_first() {
    let mut harness = Harness::new();
    harness.store_failures.record_launch = true;
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert!(matches!(err, DeployError::Persistence(_)));
    assert_eq!(workflow.state(), WorkflowState::Failed);

    let calls = harness.calls();
    let discard = calls.iter().position(|c| *c == Call::Discard).unwrap();
    let last_open = calls.iter().rposition(|c| *c == Call::OpenSession).unwrap();
    assert!(discard < last_open, "stale session must be discarded before the failure write");
    assert_eq!(harness.count(|c| *c == Call::OpenSession), 2);
    assert_eq!(harness.count(is_clean), 1);
    assert_eq!(harness.count(is_record_failure), 1);
    assert_eq!(harness.count(is_notify), 1);
}

#[tokio::test]
async fn test_compensation_failure_keeps_original_error() {
    let mut harness = Harness::new();
    harness.launch = Behavior::Fail("image pull failed");
    harness.clean = Behavior::Fail("namespace stuck terminating");
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert_eq!(err.to_string(), "Provisioning error: image pull failed");
    assert_eq!(harness.count(is_record_failure), 1);
    assert_eq!(harness.count(is_notify), 1);
}

#[tokio::test]
async fn test_notification_failure_keeps_original_error() {
    let mut harness = Harness::new();
    harness.launch = Behavior::Fail("image pull failed");
    harness.notify_fails = true;
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert_eq!(err.to_string(), "Provisioning error: image pull failed");
    assert_eq!(workflow.state(), WorkflowState::Failed);
}

#[tokio::test]
async fn test_failure_record_error_does_not_stop_notification() {
    let mut harness = Harness::new();
    harness.launch = Behavior::Fail("image pull failed");
    harness.store_failures.record_failure = true;
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert!(matches!(err, DeployError::Provisioning(_)));
    assert_eq!(harness.count(is_notify), 1);
    assert_eq!(harness.count(|c| *c == Call::Discard), 1);
}

#[tokio::test]
async fn test_bind_failure_skips_compensation() {
    let mut harness = Harness::new();
    harness.bind_fails = true;
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert!(matches!(err, DeployError::Provisioning(_)));
    assert_eq!(harness.count(is_clean), 0);
    assert_eq!(harness.count(|c| *c == Call::Discard), 0);
    assert_eq!(harness.count(is_record_failure), 1);
    assert_eq!(harness.count(is_notify), 1);
}

#[tokio::test]
async fn test_hung_provisioning_times_out() {
    let mut harness = Harness::new();
    harness.launch = Behavior::Hang;
    harness.timeout = Duration::from_millis(50);
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    match err {
        DeployError::Provisioning(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.count(is_clean), 1);
    assert_eq!(harness.count(is_record_failure), 1);
}

#[tokio::test]
async fn test_workflow_runs_once() {
    let harness = Harness::new();
    let mut workflow = harness.workflow();
    workflow.run(&create_test_request(false)).await.unwrap();
    let calls_before = harness.calls().len();

    let err = workflow.run(&create_test_request(false)).await.unwrap_err();
    assert!(matches!(err, DeployError::Workflow(_)));
    assert_eq!(harness.calls().len(), calls_before);
}

// ============================== CLEAN ============================== //

#[tokio::test]
async fn test_clean_success_targets_launch_job() {
    let harness = Harness::new();
    let mut workflow = harness.workflow();

    let state = workflow.run(&create_test_request(true)).await.unwrap();
    assert_eq!(state, WorkflowState::Deleted);

    assert_eq!(
        harness.count(|c| *c
            == Call::Clean {
                delete_job_name: Some("project-deployment-31-analytics".to_string()),
                raise_error: true
            }),
        1
    );
    assert_eq!(harness.count(|c| *c == Call::RecordDeletion { project_id: 31 }), 1);
    assert_eq!(harness.count(is_notify), 0);
    assert_eq!(harness.count(is_record_failure), 0);
    assert_eq!(harness.count(|c| *c == Call::Launch), 0);
}

#[tokio::test]
async fn test_clean_failure_records_deleted_status() {
    let mut harness = Harness::new();
    harness.clean = Behavior::Fail("pvc finalizer blocked");
    let mut workflow = harness.workflow();

    let err = workflow.run(&create_test_request(true)).await.unwrap_err();
    assert_eq!(err.to_string(), "Provisioning error: pvc finalizer blocked");
    assert_eq!(workflow.state(), WorkflowState::DeleteFailed);

    assert_eq!(
        harness.count(|c| *c
            == Call::RecordFailure {
                project_id: 31,
                status: ProjectStatus::Deleted
            }),
        1
    );
    assert_eq!(harness.count(is_record_failure), 1);
    assert_eq!(harness.count(|c| matches!(c, Call::RecordDeletion { .. })), 0);

    let notifications: Vec<Call> = harness.calls().into_iter().filter(is_notify).collect();
    assert_eq!(notifications.len(), 1);
    let Call::Notify { label, text } = &notifications[0] else {
        unreachable!()
    };
    assert_eq!(label, "Project Deletion");
    assert!(text.contains("pvc finalizer blocked"));

    // No compensation on the clean path, only the one clean attempt
    assert_eq!(harness.count(is_clean), 1);
    assert!(harness.position(is_record_failure) < harness.position(is_notify));
}
