//! FSM unit tests

use project_deployer::deploy::fsm::{WorkflowEvent, WorkflowFsm, WorkflowState};

#[test]
fn test_fsm_initial_state() {
    let fsm = WorkflowFsm::new();
    assert_eq!(fsm.state(), WorkflowState::NotStarted);
    assert!(fsm.error().is_none());
    assert!(!fsm.state().is_terminal());
}

#[test]
fn test_fsm_launch_failure_flow() {
    let mut fsm = WorkflowFsm::new();

    fsm.process(WorkflowEvent::Launch).unwrap();
    assert_eq!(fsm.state(), WorkflowState::Provisioning);

    fsm.process(WorkflowEvent::Failed("partial launch".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), WorkflowState::Failed);
    assert_eq!(fsm.error(), Some("partial launch"));
}

#[test]
fn test_fsm_clean_success_flow() {
    let mut fsm = WorkflowFsm::new();

    fsm.process(WorkflowEvent::Clean).unwrap();
    assert_eq!(fsm.state(), WorkflowState::CleaningUp);

    fsm.process(WorkflowEvent::Succeeded).unwrap();
    assert_eq!(fsm.state(), WorkflowState::Deleted);
}

#[test]
fn test_fsm_terminal_states_reject_events() {
    for (start, end) in [
        (WorkflowEvent::Launch, WorkflowEvent::Succeeded),
        (WorkflowEvent::Launch, WorkflowEvent::Failed("x".to_string())),
        (WorkflowEvent::Clean, WorkflowEvent::Succeeded),
        (WorkflowEvent::Clean, WorkflowEvent::Failed("x".to_string())),
    ] {
        let mut fsm = WorkflowFsm::new();
        fsm.process(start).unwrap();
        fsm.process(end).unwrap();
        assert!(fsm.state().is_terminal());

        // No retry loop back into a running state
        assert!(fsm.process(WorkflowEvent::Launch).is_err());
        assert!(fsm.process(WorkflowEvent::Clean).is_err());
        assert!(fsm.process(WorkflowEvent::Succeeded).is_err());
    }
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = WorkflowFsm::new();

    // Nothing is running yet
    assert!(fsm.process(WorkflowEvent::Succeeded).is_err());
    assert_eq!(fsm.state(), WorkflowState::NotStarted);

    // A launch cannot turn into a clean
    fsm.process(WorkflowEvent::Launch).unwrap();
    assert!(fsm.process(WorkflowEvent::Clean).is_err());
}
