//! FSM unit tests

use gakwaya_panel::deploy::fsm::{DeployEvent, DeployFsm, DeployStage};

#[test]
fn test_fsm_initial_state() {
    let fsm = DeployFsm::new();
    assert_eq!(fsm.stage(), DeployStage::Pending);
    assert!(fsm.error().is_none());
    assert!(fsm.failed_at().is_none());
}

#[test]
fn test_fsm_deploy_success_flow() {
    let mut fsm = DeployFsm::new();

    // Pending -> Workspace -> ... -> Done
    let mut stage = fsm.stage();
    while let Some(next) = stage.next() {
        fsm.process(DeployEvent::Enter(next)).unwrap();
        assert_eq!(fsm.stage(), next);
        stage = next;
    }

    assert_eq!(fsm.stage(), DeployStage::Done);
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_deploy_failure_flow() {
    let mut fsm = DeployFsm::new();

    fsm.enter(DeployStage::Workspace).unwrap();
    fsm.enter(DeployStage::Fetch).unwrap();
    fsm.enter(DeployStage::Pack).unwrap();
    fsm.enter(DeployStage::Build).unwrap();
    fsm.process(DeployEvent::Fail("image not produced".to_string()))
        .unwrap();

    assert_eq!(fsm.stage(), DeployStage::Failed);
    assert_eq!(fsm.failed_at(), Some(DeployStage::Build));
    assert_eq!(fsm.error(), Some("image not produced"));
}

#[test]
fn test_fsm_rejects_skipped_stage() {
    let mut fsm = DeployFsm::new();
    fsm.enter(DeployStage::Workspace).unwrap();

    // Fetch must come before Build
    assert!(fsm.enter(DeployStage::Build).is_err());
    assert_eq!(fsm.stage(), DeployStage::Workspace);

    // Persist is never reachable straight from Workspace
    assert!(fsm.enter(DeployStage::Persist).is_err());
}

#[test]
fn test_fsm_rejects_going_back() {
    let mut fsm = DeployFsm::new();
    fsm.enter(DeployStage::Workspace).unwrap();
    fsm.enter(DeployStage::Fetch).unwrap();

    assert!(fsm.enter(DeployStage::Workspace).is_err());
    assert!(fsm.enter(DeployStage::Fetch).is_err());
}

#[test]
fn test_fsm_terminal_states() {
    let mut fsm = DeployFsm::new();
    fsm.enter(DeployStage::Workspace).unwrap();
    fsm.fail("no space left on device").unwrap();

    // no retry within an attempt
    assert!(fsm.enter(DeployStage::Fetch).is_err());
    assert!(fsm.fail("again").is_err());
    assert_eq!(fsm.error(), Some("no space left on device"));
    assert_eq!(fsm.failed_at(), Some(DeployStage::Workspace));
}

#[test]
fn test_stage_names() {
    assert_eq!(DeployStage::Workspace.to_string(), "workspace");
    assert_eq!(DeployStage::Persist.to_string(), "persist");
    assert_eq!(
        serde_json::to_string(&DeployStage::Build).unwrap(),
        "\"build\""
    );
}
