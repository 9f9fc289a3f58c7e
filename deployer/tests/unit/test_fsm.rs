//! FSM unit tests

use deployer::deploy::fsm::{RunEvent, RunFsm, RunState};

#[test]
fn test_fsm_initial_state() {
    let fsm = RunFsm::new();
    assert_eq!(fsm.state(), RunState::Init);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.history(), &[RunState::Init]);
}

#[test]
fn test_fsm_run_without_fetch() {
    let mut fsm = RunFsm::new();

    // Init -> Dispatching
    fsm.process(RunEvent::Dispatch).unwrap();
    assert_eq!(fsm.state(), RunState::Dispatching);

    // Dispatching -> Generating -> Done
    fsm.process(RunEvent::Generate).unwrap();
    fsm.process(RunEvent::Complete).unwrap();
    assert_eq!(fsm.state(), RunState::Done);
    assert_eq!(
        fsm.history(),
        &[RunState::Init, RunState::Dispatching, RunState::Generating, RunState::Done]
    );
}

#[test]
fn test_fsm_fail_from_every_non_terminal_state() {
    let paths: [&[RunEvent]; 4] = [
        &[],
        &[RunEvent::Fetch],
        &[RunEvent::Dispatch],
        &[RunEvent::Dispatch, RunEvent::Generate],
    ];

    for events in paths {
        let mut fsm = RunFsm::new();
        for event in events {
            fsm.process(event.clone()).unwrap();
        }
        fsm.process(RunEvent::Fail("boom".to_string())).unwrap();
        assert_eq!(fsm.state(), RunState::Failed);
        assert_eq!(fsm.error(), Some("boom"));
    }
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut done = RunFsm::new();
    done.process(RunEvent::Dispatch).unwrap();
    done.process(RunEvent::Generate).unwrap();
    done.process(RunEvent::Complete).unwrap();
    assert!(done.process(RunEvent::Fail("late".to_string())).is_err());
    assert!(done.process(RunEvent::Dispatch).is_err());

    let mut failed = RunFsm::new();
    failed.process(RunEvent::Fail("early".to_string())).unwrap();
    assert!(failed.process(RunEvent::Fetch).is_err());
    assert!(failed.process(RunEvent::Fail("again".to_string())).is_err());
    assert_eq!(failed.error(), Some("early"));
}

#[test]
fn test_fsm_no_reentry() {
    let mut fsm = RunFsm::new();
    fsm.process(RunEvent::Fetch).unwrap();
    fsm.process(RunEvent::Dispatch).unwrap();

    // Cannot go back to fetching, nor skip generation
    assert!(fsm.process(RunEvent::Fetch).is_err());
    assert!(fsm.process(RunEvent::Complete).is_err());
    assert_eq!(fsm.state(), RunState::Dispatching);
}
