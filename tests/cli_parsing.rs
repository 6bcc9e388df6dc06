//! Argument parsing for the triad command line.

use clap::Parser;
use triad::cli::commands::req::ReqCommands;
use triad::cli::commands::work::WorkCommands;
use triad::cli::{Cli, Commands};
use triad::domain::models::{Actor, Outcome, Priority, RequirementId, WorkItemId, WorkKind};

#[test]
fn test_req_add_parses_threshold_and_priority() {
    let cli = Cli::try_parse_from([
        "triad", "req", "add", "The thruster shall produce 1.0 N of thrust",
        "--parent", "SOW 3.2", "-P", "must", "--threshold", "0.95..1.05 N",
    ])
    .unwrap();

    let Commands::Req(args) = cli.command else { panic!("expected req") };
    let ReqCommands::Add { parent, priority, threshold, .. } = args.command else {
        panic!("expected add")
    };
    assert_eq!(parent, "SOW 3.2");
    assert_eq!(priority, Priority::Must);
    let threshold = threshold.unwrap();
    assert_eq!(threshold.min, Some(0.95));
    assert_eq!(threshold.unit.as_deref(), Some("N"));
}

#[test]
fn test_req_add_rejects_bad_threshold() {
    let result = Cli::try_parse_from([
        "triad", "req", "add", "The valve shall open within 50 ms", "--parent", "SOW 1", "--threshold", "fast",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_work_complete_collects_claims() {
    let cli = Cli::try_parse_from([
        "triad", "--json", "work", "complete", "VER-002", "--as", "verification",
        "--claim", "REQ-001:thrust_N=0.98:PASS", "--claim", "REQ-003:isp_s=231",
    ])
    .unwrap();
    assert!(cli.json);

    let Commands::Work(args) = cli.command else { panic!("expected work") };
    let WorkCommands::Complete { item, actor, claim, claims_file, .. } = args.command else {
        panic!("expected complete")
    };
    assert_eq!(item, WorkItemId::new(WorkKind::Verify, 2));
    assert_eq!(actor, Actor::Verification);
    assert_eq!(claim.len(), 2);
    assert_eq!(claim[0].requirement_id, RequirementId(1));
    assert_eq!(claim[0].outcome, Some(Outcome::Pass));
    assert_eq!(claim[1].outcome, None);
    assert!(claims_file.is_none());
}

#[test]
fn test_work_check_index_starts_at_one() {
    assert!(Cli::try_parse_from(["triad", "work", "check", "DES-001", "0", "--as", "design"]).is_err());
    assert!(Cli::try_parse_from(["triad", "work", "check", "DES-001", "1", "--as", "design"]).is_ok());
}

#[test]
fn test_unknown_actor_is_rejected() {
    assert!(Cli::try_parse_from(["triad", "signal", "--as", "manager"]).is_err());
}
