use clap::{CommandFactory, Parser};
use fleet_dispatch::tooling::cli::Cli;

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["fleet", "command", "--command", "whoami"],
        vec!["fleet", "command", "--command", "ls", "--args", "-la^/etc", "--beacons", "b1 b2"],
        vec!["fleet", "rename"],
        vec!["fleet", "rename", "--sessions", "alpha"],
        vec!["fleet", "notify", "--url", "http://10.0.0.1^http://10.0.0.2"],
        vec!["fleet", "pwnboard"],
        vec!["fleet", "agents", "--format", "json"],
        vec!["fleet", "--endpoint", "http://c2:31337", "agents"],
        vec!["fleet", "config", "show", "--config", "/tmp/fleet.toml"],
        vec!["fleet", "agents", "--log-level", "debug", "--log-output", "file+stderr"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_invocations() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["fleet"],
        vec!["fleet", "command"],
        vec!["fleet", "rename", "--sessions", "a", "--beacons", "b"],
        vec!["fleet", "agents", "--format", "yaml"],
    ];
    for args in cases {
        assert!(
            Cli::try_parse_from(args.clone()).is_err(),
            "expected parse failure for args: {args:?}"
        );
    }
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}
