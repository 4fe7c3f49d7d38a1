use crate::integration::support::{beacon, dead_agent, session};
use fleet_dispatch::agent::{AgentKind, AgentSelector};
use fleet_dispatch::config::DecodeConfig;
use fleet_dispatch::control_plane::InMemoryControlPlane;
use fleet_dispatch::decode::DecoderSet;
use fleet_dispatch::fanout::{FanOut, FanOutSettings, Operation};
use fleet_dispatch::report::{ConsoleReporter, MemoryReporter, ReportEvent};
use std::time::Duration;
use tokio::time::Instant;

fn whoami() -> Operation {
    Operation::RunCommand {
        path: "whoami".to_string(),
        args: vec![],
    }
}

#[tokio::test(start_paused = true)]
async fn late_and_silent_beacons_exhaust_the_budget() {
    let plane = InMemoryControlPlane::new();
    beacon(&plane, "A", Some(1));
    beacon(&plane, "B", Some(5));
    beacon(&plane, "C", None);

    let decoders = DecoderSet::standard(&DecodeConfig::default());
    let mut reporter = MemoryReporter::new();
    let started = Instant::now();
    let summary = FanOut::new(&plane, &decoders, FanOutSettings::default())
        .run(&whoami(), &AgentSelector::All, &mut reporter)
        .await
        .unwrap();

    assert_eq!(reporter.results(), vec!["A", "B"]);
    assert_eq!(reporter.unresponsive(), vec!["C"]);
    assert_eq!(summary.cycles, 100);
    assert_eq!(summary.unresponsive, 1);
    assert_eq!(started.elapsed(), Duration::from_secs(1000));

    // the unresponsive notice comes last, after every result
    let last = reporter.events().last().unwrap();
    assert!(matches!(last, ReportEvent::Unresponsive { agent } if agent.name() == "C"));
}

#[tokio::test(start_paused = true)]
async fn m_of_n_responders() {
    let plane = InMemoryControlPlane::new();
    let schedule = [Some(1), None, Some(3), Some(3), None, Some(42), None, Some(99), None, Some(100)];
    for (n, cycle) in schedule.iter().enumerate() {
        beacon(&plane, &format!("b{}", n), *cycle);
    }

    let decoders = DecoderSet::standard(&DecodeConfig::default());
    let mut reporter = MemoryReporter::new();
    let summary = FanOut::new(&plane, &decoders, FanOutSettings::default())
        .run(&whoami(), &AgentSelector::All, &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.targeted, 10);
    assert_eq!(reporter.results().len(), 6);
    assert_eq!(reporter.unresponsive(), vec!["b1", "b4", "b6", "b8"]);
    assert!(summary.cycles <= 100);
}

#[tokio::test(start_paused = true)]
async fn all_responders_end_polling_early() {
    let plane = InMemoryControlPlane::new();
    session(&plane, "s0");
    beacon(&plane, "b0", Some(2));
    beacon(&plane, "b1", Some(4));
    plane.add_agent(dead_agent(AgentKind::StoreAndForward, "ghost"));

    let decoders = DecoderSet::standard(&DecodeConfig::default());
    let mut reporter = MemoryReporter::new();
    let started = Instant::now();
    let summary = FanOut::new(&plane, &decoders, FanOutSettings::default())
        .run(&whoami(), &AgentSelector::All, &mut reporter)
        .await
        .unwrap();

    assert_eq!(reporter.results(), vec!["s0", "b0", "b1"]);
    assert!(reporter.unresponsive().is_empty());
    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.dead, 1);
    assert_eq!(started.elapsed(), Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_console_line_names_agent() {
    let plane = InMemoryControlPlane::new();
    beacon(&plane, "quiet", None);

    let mut settings = FanOutSettings::default();
    settings.poll.max_cycles = 3;
    let decoders = DecoderSet::standard(&DecodeConfig::default());
    let mut reporter = ConsoleReporter::new(Vec::new(), false);
    FanOut::new(&plane, &decoders, settings)
        .run(&whoami(), &AgentSelector::All, &mut reporter)
        .await
        .unwrap();

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(out.ends_with("no response from quiet,quiet.corp\n"));
}

#[tokio::test(start_paused = true)]
async fn rename_every_agent_from_interfaces() {
    let plane = InMemoryControlPlane::new();
    let s = session(&plane, "s0");
    let b = beacon(&plane, "b0", Some(1));
    let ifconfig = br#"{"net_interfaces":[
        {"name":"lo","ip_addresses":["127.0.0.1/8"]},
        {"name":"eth0","ip_addresses":["10.0.0.5/24","172.17.0.1/16"]}
    ]}"#;
    plane.set_payload(s.id(), ifconfig.to_vec());
    plane.set_payload(b.id(), ifconfig.to_vec());

    let decoders = DecoderSet::standard(&DecodeConfig::default());
    let mut reporter = MemoryReporter::new();
    let summary = FanOut::new(&plane, &decoders, FanOutSettings::default())
        .run(&Operation::Rename, &AgentSelector::All, &mut reporter)
        .await
        .unwrap();

    let names: Vec<String> = plane.renames().into_iter().map(|(_, n)| n).collect();
    assert_eq!(names, vec!["10.0.0.5_s0.corp.", "10.0.0.5_b0.corp."]);
    assert_eq!(summary.renamed, 2);
}
