#![forbid(unsafe_code)]

mod common;

use common::{AttachBehavior, Harness, module};
use config::AgentMode;
use orchestrator::domain::{Endpoint, InjectionStatus};
use orchestrator::probe::ProcessProbe;
use orchestrator::process::ManagedProcess;

fn discover(harness: &Harness, pid: i32) -> ManagedProcess {
    harness.probe.spawn_java(pid);
    let details = harness.probe.details(pid).unwrap();
    ManagedProcess::discover(pid, details, &harness.layout, &[])
}

#[tokio::test]
async fn attach_and_login_reach_success() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    let mut process = discover(&harness, 41);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::SuccessInjected);
    assert_eq!(process.endpoint(), Some(&Endpoint::new("127.0.0.1", "9041")));

    let calls = harness.attacher.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.starts_with("raspHome="));
    assert!(calls[0].1.contains(";namespace=jrasp;"));
    assert_eq!(harness.agent.calls_named("login").len(), 1);
}

#[tokio::test]
async fn failed_attach_is_terminal() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.attacher.set_behavior(AttachBehavior::ExitFailure);
    let mut process = discover(&harness, 42);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert!(process.endpoint().is_none());

    harness.attacher.set_behavior(AttachBehavior::Succeed);
    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert_eq!(harness.attacher.calls().len(), 1);
    assert!(harness.agent.calls_named("login").is_empty());
}

#[tokio::test]
async fn missing_socket_fails_even_with_token() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.attacher.set_behavior(AttachBehavior::NoSocket);
    let mut process = discover(&harness, 43);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert!(harness.layout.token_file(43).exists());
    assert!(process.endpoint().is_none());
}

#[tokio::test]
async fn malformed_token_fails_attach() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.attacher.set_behavior(AttachBehavior::BadToken);
    let mut process = discover(&harness, 44);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert!(process.endpoint().is_none());
}

#[tokio::test]
async fn vanished_process_is_not_attached() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    let mut process = discover(&harness, 45);
    harness.probe.kill(45);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert!(harness.attacher.calls().is_empty());
}

#[tokio::test]
async fn refused_login_keeps_token_for_shutdown() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.agent.edit_script(|script| script.login_code = 403);
    let mut process = discover(&harness, 46);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
    assert!(process.endpoint().is_some());

    assert_eq!(process.shutdown(&ctx).await, InjectionStatus::SuccessExited);
    let shutdowns = harness.agent.calls_named("shutdown");
    assert_eq!(shutdowns.len(), 1);
    assert_eq!(shutdowns[0].2, "token-9046");
    assert_eq!(harness.agent.calls_named("login").len(), 1);
}

#[tokio::test]
async fn login_transport_error_fails_attach() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.agent.edit_script(|script| script.login_transport_error = true);
    let mut process = discover(&harness, 47);

    assert_eq!(process.inject(&ctx).await, InjectionStatus::FailedInjected);
}

#[tokio::test]
async fn shutdown_outcomes() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Disable));

    let mut ok = discover(&harness, 50);
    ok.inject(&ctx).await;
    assert_eq!(ok.shutdown(&ctx).await, InjectionStatus::SuccessExited);
    assert!(!ok.is_injected());
    // Exited agents are not shut down twice.
    assert_eq!(ok.shutdown(&ctx).await, InjectionStatus::SuccessExited);
    assert_eq!(harness.agent.calls_named("shutdown").len(), 1);

    harness.agent.edit_script(|script| script.shutdown_ok = false);
    let mut refused = discover(&harness, 51);
    refused.inject(&ctx).await;
    assert_eq!(refused.shutdown(&ctx).await, InjectionStatus::FailedExited);
}

#[tokio::test]
async fn shutdown_ignores_processes_without_agent() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Disable));
    let mut process = discover(&harness, 52);

    assert_eq!(process.shutdown(&ctx).await, InjectionStatus::NotInjected);
    assert!(harness.agent.calls_named("shutdown").is_empty());
}

#[tokio::test]
async fn degrade_deactivates_all_but_kept_modules() {
    let harness = Harness::new();
    let mut config = Harness::config(AgentMode::Dynamic);
    config.agent.degrade_keep = vec!["b".into()];
    let ctx = harness.context(&config);
    harness.agent.edit_script(|script| {
        script.modules = vec![module("a", true), module("b", true), module("c", false)];
    });

    let mut process = discover(&harness, 60);
    process.inject(&ctx).await;
    assert!(process.request_degrade());
    assert_eq!(process.degrade(&ctx).await, InjectionStatus::SuccessDegraded);
    assert!(!process.pending_degrade());
    assert_eq!(*harness.agent.degraded.lock().unwrap(), [vec!["a".to_owned()]]);
    assert_eq!(process.modules().len(), 3);

    // A degraded agent is not degraded again.
    assert!(!process.request_degrade());
    assert_eq!(process.degrade(&ctx).await, InjectionStatus::SuccessDegraded);
    assert_eq!(harness.agent.degraded.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn degrade_failures() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));

    harness.agent.edit_script(|script| script.list_ok = false);
    let mut list_fails = discover(&harness, 61);
    list_fails.inject(&ctx).await;
    assert_eq!(list_fails.degrade(&ctx).await, InjectionStatus::FailedDegraded);

    harness.agent.edit_script(|script| {
        script.list_ok = true;
        script.degrade_ok = false;
        script.modules = vec![module("a", true)];
    });
    let mut degrade_fails = discover(&harness, 62);
    degrade_fails.inject(&ctx).await;
    assert_eq!(degrade_fails.degrade(&ctx).await, InjectionStatus::FailedDegraded);
}

#[tokio::test]
async fn parameter_update_flushes_once() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    let mut process = discover(&harness, 70);
    process.inject(&ctx).await;

    assert!(process.mark_parameters_changed());
    process.apply_parameter_update(&ctx).await;
    process.apply_parameter_update(&ctx).await;
    assert!(!process.pending_parameter_update());
    assert_eq!(harness.agent.calls_named("flush").len(), 1);

    harness.agent.edit_script(|script| script.flush_ok = false);
    process.mark_parameters_changed();
    process.apply_parameter_update(&ctx).await;
    assert!(!process.pending_parameter_update());
    assert_eq!(process.status(), InjectionStatus::SuccessInjected);
}

#[tokio::test]
async fn parameter_update_pushes_manifest_parameters_before_flush() {
    let harness = Harness::new();
    let mut config = Harness::config(AgentMode::Dynamic);
    config.modules = vec![
        config::Module {
            name: "rce-hook".into(),
            parameters: [
                ("action".to_owned(), "block".to_owned()),
                ("whitelist".to_owned(), "/usr/bin/id".to_owned()),
            ]
            .into(),
            ..Default::default()
        },
        config::Module {
            name: "sql-hook".into(),
            ..Default::default()
        },
    ];
    let ctx = harness.context(&config);
    let mut process = discover(&harness, 72);
    process.inject(&ctx).await;

    process.mark_parameters_changed();
    process.apply_parameter_update(&ctx).await;

    let pushed = harness.agent.parameters.lock().unwrap().clone();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, "rce-hook");
    assert_eq!(pushed[0].1["action"], "block");
    assert_eq!(pushed[0].1["whitelist"], "/usr/bin/id");

    let calls: Vec<_> = harness
        .agent
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, call, token)| (call.clone(), token.clone()))
        .collect();
    let order: Vec<_> = calls.iter().map(|(call, _)| call.as_str()).collect();
    assert_eq!(order, ["login", "parameters", "flush"]);
    assert_eq!(calls[1].1, "token-9072");
}

#[tokio::test]
async fn rediscovered_agent_logs_in_lazily() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Disable));
    harness.leave_running_agent(80);
    let mut process = discover(&harness, 80);
    assert_eq!(process.status(), InjectionStatus::SuccessInjected);
    assert!(harness.agent.calls_named("login").is_empty());

    assert_eq!(process.shutdown(&ctx).await, InjectionStatus::SuccessExited);
    assert_eq!(harness.agent.calls_named("login").len(), 1);
    assert!(harness.attacher.calls().is_empty());
}

#[tokio::test]
async fn dependencies_only_from_serving_agents() {
    let harness = Harness::new();
    let ctx = harness.context(&Harness::config(AgentMode::Dynamic));
    harness.agent.edit_script(|script| {
        script.dependencies = vec![orchestrator::domain::Dependency {
            product: "spring-core".into(),
            version: "5.3.0".into(),
            ..Default::default()
        }];
    });

    let mut process = discover(&harness, 90);
    assert!(process.dependencies(&ctx).await.unwrap().is_empty());

    process.inject(&ctx).await;
    let found = process.dependencies(&ctx).await.unwrap();
    assert_eq!(found[0].product, "spring-core");
}
