mod helpers;

use anyhow::Result;
use rsapt::RsaptError;
use rsapt::apt::{
    self, DEFAULT_DPKG_OPTIONS, filter_installed, filter_missing, get_upstream_version,
    installed_version,
};
use rsapt::privilege::PrivilegeMethod;

use helpers::{ScriptedExecutor, test_context};

fn packages(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn install_builds_assume_yes_command_with_default_options() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::install(&ctx, &packages(&["curl", "ca-certificates"]), None, false)?;

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "apt-get");
    assert_eq!(
        calls[0].args,
        vec![
            "--assume-yes",
            DEFAULT_DPKG_OPTIONS[0],
            "install",
            "curl",
            "ca-certificates",
        ]
    );
    Ok(())
}

#[test]
fn install_sets_noninteractive_frontend() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::install(&ctx, &packages(&["curl"]), None, false)?;

    let calls = executor.calls();
    assert!(
        calls[0].env.iter().any(|(k, _)| k == "DEBIAN_FRONTEND"),
        "expected DEBIAN_FRONTEND in env, got: {:?}",
        calls[0].env
    );
    Ok(())
}

#[test]
fn install_honors_custom_options() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    let options = packages(&["--no-install-recommends"]);
    apt::install(&ctx, &packages(&["curl"]), Some(&options), false)?;

    let calls = executor.calls();
    assert_eq!(
        calls[0].args,
        vec!["--assume-yes", "--no-install-recommends", "install", "curl"]
    );
    Ok(())
}

#[test]
fn install_with_no_packages_runs_nothing() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::install(&ctx, &[], None, true)?;

    assert_eq!(executor.call_count(), 0);
    Ok(())
}

#[test]
fn install_non_fatal_ignores_failure() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_exec_code(100);
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::install(&ctx, &packages(&["curl"]), None, false)?;

    assert_eq!(executor.call_count(), 1, "non-fatal commands run exactly once");
    Ok(())
}

#[test]
fn upgrade_selects_upgrade_or_dist_upgrade() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::upgrade(&ctx, None, false, false)?;
    apt::upgrade(&ctx, None, false, true)?;

    let calls = executor.calls();
    assert!(calls[0].args.contains(&"upgrade".to_string()));
    assert!(!calls[0].args.contains(&"dist-upgrade".to_string()));
    assert!(calls[1].args.contains(&"dist-upgrade".to_string()));
    Ok(())
}

#[test]
fn update_builds_bare_update() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::update(&ctx, false)?;

    let calls = executor.calls();
    assert_eq!(calls[0].command, "apt-get");
    assert_eq!(calls[0].args, vec!["update"]);
    Ok(())
}

#[test]
fn purge_builds_assume_yes_purge() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::purge(&ctx, &packages(&["snapd"]), false)?;

    let calls = executor.calls();
    assert_eq!(calls[0].args, vec!["--assume-yes", "purge", "snapd"]);
    Ok(())
}

#[test]
fn autoremove_appends_purge_flag() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::autoremove(&ctx, true, false)?;
    apt::autoremove(&ctx, false, false)?;

    let calls = executor.calls();
    assert_eq!(calls[0].args, vec!["--assume-yes", "autoremove", "--purge"]);
    assert_eq!(calls[1].args, vec!["--assume-yes", "autoremove"]);
    Ok(())
}

#[test]
fn hold_and_unhold_use_apt_mark() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::hold(&ctx, &packages(&["kernel-image"]), false)?;
    apt::unhold(&ctx, &packages(&["kernel-image"]), false)?;

    let calls = executor.calls();
    assert_eq!(calls[0].command, "apt-mark");
    assert_eq!(calls[0].args, vec!["hold", "kernel-image"]);
    assert_eq!(calls[1].args, vec!["unhold", "kernel-image"]);
    Ok(())
}

#[test]
fn fatal_mark_failure_is_an_error() {
    let executor = ScriptedExecutor::new();
    executor.push_exec_code(1);
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    let err = apt::hold(&ctx, &packages(&["kernel-image"]), true)
        .expect_err("fatal apt-mark failure should error");
    let typed = err.downcast_ref::<RsaptError>().expect("expected RsaptError");
    assert!(matches!(typed, RsaptError::Execution { .. }));
}

#[test]
fn non_fatal_mark_failure_is_ignored() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_exec_code(1);
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");

    apt::hold(&ctx, &packages(&["kernel-image"]), false)?;
    Ok(())
}

#[test]
fn privilege_method_is_attached_to_specs() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let (ctx, _guard) = test_context(executor.clone(), "bionic", "x86_64");
    let ctx = ctx.with_privilege(Some(PrivilegeMethod::Sudo));

    apt::update(&ctx, false)?;

    let calls = executor.calls();
    assert_eq!(calls[0].privilege, Some(PrivilegeMethod::Sudo));
    Ok(())
}

#[test]
fn installed_version_parses_dpkg_query_output() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"installed\t7.81.0-1ubuntu1.16", "", 0);
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    let version = installed_version(&ctx, "curl")?;
    assert_eq!(version.as_deref(), Some("7.81.0-1ubuntu1.16"));

    let calls = executor.calls();
    assert_eq!(calls[0].command, "dpkg-query");
    assert!(calls[0].args.contains(&"curl".to_string()));
    Ok(())
}

#[test]
fn installed_version_handles_unknown_package() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"", "dpkg-query: no packages found matching nope", 1);
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    assert_eq!(installed_version(&ctx, "nope")?, None);
    Ok(())
}

#[test]
fn installed_version_treats_config_files_state_as_absent() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"config-files\t1.2.3-1", "", 0);
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    assert_eq!(installed_version(&ctx, "removed-pkg")?, None);
    Ok(())
}

#[test]
fn filter_installed_returns_packages_needing_installation() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"installed\t1.0", "", 0); // curl
    executor.push_capture(b"", "no packages found", 1); // vim
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    let missing = filter_installed(&ctx, &packages(&["curl", "vim"]))?;
    assert_eq!(missing, vec!["vim"]);
    Ok(())
}

#[test]
fn filter_missing_returns_installed_packages() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"installed\t1.0", "", 0); // curl
    executor.push_capture(b"", "no packages found", 1); // vim
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    let installed = filter_missing(&ctx, &packages(&["curl", "vim"]))?;
    assert_eq!(installed, vec!["curl"]);
    Ok(())
}

#[test]
fn get_upstream_version_strips_epoch_and_revision() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"installed\t1:2.34-0ubuntu3", "", 0);
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    let version = get_upstream_version(&ctx, "libc6")?;
    assert_eq!(version.as_deref(), Some("2.34"));
    Ok(())
}

#[test]
fn get_upstream_version_none_when_not_installed() -> Result<()> {
    let executor = ScriptedExecutor::new();
    executor.push_capture(b"", "no packages found", 1);
    let (ctx, _guard) = test_context(executor.clone(), "jammy", "x86_64");

    assert_eq!(get_upstream_version(&ctx, "nope")?, None);
    Ok(())
}
