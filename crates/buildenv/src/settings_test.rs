// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use rstest::rstest;
use strum::IntoEnumIterator;
use tempfile::TempDir;

use super::*;

fn resolved() -> ResolvedSettings {
    ResolvedSettings {
        start_dir: PathBuf::from("/work"),
        build_dir: PathBuf::from("/work/build"),
        layer_dir: PathBuf::from("/work"),
        setup_script: PathBuf::from("/work/poky/oe-init-build-env"),
        init_setup_script: PathBuf::from("/work/poky/oe-init-build-env"),
        init_args: vec!["/work/build".to_string(), "extra".to_string()],
        shell_prompt: "buildenv".to_string(),
        extra_env: vec!["MACHINE=qemux86-64".to_string()],
        passthrough: IndexMap::new(),
        debug: false,
        user_conf_only: false,
        init: true,
    }
}

#[rstest]
fn test_key_names_round_trip() {
    for key in ConfigKey::iter() {
        assert_eq!(ConfigKey::from_str(key.as_ref()).unwrap(), key);
    }
    assert_eq!(ConfigKey::from_str("BUILDDIR").unwrap(), ConfigKey::BuildDir);
    assert!(ConfigKey::from_str("PATH").is_err());
}

#[rstest]
#[case(ConfigKey::CmdLineInit, true)]
#[case(ConfigKey::UserConfOnly, true)]
#[case(ConfigKey::BuildDir, false)]
#[case(ConfigKey::SshAuthSock, false)]
fn test_forbidden_keys(#[case] key: ConfigKey, #[case] forbidden: bool) {
    assert_eq!(key.is_forbidden_in_file(), forbidden);
    assert_eq!(key.is_allowed_in_file(), !forbidden);
}

#[rstest]
fn test_apply_values() {
    let mut settings = Settings::default();
    settings.apply(ConfigKey::BuildDir, "/tmp/build");
    settings.apply(ConfigKey::InitArgs, "a  b c");
    settings.apply(ConfigKey::ExtraEnvArgs, "FOO=1 BAR=2");
    settings.apply(ConfigKey::LicenseFile, "1717@licserver");

    assert_eq!(settings.build_dir.as_deref(), Some("/tmp/build"));
    assert_eq!(settings.init_args, vec!["a", "b", "c"]);
    assert_eq!(settings.extra_env, vec!["FOO=1", "BAR=2"]);
    assert_eq!(
        settings.passthrough.get("LM_LICENSE_FILE").map(String::as_str),
        Some("1717@licserver")
    );
}

#[rstest]
fn test_apply_empty_value_clears_setting() {
    let mut settings = Settings {
        setup_script: Some("/x/setup".to_string()),
        extra_env: vec!["A=1".to_string()],
        ..Default::default()
    };
    settings.apply(ConfigKey::SshAuthSock, "/tmp/agent");
    settings.apply(ConfigKey::SetupScript, "");
    settings.apply(ConfigKey::ExtraEnvArgs, "");
    settings.apply(ConfigKey::SshAuthSock, "");

    assert_eq!(settings.setup_script, None);
    assert!(settings.extra_env.is_empty());
    assert!(settings.passthrough.is_empty());
}

#[rstest]
fn test_apply_ignores_control_keys() {
    let mut settings = Settings::default();
    settings.apply(ConfigKey::CmdLineInit, "1");
    settings.apply(ConfigKey::UserConfOnly, "1");

    assert_eq!(settings, Settings::default());
}

#[rstest]
fn test_config_string_order_and_quoting() {
    let text = resolved().to_config_string();
    let keys: Vec<&str> = text
        .lines()
        .map(|line| line.split_once('=').unwrap().0)
        .collect();

    assert_eq!(
        keys,
        vec![
            "BUILDDIR",
            "LAYERDIR",
            "INIT_ARGS",
            "INIT_SETUP_SCRIPT",
            "SETUP_SCRIPT",
            "SHELL_PROMPT",
            "EXTRA_ENV_ARGS"
        ]
    );
    assert!(text.contains("BUILDDIR='/work/build'\n"));
    assert!(text.contains("INIT_ARGS='/work/build extra'\n"));
    assert!(text.contains("EXTRA_ENV_ARGS='MACHINE=qemux86-64'\n"));
}

#[rstest]
fn test_single_quote_escapes_quotes() {
    assert_eq!(single_quote("plain"), "'plain'");
    assert_eq!(single_quote("it's"), r"'it'\''s'");
}

#[rstest]
fn test_active_script_follows_init_flag() {
    let mut settings = resolved();
    settings.init_setup_script = PathBuf::from("/init.sh");
    assert_eq!(settings.active_script(), Path::new("/init.sh"));

    settings.init = false;
    assert_eq!(settings.active_script(), Path::new("/work/poky/oe-init-build-env"));
}

#[rstest]
fn test_write_config_refuses_existing_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.conf");
    std::fs::write(&path, "previous").unwrap();

    let result = resolved().write_config(&path, false);
    assert!(matches!(result, Err(Error::OutputConfigExists(_))));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
}

#[rstest]
fn test_write_config_overwrites_with_flag() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("out.conf");
    std::fs::write(&path, "previous").unwrap();

    resolved().write_config(&path, true).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("BUILDDIR='/work/build'\n"));
}
