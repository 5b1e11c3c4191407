// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
#[case("")]
#[case("   ")]
#[case("# BUILDDIR=/commented")]
#[case("FOO=bar#baz")]
#[case("BUILDDIR=/tmp/build#oops")]
#[case("SETUP_SCRIPT=/x; rm -rf /")]
#[case("LAYERDIR=$(cat /etc/passwd) > /dev/null")]
#[case("SHELL_PROMPT=a|b")]
#[case("INIT_ARGS=50%")]
#[case("EXTRA_ENV_ARGS=a&b")]
#[case("CMD_LINE_INIT=1 < /dev/null")]
#[case("UNKNOWN_KEY=value")]
#[case("BUILDDIR")]
fn test_ignored_lines(#[case] line: &str) {
    assert_eq!(ConfigLine::classify(line), ConfigLine::Ignored);
}

#[rstest]
#[case("CMD_LINE_INIT=1", ConfigKey::CmdLineInit)]
#[case("USER_CONF_ONLY=yes", ConfigKey::UserConfOnly)]
#[case("CMD_LINE_INIT", ConfigKey::CmdLineInit)]
fn test_warned_lines(#[case] line: &str, #[case] key: ConfigKey) {
    assert_eq!(ConfigLine::classify(line), ConfigLine::Warned(key));
}

#[rstest]
#[case("BUILDDIR=/tmp/build", ConfigKey::BuildDir, "/tmp/build")]
#[case("SETUP_SCRIPT='/opt/poky/oe-init-build-env'", ConfigKey::SetupScript, "/opt/poky/oe-init-build-env")]
#[case("SHELL_PROMPT=\"my build\"", ConfigKey::ShellPrompt, "my build")]
#[case("EXTRA_ENV_ARGS=A=1 B=2", ConfigKey::ExtraEnvArgs, "A=1 B=2")]
#[case("  LAYERDIR = /layers  ", ConfigKey::LayerDir, "/layers")]
#[case("INIT_ARGS=", ConfigKey::InitArgs, "")]
#[case("LM_LICENSE_FILE=1717@server", ConfigKey::LicenseFile, "1717@server")]
fn test_applied_lines(#[case] line: &str, #[case] key: ConfigKey, #[case] value: &str) {
    assert_eq!(
        ConfigLine::classify(line),
        ConfigLine::Applied(key, value.to_string())
    );
}

#[rstest]
fn test_parse_last_value_wins_within_file() {
    let config = ConfigFile::parse(
        "/x/buildenv.conf",
        "SETUP_SCRIPT=/first\nBUILDDIR=/b\nSETUP_SCRIPT=/second\n",
    );

    assert_eq!(config.applied.len(), 2);
    assert_eq!(
        config.applied.get(&ConfigKey::SetupScript).map(String::as_str),
        Some("/second")
    );
}

#[rstest]
fn test_parse_collects_warnings_with_line_numbers() {
    let config = ConfigFile::parse(
        "/x/buildenv.conf",
        "BUILDDIR=/b\nCMD_LINE_INIT=1\n\nUSER_CONF_ONLY=1\n",
    );

    let lines: Vec<usize> = config.warnings.iter().map(|w| w.line).collect();
    assert_eq!(lines, vec![2, 4]);
    assert_eq!(config.warnings[0].key, ConfigKey::CmdLineInit);
    assert!(config.warnings[0].to_string().contains("/x/buildenv.conf:2"));
    assert!(!config.applied.contains_key(&ConfigKey::CmdLineInit));
}

#[rstest]
fn test_load_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("buildenv.conf");
    std::fs::write(
        &path,
        "BUILDDIR=/b\nLAYERDIR=/l\nINIT_ARGS=/b x\nSHELL_PROMPT='p'\n",
    )
    .unwrap();

    let first = ConfigFile::load(&path).unwrap();
    let second = ConfigFile::load(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.applied.len(), 4);
}

#[rstest]
fn test_load_missing_file_is_empty() {
    let tmp = TempDir::new().unwrap();
    let config = ConfigFile::load(tmp.path().join("absent.conf")).unwrap();

    assert!(config.applied.is_empty());
    assert!(config.warnings.is_empty());
}

#[rstest]
fn test_apply_to_settings() {
    let config = ConfigFile::parse(
        "/x/buildenv.conf",
        "BUILDDIR=/b\nCMD_LINE_INIT=1\nINIT_ARGS=one two\n",
    );
    let mut settings = Settings::default();
    config.apply_to(&mut settings);

    assert_eq!(settings.build_dir.as_deref(), Some("/b"));
    assert_eq!(settings.init_args, vec!["one", "two"]);
    assert!(!settings.init);
}
