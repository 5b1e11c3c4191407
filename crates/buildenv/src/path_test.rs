// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

fn real_tmp() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let real = dunce::canonicalize(tmp.path()).unwrap();
    (tmp, real)
}

#[rstest]
fn test_canonicalize_nonexistent_path() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let path = resolver.canonicalize("not/yet/created").unwrap();
    assert_eq!(path, root.join("not/yet/created"));
}

#[rstest]
#[case("a/./b", "a/b")]
#[case("a/../b", "b")]
#[case("a/b/../../c", "c")]
fn test_canonicalize_normalizes_components(#[case] input: &str, #[case] expected: &str) {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    assert_eq!(resolver.canonicalize(input).unwrap(), root.join(expected));
}

#[rstest]
fn test_canonicalize_resolves_symlinks() {
    let (_tmp, root) = real_tmp();
    std::fs::create_dir(root.join("real")).unwrap();
    std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();
    let resolver = PathResolver::new(&root);

    let path = resolver.canonicalize("link/build").unwrap();
    assert_eq!(path, root.join("real/build"));
}

#[rstest]
fn test_canonicalize_absolute_ignores_base() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new("/somewhere/else");

    let path = resolver.canonicalize(root.join("x")).unwrap();
    assert_eq!(path, root.join("x"));
}

#[rstest]
fn test_canonicalize_expands_home() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new("/").with_home(Some(root.join("home")));

    let path = resolver.canonicalize("~/some-build").unwrap();
    assert_eq!(path, root.join("home/some-build"));
}

#[rstest]
fn test_canonicalize_home_comes_from_host() {
    let (_tmp, root) = real_tmp();
    let host = HostContext {
        start_dir: root.join("work"),
        home: Some(root.join("someone")),
        ..Default::default()
    };

    let path = PathResolver::for_host(&host).canonicalize("~").unwrap();
    assert_eq!(path, root.join("someone"));
}

#[rstest]
fn test_canonicalize_home_without_home_fails() {
    let resolver = PathResolver::new("/");

    let result = resolver.canonicalize("~/some-build");
    assert!(matches!(result, Err(Error::Usage(_))));
}

#[rstest]
fn test_resolve_file_accepts_non_utf8_path() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (_tmp, root) = real_tmp();
    let name = OsStr::from_bytes(b"conf-\xff");
    if std::fs::write(root.join(name), "").is_err() {
        // filesystem refuses non UTF-8 names
        return;
    }
    let resolver = PathResolver::new(&root);

    let result = resolver
        .resolve_file(
            Some(root.join(name).as_path()),
            "config",
            Existence::OptionalIfMissing,
            None,
        )
        .unwrap();
    assert_eq!(result, Some(root.join(name)));
}

#[rstest]
fn test_empty_value_without_default_is_unresolved() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let file = resolver
        .resolve_file(Some(Path::new("")), "setup script", Existence::Required, None)
        .unwrap();
    let dir = resolver
        .resolve_dir(None, "build directory", Existence::Required, None)
        .unwrap();
    assert!(file.is_none());
    assert!(dir.is_none());
}

#[rstest]
fn test_default_used_when_value_empty() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let dir = resolver
        .resolve_dir(
            None,
            "build directory",
            Existence::OptionalIfMissing,
            Some(Path::new("build")),
        )
        .unwrap();
    assert_eq!(dir, Some(root.join("build")));
}

#[rstest]
fn test_required_file_missing_fails() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let result = resolver.resolve_file(
        Some(Path::new("missing.sh")),
        "setup script",
        Existence::Required,
        None,
    );
    match result {
        Err(Error::MissingOrUnreadableFile { path, .. }) => {
            assert_eq!(path, root.join("missing.sh"));
        }
        other => panic!("Expected MissingOrUnreadableFile, got: {:?}", other),
    }
}

#[rstest]
fn test_required_file_that_is_a_directory_fails() {
    let (_tmp, root) = real_tmp();
    std::fs::create_dir(root.join("dir")).unwrap();
    let resolver = PathResolver::new(&root);

    assert_eq!(classify_file(&root.join("dir")), PathState::WrongType);
    let result = resolver.resolve_file(
        Some(Path::new("dir")),
        "setup script",
        Existence::Required,
        None,
    );
    assert!(matches!(result, Err(Error::MissingOrUnreadableFile { .. })));
}

#[rstest]
fn test_optional_file_missing_is_unresolved() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let result = resolver
        .resolve_file(
            Some(Path::new("missing.conf")),
            "config",
            Existence::OptionalIfMissing,
            None,
        )
        .unwrap();
    assert!(result.is_none());
}

#[rstest]
fn test_existing_file_resolves() {
    let (_tmp, root) = real_tmp();
    std::fs::write(root.join("present.conf"), "").unwrap();
    let resolver = PathResolver::new(&root);

    let result = resolver
        .resolve_file(Some(Path::new("present.conf")), "config", Existence::Required, None)
        .unwrap();
    assert_eq!(result, Some(root.join("present.conf")));
}

#[rstest]
fn test_required_dir_missing_fails() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    assert_eq!(classify_dir(&root.join("nope")), PathState::Missing);
    let result = resolver.resolve_dir(
        Some(Path::new("nope")),
        "build directory",
        Existence::Required,
        None,
    );
    assert!(matches!(
        result,
        Err(Error::MissingOrInaccessibleDirectory { .. })
    ));
}

#[rstest]
fn test_must_not_exist_yet_rejects_existing_dir() {
    let (_tmp, root) = real_tmp();
    std::fs::create_dir(root.join("build")).unwrap();
    let resolver = PathResolver::new(&root);

    let result = resolver.resolve_dir(
        Some(Path::new("build")),
        "build directory",
        Existence::MustNotExistYet,
        None,
    );
    assert!(matches!(result, Err(Error::DirectoryAlreadyExists { .. })));
}

#[rstest]
fn test_must_not_exist_yet_accepts_new_dir() {
    let (_tmp, root) = real_tmp();
    let resolver = PathResolver::new(&root);

    let result = resolver
        .resolve_dir(
            Some(Path::new("fresh/build")),
            "build directory",
            Existence::MustNotExistYet,
            None,
        )
        .unwrap();
    assert_eq!(result, Some(root.join("fresh/build")));
}
