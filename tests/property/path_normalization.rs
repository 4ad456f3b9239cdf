//! Property-based tests for path normalization

use handlefs::tree::path::{basename, extension, is_descendant, normalize, normalize_path, parent_path};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,8}".prop_filter("no dot-only segments", |s| s != "." && s != "..")
}

fn messy_path() -> impl Strategy<Value = String> {
    prop::collection::vec((segment(), 1usize..3), 0..6).prop_map(|parts| {
        let mut out = String::new();
        for (seg, slashes) in parts {
            out.push_str(&"/".repeat(slashes));
            out.push_str(&seg);
        }
        out
    })
}

/// Test that normalization is idempotent and canonical
#[test]
fn test_normalize_idempotent_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(messy_path(), messy_path()), |(parent, child)| {
            let once = normalize(&parent, &child);
            prop_assert_eq!(normalize(&once, ""), once.clone());
            prop_assert!(once.starts_with('/'));
            prop_assert!(!once.contains("//"));
            prop_assert!(once == "/" || !once.ends_with('/'));
            Ok(())
        })
        .unwrap();
}

/// Test that a path is rebuilt from its parent and basename
#[test]
fn test_parent_and_basename_recompose_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&messy_path(), |raw| {
            let path = normalize(&raw, "");
            prop_assume!(path != "/");
            let parent = parent_path(&path);
            prop_assert_eq!(normalize(&parent, basename(&path)), path.clone());
            prop_assert!(is_descendant(&parent, &path));
            prop_assert!(!is_descendant(&path, &parent));
            Ok(())
        })
        .unwrap();
}

/// Test that the extension is always a suffix of the basename
#[test]
fn test_extension_is_suffix_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&segment(), |name| {
            let ext = extension(&name);
            prop_assert!(!ext.contains('.'));
            if !ext.is_empty() {
                prop_assert!(name.ends_with(&format!(".{}", ext)), "name {:?} does not end with .{}", name, ext);
            }
            Ok(())
        })
        .unwrap();
}

/// Test that composed and decomposed spellings normalize alike
#[test]
fn test_unicode_spellings_converge() {
    let composed = normalize_path("/caf\u{e9}/r\u{e9}sum\u{e9}.txt");
    let decomposed = normalize_path("/cafe\u{301}/re\u{301}sume\u{301}.txt");
    assert_eq!(composed, decomposed);
}
