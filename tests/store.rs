use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use naip_fetch::config::{Environment, IMAGERY_ROOT_VAR};
use naip_fetch::domain::{BucketPrefix, DEFAULT_BUCKET, Selection};
use naip_fetch::error::NaipError;
use naip_fetch::store::{Store, ensure_dir_tree};

#[test]
fn layout_paths() {
    let store = Store::new_with_root(Utf8PathBuf::from("/srv/geo"));
    let selection = Selection::new("ca", "2016", "60cm", "rgb", "32117").unwrap();
    let prefix = BucketPrefix::new(DEFAULT_BUCKET, &selection);

    assert_eq!(store.naip_root().as_str(), "/srv/geo/naip");
    let path = store
        .local_path(&prefix, "m_3211701_ne_11_h_20160606.tif")
        .unwrap();
    assert!(path.ends_with("naip/ca/2016/60cm/rgb/32117/m_3211701_ne_11_h_20160606.tif"));
}

#[test]
fn local_path_refuses_keys_outside_the_prefix() {
    let store = Store::new_with_root(Utf8PathBuf::from("/srv/geo"));
    let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());

    for key in ["../x.tif", "a/../../x.tif", "/etc/passwd", "", "./x.tif"] {
        let err = store.local_path(&prefix, key).unwrap_err();
        assert_matches!(err, NaipError::UnsafeKey(_), "key {key:?}");
    }
    assert!(store.local_path(&prefix, "sub/x.tif").is_ok());
}

#[test]
fn store_requires_imagery_root() {
    let env = Environment::from_lookup(|_| None);
    let err = Store::new(&env).unwrap_err();
    assert_matches!(err, NaipError::MissingEnv(name) if name == IMAGERY_ROOT_VAR);
}

#[test]
fn ensure_dir_tree_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("a/b/c")).unwrap();

    ensure_dir_tree(&root).unwrap();
    ensure_dir_tree(&root).unwrap();
    assert!(root.as_std_path().is_dir());

    let store = Store::new_with_root(root.clone());
    store.ensure_naip_root().unwrap();
    store.ensure_naip_root().unwrap();
    assert!(root.join("naip").as_std_path().is_dir());
}

#[test]
fn ensure_dir_tree_reports_file_in_the_way() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = Utf8PathBuf::from_path_buf(temp.path().join("geo")).unwrap();
    std::fs::write(blocker.as_std_path(), b"not a directory").unwrap();

    let err = ensure_dir_tree(&blocker.join("naip")).unwrap_err();
    assert_matches!(err, NaipError::Filesystem(_));
}
