use proptest::prelude::*;
use swiftfs::models::{PathTranslator, SwiftPath};

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_.-]{1,8}".prop_filter("no dot segments", |s| s != "." && s != "..")
}

fn path() -> impl Strategy<Value = (String, bool)> {
    (prop::collection::vec(segment(), 1..5), any::<bool>())
        .prop_map(|(segments, slash)| (format!("/{}", segments.join("/")), slash))
}

proptest! {
    #[test]
    fn dir_form_ends_with_one_slash_and_is_idempotent((raw, slash) in path()) {
        let translator = PathTranslator::new("swift://data.test/").unwrap();
        let input = if slash { format!("{raw}/") } else { raw.clone() };
        let path = SwiftPath::parse(&input).unwrap();

        let dir = translator.to_dir_path(&path);
        prop_assert!(dir.key().ends_with('/'));
        prop_assert!(!dir.key().ends_with("//"));
        prop_assert!(!dir.key().starts_with('/'));
        prop_assert_eq!(dir.to_dir(), dir.clone());
        prop_assert_eq!(translator.to_dir_path(&translator.qualify_object(&dir)), dir);
    }

    #[test]
    fn parent_and_name_rebuild_the_path((raw, _slash) in path()) {
        let path = SwiftPath::parse(&raw).unwrap();
        let parent = path.parent().unwrap();
        prop_assert!(parent.join(path.name()).same_location(&path));
    }
}

#[test]
fn root_dir_form_is_the_container() {
    let translator = PathTranslator::new("swift://data.test/").unwrap();
    let root = translator.to_dir_path(&SwiftPath::parse("/").unwrap());
    assert!(root.is_root());
    assert_eq!(root.container(), "data");
}
