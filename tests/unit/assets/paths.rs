use super::*;

fn resolver() -> AssetResolver {
    AssetResolver::new("/tpl/dir", "/work")
}

#[test]
fn sentinel_paths_resolve_against_template_dir() {
    let r = resolver();
    assert_eq!(r.resolve("@logo.png"), PathBuf::from("/tpl/dir/logo.png"));
    assert_eq!(r.resolve("@/img/a.png"), PathBuf::from("/tpl/dir/img/a.png"));
    assert_eq!(r.resolve("@"), PathBuf::from("/tpl/dir/"));
}

#[test]
fn plain_paths_resolve_against_working_dir() {
    let r = resolver();
    assert_eq!(r.resolve("bg.png"), PathBuf::from("/work/bg.png"));
    assert_eq!(r.resolve("a/@b.png"), PathBuf::from("/work/a/@b.png"));
    assert_eq!(r.resolve("/abs/x.png"), PathBuf::from("/abs/x.png"));
}

#[test]
fn for_template_uses_parent_directory() {
    let r = AssetResolver::for_template(Path::new("t/card.lua"), Some("/work".into())).unwrap();
    assert_eq!(r.template_dir(), Path::new("/work/t"));
    assert_eq!(r.working_dir(), Path::new("/work"));

    let r = AssetResolver::for_template(Path::new("/abs/card.lua"), Some("/work".into())).unwrap();
    assert_eq!(r.template_dir(), Path::new("/abs"));
}

#[test]
fn for_template_defaults_to_process_working_dir() {
    let cwd = std::env::current_dir().unwrap();
    let r = AssetResolver::for_template(Path::new("card.lua"), None).unwrap();
    assert_eq!(r.working_dir(), cwd.as_path());
    assert_eq!(r.template_dir(), cwd.as_path());
}
