use super::*;

fn entry(path: &str, arguments: &[&str], working_dir: Option<&str>) -> ResolvedEntry {
    ResolvedEntry {
        id: "foo".to_string(),
        name: "Foo".to_string(),
        path: path.to_string(),
        default_path: String::new(),
        enabled: true,
        order: 0,
        arguments: arguments.iter().map(ToString::to_string).collect(),
        working_dir: working_dir.map(ToString::to_string),
        is_custom: true,
    }
}

#[test]
fn macos_bundle_executable_should_launch_through_open() {
    let item = entry("/Applications/Foo.app/Contents/MacOS/Foo", &["--x"], None);
    let plan = plan_launch(&item, Path::new("/tmp/a.stl"), Platform::MacOs);

    assert_eq!(plan.program, PathBuf::from("open"));
    assert_eq!(
        plan.args,
        vec![
            OsString::from("-a"),
            OsString::from("/Applications/Foo.app"),
            OsString::from("/tmp/a.stl"),
        ]
    );
    assert_eq!(plan.working_dir, None);
}

#[test]
fn macos_bundle_path_itself_should_be_its_own_root() {
    let item = entry("/Applications/Foo.app", &[], None);
    let plan = plan_launch(&item, Path::new("/tmp/a.3mf"), Platform::MacOs);
    assert_eq!(plan.args[1], OsString::from("/Applications/Foo.app"));
}

#[test]
fn plain_executable_should_receive_arguments_then_file() {
    let item = entry("/usr/bin/foo", &["--single", "-v"], Some("/opt/foo"));
    let plan = plan_launch(&item, Path::new("/tmp/a.stl"), Platform::Linux);

    assert_eq!(plan.program, PathBuf::from("/usr/bin/foo"));
    assert_eq!(
        plan.args,
        vec![
            OsString::from("--single"),
            OsString::from("-v"),
            OsString::from("/tmp/a.stl"),
        ]
    );
    assert_eq!(plan.working_dir, Some(PathBuf::from("/opt/foo")));
}

#[test]
fn bundle_path_off_macos_should_run_directly() {
    let item = entry("/Applications/Foo.app/Contents/MacOS/Foo", &[], Some("  "));
    let plan = plan_launch(&item, Path::new("/tmp/a.stl"), Platform::Linux);
    assert_eq!(
        plan.program,
        PathBuf::from("/Applications/Foo.app/Contents/MacOS/Foo")
    );
    assert_eq!(plan.args, vec![OsString::from("/tmp/a.stl")]);
    assert_eq!(plan.working_dir, None);
}

#[test]
fn bundle_root_should_find_nearest_app_ancestor() {
    assert_eq!(
        bundle_root(Path::new("/Applications/Foo.app/Contents/MacOS/Foo")),
        Some(Path::new("/Applications/Foo.app"))
    );
    assert_eq!(bundle_root(Path::new("/usr/bin/foo")), None);
}

#[test]
fn spawn_failure_should_report_launch_error() {
    let plan = LaunchPlan {
        program: std::env::temp_dir().join("slicer-picker-definitely-missing-binary"),
        args: vec![OsString::from("/tmp/a.stl")],
        working_dir: None,
    };
    let error = spawn_plan(&plan).expect_err("missing binary should fail");
    assert_eq!(error.code, "slicer_launch_failed");
    assert!(error.context_value("program").is_some());
    assert!(!error.causes.is_empty());
}

#[cfg(unix)]
#[test]
fn spawn_should_return_detached_handle() {
    let plan = LaunchPlan {
        program: PathBuf::from("sh"),
        args: vec![OsString::from("-c"), OsString::from("exit 0")],
        working_dir: Some(std::env::temp_dir()),
    };
    let handle = spawn_plan(&plan).expect("spawn sh");
    assert!(handle.detached);
    assert!(handle.pid > 0);
}

#[test]
fn relative_file_should_be_passed_as_absolute_path() {
    let item = entry("/usr/bin/cura", &[], Some("/opt/cura"));
    let plan = plan_launch(&item, Path::new("model.stl"), Platform::Linux);

    let expected = std::env::current_dir()
        .expect("current dir")
        .join("model.stl");
    assert_eq!(plan.args, vec![expected.clone().into_os_string()]);
    assert!(Path::new(&plan.args[0]).is_absolute());
    assert_eq!(plan.working_dir, Some(PathBuf::from("/opt/cura")));

    let bundle = entry("/Applications/Cura.app", &[], Some("/opt/cura"));
    let plan = plan_launch(&bundle, Path::new("model.stl"), Platform::MacOs);
    assert_eq!(plan.args[2], expected.into_os_string());
}
