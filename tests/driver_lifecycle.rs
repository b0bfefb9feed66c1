//! Integration tests for the volume lifecycle driver using capability fakes.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;

use cloudvol::test_support::{
    FakeFilesystem, FakeProvider, FakeProviderError, FsCall, ProviderCall, RecordingObserver,
};
use cloudvol::{DiskConfig, DiskConfigError, DriverError, Scope, Verb, VolumeDriver};

type FakeDriver = VolumeDriver<FakeProvider, FakeFilesystem>;

fn driver_fixture() -> (FakeProvider, FakeFilesystem, FakeDriver) {
    let provider = FakeProvider::new();
    let fs = FakeFilesystem::new();
    let driver = VolumeDriver::new("/mnt/", provider.clone(), fs.clone());
    (provider, fs, driver)
}

fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[tokio::test]
async fn create_forwards_the_derived_config_to_the_provider() {
    let (provider, _fs, driver) = driver_fixture();

    driver
        .create("vol1", &options(&[("SizeGb", "10")]))
        .await
        .expect("create should succeed");

    assert_eq!(
        provider.created(),
        vec![DiskConfig {
            name: String::from("vol1"),
            size_gb: Some(10),
            ..DiskConfig::default()
        }]
    );
}

#[tokio::test]
async fn create_with_unknown_option_never_reaches_the_provider() {
    let (provider, _fs, driver) = driver_fixture();

    let err = driver
        .create("vol1", &options(&[("Foo", "x")]))
        .await
        .expect_err("unknown option should fail");

    assert!(matches!(
        err,
        DriverError::Config(DiskConfigError::UnknownOption { ref key }) if key == "Foo"
    ));
    assert!(err.to_string().contains("unknown option \"Foo\""));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn list_omits_disks_that_are_not_ready() {
    let (provider, _fs, driver) = driver_fixture();
    provider.seed_disk("vol1", "READY");
    provider.seed_disk("vol2", "CREATING");
    provider.seed_disk("vol3", "FAILED");

    let volumes = driver.list().await.expect("list should succeed");

    let names: Vec<_> = volumes.iter().map(|volume| volume.name.as_str()).collect();
    assert_eq!(names, vec!["vol1"]);
    assert!(volumes.iter().all(|volume| volume.mountpoint.is_none()));
}

#[tokio::test]
async fn get_recomputes_the_mount_point_from_the_name() {
    let (provider, _fs, driver) = driver_fixture();
    provider.seed_disk("vol1", "READY");

    let volume = driver
        .get("vol1")
        .await
        .expect("get should succeed")
        .expect("volume should be visible");

    assert_eq!(volume.name, "vol1");
    assert_eq!(volume.mountpoint, Some(Utf8PathBuf::from("/mnt/vol1")));
}

#[tokio::test]
async fn get_returns_none_for_an_unknown_name() {
    let (provider, _fs, driver) = driver_fixture();
    provider.seed_disk("other", "READY");

    let volume = driver.get("vol1").await.expect("get should succeed");

    assert_eq!(volume, None);
}

#[tokio::test]
async fn path_creates_a_missing_mount_point_directory() {
    let (_provider, fs, driver) = driver_fixture();

    let mountpoint = driver.path("vol1").await.expect("path should succeed");

    assert_eq!(mountpoint, Utf8PathBuf::from("/mnt/vol1"));
    assert_eq!(
        fs.mutations(),
        vec![FsCall::MkdirAll(Utf8PathBuf::from("/mnt/vol1"), 0o755)]
    );
}

#[tokio::test]
async fn path_leaves_an_existing_directory_untouched() {
    let (_provider, fs, driver) = driver_fixture();
    fs.seed_dir(Utf8PathBuf::from("/mnt/vol1").as_path());

    driver.path("vol1").await.expect("path should succeed");

    assert!(fs.mutations().is_empty());
}

#[tokio::test]
async fn path_conflicts_on_a_pre_existing_non_directory() {
    let (_provider, fs, driver) = driver_fixture();
    fs.seed_file(Utf8PathBuf::from("/mnt/vol1").as_path());

    let err = driver
        .path("vol1")
        .await
        .expect_err("conflicting path should fail");

    assert!(matches!(
        err,
        DriverError::MountPointConflict { ref path } if path == "/mnt/vol1"
    ));
    assert!(fs.mutations().is_empty());
}

#[tokio::test]
async fn mount_orders_attach_format_and_mount() {
    let (provider, fs, driver) = driver_fixture();

    let mountpoint = driver.mount("vol1").await.expect("mount should succeed");

    assert_eq!(mountpoint, Utf8PathBuf::from("/mnt/vol1"));
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Attach(String::from("vol1"))]
    );

    let device = Utf8PathBuf::from("/dev/disk/by-id/google-cloudvol-vol1");
    assert_eq!(
        fs.mutations(),
        vec![
            FsCall::MkdirAll(Utf8PathBuf::from("/mnt/vol1"), 0o755),
            FsCall::Format(device.clone()),
            FsCall::Mount(device, Utf8PathBuf::from("/mnt/vol1")),
        ]
    );
}

#[tokio::test]
async fn mount_aborts_with_the_attach_error_before_touching_the_device() {
    let (provider, fs, driver) = driver_fixture();
    provider.fail_on_attach();

    let err = driver
        .mount("vol1")
        .await
        .expect_err("failed attach should abort the mount");

    assert!(matches!(
        err,
        DriverError::Provider(FakeProviderError::Attach)
    ));
    assert_eq!(
        fs.mutations(),
        vec![FsCall::MkdirAll(Utf8PathBuf::from("/mnt/vol1"), 0o755)],
        "format and mount must not run after a failed attach"
    );
}

#[tokio::test]
async fn mount_stops_before_mounting_when_format_fails() {
    let (provider, fs, driver) = driver_fixture();
    fs.fail_on_format();

    let err = driver
        .mount("vol1")
        .await
        .expect_err("failed format should abort the mount");

    assert!(matches!(err, DriverError::Filesystem(_)));
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Attach(String::from("vol1"))],
        "attach has already happened and is not rolled back"
    );
    assert!(
        !fs.mutations()
            .iter()
            .any(|call| matches!(call, FsCall::Mount(_, _))),
        "mount must not run after a failed format"
    );
}

#[tokio::test]
async fn unmount_failure_never_detaches_the_disk() {
    let (provider, fs, driver) = driver_fixture();
    fs.fail_on_unmount();

    let err = driver
        .unmount("vol1")
        .await
        .expect_err("failed unmount should surface");

    assert!(matches!(err, DriverError::Filesystem(_)));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn unmount_detaches_only_after_the_filesystem_releases() {
    let (provider, fs, driver) = driver_fixture();

    driver.unmount("vol1").await.expect("unmount should succeed");

    assert_eq!(
        fs.mutations(),
        vec![FsCall::Unmount(Utf8PathBuf::from("/mnt/vol1"))]
    );
    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Detach(String::from("vol1"))]
    );
}

#[tokio::test]
async fn remove_delegates_straight_to_the_provider() {
    let (provider, fs, driver) = driver_fixture();

    driver.remove("vol1").await.expect("remove should succeed");

    assert_eq!(
        provider.calls(),
        vec![ProviderCall::Delete(String::from("vol1"))]
    );
    assert!(fs.calls().is_empty());
}

#[tokio::test]
async fn remove_surfaces_the_provider_refusal_verbatim() {
    let (provider, _fs, driver) = driver_fixture();
    provider.fail_on_delete();

    let err = driver
        .remove("vol1")
        .await
        .expect_err("provider refusal should surface");

    assert!(matches!(
        err,
        DriverError::Provider(FakeProviderError::Delete)
    ));
}

#[test]
fn capabilities_advertise_local_scope() {
    let (_provider, _fs, driver) = driver_fixture();

    assert_eq!(driver.capabilities().scope, Scope::Local);
    assert_eq!(driver.capabilities().scope.to_string(), "local");
}

#[tokio::test]
async fn observer_sees_requests_and_successful_completions() {
    let provider = FakeProvider::new();
    let fs = FakeFilesystem::new();
    let observer = RecordingObserver::new();
    let driver =
        VolumeDriver::with_observer("/mnt/", provider, fs, observer.clone());

    driver
        .create("vol1", &BTreeMap::new())
        .await
        .expect("create should succeed");
    driver.mount("vol1").await.expect("mount should succeed");

    let verbs: Vec<_> = observer
        .requests()
        .iter()
        .map(|request| request.verb)
        .collect();
    assert_eq!(verbs, vec![Verb::Create, Verb::Mount]);
    assert_eq!(
        observer.completions(),
        vec![
            (Verb::Create, String::from("vol1")),
            (Verb::Mount, String::from("vol1")),
        ]
    );
}

#[tokio::test]
async fn failures_leave_no_completion_event() {
    let provider = FakeProvider::new();
    let fs = FakeFilesystem::new();
    let observer = RecordingObserver::new();
    provider.fail_on_create();
    let driver =
        VolumeDriver::with_observer("/mnt/", provider, fs, observer.clone());

    driver
        .create("vol1", &BTreeMap::new())
        .await
        .expect_err("scripted create failure");

    assert!(observer.completions().is_empty());
}
