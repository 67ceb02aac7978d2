//! Integration tests for the discovery walk
//!
//! These build small service trees on disk and verify ignore cascading,
//! descriptor disambiguation, file/Dockerfile attribution, and the
//! first-registration-wins naming rule.

use forge::{Discovery, DiscoveryError, ForgeConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn discovery_for(base: &Path) -> Discovery {
    Discovery::new(ForgeConfig::new(base))
}

/// Two sibling services, one depending on the other.
fn create_two_service_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let base = dir.path();

    fs::create_dir(base.join("serviceA")).unwrap();
    fs::write(
        base.join("serviceA/service.yaml"),
        "name: serviceA\nrequires:\n  - serviceB\n",
    )
    .unwrap();
    fs::write(base.join("serviceA/Dockerfile"), "FROM scratch\n").unwrap();

    fs::create_dir(base.join("serviceB")).unwrap();
    fs::write(base.join("serviceB/service.yaml"), "name: serviceB\nrequires: []\n").unwrap();

    dir
}

#[test]
fn test_end_to_end_discover_and_resolve() {
    let dir = create_two_service_tree();
    let mut discovery = discovery_for(dir.path());

    let services = discovery.search(dir.path()).unwrap();
    assert_eq!(services.len(), 2);

    let a = discovery.registry().get("serviceA").unwrap();
    assert_eq!(a.requires(), ["serviceB"]);
    assert_eq!(a.dockerfiles(), vec!["Dockerfile"]);

    let added = discovery
        .dependencies(&["serviceA".to_string()])
        .unwrap();
    assert_eq!(added, vec!["serviceB"]);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut discovery = discovery_for(dir.path());

    let err = discovery.search(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, DiscoveryError::PathNotFound(_)));
}

#[test]
fn test_root_must_be_a_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("plain"), "").unwrap();
    let mut discovery = discovery_for(dir.path());

    let err = discovery.search(&dir.path().join("plain")).unwrap_err();
    assert!(matches!(err, DiscoveryError::NotADirectory(_)));
}

#[test]
fn test_parent_ignore_cascades_to_descendants() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::write(base.join(".gitignore"), "*.log\n").unwrap();
    fs::create_dir_all(base.join("svc/deep")).unwrap();
    fs::write(base.join("svc/service.yaml"), "name: svc\n").unwrap();
    fs::write(base.join("svc/deep/trace.log"), "x").unwrap();
    fs::write(base.join("svc/deep/keep.txt"), "x").unwrap();

    let mut discovery = discovery_for(base);
    discovery.search(base).unwrap();

    let files = discovery.registry().get("svc").unwrap().files();
    assert!(files.contains(&"deep/keep.txt".to_string()));
    assert!(!files.iter().any(|f| f.ends_with("trace.log")));
}

#[test]
fn test_local_ignore_does_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir(base.join("a")).unwrap();
    fs::create_dir(base.join("b")).unwrap();
    fs::write(base.join("a/.forgeignore"), "secret.txt\n").unwrap();
    fs::write(base.join("a/service.yaml"), "name: a\n").unwrap();
    fs::write(base.join("a/secret.txt"), "x").unwrap();
    fs::write(base.join("b/service.yaml"), "name: b\n").unwrap();
    fs::write(base.join("b/secret.txt"), "x").unwrap();

    let mut discovery = discovery_for(base);
    discovery.search(base).unwrap();

    let a_files = discovery.registry().get("a").unwrap().files();
    let b_files = discovery.registry().get("b").unwrap().files();
    assert!(!a_files.contains(&"secret.txt".to_string()));
    assert!(b_files.contains(&"secret.txt".to_string()));
}

#[test]
fn test_kubernetes_manifest_is_not_a_service_boundary() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir(base.join("svc")).unwrap();
    fs::write(base.join("svc/service.yaml"), "name: svc\n").unwrap();
    fs::create_dir(base.join("svc/k8s")).unwrap();
    // Same filename, Kubernetes-shaped content: plain data, not a service.
    fs::write(
        base.join("svc/k8s/service.yaml"),
        "apiVersion: v1\nkind: Service\nmetadata:\n  name: svc\n",
    )
    .unwrap();

    let mut discovery = discovery_for(base);
    let services = discovery.search(base).unwrap();

    assert_eq!(services.len(), 1);
    let files = discovery.registry().get("svc").unwrap().files();
    assert!(files.contains(&"k8s/service.yaml".to_string()));
}

#[test]
fn test_first_registration_wins_but_both_are_reported() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir(base.join("one")).unwrap();
    fs::create_dir(base.join("two")).unwrap();
    fs::write(base.join("one/service.yaml"), "name: dup\n").unwrap();
    fs::write(base.join("two/service.yaml"), "name: dup\n").unwrap();

    let mut discovery = discovery_for(base);
    let services = discovery.search(base).unwrap();

    // Both discoveries are visible to the caller...
    assert_eq!(services.len(), 2);
    // ...but the registry keeps the first.
    assert_eq!(discovery.registry().len(), 1);
    let registered = discovery.registry().get("dup").unwrap();
    assert_eq!(registered.root(), services[0].root());
    assert!(registered.root().ends_with("one"));
}

#[test]
fn test_files_attach_to_nearest_enclosing_service() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir_all(base.join("svc/src")).unwrap();
    fs::create_dir_all(base.join("svc/sub")).unwrap();
    fs::write(base.join("svc/service.yaml"), "name: outer\n").unwrap();
    fs::write(base.join("svc/Dockerfile"), "FROM scratch\n").unwrap();
    fs::write(base.join("svc/src/app.py"), "x").unwrap();
    fs::write(base.join("svc/sub/service.yaml"), "name: inner\n").unwrap();
    fs::write(base.join("svc/sub/lib.py"), "x").unwrap();

    let mut discovery = discovery_for(base);
    discovery.search(base).unwrap();

    let outer = discovery.registry().get("outer").unwrap();
    let inner = discovery.registry().get("inner").unwrap();

    assert_eq!(
        outer.files(),
        vec!["Dockerfile", "service.yaml", "src/app.py"]
    );
    assert_eq!(outer.dockerfiles(), vec!["Dockerfile"]);
    assert_eq!(inner.files(), vec!["lib.py", "service.yaml"]);
    assert!(inner.dockerfiles().is_empty());
}

#[test]
fn test_nested_dockerfile_attaches_to_enclosing_service() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir_all(base.join("svc/worker")).unwrap();
    fs::write(base.join("svc/service.yaml"), "name: svc\n").unwrap();
    fs::write(base.join("svc/worker/Dockerfile"), "FROM scratch\n").unwrap();

    let mut discovery = discovery_for(base);
    discovery.search(base).unwrap();

    let svc = discovery.registry().get("svc").unwrap();
    assert_eq!(svc.dockerfiles(), vec!["worker/Dockerfile"]);

    let containers = svc.containers();
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].image(), "svc-worker");
}

#[test]
fn test_dockerfile_without_enclosing_service_is_loose() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir(base.join("tools")).unwrap();
    fs::write(base.join("tools/Dockerfile"), "FROM scratch\n").unwrap();

    let mut discovery = discovery_for(base);
    let services = discovery.search(base).unwrap();
    assert!(services.is_empty());
}

#[test]
fn test_forge_state_directory_is_skipped() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    fs::create_dir(base.join("svc")).unwrap();
    fs::write(base.join("svc/service.yaml"), "name: svc\n").unwrap();
    fs::create_dir_all(base.join(".forge/dep")).unwrap();
    fs::write(base.join(".forge/dep/service.yaml"), "name: dep\n").unwrap();

    let mut discovery = discovery_for(base);
    let services = discovery.search(base).unwrap();

    assert_eq!(services.len(), 1);
    assert!(!discovery.registry().contains("dep"));
}

#[test]
fn test_search_result_order_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    for name in ["zeta", "alpha", "midway"] {
        fs::create_dir(base.join(name)).unwrap();
        fs::write(
            base.join(name).join("service.yaml"),
            format!("name: {}\n", name),
        )
        .unwrap();
    }

    let names = |discovery: &mut Discovery| -> Vec<String> {
        discovery
            .search(base)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    };

    let mut first = discovery_for(base);
    let mut second = discovery_for(base);
    assert_eq!(names(&mut first), vec!["alpha", "midway", "zeta"]);
    assert_eq!(names(&mut first), names(&mut second));
}
