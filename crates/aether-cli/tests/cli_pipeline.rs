use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn aether_cmd() -> Command {
    Command::cargo_bin("aether").unwrap()
}

fn write_pom(repo_dir: &std::path::Path, group: &str, artifact: &str, version: &str, xml: &str) {
    let dir = repo_dir.join(group.replace('.', "/")).join(artifact).join(version);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{artifact}-{version}.pom")), xml).unwrap();
    fs::write(dir.join(format!("{artifact}-{version}.jar")), b"fake jar bytes").unwrap();
}

/// Root depends on `dep-a`, which has no further dependencies.
fn build_fixture_repo() -> TempDir {
    let repo = TempDir::new().unwrap();
    write_pom(
        repo.path(),
        "org.example",
        "demo",
        "1.0",
        r#"<project>
            <groupId>org.example</groupId>
            <artifactId>demo</artifactId>
            <version>1.0</version>
            <dependencies>
                <dependency>
                    <groupId>org.example</groupId>
                    <artifactId>dep-a</artifactId>
                    <version>2.0</version>
                </dependency>
            </dependencies>
        </project>"#,
    );
    write_pom(
        repo.path(),
        "org.example",
        "dep-a",
        "2.0",
        r#"<project>
            <groupId>org.example</groupId>
            <artifactId>dep-a</artifactId>
            <version>2.0</version>
        </project>"#,
    );
    repo
}

fn write_manifest(project_dir: &std::path::Path, repo_url: &str) {
    fs::write(
        project_dir.join("Kargo.toml"),
        format!(
            r#"
            [package]
            group = "org.example"
            name = "demo"
            version = "1.0"

            [repositories]
            local = "{repo_url}"
            "#
        ),
    )
    .unwrap();
}

#[test]
fn resolve_reports_the_conflict_free_graph() {
    let repo = build_fixture_repo();
    let project = TempDir::new().unwrap();
    write_manifest(project.path(), &format!("file:{}", repo.path().display()));

    aether_cmd()
        .current_dir(project.path())
        .args(["resolve", "--verbose"])
        .assert()
        .success()
        .stdout(predicates::str::contains("resolved"))
        .stdout(predicates::str::contains("dep-a"));
}

#[test]
fn tree_prints_root_and_dependency() {
    let repo = build_fixture_repo();
    let project = TempDir::new().unwrap();
    write_manifest(project.path(), &format!("file:{}", repo.path().display()));

    aether_cmd()
        .current_dir(project.path())
        .arg("tree")
        .assert()
        .success()
        .stdout(predicates::str::contains("org.example:demo"))
        .stdout(predicates::str::contains("org.example:dep-a"));
}

#[test]
fn fetch_downloads_every_resolved_artifact() {
    let repo = build_fixture_repo();
    let project = TempDir::new().unwrap();
    write_manifest(project.path(), &format!("file:{}", repo.path().display()));

    aether_cmd()
        .current_dir(project.path())
        .arg("fetch")
        .assert()
        .success()
        .stdout(predicates::str::contains("fetched 1 artifact"));

    let jar = project
        .path()
        .join(".aether-local-repo/org/example/dep-a/2.0/dep-a-2.0.jar");
    assert!(jar.is_file());
}

#[test]
fn resolve_without_manifest_fails() {
    let project = TempDir::new().unwrap();
    aether_cmd().current_dir(project.path()).arg("resolve").assert().failure();
}
