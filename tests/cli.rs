use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        Command::cargo_bin("mnemo")?
            .current_dir(dir.path())
            .env_remove("MNEMO_CONFIG")
            .env_remove("MNEMO_DATABASE")
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized mnemo"));
        Ok(Self { dir })
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root().join(".mnemo").join(file)
    }

    fn mnemo(&self) -> anyhow::Result<Command> {
        let mut cmd = Command::cargo_bin("mnemo")?;
        cmd.current_dir(self.root())
            .env("MNEMO_CONFIG", self.path("config.toml"))
            .env("MNEMO_DATABASE", self.path("data.db"))
            .env_remove("RUST_LOG");
        Ok(cmd)
    }
}

#[test]
fn init_twice_requires_force() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    assert!(ws.path("config.toml").exists());
    assert!(ws.path("data.db").exists());

    Command::cargo_bin("mnemo")?
        .current_dir(ws.root())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    Ok(())
}

#[test]
fn remember_then_list_favorites() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "My favorite candies are Snickers, Reese's."])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 stored, 0 updated"))
        .stdout(predicate::str::contains("user.favorites.candy.2"));

    ws.mnemo()?
        .args(["remember", "Make Twix my #1 favorite candy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 stored, 2 updated"));

    let output = ws
        .mnemo()?
        .args(["favorites", "candies", "--format", "json"])
        .output()?;
    assert!(output.status.success());

    let lists: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let values: Vec<&str> = lists["candy"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["value"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(values, vec!["Twix", "Snickers", "Reese's"]);
    Ok(())
}

#[test]
fn remember_reports_ambiguity() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "My favorite colors are green, blue"])
        .assert()
        .success();
    ws.mnemo()?
        .args(["remember", "My favorite cities are Paris, Rome"])
        .assert()
        .success();

    ws.mnemo()?
        .args(["remember", "Make Lisbon my #1", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ambiguous_topics\""))
        .stdout(predicate::str::contains("\"store_count\": 0"));
    Ok(())
}

#[test]
fn facts_and_clear() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "My email is ada@example.com and I live in Berlin"])
        .assert()
        .success();

    ws.mnemo()?
        .args(["facts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user.email"))
        .stdout(predicate::str::contains("ada@example.com"));

    ws.mnemo()?
        .args(["clear", "--all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    ws.mnemo()?
        .args(["clear", "--prefix", "user.email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 fact(s)"));

    ws.mnemo()?
        .args(["facts", "--prefix", "user.email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No facts stored"));
    Ok(())
}

#[test]
fn recall_numbers_hits() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "My favorite candies are Twix, Mars"])
        .assert()
        .success();

    ws.mnemo()?
        .args(["recall", "twix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[M1]"))
        .stdout(predicate::str::contains("Twix"));
    Ok(())
}

#[test]
fn cite_keeps_one_marker_for_single_claim() -> anyhow::Result<()> {
    let ws = Workspace::new()?;
    let hits = ws.root().join("hits.json");
    std::fs::write(
        &hits,
        r#"[
            {"source_id": "a", "content": "favorite candy #1: Twix", "score": 0.4},
            {"source_id": "b", "content": "favorite candy #1: Twix", "score": 0.9},
            {"source_id": "c", "content": "favorite candy #2: Mars", "score": 0.2}
        ]"#,
    )?;

    ws.mnemo()?
        .args(["cite", "Your favorite candy is Twix [M1][M2][M3]."])
        .arg("--hits")
        .arg(&hits)
        .assert()
        .success()
        .stdout("Your favorite candy is Twix [M1].\n");
    Ok(())
}

#[test]
fn escalate_reports_reason() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["escalate", "What is my favorite candy?", "Twix."])
        .assert()
        .success()
        .stdout(predicate::str::contains("too_short"));

    ws.mnemo()?
        .args([
            "escalate",
            "What is my favorite candy?",
            "Your favorite candy is Twix.",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"should_escalate\": false"));
    Ok(())
}

#[test]
fn config_set_and_get() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["config", "ranking.max_hits", "3"])
        .assert()
        .success();

    ws.mnemo()?
        .args(["config", "ranking.max_hits"])
        .assert()
        .success()
        .stdout("3\n");
    Ok(())
}

#[test]
fn escalate_searches_local_store() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "My favorite candies are Twix, Mars"])
        .assert()
        .success();

    ws.mnemo()?
        .args([
            "escalate",
            "What is my favorite candy?",
            "Your favorite candy is Twix.",
            "--search",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"should_escalate\": false"));
    Ok(())
}

#[test]
fn stats_labels_message_count_as_global() -> anyhow::Result<()> {
    let ws = Workspace::new()?;

    ws.mnemo()?
        .args(["remember", "I live in Berlin"])
        .assert()
        .success();

    ws.mnemo()?
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Messages (all projects): 1"));

    ws.mnemo()?
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"messages_all_projects\": 1"));
    Ok(())
}
