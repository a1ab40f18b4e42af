//! End-to-end tests for the seraglio binary.
//!
//! Each test points the binary at a temporary database through a config file
//! and an isolated HOME, then drives it the way the gateway and chat front end
//! would: presence events on stdin, queries as subcommands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::{DateTime, Duration, Utc};
use sg_core::{ChannelId, GuildId, Scope, Session, UserId};
use sg_db::Database;
use tempfile::TempDir;

struct Env {
    temp: TempDir,
    db_path: PathBuf,
    config_path: PathBuf,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("seraglio.db");
        let config_path = temp.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!("database_path = {:?}\n", db_path.display().to_string()),
        )
        .unwrap();
        Self {
            temp,
            db_path,
            config_path,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_seraglio"));
        cmd.env("HOME", self.temp.path())
            .env_remove("SERAGLIO_DATABASE_PATH")
            .env_remove("SERAGLIO_LOG_FILTER")
            .env_remove("SERAGLIO_BUSY_TIMEOUT_MS")
            .arg("--config")
            .arg(&self.config_path);
        cmd
    }

    fn database(&self) -> Database {
        Database::open(&self.db_path).unwrap()
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "seraglio failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn run_with_input(env: &Env, input: &str) -> Output {
    let mut child = env
        .command()
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn seraglio run");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to wait for seraglio run")
}

fn guild_sessions(db_path: &Path) -> Vec<Session> {
    Database::open(db_path)
        .unwrap()
        .sessions_in_scope(&Scope::guild(GuildId::new("g1").unwrap()))
        .unwrap()
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn seed(db: &Database, user: &str, channel: &str, start: i64, end: i64) {
    let mut session = Session::open(
        UserId::new(user).unwrap(),
        GuildId::new("g1").unwrap(),
        ChannelId::new(channel).unwrap(),
        t0() + Duration::seconds(start),
    );
    session.end_time = Some(t0() + Duration::seconds(end));
    db.insert_session(&session).unwrap();
}

#[test]
fn run_tracks_events_and_closes_sessions_at_end_of_input() {
    let env = Env::new();
    let events = r#"{"type":"snapshot","guild_id":"g1","entries":[{"user_id":"u1","channel_id":"c1"}]}
{"type":"entered","user_id":"u1","guild_id":"g1","channel_id":"c1"}
{"type":"entered","user_id":"u2","guild_id":"g1","channel_id":"c2"}
{"type":"left","user_id":"u2","guild_id":"g1"}
{"type":"left","user_id":"nobody","guild_id":"g1"}
"#;

    let output = run_with_input(&env, events);
    assert_success(&output);

    let sessions = guild_sessions(&env.db_path);
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.end_time.is_some()));
    assert!(sessions.iter().all(|s| s.end_time >= Some(s.start_time)));
}

#[test]
fn restart_with_snapshot_does_not_duplicate_sessions() {
    let env = Env::new();
    {
        // An open session left behind by a tracker that never reconciled.
        let db = env.database();
        let session = Session::open(
            UserId::new("u1").unwrap(),
            GuildId::new("g1").unwrap(),
            ChannelId::new("c1").unwrap(),
            Utc::now() - Duration::minutes(5),
        );
        db.insert_session(&session).unwrap();
    }

    let output = run_with_input(
        &env,
        r#"{"type":"snapshot","guild_id":"g1","entries":[{"user_id":"u1","channel_id":"c1"}]}
"#,
    );
    assert_success(&output);

    let sessions = guild_sessions(&env.db_path);
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].end_time.is_some());
}

#[test]
fn leaderboard_prints_ranked_totals() {
    let env = Env::new();
    {
        let db = env.database();
        seed(&db, "a", "c1", 0, 30);
        seed(&db, "b", "c1", 0, 20);
        seed(&db, "b", "c2", 100, 125);
    }

    let output = env
        .command()
        .args(["leaderboard", "--guild", "g1"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Leaderboard\n**Time Spent in VC**\n**1.** <@b>: 45s\n**2.** <@a>: 30s\n"
    );

    let output = env
        .command()
        .args(["leaderboard", "--guild", "g1", "--channel", "c2", "--json"])
        .output()
        .unwrap();
    assert_success(&output);
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["visibility"], "public");
    assert_eq!(reply["content"], "**Time Spent in VC**\n**1.** <@b>: 25s");
}

#[test]
fn total_reports_user_time_and_validates_target() {
    let env = Env::new();
    {
        let db = env.database();
        seed(&db, "a", "c1", 0, 10);
        seed(&db, "a", "c1", 20, 25);
    }

    let output = env
        .command()
        .args(["total", "--guild", "g1", "--user", "a", "--ephemeral", "--json"])
        .output()
        .unwrap();
    assert_success(&output);
    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["content"], "<@a> has spent 15s in voice channels");
    assert_eq!(reply["visibility"], "ephemeral");

    let output = env
        .command()
        .args(["total", "--guild", "g1"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Invalid request: missing required option: user\n"
    );
}

#[test]
fn empty_guild_id_is_rejected_by_argument_parsing() {
    let env = Env::new();
    let output = env
        .command()
        .args(["leaderboard", "--guild", ""])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn close_open_reconciles_crashed_sessions() {
    let env = Env::new();
    {
        let db = env.database();
        let session = Session::open(
            UserId::new("u1").unwrap(),
            GuildId::new("g1").unwrap(),
            ChannelId::new("c1").unwrap(),
            Utc::now() - Duration::minutes(1),
        );
        db.insert_session(&session).unwrap();
    }

    let output = env.command().arg("close-open").output().unwrap();
    assert_success(&output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Closed 1 open session(s).\n"
    );
    assert!(guild_sessions(&env.db_path)[0].end_time.is_some());
}

#[test]
fn environment_overrides_config_file_database_path() {
    let env = Env::new();
    let other_db = env.temp.path().join("from-env").join("other.db");

    let output = env
        .command()
        .env("SERAGLIO_DATABASE_PATH", &other_db)
        .arg("run")
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_success(&output);

    assert!(other_db.exists());
    assert!(!env.db_path.exists());
}
