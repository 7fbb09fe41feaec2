use sest::config::load_config;
use sest::pipeline::{dispatch, ChannelSink, Coordinator};
use sest::rule::{load_rules, RenderedEvent};
use sest::source::WatchTargets;
use sest::watch::{watch_channel, Notification, PollWatcher, Watcher};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Writes app.log, a login template and a config naming both.
fn write_fixture(temp_dir: &TempDir, extra_input: &str) -> (PathBuf, PathBuf) {
    let log_path = temp_dir.path().join("app.log");
    fs::write(&log_path, "").unwrap();
    fs::write(
        temp_dir.path().join("login.tpl"),
        "{{ groups.1 }} logged in at {{ timestamp() }}",
    )
    .unwrap();

    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        format!(
            r#"
input:
  files: [app.log]
{}
events:
  login:
    src: 'LOGIN user=(\w+)'
    dest: login.tpl
    event_type: user_login
    channel_name: auth
watch:
  mode: poll
  poll_interval: 10ms
"#,
            extra_input
        ),
    )
    .unwrap();

    (config_path, log_path)
}

#[tokio::test]
async fn test_login_line_renders_one_event() {
    let temp_dir = TempDir::new().unwrap();
    let (config_path, log_path) = write_fixture(&temp_dir, "");

    let config = load_config(&config_path).unwrap();
    let filter = config.input.include_filter();
    let targets = WatchTargets::from_input(&config.input, filter.as_ref());
    let loaded = load_rules(&config.events);
    assert!(loaded.rejected.is_empty());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut coordinator = Coordinator::new(targets, loaded.rules, ChannelSink::new(event_tx));

    let (mut senders, streams) = watch_channel();
    append(&log_path, "LOGIN user=alice\n");
    senders.notify(Notification::write(log_path.clone()));
    senders.close();

    let stats = dispatch(streams, &mut coordinator).await.unwrap();
    assert_eq!(stats.events, 1);

    let event = event_rx.recv().await.unwrap();
    assert!(event.payload.starts_with("alice logged in at "));
    assert_eq!(event.event_type, "user_login");
    assert_eq!(event.channel, "auth");
    assert_eq!(event.source.as_deref(), Some(log_path.as_path()));
    assert!(event_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_dot_template_renders_login() {
    let temp_dir = TempDir::new().unwrap();
    let (config_path, log_path) = write_fixture(&temp_dir, "");
    fs::write(temp_dir.path().join("login.tpl"), "{{.}} logged in").unwrap();

    let config = load_config(&config_path).unwrap();
    let targets = WatchTargets::from_input(&config.input, None);
    let loaded = load_rules(&config.events);
    assert!(loaded.rejected.is_empty());

    let mut coordinator = Coordinator::new(targets, loaded.rules, Vec::<RenderedEvent>::new());

    let (mut senders, streams) = watch_channel();
    append(&log_path, "LOGIN user=alice\n");
    senders.notify(Notification::write(log_path.clone()));
    senders.close();

    let stats = dispatch(streams, &mut coordinator).await.unwrap();
    assert_eq!(stats.events, 1);

    let events = coordinator.into_sink();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload, "alice logged in");
    assert_eq!(events[0].event_type, "user_login");
    assert_eq!(events[0].channel, "auth");
}

#[tokio::test]
async fn test_dollar_template_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let (config_path, log_path) = write_fixture(&temp_dir, "");
    fs::write(temp_dir.path().join("login.tpl"), "user=$1 event=$$login").unwrap();

    let config = load_config(&config_path).unwrap();
    let targets = WatchTargets::from_input(&config.input, None);
    let loaded = load_rules(&config.events);
    let mut coordinator = Coordinator::new(targets, loaded.rules, Vec::<RenderedEvent>::new());

    append(&log_path, "LOGIN user=alice\nLOGIN user=bob\n");
    coordinator.process_path(&log_path);

    let payloads: Vec<&str> = coordinator.sink().iter().map(|e| e.payload.as_str()).collect();
    assert_eq!(payloads, vec!["user=alice event=$login", "user=bob event=$login"]);
}

#[tokio::test]
async fn test_poll_watcher_drives_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let (config_path, log_path) = write_fixture(&temp_dir, "");
    let config = load_config(&config_path).unwrap();

    let targets = WatchTargets::from_input(&config.input, None);
    let loaded = load_rules(&config.events);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut coordinator = Coordinator::new(targets, loaded.rules, ChannelSink::new(event_tx));

    let mut watcher = PollWatcher::new(config.watch.poll_interval);
    watcher.watch(&log_path).unwrap();
    let streams = watcher.start().unwrap();

    let pipeline = tokio::spawn(async move {
        let stats = dispatch(streams, &mut coordinator).await;
        (stats, coordinator)
    });

    append(&log_path, "noise\nLOGIN user=alice\n");
    let first: RenderedEvent = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert!(first.payload.starts_with("alice logged in"));

    append(&log_path, "LOGIN user=bob\n");
    let second = timeout(WAIT, event_rx.recv()).await.unwrap().unwrap();
    assert!(second.payload.starts_with("bob logged in"));

    watcher.stop();
    let (stats, mut coordinator) = timeout(WAIT, pipeline).await.unwrap().unwrap();
    let stats = stats.unwrap();
    assert_eq!(stats.events, 2);
    assert_eq!(
        coordinator.targets().get(&log_path).unwrap().current_offset(),
        "noise\nLOGIN user=alice\nLOGIN user=bob\n".len() as u64
    );

    coordinator.shutdown();
}

#[tokio::test]
async fn test_directory_enumeration_registers_filtered_files() {
    let temp_dir = TempDir::new().unwrap();
    let logs = temp_dir.path().join("logs");
    fs::create_dir(&logs).unwrap();
    for name in ["a.log", "b.log", "a.txt"] {
        fs::write(logs.join(name), "").unwrap();
    }
    fs::write(temp_dir.path().join("login.tpl"), "{{ groups.1 }}").unwrap();

    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        r#"
input:
  directories: [logs]
  filter: '\.log$'
events:
  login:
    src: 'LOGIN user=(\w+)'
    dest: login.tpl
"#,
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let filter = config.input.include_filter();
    let targets = WatchTargets::from_input(&config.input, filter.as_ref());

    let expected = vec![logs.join("a.log"), logs.join("b.log")];
    let paths: Vec<PathBuf> = targets.paths().map(Path::to_path_buf).collect();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_hold_partial_lines_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let (config_path, log_path) = write_fixture(&temp_dir, "  hold_partial_lines: true");
    let config = load_config(&config_path).unwrap();
    assert!(config.input.hold_partial_lines);

    let targets = WatchTargets::from_input(&config.input, None);
    let loaded = load_rules(&config.events);
    let mut coordinator = Coordinator::new(targets, loaded.rules, Vec::<RenderedEvent>::new())
        .with_partial_lines(config.input.hold_partial_lines);

    let (mut senders, streams) = watch_channel();
    append(&log_path, "LOGIN user=al");
    senders.notify(Notification::write(log_path.clone()));
    senders.close();
    dispatch(streams, &mut coordinator).await.unwrap();
    assert!(coordinator.sink().is_empty());

    let (mut senders, streams) = watch_channel();
    append(&log_path, "ice\n");
    senders.notify(Notification::write(log_path.clone()));
    senders.close();
    dispatch(streams, &mut coordinator).await.unwrap();

    assert_eq!(coordinator.sink().len(), 1);
    assert!(coordinator.sink()[0].payload.starts_with("alice logged in"));
}
