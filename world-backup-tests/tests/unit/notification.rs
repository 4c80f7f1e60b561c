//! Unit tests for log lookup, mailing and pruning

use rstest::rstest;
use test_utils::{files_with_extension, write_log, LogPruneMode, MockMailer, TestContext};
use world_backup::managers::notification::{latest_log, prune_logs, NotificationManager};

#[rstest]
#[case(5, 5, LogPruneMode::PurgeAll, 5)]
#[case(3, 5, LogPruneMode::PurgeAll, 0)]
#[case(7, 5, LogPruneMode::PurgeAll, 7)]
#[case(4, 5, LogPruneMode::KeepNewest, 0)]
#[case(5, 5, LogPruneMode::KeepNewest, 1)]
#[case(8, 5, LogPruneMode::KeepNewest, 4)]
#[case(1, 1, LogPruneMode::KeepNewest, 1)]
fn test_retention(
    #[case] present: u64,
    #[case] limit: usize,
    #[case] mode: LogPruneMode,
    #[case] expected_removed: usize,
) {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    for i in 0..present {
        write_log(&logs, &format!("backup_log_{}.log", i), i * 60);
    }

    assert_eq!(prune_logs(&logs, limit, mode), expected_removed);
    assert_eq!(
        files_with_extension(&logs, "log").len(),
        present as usize - expected_removed
    );
}

#[test]
fn test_keep_newest_keeps_most_recent() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    let newest = write_log(&logs, "new.log", 1);
    write_log(&logs, "old.log", 3600);
    write_log(&logs, "older.log", 7200);

    prune_logs(&logs, 2, LogPruneMode::KeepNewest);

    assert_eq!(files_with_extension(&logs, "log"), vec![newest]);
}

#[test]
fn test_prune_ignores_other_files() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    write_log(&logs, "a.log", 1);
    ctx.create_file("logs/readme.txt", "keep me");

    assert_eq!(prune_logs(&logs, 1, LogPruneMode::PurgeAll), 1);
    assert!(ctx.file_exists("logs/readme.txt"));
}

#[test]
fn test_latest_log_picks_newest() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    write_log(&logs, "backup_log_2026-10-14_013000.log", 86_400);
    let newest = write_log(&logs, "backup_log_2026-10-15_013000.log", 10);

    let latest = latest_log(&logs).unwrap();
    assert_eq!(latest.path, newest);
    assert_eq!(latest.file_name(), "backup_log_2026-10-15_013000.log");
}

#[test]
fn test_latest_log_none_when_missing() {
    let ctx = TestContext::new();
    assert!(latest_log(&ctx.temp_dir().join("logs")).is_none());
    assert!(latest_log(&ctx.create_subdir("empty")).is_none());
}

#[test]
fn test_notify_without_logs_does_not_mail() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    let mailer = MockMailer::new();

    let manager =
        NotificationManager::new(Some(Box::new(mailer.clone())), 5, LogPruneMode::PurgeAll);
    let report = manager.notify(&logs);

    assert!(mailer.get_sent().is_empty());
    assert!(report.log.is_none());
    assert!(!report.mailed);
}

#[test]
fn test_notify_subject_carries_log_date() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    let path = write_log(&logs, "backup_log_x.log", 0);
    let label = latest_log(&logs).unwrap().modified_label();

    let mailer = MockMailer::new();
    NotificationManager::new(Some(Box::new(mailer.clone())), 5, LogPruneMode::PurgeAll)
        .notify(&logs);

    let sent = mailer.get_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].log_path, path);
    assert_eq!(sent[0].subject, format!("World Backup Report - {}", label));
}

#[test]
fn test_notify_with_email_disabled_still_prunes() {
    let ctx = TestContext::new();
    let logs = ctx.create_subdir("logs");
    for i in 0..5 {
        write_log(&logs, &format!("{}.log", i), i * 10);
    }

    let report = NotificationManager::new(None, 5, LogPruneMode::PurgeAll).notify(&logs);

    assert!(!report.mailed);
    assert_eq!(report.pruned, 5);
}
