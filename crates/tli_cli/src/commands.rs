//! Subcommand implementations.

use anyhow::{Context, Result};
use log::info;
use std::io::{self, BufRead, Write};
use tli_core::{
    AppPaths, DeliveryClient, FileHistoryStore, HistoryError, HistoryStore, InteractiveCapture,
    NoteWorkflow, Record, SmtpTransport, TliConfig, WorkflowOutcome, WorkflowReport,
};

const INIT_FIELDS: [&str; 7] = [
    "SMTP Host Address",
    "SMTP Host Port",
    "Avatar (Your Name)",
    "Email (Your Email)",
    "Username (Your Email's Username)",
    "Password (Your Email's Password)",
    "Things 3 Email Address",
];

/// `tli init`: asks for every config field and saves the result.
pub fn init(paths: &AppPaths) -> Result<()> {
    let stdin = io::stdin();
    let Some(config) = prompt_config(stdin.lock(), io::stderr())? else {
        eprintln!("init was canceled.");
        return Ok(());
    };
    config.validate()?;
    config.save(&paths.config)?;
    eprintln!("You can start using tli now :)");
    Ok(())
}

/// Reads one answer per field; `None` when input ends early.
fn prompt_config<R: BufRead, W: Write>(
    mut input: R,
    mut prompt: W,
) -> Result<Option<TliConfig>> {
    let mut answers = Vec::with_capacity(INIT_FIELDS.len());
    for field in INIT_FIELDS {
        write!(prompt, "{field}: ")?;
        prompt.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        answers.push(line.trim_end_matches(['\n', '\r']).to_string());
    }

    let mut answers = answers.into_iter();
    let mut next = || answers.next().unwrap_or_default();
    Ok(Some(TliConfig {
        smtp_host: next(),
        smtp_port: next(),
        avatar: next(),
        email_addr: next(),
        username: next(),
        password: next(),
        things_addr: next(),
        ..TliConfig::default()
    }))
}

/// `tli log [n]`: prints the newest `n` records, newest first.
pub fn log(paths: &AppPaths, number: usize) -> Result<()> {
    let history = FileHistoryStore::new(&paths.history);
    let records = match history.read_tail(number) {
        Ok(records) => records,
        Err(HistoryError::NotFound(path)) => {
            anyhow::bail!(
                "cannot read {}, try storing something first",
                path.display()
            );
        }
        Err(err) => return Err(err.into()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in newest_first(records, number) {
        write!(out, "{}", render_record(&record)?)?;
    }
    Ok(())
}

fn newest_first(mut records: Vec<Record>, number: usize) -> Vec<Record> {
    // `read_tail(0)` keeps append order.
    if number == 0 {
        records.reverse();
    }
    records
}

fn render_record(record: &Record) -> Result<String> {
    let yaml = serde_yaml::to_string(record).context("cannot render history record")?;
    Ok(format!("---\n{yaml}"))
}

/// `tli todo <title...>`: captures, records and delivers one note.
///
/// `echo_attempts` prints each failed send attempt itself.
pub async fn todo(paths: &AppPaths, title: &str, echo_attempts: bool) -> Result<()> {
    let config =
        TliConfig::load_from_env(paths).context("cannot load tli config (try: tli init)")?;
    let transport = SmtpTransport::new(&config.smtp_settings()?)?;
    let workflow = NoteWorkflow::new(
        FileHistoryStore::new(&paths.history),
        DeliveryClient::new(transport, config.mail_identity()),
        config.retry_policy(),
        config.max_segment_size(),
    );

    match workflow.run(title, InteractiveCapture::stdio()).await? {
        WorkflowOutcome::Canceled => {
            eprintln!("TODO is canceled.");
        }
        WorkflowOutcome::Done(report) => {
            if echo_attempts {
                for line in attempt_warnings(&report) {
                    eprintln!("{line}");
                }
            }
            for failure in report.failures() {
                if let Err(err) = &failure.outcome {
                    eprintln!("warning: `{}` was not delivered: {err}", failure.title);
                }
            }
            if !report.all_delivered() {
                eprintln!(
                    "the note is saved in {}; run `tli log 1` to see it",
                    paths.history.display()
                );
            }
            info!(
                "event=todo module=cli status=done delivered={}/{}",
                report.delivered(),
                report.segments.len()
            );
            eprintln!("DONE!");
        }
    }
    Ok(())
}

fn attempt_warnings(report: &WorkflowReport) -> Vec<String> {
    report
        .segments
        .iter()
        .flat_map(|segment| {
            segment
                .failed_attempts
                .iter()
                .map(move |attempt| format!("warning: `{}` {attempt}", segment.title))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{attempt_warnings, newest_first, prompt_config, render_record};
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;
    use tli_core::{DeliveryReceipt, Record, SegmentReport, WorkflowReport};

    #[test]
    fn prompt_config_fills_fields_in_order() {
        let input = Cursor::new(
            "smtp.example.com\n587\nAda\nada@example.com\nada\nsecret\ninbox@things.email\n",
        );
        let mut prompts = Vec::new();
        let config = prompt_config(input, &mut prompts).unwrap().unwrap();
        assert_eq!(config.smtp_host, "smtp.example.com");
        assert_eq!(config.smtp_port, "587");
        assert_eq!(config.avatar, "Ada");
        assert_eq!(config.things_addr, "inbox@things.email");
        let prompts = String::from_utf8(prompts).unwrap();
        assert!(prompts.starts_with("SMTP Host Address: "));
        assert!(prompts.ends_with("Things 3 Email Address: "));
    }

    #[test]
    fn prompt_config_cancels_on_early_eof() {
        let input = Cursor::new("smtp.example.com\n587\n");
        assert!(prompt_config(input, Vec::new()).unwrap().is_none());
    }

    #[test]
    fn newest_first_reverses_only_the_full_listing() {
        let record = |title: &str| Record {
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            title: title.to_string(),
            body: String::new(),
        };
        let all = newest_first(vec![record("a"), record("b")], 0);
        assert_eq!(all[0].title, "b");
        let tail = newest_first(vec![record("b"), record("a")], 2);
        assert_eq!(tail[0].title, "b");
    }

    #[test]
    fn rendered_record_is_a_yaml_document() {
        let record = Record {
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            title: "Groceries".to_string(),
            body: "milk\neggs".to_string(),
        };
        let rendered = render_record(&record).unwrap();
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.contains("title: Groceries"));
    }

    #[test]
    fn attempt_warnings_name_the_segment_and_attempt() {
        let report = WorkflowReport {
            record: Record {
                time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                title: "Draft".to_string(),
                body: "a".to_string(),
            },
            segments: vec![
                SegmentReport {
                    title: "Draft (1)".to_string(),
                    failed_attempts: vec!["attempt 1: connection reset".to_string()],
                    outcome: Ok(DeliveryReceipt { attempts: 2 }),
                },
                SegmentReport {
                    title: "Draft (2)".to_string(),
                    failed_attempts: Vec::new(),
                    outcome: Ok(DeliveryReceipt { attempts: 1 }),
                },
            ],
        };
        assert_eq!(
            attempt_warnings(&report),
            vec!["warning: `Draft (1)` attempt 1: connection reset"]
        );
    }
}
