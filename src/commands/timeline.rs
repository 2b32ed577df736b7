use super::{finish, prepare, stop_on_ctrl_c};
use crate::cli::StreamArgs;
use crate::exit_codes;
use crate::output::RunReport;
use sinfonia::playback::PlaybackState;
use sinfonia::streaming::{StreamMode, TimelineOutcome};

pub async fn execute(args: StreamArgs) -> i32 {
    let mut session = match prepare(&args).await {
        Ok(session) => session,
        Err(code) => return code,
    };

    if !args.quiet {
        eprintln!(
            "Recording {} from {}...",
            session.fields.join(", "),
            session.source.describe()
        );
    }

    let ctrl_c = stop_on_ctrl_c(&session.orchestrator);
    let result = session
        .orchestrator
        .start_timeline(session.source.as_mut(), &session.fields)
        .await;

    let (mut report, code) = match result {
        Ok(TimelineOutcome::Scheduled {
            summary,
            handle,
            events,
            duration_secs,
        }) => {
            let outcome = if args.dry_run {
                session.orchestrator.stop();
                "scheduled"
            } else {
                if !args.quiet {
                    eprintln!("Playing {} events over {:.2}s...", events, duration_secs);
                }
                match handle.wait().await {
                    PlaybackState::Completed => "played",
                    _ => {
                        if !args.quiet {
                            eprintln!("Playback stopped by user");
                        }
                        "cancelled"
                    }
                }
            };
            let mut report = RunReport::new(StreamMode::Timeline, outcome);
            report.summary = Some(summary);
            report.events = Some(events);
            report.duration_secs = Some(duration_secs);
            (report, exit_codes::SUCCESS)
        }
        Ok(TimelineOutcome::Empty(summary)) => {
            if !args.quiet {
                eprintln!("No complete samples to play");
            }
            let mut report = RunReport::new(StreamMode::Timeline, "empty");
            report.summary = Some(summary);
            report.events = Some(0);
            (report, exit_codes::SUCCESS)
        }
        Ok(TimelineOutcome::Stopped(summary)) => {
            if !args.quiet {
                eprintln!("Stream stopped by user");
            }
            let mut report = RunReport::new(StreamMode::Timeline, "stopped");
            report.summary = Some(summary);
            (report, exit_codes::SUCCESS)
        }
        Ok(TimelineOutcome::Failed(message)) => {
            eprintln!("Error: {}", message);
            let mut report = RunReport::new(StreamMode::Timeline, "failed");
            report.error = Some(message);
            (report, exit_codes::SOURCE_ERROR)
        }
        Err(e) => {
            ctrl_c.abort();
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    ctrl_c.abort();

    finish(&report, &args, code)
}
