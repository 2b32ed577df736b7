use super::{finish, prepare, stop_on_ctrl_c};
use crate::cli::StreamArgs;
use crate::exit_codes;
use crate::output::RunReport;
use sinfonia::streaming::{StreamMode, StreamOutcome};

pub async fn execute(args: StreamArgs) -> i32 {
    let mut session = match prepare(&args).await {
        Ok(session) => session,
        Err(code) => return code,
    };

    if !args.quiet {
        eprintln!(
            "Streaming {} from {}...",
            session.fields.join(", "),
            session.source.describe()
        );
    }

    let ctrl_c = stop_on_ctrl_c(&session.orchestrator);
    let result = session
        .orchestrator
        .start_live(session.source.as_mut(), &session.fields)
        .await;
    ctrl_c.abort();

    let (mut report, code) = match result {
        Ok(StreamOutcome::Completed(summary)) => {
            let mut report = RunReport::new(StreamMode::Live, "completed");
            report.summary = Some(summary);
            (report, exit_codes::SUCCESS)
        }
        Ok(StreamOutcome::Stopped(summary)) => {
            if !args.quiet {
                eprintln!("Stream stopped by user");
            }
            let mut report = RunReport::new(StreamMode::Live, "stopped");
            report.summary = Some(summary);
            (report, exit_codes::SUCCESS)
        }
        Ok(StreamOutcome::Failed(message)) => {
            eprintln!("Error: {}", message);
            let mut report = RunReport::new(StreamMode::Live, "failed");
            report.error = Some(message);
            (report, exit_codes::SOURCE_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    report.triggers = session.recording.as_ref().map(|r| r.len());
    finish(&report, &args, code)
}
