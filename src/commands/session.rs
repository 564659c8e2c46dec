use crate::commands::Out;
use crate::rollover::RolloverReport;
use crate::Config;
use crate::Result;
use chrono::NaiveDate;

/// Starts a session on `as_of`: last month's unpaid transactions are carried into the current
/// month. Running it again in the same month carries nothing new.
///
/// Rollover problems never fail the session. They are logged and show up in the message.
pub async fn session(config: Config, as_of: NaiveDate) -> Result<Out<RolloverReport>> {
    let report = config.ledger().start_session(config.user_id(), as_of).await;
    Ok(session_out(report))
}

fn session_out(report: Option<RolloverReport>) -> Out<RolloverReport> {
    let Some(report) = report else {
        return Out::new_message(
            "Session started, but unpaid transactions could not be carried forward",
        );
    };
    let message = format!(
        "Session started: carried {} unpaid transaction(s) from {} into {}{}",
        report.created.len(),
        report.source_month,
        report.target_month,
        if report.is_complete() {
            String::new()
        } else {
            format!(", {} failed", report.failures.len())
        }
    );
    Out::new(message, report)
}
