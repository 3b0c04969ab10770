//! Command-line entry point for the agricultural declaration service.

mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use ag_declaration::error::AppError;
use std::error::Error;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

/// One line per error in the `source` chain, outermost first.
pub fn error_report(err: &AppError) -> String {
    let mut report = format!("application error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        report.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    report
}
