use std::time::Instant;

use anyhow::Result;

use signalq::config::{day_key, Config};
use signalq::dashboard::{self, DashboardState};
use signalq::logging::{self, obj, v_num, v_str, Domain};
use signalq::pipeline;
use signalq::remote::HttpSource;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (username, password) = match (args.next(), args.next()) {
        (Some(u), Some(p)) => (u, p),
        _ => {
            eprintln!("usage: signalq <username> <password>");
            std::process::exit(1);
        }
    };

    let cfg = Config::from_env();
    let started = Instant::now();
    logging::info(
        Domain::System,
        "run_start",
        obj(&[
            ("user", v_str(&username)),
            ("start_date", v_str(&day_key(cfg.start_date))),
            ("end_date", v_str(&day_key(cfg.end_date))),
            ("metrics", v_num(cfg.metrics.len() as f64)),
        ]),
    );

    let source = HttpSource::new(&cfg, &username, &password)?;
    let output = pipeline::run(&cfg, &source).await?;

    logging::info(
        Domain::System,
        "run_complete",
        obj(&[
            ("series", v_num(output.table.len() as f64)),
            ("records", v_num(output.report.records as f64)),
            ("days_fetched", v_num(output.report.days_fetched as f64)),
            ("bad_files", v_num(output.report.bad_files as f64)),
            ("elapsed_secs", v_num(started.elapsed().as_secs_f64())),
        ]),
    );

    let state =
        DashboardState::build(&output.table, &output.trends, &output.manifest, &output.report);
    dashboard::serve(&state, cfg.dashboard_port)
}
