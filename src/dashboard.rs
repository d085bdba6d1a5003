//! Local dashboard server.
//!
//! Serves the aggregated series, the per-series trend fits, and the run's
//! quality report as JSON, plus a single HTML page that charts everything
//! client-side. One thread, one request at a time; the state is immutable
//! once the pipeline hands it over.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use anyhow::{bail, Result};
use serde_json::json;

use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::quality::{FetchManifest, QualityReport};
use crate::series::{SeriesKey, SeriesTable};
use crate::trend::TrendResult;

pub struct DashboardState {
    series_count: usize,
    series_json: String,
    trends_json: String,
    quality_json: String,
}

impl DashboardState {
    /// Pre-render every payload once; nothing changes after the pipeline run.
    pub fn build(
        table: &SeriesTable,
        trends: &[(SeriesKey, Option<TrendResult>)],
        manifest: &FetchManifest,
        report: &QualityReport,
    ) -> Self {
        let series: Vec<_> = table
            .iter()
            .map(|(key, points)| {
                json!({
                    "lab_id": &key.lab_id,
                    "metric_name": &key.metric_name,
                    "points": points.iter().map(|(&ts, &v)| json!([ts, v])).collect::<Vec<_>>(),
                })
            })
            .collect();
        let labs: serde_json::Map<String, serde_json::Value> = table
            .labs()
            .into_iter()
            .map(|(lab, nodes)| (lab, json!(nodes.into_iter().collect::<Vec<_>>())))
            .collect();
        let series_json = json!({
            "series": series,
            "labs": labs,
            "metrics": table.metric_names().into_iter().collect::<Vec<_>>(),
        })
        .to_string();

        let trends_json = json!({
            "trends": trends
                .iter()
                .map(|(key, fit)| {
                    json!({
                        "lab_id": &key.lab_id,
                        "metric_name": &key.metric_name,
                        "trend": fit,
                    })
                })
                .collect::<Vec<_>>(),
        })
        .to_string();

        let quality_json = json!({
            "report": report,
            "manifest": manifest,
        })
        .to_string();

        Self { series_count: table.len(), series_json, trends_json, quality_json }
    }

    /// Dispatch one request line to (status, content type, body).
    pub fn respond(&self, request: &str) -> (&'static str, &'static str, String) {
        if request.starts_with("GET /api/series") {
            ("200 OK", "application/json", self.series_json.clone())
        } else if request.starts_with("GET /api/trends") {
            ("200 OK", "application/json", self.trends_json.clone())
        } else if request.starts_with("GET /api/quality") {
            ("200 OK", "application/json", self.quality_json.clone())
        } else if request.starts_with("GET /api/health") {
            ("200 OK", "application/json", r#"{"status":"ok"}"#.to_string())
        } else if request.starts_with("GET / ") || request.starts_with("GET /index") {
            ("200 OK", "text/html; charset=utf-8", INDEX_HTML.to_string())
        } else {
            ("404 NOT FOUND", "text/plain", "Not Found".to_string())
        }
    }
}

/// Bind the local endpoint and serve until killed. Refuses an empty table:
/// a dashboard with nothing to chart means the run failed upstream.
pub fn serve(state: &DashboardState, port: u16) -> Result<()> {
    if state.series_count == 0 {
        bail!("no series to display; refusing to start the dashboard");
    }

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port))?;
    logging::info(
        Domain::Dash,
        "listening",
        obj(&[("port", v_num(port as f64)), ("series", v_num(state.series_count as f64))]),
    );
    println!("Dashboard running at http://localhost:{}", port);
    println!();
    println!("Endpoints:");
    println!("  GET /            - charts and lab inventory");
    println!("  GET /api/series  - aggregated series as JSON");
    println!("  GET /api/trends  - per-series regression fits");
    println!("  GET /api/quality - fetch manifest and quality report");
    println!("  GET /api/health  - health check");
    println!();

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(_) => continue,
        };

        let buf_reader = BufReader::new(&stream);
        let request_line = buf_reader.lines().next();

        let request = match request_line {
            Some(Ok(line)) => line,
            _ => continue,
        };

        let (status, content_type, body) = state.respond(&request);
        let response = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Length: {}\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());

        logging::debug(
            Domain::Dash,
            "request",
            obj(&[("line", v_str(&request)), ("status", v_str(status))]),
        );
    }
    Ok(())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Optical Signal Quality</title>
<script src="https://cdn.plot.ly/plotly-2.27.0.min.js"></script>
<style>
  body { font-family: Arial, sans-serif; margin: 0; background: #e9ecef; }
  header { background: #1d3557; color: #fff; padding: 16px 24px; }
  header h1 { margin: 0; font-size: 22px; }
  #quality { padding: 8px 24px; background: #f1faee; color: #333; font-size: 14px; }
  .cards { display: flex; flex-wrap: wrap; gap: 12px; padding: 12px 24px; }
  .card { background: #e7f8eb; border-radius: 6px; padding: 12px 16px; min-width: 180px; }
  .card h3 { margin: 0 0 6px 0; color: #3abf5b; font-size: 16px; }
  .card p { margin: 0; font-size: 13px; color: #444; }
  .chart { background: #fff; margin: 12px 24px; border-radius: 6px; padding: 8px; }
</style>
</head>
<body>
<header><h1>Optical Signal Quality</h1></header>
<div id="quality"></div>
<div id="labs" class="cards"></div>
<div id="charts"></div>
<script>
async function getJson(path) {
  const resp = await fetch(path);
  if (!resp.ok) throw new Error(path + ': ' + resp.status);
  return resp.json();
}

function trendKey(t) { return t.lab_id + ' ' + t.metric_name; }

async function main() {
  const [seriesDoc, trendsDoc, qualityDoc] = await Promise.all([
    getJson('/api/series'), getJson('/api/trends'), getJson('/api/quality')
  ]);

  const rep = qualityDoc.report;
  document.getElementById('quality').textContent =
    'Fetched ' + rep.days_fetched + '/' + rep.days_requested + ' days | ' +
    rep.records + ' records | ' + rep.gaps + ' gaps | ' +
    rep.bad_files + ' malformed files';

  const labsDiv = document.getElementById('labs');
  for (const [lab, nodes] of Object.entries(seriesDoc.labs)) {
    const card = document.createElement('div');
    card.className = 'card';
    card.innerHTML = '<h3></h3><p></p>';
    card.querySelector('h3').textContent = lab;
    card.querySelector('p').textContent = nodes.join(', ');
    labsDiv.appendChild(card);
  }

  const trends = new Map();
  for (const t of trendsDoc.trends) trends.set(trendKey(t), t.trend);

  const charts = document.getElementById('charts');
  for (const s of seriesDoc.series) {
    const div = document.createElement('div');
    div.className = 'chart';
    charts.appendChild(div);

    const xs = s.points.map(p => new Date(p[0] * 1000));
    const ys = s.points.map(p => p[1]);
    const traces = [{
      x: xs, y: ys, mode: 'lines+markers', name: s.lab_id, line: { width: 2 }
    }];

    const trend = trends.get(trendKey(s));
    if (trend) {
      const t0 = s.points[0][0];
      const tn = s.points[s.points.length - 1][0];
      traces.push({
        x: [new Date(t0 * 1000), new Date(tn * 1000)],
        y: [trend.intercept, trend.intercept + trend.slope * (tn - t0)],
        mode: 'lines',
        name: 'trend (r=' + trend.r_value.toFixed(3) + ')',
        line: { dash: 'dash', width: 2 }
      });
    }

    Plotly.newPlot(div, traces, {
      title: { text: '<b>' + s.metric_name + ' (' + s.lab_id + ')</b>',
               font: { size: 18, color: '#007BFF', family: 'Arial' } },
      xaxis: { title: 'Time' },
      yaxis: { title: s.metric_name },
      height: 360
    }, { displayModeBar: false });
  }
}

main().catch(err => {
  document.getElementById('quality').textContent = 'Failed to load dashboard data: ' + err;
});
</script>
</body>
</html>
"#;
