//! Dashboard HTML page handler for the vocab service.

use crate::db::{VocabFilter, VocabOrder};
use crate::routes::AppState;
use crate::schedule::{DEFAULT_DUE_LIMIT, Scheduler, today};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use html_escape::encode_text;
use std::sync::Arc;
use vocab_types::VocabEntry;

const RECENT_LIMIT: i64 = 50;

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let scheduler = Scheduler::new(&state.db);
    let total = state.db.count(&VocabFilter::default()).unwrap_or(0);
    let due_count = scheduler.count_due().unwrap_or(0);
    let due = scheduler.list_due(DEFAULT_DUE_LIMIT).unwrap_or_default();
    let (entries, _) = state
        .db
        .find_all(&VocabFilter::default(), VocabOrder::PracticeAt, 0, RECENT_LIMIT)
        .unwrap_or_default();
    let uptime = state.start_time.elapsed().as_secs();

    let mut due_rows = String::new();
    for entry in &due {
        due_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{} days overdue</td></tr>\n",
            encode_text(&entry.term),
            encode_text(&entry.translation),
            entry.knowledge_level,
            -days_until(entry),
        ));
    }
    if due_rows.is_empty() {
        due_rows = "<tr><td colspan=\"4\">Nothing to practice right now.</td></tr>".to_string();
    }

    let mut entry_rows = String::new();
    for entry in &entries {
        entry_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"mono\">{}</td></tr>\n",
            encode_text(&entry.term),
            encode_text(&entry.translation),
            entry.knowledge_level,
            days_until(entry),
            entry.practice_at.format("%Y-%m-%d"),
        ));
    }
    if entry_rows.is_empty() {
        entry_rows =
            "<tr><td colspan=\"5\">No vocab yet. Add some through the API or import a CSV.</td></tr>"
                .to_string();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>vocab</title>
<style>
  * {{ margin: 0; padding: 0; box-sizing: border-box; }}
  body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f1117; color: #e0e0e0; padding: 20px; }}
  h1 {{ color: #58a6ff; margin-bottom: 8px; }}
  h2 {{ color: #c9d1d9; margin: 16px 0 8px; font-size: 1.1em; }}
  .meta {{ color: #8b949e; font-size: 0.85em; margin-bottom: 20px; }}
  .stats {{ display: flex; gap: 16px; margin-bottom: 24px; flex-wrap: wrap; }}
  .stat {{ background: #161b22; border: 1px solid #30363d; border-radius: 8px; padding: 16px 24px; text-align: center; min-width: 140px; }}
  .stat .val {{ display: block; font-size: 2em; font-weight: bold; color: #58a6ff; }}
  .stat.yellow .val {{ color: #d29922; }}
  .stat .lbl {{ display: block; font-size: 0.85em; color: #8b949e; margin-top: 4px; }}
  table {{ width: 100%; border-collapse: collapse; margin-bottom: 24px; }}
  th {{ background: #161b22; color: #8b949e; text-align: left; padding: 8px 12px; font-size: 0.85em; text-transform: uppercase; border-bottom: 1px solid #30363d; }}
  td {{ padding: 8px 12px; border-bottom: 1px solid #21262d; font-size: 0.9em; }}
  td.num {{ text-align: right; }}
  td.mono {{ font-family: monospace; }}
  tr:hover {{ background: #161b22; }}
</style>
</head>
<body>
<h1>vocab</h1>
<p class="meta">Uptime: {uptime}s &middot; Today: {today}</p>
<div class="stats">
  <div class="stat"><span class="val">{total}</span><span class="lbl">Entries</span></div>
  <div class="stat yellow"><span class="val">{due_count}</span><span class="lbl">Due for practice</span></div>
</div>
<h2>Practice next</h2>
<table>
<tr><th>Term</th><th>Translation</th><th>Knowledge</th><th>Due</th></tr>
{due_rows}
</table>
<h2>Vocabulary</h2>
<table>
<tr><th>Term</th><th>Translation</th><th>Knowledge</th><th>Practice in (days)</th><th>Practice at</th></tr>
{entry_rows}
</table>
</body>
</html>"#,
        uptime = uptime,
        today = today().format("%Y-%m-%d"),
        total = total,
        due_count = due_count,
        due_rows = due_rows,
        entry_rows = entry_rows,
    );

    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

/// Whole days from today until the entry is due; negative when overdue.
fn days_until(entry: &VocabEntry) -> i64 {
    (entry.practice_at.date_naive() - today().date_naive()).num_days()
}
