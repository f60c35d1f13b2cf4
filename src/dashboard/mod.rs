use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::lines::LinesCache;

#[derive(Clone)]
pub struct AppState {
    pub cache: LinesCache,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/matchups", get(matchups_handler))
        .route("/api/status", get(status_handler))
        .route("/api/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /api/matchups
async fn matchups_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .cache
        .get_or_refresh()
        .await
        .map(|snap| Json(snap.matchups.clone()))
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

/// POST /api/refresh
async fn refresh_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!("Manual refresh requested");
    state.cache.invalidate().await;
    state
        .cache
        .get_or_refresh()
        .await
        .map(|snap| Json(snap.matchups.clone()))
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    source: String,
    ttl_secs: u64,
    cached: bool,
    fetched_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    matchups: usize,
    last_updated: Option<String>,
}

/// GET /api/status — never triggers a fetch
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = state.cache.peek().await;
    Json(StatusResponse {
        source: state.cache.source_name().to_string(),
        ttl_secs: state.cache.ttl().as_secs(),
        cached: snap.is_some(),
        fetched_at: snap.as_ref().map(|s| s.fetched_at),
        expires_at: snap.as_ref().map(|s| state.cache.expires_at(s.fetched_at)),
        matchups: snap.as_ref().map(|s| s.matchups.len()).unwrap_or(0),
        last_updated: snap.as_ref().and_then(|s| s.last_updated.clone()),
    })
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>College Football Lines</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #6c63ff;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  main { padding: 1.5rem 2rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; display: flex; justify-content: space-between; align-items: center; }
  .scroll { max-height: 75vh; overflow: auto; }
  table { width: 100%; border-collapse: collapse; }
  th { position: sticky; top: 0; background: var(--card); padding: .7rem 1rem; text-align: left; font-size: .72rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); cursor: pointer; white-space: nowrap; user-select: none; }
  th:hover { color: var(--accent); }
  th.asc::after { content: ' ▲'; }
  th.desc::after { content: ' ▼'; }
  td { padding: .55rem 1rem; font-size: .85rem; border-bottom: 1px solid #1e2130; white-space: nowrap; }
  tr:last-child td { border-bottom: none; }
  .muted { color: var(--muted); }
  .empty { color: var(--muted); text-align: center; padding: 2rem; font-size: .9rem; }
  .error { color: var(--red); text-align: center; padding: 2rem; font-size: .9rem; white-space: pre-wrap; }
  .refresh-btn { background: none; border: 1px solid var(--border); color: var(--muted); padding: .3rem .8rem; border-radius: 6px; cursor: pointer; font-size: .8rem; }
  .refresh-btn:hover { border-color: var(--accent); color: var(--accent); }
</style>
</head>
<body>
<header>
  <h1>🏈 College Football Lines</h1>
  <span style="margin-left:auto;color:var(--muted);font-size:.8rem;" id="fetched-at"></span>
</header>

<main>
  <div class="panel">
    <div class="panel-header"><span id="count">Matchups</span> <button class="refresh-btn" onclick="refresh()">↻ Refresh</button></div>
    <div class="scroll">
      <table>
        <thead><tr id="head-row"></tr></thead>
        <tbody id="rows"><tr><td class="empty">Loading…</td></tr></tbody>
      </table>
    </div>
  </div>
</main>

<script>
const COLUMNS = [
  'home', 'road', 'matchup', 'homeTeam_conference', 'roadTeam_conference',
  'opening_line', 'current_line', 'line_movement', 'midweek_line',
  'prob_homeTeam_covers', 'prob_roadTeam_covers', 'avg_predicted_winner',
  'prediction_st_dev', 'prob_homeTeam_wins', 'brinks_number', 'brinks_label',
];
const PROB = new Set(['prob_homeTeam_covers', 'prob_roadTeam_covers', 'prob_homeTeam_wins', 'brinks_number']);
const esc = s => String(s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
const cell = (col, v) => {
  if (v === null || v === undefined) return '<span class="muted">nan</span>';
  if (typeof v !== 'number') return `<span class="${col === 'midweek_line' ? 'muted' : ''}">${esc(v)}</span>`;
  if (PROB.has(col)) return (v*100).toFixed(1) + '%';
  return Number.isInteger(v) ? v.toFixed(1) : String(v);
};

let rows = [];
let sortCol = null, sortDir = 1;

function compare(a, b) {
  const x = a[sortCol], y = b[sortCol];
  const xn = typeof x === 'number', yn = typeof y === 'number';
  // numbers before sentinel strings, regardless of direction
  if (xn !== yn) return xn ? -1 : 1;
  if (xn) return (x - y) * sortDir;
  return String(x).localeCompare(String(y)) * sortDir;
}

function renderHead() {
  document.getElementById('head-row').innerHTML = COLUMNS.map(c => {
    const cls = c === sortCol ? (sortDir > 0 ? 'asc' : 'desc') : '';
    return `<th class="${cls}" data-col="${c}">${c}</th>`;
  }).join('');
  document.querySelectorAll('#head-row th').forEach(th => th.onclick = () => {
    const c = th.dataset.col;
    if (sortCol === c) { sortDir = -sortDir; } else { sortCol = c; sortDir = 1; }
    render();
  });
}

function render() {
  renderHead();
  const tbody = document.getElementById('rows');
  document.getElementById('count').textContent = `Matchups (${rows.length})`;
  if (!rows.length) { tbody.innerHTML = `<tr><td colspan="${COLUMNS.length}" class="empty">No Power-5 games in the feed</td></tr>`; return; }
  const view = sortCol ? rows.slice().sort(compare) : rows;
  tbody.innerHTML = view.map(r => '<tr>' + COLUMNS.map(c => `<td>${cell(c, r[c])}</td>`).join('') + '</tr>').join('');
}

function showError(text) {
  renderHead();
  document.getElementById('rows').innerHTML = `<tr><td colspan="${COLUMNS.length}" class="error">${esc(text)}</td></tr>`;
}

async function loadStatus() {
  const r = await fetch('/api/status');
  if (!r.ok) return;
  const s = await r.json();
  document.getElementById('fetched-at').textContent = s.fetched_at ? 'Fetched ' + new Date(s.fetched_at).toLocaleString() : '';
}

async function load(url, opts) {
  const r = await fetch(url, opts);
  if (!r.ok) { showError(await r.text()); return; }
  rows = await r.json();
  render();
  await loadStatus();
}

const refresh = () => load('/api/refresh', { method: 'POST' });

load('/api/matchups');
</script>
</body>
</html>"#;
