use std::fmt::Write as _;

use anyhow::{Context, Result};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::export::{export_metafields, select, MetafieldExport, SortKey};
use crate::shop::MetafieldStore;

/// Characters of a metafield value shown in the HTML table.
pub const VALUE_PREVIEW_CHARS: usize = 160;

const INDEX_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>copysync</title></head>
<body>
<h1>Product metafields</h1>
<form action="/metafields" method="get">
  <label>Product id <input name="product_id" required></label>
  <label>Sort by <select name="sort_by">
    <option>namespace</option><option>key</option><option>type</option>
  </select></label>
  <label>Filter <input name="q"></label>
  <button type="submit">Show</button>
</form>
</body></html>
"#;

#[derive(Debug, Default, PartialEq, Eq)]
struct Query {
    product_id: Option<String>,
    sort_by: Option<String>,
    q: Option<String>,
}

fn parse_query(url: &str) -> (&str, Query) {
    let (path, raw) = url.split_once('?').unwrap_or((url, ""));
    let mut query = Query::default();
    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let slot = match name.as_ref() {
            "product_id" => &mut query.product_id,
            "sort_by" => &mut query.sort_by,
            "q" => &mut query.q,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    (path, query)
}

/// Serve requests one at a time until the process is stopped.
pub fn run(store: &dyn MetafieldStore, shop: &str, port: u16) -> Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("cannot bind {}: {}", addr, e))?;
    println!("Serving metafields for {} on http://{}/", shop, addr);

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        if let Err(e) = handle(request, store, shop) {
            warn!(%url, error = %e, "request failed");
        }
    }
    Ok(())
}

fn handle(request: Request, store: &dyn MetafieldStore, shop: &str) -> Result<()> {
    let url = request.url().to_string();
    let (path, query) = parse_query(&url);
    info!(%path, "request");

    let (status, content_type, body) = match path {
        "/" => (200, "text/html; charset=utf-8", INDEX_HTML.to_string()),
        "/metafields" | "/metafields.json" => {
            let Some(product_id) = query.product_id.as_deref().filter(|p| !p.trim().is_empty())
            else {
                return respond(request, 400, "text/plain; charset=utf-8", "missing product_id".into());
            };
            let sort = match query.sort_by.as_deref().unwrap_or_default().parse::<SortKey>() {
                Ok(sort) => sort,
                Err(e) => return respond(request, 400, "text/plain; charset=utf-8", e),
            };

            match export_metafields(store, shop, product_id) {
                Ok(export) if path == "/metafields.json" => (
                    200,
                    "application/json",
                    serde_json::to_string_pretty(&export).context("encoding export")?,
                ),
                Ok(export) => (
                    200,
                    "text/html; charset=utf-8",
                    render_metafields_html(&export, sort, query.q.as_deref()),
                ),
                Err(e) => (502, "text/plain; charset=utf-8", format!("shop request failed: {}", e)),
            }
        }
        _ => (404, "text/plain; charset=utf-8", "404 Not Found".to_string()),
    };
    respond(request, status, content_type, body)
}

fn respond(request: Request, status: u16, content_type: &str, body: String) -> Result<()> {
    let header = Header::from_bytes("Content-Type", content_type)
        .map_err(|_| anyhow::anyhow!("invalid content type {}", content_type))?;
    let response = Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(header);
    request.respond(response)?;
    Ok(())
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn preview(value: &str) -> String {
    if value.chars().count() <= VALUE_PREVIEW_CHARS {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(VALUE_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

pub fn render_metafields_html(export: &MetafieldExport, sort: SortKey, query: Option<&str>) -> String {
    let rows = select(&export.metafields, sort, query);
    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{id}</title></head><body>\n\
         <h1>{shop} · {id}</h1>\n<p>{shown} of {count} metafields, sorted by {sort}</p>\n\
         <table border=\"1\">\n<tr><th>namespace</th><th>key</th><th>type</th><th>value</th></tr>\n",
        id = escape_html(&export.product_id),
        shop = escape_html(&export.shop),
        shown = rows.len(),
        count = export.count,
        sort = sort.as_str(),
    );
    for m in rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&m.namespace),
            escape_html(&m.key),
            escape_html(&m.kind),
            escape_html(&preview(&m.value)),
        );
    }
    html.push_str("</table>\n</body></html>\n");
    html
}
